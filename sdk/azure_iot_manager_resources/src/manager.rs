//! Entry point for provisioning: one client and one shared token cache.

use std::sync::Arc;

use azure_iot_manager_core::auth::ClientAuthenticator;
use azure_iot_manager_core::client::ManagementClient;
use azure_iot_manager_core::error::ProvisioningResult;
use azure_iot_manager_core::models::ClientConfig;

use crate::config::FromEnv;
use crate::dps::Dps;
use crate::iot_hub::IotHub;
use crate::resource_group::ResourceGroup;

/// Creates resource groups and hands out handles to existing resources.
///
/// Every handle obtained from one manager shares its token cache, so a whole
/// provisioning sequence performs a single token exchange while the token
/// stays valid.
#[derive(Debug, Clone)]
pub struct IotManager {
    auth: Arc<ClientAuthenticator>,
}

impl IotManager {
    /// Create a manager talking to the public Azure cloud.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: ClientConfig) -> ProvisioningResult<Self> {
        let client = ManagementClient::builder().config(config).build()?;
        Ok(Self::with_client(client))
    }

    /// Create a manager from `AZURE_*` environment variables.
    ///
    /// See [`FromEnv`] for the variables read.
    pub fn from_env() -> ProvisioningResult<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Create a manager around a preconfigured client.
    pub fn with_client(client: ManagementClient) -> Self {
        Self {
            auth: Arc::new(ClientAuthenticator::new(client)),
        }
    }

    pub fn client(&self) -> &ManagementClient {
        self.auth.client()
    }

    pub fn authenticator(&self) -> &Arc<ClientAuthenticator> {
        &self.auth
    }

    /// Create (or update) a resource group and return a handle to it.
    ///
    /// # Tracing
    ///
    /// Emits a span named `iot::manager::create_resource_group`.
    #[tracing::instrument(
        name = "iot::manager::create_resource_group",
        skip(self, name),
        fields(resource_group = %name)
    )]
    pub async fn create_resource_group(
        &self,
        location: &str,
        name: &str,
    ) -> ProvisioningResult<ResourceGroup> {
        let token = self.auth.get_token_cached().await?;
        let details = self
            .client()
            .create_resource_group(&token, location, name)
            .await?;

        tracing::debug!("resource group ready");
        Ok(ResourceGroup::new(
            Arc::clone(&self.auth),
            name,
            Some(location.to_string()),
            Some(details),
        ))
    }

    /// A handle to a resource group that already exists. No request is sent.
    pub fn attach_resource_group(&self, name: &str) -> ResourceGroup {
        ResourceGroup::new(Arc::clone(&self.auth), name, None, None)
    }

    /// A handle to an IoT Hub that already exists. No request is sent.
    pub fn attach_iot_hub(&self, resource_group: &str, name: &str) -> IotHub {
        IotHub::new(Arc::clone(&self.auth), resource_group, name, None, None)
    }

    /// A handle to a DPS instance that already exists and is linked to
    /// `iot_hub`. No request is sent.
    pub fn attach_dps(&self, resource_group: &str, iot_hub: &str, name: &str) -> Dps {
        Dps::new(Arc::clone(&self.auth), resource_group, iot_hub, name, None)
    }
}
