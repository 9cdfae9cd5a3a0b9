//! Handle to a resource group.

use std::sync::Arc;

use azure_iot_manager_core::auth::ClientAuthenticator;
use azure_iot_manager_core::error::ProvisioningResult;
use azure_iot_manager_core::models::IotHubSku;

use crate::iot_hub::IotHub;

/// A resource group known to exist.
///
/// Obtained from [`IotManager::create_resource_group`](crate::IotManager::create_resource_group)
/// or [`IotManager::attach_resource_group`](crate::IotManager::attach_resource_group).
#[derive(Debug, Clone)]
pub struct ResourceGroup {
    auth: Arc<ClientAuthenticator>,
    name: String,
    location: Option<String>,
    details: Option<serde_json::Value>,
}

impl ResourceGroup {
    pub(crate) fn new(
        auth: Arc<ClientAuthenticator>,
        name: &str,
        location: Option<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            auth,
            name: name.to_string(),
            location,
            details,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location the group was created in, `None` for attached groups.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Resource Manager response from creation, `None` for attached groups.
    pub fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }

    /// Create an IoT Hub in this resource group.
    ///
    /// # Tracing
    ///
    /// Emits a span named `iot::resource_group::create_iot_hub`.
    #[tracing::instrument(
        name = "iot::resource_group::create_iot_hub",
        skip(self, name),
        fields(resource_group = %self.name, iot_hub = %name)
    )]
    pub async fn create_iot_hub(
        &self,
        location: &str,
        sku: IotHubSku,
        capacity: u32,
        name: &str,
    ) -> ProvisioningResult<IotHub> {
        let token = self.auth.get_token_cached().await?;
        let details = self
            .auth
            .client()
            .create_iot_hub(&token, location, sku, capacity, &self.name, name)
            .await?;

        tracing::debug!("IoT Hub ready");
        Ok(IotHub::new(
            Arc::clone(&self.auth),
            &self.name,
            name,
            Some(location.to_string()),
            Some(details),
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{hub_path, setup_manager};
    use azure_iot_manager_core::error::{IotHubErrorKind, ProvisioningError};
    use azure_iot_manager_core::models::IotHubSku;
    use azure_iot_manager_core::test_support::{mount_token_endpoint, token_path};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RG: &str = "rg-test";
    const HUB: &str = "hub-test";

    #[tokio::test]
    async fn create_iot_hub_returns_handle() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;

        Mock::given(method("PUT"))
            .and(path(hub_path(RG, HUB)))
            .and(body_json(serde_json::json!({
                "location": "northeurope",
                "sku": {"name": "B1", "tier": "Basic", "capacity": 2}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "name": HUB,
                "properties": {"state": "Activating"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = setup_manager(&server).await;
        let hub = manager
            .attach_resource_group(RG)
            .create_iot_hub("northeurope", IotHubSku::B1, 2, HUB)
            .await
            .expect("should succeed");

        assert_eq!(hub.name(), HUB);
        assert_eq!(hub.resource_group(), RG);
        assert_eq!(hub.location(), Some("northeurope"));
        assert_eq!(
            hub.details().map(|d| &d["properties"]["state"]),
            Some(&serde_json::json!("Activating"))
        );
    }

    #[tokio::test]
    async fn create_iot_hub_failure_keeps_names() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;

        Mock::given(method("PUT"))
            .and(path(hub_path(RG, HUB)))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "Code": "ProvisionedUnitsOutOfRange",
                "Message": "Provisioned units must be between 1 and 200 for the S1 tier."
            })))
            .mount(&server)
            .await;

        let manager = setup_manager(&server).await;
        let err = manager
            .attach_resource_group(RG)
            .create_iot_hub("westeurope", IotHubSku::S1, 0, HUB)
            .await
            .unwrap_err();

        match err {
            ProvisioningError::IotHub(e) => {
                assert_eq!(e.kind, IotHubErrorKind::FailedToCreate);
                assert_eq!(e.code, 400);
                assert_eq!(e.resource_group_name.as_deref(), Some(RG));
                assert_eq!(e.iot_hub_name.as_deref(), Some(HUB));
            }
            other => panic!("Expected IotHub error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn auth_error_is_not_rewrapped() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(token_path()))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "unauthorized_client",
                "error_description": "AADSTS700016: Application not found."
            })))
            .mount(&server)
            .await;

        let manager = setup_manager(&server).await;
        let err = manager
            .attach_resource_group(RG)
            .create_iot_hub("westeurope", IotHubSku::S1, 1, HUB)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisioningError::Auth(ref e) if e.code == 400));
    }
}
