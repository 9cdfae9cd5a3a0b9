//! Handle to a Device Provisioning Service instance.

use std::fmt;
use std::sync::Arc;

use azure_iot_manager_core::auth::ClientAuthenticator;
use azure_iot_manager_core::error::{ProvisioningError, ProvisioningResult};
use tokio::sync::OnceCell;

/// A DPS instance known to exist, linked to an IoT Hub.
///
/// The scope ID and owner connection string are fetched on first use and
/// cached for the lifetime of the handle.
pub struct Dps {
    auth: Arc<ClientAuthenticator>,
    resource_group: String,
    iot_hub: String,
    name: String,
    details: Option<serde_json::Value>,
    scope_id: OnceCell<String>,
    connection_string: OnceCell<String>,
}

impl Dps {
    pub(crate) fn new(
        auth: Arc<ClientAuthenticator>,
        resource_group: &str,
        iot_hub: &str,
        name: &str,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            auth,
            resource_group: resource_group.to_string(),
            iot_hub: iot_hub.to_string(),
            name: name.to_string(),
            details,
            scope_id: OnceCell::new(),
            connection_string: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    /// Name of the IoT Hub this instance is linked to.
    pub fn iot_hub(&self) -> &str {
        &self.iot_hub
    }

    /// Resource Manager response from creation, `None` for attached instances.
    pub fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }

    /// The ID scope devices use when provisioning, fetched once and cached.
    pub async fn scope_id(&self) -> ProvisioningResult<&str> {
        self.scope_id
            .get_or_try_init(|| async {
                let token = self.auth.get_token_cached().await?;
                self.auth
                    .client()
                    .get_dps_scope_id(&token, &self.resource_group, &self.name)
                    .await
                    .map_err(|e| self.with_hub(e))
            })
            .await
            .map(String::as_str)
    }

    /// The `provisioningserviceowner` connection string, fetched once and cached.
    pub async fn connection_string(&self) -> ProvisioningResult<&str> {
        self.connection_string
            .get_or_try_init(|| async {
                let token = self.auth.get_token_cached().await?;
                self.auth
                    .client()
                    .get_dps_connection_string(&token, &self.resource_group, &self.name)
                    .await
                    .map_err(|e| self.with_hub(e))
            })
            .await
            .map(String::as_str)
    }

    fn with_hub(&self, err: ProvisioningError) -> ProvisioningError {
        match err {
            ProvisioningError::Dps(e) => ProvisioningError::Dps(e.with_iot_hub(&self.iot_hub)),
            other => other,
        }
    }
}

impl fmt::Debug for Dps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dps")
            .field("resource_group", &self.resource_group)
            .field("iot_hub", &self.iot_hub)
            .field("name", &self.name)
            .field("scope_id", &self.scope_id.get())
            .field(
                "connection_string",
                &self.connection_string.get().map(|_| "[cached]"),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{dps_path, setup_manager};
    use azure_iot_manager_core::error::ProvisioningError;
    use azure_iot_manager_core::test_support::mount_token_endpoint;
    use tracing_test::traced_test;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RG: &str = "rg-test";
    const HUB: &str = "hub-test";
    const DPS: &str = "dps-test";

    fn keys_path() -> String {
        format!("{}/keys/provisioningserviceowner/listkeys", dps_path(RG, DPS))
    }

    #[tokio::test]
    async fn scope_id_is_cached() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;

        Mock::given(method("GET"))
            .and(path(dps_path(RG, DPS)))
            .and(query_param("api-version", "2018-01-22"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": DPS,
                "properties": {"idScope": "0ne00000A0A"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = setup_manager(&server).await;
        let dps = manager.attach_dps(RG, HUB, DPS);

        assert_eq!(dps.scope_id().await.expect("should succeed"), "0ne00000A0A");
        assert_eq!(dps.scope_id().await.expect("should succeed"), "0ne00000A0A");
    }

    #[tokio::test]
    async fn connection_string_is_cached() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path(keys_path()))
            .and(query_param("api-version", "2018-04-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keyName": "provisioningserviceowner",
                "primaryKey": "ZHBzLWtleQ=="
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = setup_manager(&server).await;
        let dps = manager.attach_dps(RG, HUB, DPS);

        let expected = "HostName=dps-test.azure-devices-provisioning.net;SharedAccessKeyName=provisioningserviceowner;SharedAccessKey=ZHBzLWtleQ==";
        assert_eq!(dps.connection_string().await.expect("should succeed"), expected);
        assert_eq!(dps.connection_string().await.expect("should succeed"), expected);
    }

    #[tokio::test]
    async fn connection_string_error_names_the_hub() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path(keys_path()))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "httpStatusCode": "ResourceGroupNotFound",
                "message": "Resource group 'rg-test' could not be found."
            })))
            .mount(&server)
            .await;

        let manager = setup_manager(&server).await;
        let err = manager
            .attach_dps(RG, HUB, DPS)
            .connection_string()
            .await
            .unwrap_err();

        match err {
            ProvisioningError::Dps(e) => {
                assert_eq!(e.code, 404);
                assert_eq!(e.message, "ResourceGroupNotFound");
                assert_eq!(e.description, "Resource group 'rg-test' could not be found.");
                assert_eq!(e.iot_hub_name.as_deref(), Some(HUB));
                assert_eq!(e.resource_group_name.as_deref(), Some(RG));
            }
            other => panic!("Expected Dps error, got {:?}", other),
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn keys_never_reach_the_logs() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path(keys_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "primaryKey": "bG9nZ2VkLWtleQ=="
            })))
            .mount(&server)
            .await;

        let manager = setup_manager(&server).await;
        let dps = manager.attach_dps(RG, HUB, DPS);
        dps.connection_string().await.expect("should succeed");

        assert!(logs_contain("iot::dps::connection_string"));
        assert!(!logs_contain("bG9nZ2VkLWtleQ=="));
        assert!(!format!("{:?}", dps).contains("bG9nZ2VkLWtleQ=="));
    }
}
