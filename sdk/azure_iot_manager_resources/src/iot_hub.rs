//! Handle to an IoT Hub.

use std::fmt;
use std::sync::Arc;

use azure_iot_manager_core::auth::ClientAuthenticator;
use azure_iot_manager_core::error::{ProvisioningError, ProvisioningResult};
use azure_iot_manager_core::models::DpsSku;
use tokio::sync::OnceCell;

use crate::dps::Dps;

/// An IoT Hub known to exist.
///
/// The owner connection string is fetched on first use and cached for the
/// lifetime of the handle. `Debug` output never includes it.
pub struct IotHub {
    auth: Arc<ClientAuthenticator>,
    resource_group: String,
    name: String,
    location: Option<String>,
    details: Option<serde_json::Value>,
    connection_string: OnceCell<String>,
}

impl IotHub {
    pub(crate) fn new(
        auth: Arc<ClientAuthenticator>,
        resource_group: &str,
        name: &str,
        location: Option<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            auth,
            resource_group: resource_group.to_string(),
            name: name.to_string(),
            location,
            details,
            connection_string: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    /// Location the hub was created in, `None` for attached hubs.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Resource Manager response from creation, `None` for attached hubs.
    pub fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }

    /// The `iothubowner` connection string, fetched once and cached.
    ///
    /// A failed fetch is not cached; the next call retries.
    pub async fn connection_string(&self) -> ProvisioningResult<&str> {
        self.connection_string
            .get_or_try_init(|| async {
                let token = self.auth.get_token_cached().await?;
                self.auth
                    .client()
                    .get_iot_hub_connection_string(&token, &self.resource_group, &self.name)
                    .await
            })
            .await
            .map(String::as_str)
    }

    /// Create a DPS instance linked to this hub, with hashed allocation.
    ///
    /// The hub's connection string is fetched first if it is not cached yet.
    /// DPS failures carry this hub's name in
    /// [`DpsError::iot_hub_name`](azure_iot_manager_core::error::DpsError::iot_hub_name).
    ///
    /// # Tracing
    ///
    /// Emits a span named `iot::iot_hub::create_dps`.
    #[tracing::instrument(
        name = "iot::iot_hub::create_dps",
        skip(self, name),
        fields(resource_group = %self.resource_group, iot_hub = %self.name, dps = %name)
    )]
    pub async fn create_dps(
        &self,
        location: &str,
        sku: DpsSku,
        capacity: u32,
        name: &str,
    ) -> ProvisioningResult<Dps> {
        let hub_connection_string = self.connection_string().await?;
        let token = self.auth.get_token_cached().await?;

        let details = self
            .auth
            .client()
            .create_dps(
                &token,
                location,
                hub_connection_string,
                sku,
                capacity,
                &self.resource_group,
                name,
            )
            .await
            .map_err(|e| match e {
                ProvisioningError::Dps(e) => ProvisioningError::Dps(e.with_iot_hub(&self.name)),
                other => other,
            })?;

        tracing::debug!("DPS instance ready");
        Ok(Dps::new(
            Arc::clone(&self.auth),
            &self.resource_group,
            &self.name,
            name,
            Some(details),
        ))
    }
}

impl fmt::Debug for IotHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IotHub")
            .field("resource_group", &self.resource_group)
            .field("name", &self.name)
            .field("location", &self.location)
            .field(
                "connection_string",
                &self.connection_string.get().map(|_| "[cached]"),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{dps_path, hub_path, setup_manager};
    use azure_iot_manager_core::error::{IotHubErrorKind, ProvisioningError};
    use azure_iot_manager_core::models::DpsSku;
    use azure_iot_manager_core::test_support::mount_token_endpoint;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RG: &str = "rg-test";
    const HUB: &str = "hub-test";
    const DPS: &str = "dps-test";
    const HUB_CONNECTION_STRING: &str =
        "HostName=hub-test.azure-devices.net;SharedAccessKeyName=iothubowner;SharedAccessKey=aHViLWtleQ==";

    async fn mount_hub_keys(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(format!("{}/IotHubKeys/iothubowner/listkeys", hub_path(RG, HUB))))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keyName": "iothubowner",
                "primaryKey": "aHViLWtleQ==",
                "secondaryKey": "c2Vjb25kYXJ5"
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn connection_string_is_cached() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;
        mount_hub_keys(&server, 1).await;

        let manager = setup_manager(&server).await;
        let hub = manager.attach_iot_hub(RG, HUB);

        let first = hub.connection_string().await.expect("should succeed").to_string();
        let second = hub.connection_string().await.expect("should succeed");

        assert_eq!(first, HUB_CONNECTION_STRING);
        assert_eq!(second, HUB_CONNECTION_STRING);
    }

    #[tokio::test]
    async fn failed_connection_string_is_not_cached() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path(format!("{}/IotHubKeys/iothubowner/listkeys", hub_path(RG, HUB))))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "Code": "IotHubNotFound",
                "Message": "IotHub 'hub-test' not found"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_hub_keys(&server, 1).await;

        let manager = setup_manager(&server).await;
        let hub = manager.attach_iot_hub(RG, HUB);

        let err = hub.connection_string().await.unwrap_err();
        assert!(matches!(
            err,
            ProvisioningError::IotHub(ref e) if e.kind == IotHubErrorKind::Request && e.code == 404
        ));

        assert_eq!(
            hub.connection_string().await.expect("should succeed"),
            HUB_CONNECTION_STRING
        );
    }

    #[tokio::test]
    async fn debug_hides_connection_string() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;
        mount_hub_keys(&server, 1).await;

        let manager = setup_manager(&server).await;
        let hub = manager.attach_iot_hub(RG, HUB);
        hub.connection_string().await.expect("should succeed");

        let debug = format!("{:?}", hub);
        assert!(!debug.contains("aHViLWtleQ=="));
        assert!(debug.contains("[cached]"));
    }

    #[tokio::test]
    async fn create_dps_links_hub_connection_string() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;
        mount_hub_keys(&server, 1).await;

        Mock::given(method("PUT"))
            .and(path(dps_path(RG, DPS)))
            .and(body_partial_json(serde_json::json!({
                "properties": {
                    "iotHubs": [{"connectionString": HUB_CONNECTION_STRING, "location": "westeurope"}],
                    "allocationPolicy": "Hashed"
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "name": DPS,
                "properties": {"state": "Activating"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = setup_manager(&server).await;
        let dps = manager
            .attach_iot_hub(RG, HUB)
            .create_dps("westeurope", DpsSku::S1, 1, DPS)
            .await
            .expect("should succeed");

        assert_eq!(dps.name(), DPS);
        assert_eq!(dps.iot_hub(), HUB);
        assert_eq!(dps.resource_group(), RG);
        assert!(dps.details().is_some());
    }

    #[tokio::test]
    async fn create_dps_error_names_the_hub() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;
        mount_hub_keys(&server, 1).await;

        Mock::given(method("PUT"))
            .and(path(dps_path(RG, DPS)))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": "InvalidIotHubConnectionString", "message": "Invalid IoT Hub connection string."}
            })))
            .mount(&server)
            .await;

        let manager = setup_manager(&server).await;
        let err = manager
            .attach_iot_hub(RG, HUB)
            .create_dps("westeurope", DpsSku::S1, 1, DPS)
            .await
            .unwrap_err();

        match err {
            ProvisioningError::Dps(e) => {
                assert_eq!(e.code, 400);
                assert_eq!(e.message, "InvalidIotHubConnectionString");
                assert_eq!(e.dps_name.as_deref(), Some(DPS));
                assert_eq!(e.iot_hub_name.as_deref(), Some(HUB));
            }
            other => panic!("Expected Dps error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn create_dps_stops_when_hub_keys_fail() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path(format!("{}/IotHubKeys/iothubowner/listkeys", hub_path(RG, HUB))))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "Code": "IotHubNotFound",
                "Message": "IotHub 'hub-test' not found"
            })))
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let manager = setup_manager(&server).await;
        let err = manager
            .attach_iot_hub(RG, HUB)
            .create_dps("westeurope", DpsSku::S1, 1, DPS)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisioningError::IotHub(_)));
    }
}
