#![doc = include_str!("../README.md")]

pub mod config;
pub mod dps;
pub mod iot_hub;
pub mod manager;
pub mod resource_group;

pub use config::FromEnv;
pub use dps::Dps;
pub use iot_hub::IotHub;
pub use manager::IotManager;
pub use resource_group::ResourceGroup;

/// Test utilities shared across modules.
#[cfg(test)]
pub(crate) mod test_utils {
    use azure_iot_manager_core::test_support::{setup_mock_client, TEST_SUBSCRIPTION_ID};
    use wiremock::MockServer;

    use crate::IotManager;

    /// Create a manager whose client points at the mock server.
    pub async fn setup_manager(server: &MockServer) -> IotManager {
        IotManager::with_client(setup_mock_client(server).await)
    }

    pub fn rg_path(resource_group: &str) -> String {
        format!(
            "/subscriptions/{}/resourcegroups/{}",
            TEST_SUBSCRIPTION_ID, resource_group
        )
    }

    pub fn hub_path(resource_group: &str, name: &str) -> String {
        format!(
            "{}/providers/Microsoft.Devices/IotHubs/{}",
            rg_path(resource_group),
            name
        )
    }

    pub fn dps_path(resource_group: &str, name: &str) -> String {
        format!(
            "{}/providers/Microsoft.Devices/provisioningServices/{}",
            rg_path(resource_group),
            name
        )
    }
}
