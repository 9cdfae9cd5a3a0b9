//! Owner connection strings for IoT Hub and DPS.
//!
//! Azure returns only the shared access keys; the connection strings are
//! assembled locally from the resource name and the primary key.

/// Shared access policy whose key is used for IoT Hub connection strings.
pub const IOT_HUB_OWNER_POLICY: &str = "iothubowner";

/// Shared access policy whose key is used for DPS connection strings.
pub const DPS_OWNER_POLICY: &str = "provisioningserviceowner";

/// Connection string for the `iothubowner` policy of an IoT Hub.
pub fn iot_hub(name: &str, primary_key: &str) -> String {
    format!(
        "HostName={}.azure-devices.net;SharedAccessKeyName={};SharedAccessKey={}",
        name, IOT_HUB_OWNER_POLICY, primary_key
    )
}

/// Connection string for the `provisioningserviceowner` policy of a DPS instance.
pub fn dps(name: &str, primary_key: &str) -> String {
    format!(
        "HostName={}.azure-devices-provisioning.net;SharedAccessKeyName={};SharedAccessKey={}",
        name, DPS_OWNER_POLICY, primary_key
    )
}
