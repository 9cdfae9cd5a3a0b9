//! Loading [`ClientConfig`] from the environment.

use azure_iot_manager_core::error::{ProvisioningError, ProvisioningResult};
use azure_iot_manager_core::models::ClientConfig;

pub const TENANT_ID_ENV: &str = "AZURE_TENANT_ID";
pub const CLIENT_ID_ENV: &str = "AZURE_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "AZURE_CLIENT_SECRET";
pub const SUBSCRIPTION_ID_ENV: &str = "AZURE_SUBSCRIPTION_ID";

/// Construct a configuration from environment variables.
pub trait FromEnv: Sized {
    fn from_env() -> ProvisioningResult<Self>;
}

impl FromEnv for ClientConfig {
    /// Read `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`, and
    /// `AZURE_SUBSCRIPTION_ID`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError::MissingConfig`] naming the first variable
    /// that is unset or empty.
    fn from_env() -> ProvisioningResult<Self> {
        Ok(ClientConfig::new(
            required(TENANT_ID_ENV)?,
            required(CLIENT_ID_ENV)?,
            required(CLIENT_SECRET_ENV)?,
            required(SUBSCRIPTION_ID_ENV)?,
        ))
    }
}

fn required(name: &str) -> ProvisioningResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ProvisioningError::MissingConfig(format!(
            "{name} environment variable is not set"
        ))),
    }
}
