//! Error taxonomy for Azure IoT provisioning.
//!
//! Every failure surfaced by this crate is a [`ProvisioningError`]. The four
//! domain variants ([`AuthenticationError`], [`ResourceGroupError`],
//! [`IotHubError`], [`DpsError`]) each carry the HTTP status as `code`, the
//! provider error code as `message`, the provider's human readable text as
//! `description`, and the names of the resources involved.

use std::fmt;

use thiserror::Error;

/// Description attached to failures that never produced an HTTP response.
pub const GENERIC_ERROR_DESCRIPTION: &str = "something went wrong";

/// Status code used for failures that never produced an HTTP response.
pub const TRANSPORT_ERROR_CODE: u16 = 500;

/// Errors that can occur while provisioning Azure IoT resources.
#[derive(Error, Debug)]
pub enum ProvisioningError {
    /// The client-credentials exchange failed.
    #[error(transparent)]
    Auth(#[from] AuthenticationError),

    /// A resource group operation failed.
    #[error(transparent)]
    ResourceGroup(#[from] ResourceGroupError),

    /// An IoT Hub operation failed.
    #[error(transparent)]
    IotHub(#[from] IotHubError),

    /// A Device Provisioning Service operation failed.
    #[error(transparent)]
    Dps(#[from] DpsError),

    /// An endpoint URL is invalid or a request URL could not be built.
    #[error("Invalid endpoint URL: {message}")]
    InvalidEndpoint {
        message: String,
        #[source]
        source: Option<url::ParseError>,
    },

    /// A resource name or identifier cannot be used as a URL path segment.
    #[error("Invalid resource name: {0}")]
    InvalidResourceName(String),

    /// A required configuration value is missing.
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl ProvisioningError {
    /// Create an [`InvalidEndpoint`](Self::InvalidEndpoint) error that keeps the parse error.
    pub fn invalid_endpoint_with_source(message: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidEndpoint {
            message: message.into(),
            source: Some(source),
        }
    }

    /// HTTP status of a domain error, `None` for configuration errors.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Auth(e) => Some(e.code),
            Self::ResourceGroup(e) => Some(e.code),
            Self::IotHub(e) => Some(e.code),
            Self::Dps(e) => Some(e.code),
            _ => None,
        }
    }

    /// Provider description of a domain error, `None` for configuration errors.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Auth(e) => Some(&e.description),
            Self::ResourceGroup(e) => Some(&e.description),
            Self::IotHub(e) => Some(&e.description),
            Self::Dps(e) => Some(&e.description),
            _ => None,
        }
    }
}

/// Result type alias for provisioning operations.
pub type ProvisioningResult<T> = std::result::Result<T, ProvisioningError>;

/// A failed request before it is attributed to a domain.
///
/// Produced by the request gateway and converted into exactly one domain error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestFailure {
    pub(crate) code: u16,
    pub(crate) message: String,
    pub(crate) description: String,
}

impl RequestFailure {
    /// A request that never got an HTTP response.
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self {
            code: TRANSPORT_ERROR_CODE,
            message: message.into(),
            description: GENERIC_ERROR_DESCRIPTION.to_string(),
        }
    }

    /// A local failure around an otherwise successful exchange, such as an unreadable body.
    pub(crate) fn unexpected(message: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: TRANSPORT_ERROR_CODE,
            message: message.into(),
            description: description.into(),
        }
    }
}

/// The client-credentials token exchange failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Authentication error ({code}): {message}")]
pub struct AuthenticationError {
    pub code: u16,
    pub message: String,
    pub description: String,
}

impl From<RequestFailure> for AuthenticationError {
    fn from(failure: RequestFailure) -> Self {
        Self {
            code: failure.code,
            message: failure.message,
            description: failure.description,
        }
    }
}

/// Which resource group operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceGroupErrorKind {
    /// Any resource group request other than creation. Creation is the only
    /// resource group request this crate sends, so no operation reports this
    /// kind yet; it is kept for matching alongside [`IotHubErrorKind::Request`].
    Request,
    FailedToCreate,
}

impl fmt::Display for ResourceGroupErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => f.write_str("Resource group error"),
            Self::FailedToCreate => f.write_str("Failed to create resource group"),
        }
    }
}

/// A resource group operation failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} ({code}): {message}")]
pub struct ResourceGroupError {
    pub kind: ResourceGroupErrorKind,
    pub code: u16,
    pub message: String,
    pub description: String,
    pub resource_group_name: Option<String>,
}

impl ResourceGroupError {
    pub(crate) fn failed_to_create(failure: RequestFailure, resource_group_name: &str) -> Self {
        Self {
            kind: ResourceGroupErrorKind::FailedToCreate,
            code: failure.code,
            message: failure.message,
            description: failure.description,
            resource_group_name: Some(resource_group_name.to_string()),
        }
    }
}

/// Which IoT Hub operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IotHubErrorKind {
    Request,
    FailedToCreate,
}

impl fmt::Display for IotHubErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => f.write_str("IoT Hub error"),
            Self::FailedToCreate => f.write_str("Failed to create IoT Hub"),
        }
    }
}

/// An IoT Hub operation failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} ({code}): {message}")]
pub struct IotHubError {
    pub kind: IotHubErrorKind,
    pub code: u16,
    pub message: String,
    pub description: String,
    pub resource_group_name: Option<String>,
    pub iot_hub_name: Option<String>,
}

impl IotHubError {
    fn new(
        kind: IotHubErrorKind,
        failure: RequestFailure,
        resource_group_name: &str,
        iot_hub_name: &str,
    ) -> Self {
        Self {
            kind,
            code: failure.code,
            message: failure.message,
            description: failure.description,
            resource_group_name: Some(resource_group_name.to_string()),
            iot_hub_name: Some(iot_hub_name.to_string()),
        }
    }

    pub(crate) fn failed_to_create(
        failure: RequestFailure,
        resource_group_name: &str,
        iot_hub_name: &str,
    ) -> Self {
        Self::new(
            IotHubErrorKind::FailedToCreate,
            failure,
            resource_group_name,
            iot_hub_name,
        )
    }

    pub(crate) fn request(
        failure: RequestFailure,
        resource_group_name: &str,
        iot_hub_name: &str,
    ) -> Self {
        Self::new(IotHubErrorKind::Request, failure, resource_group_name, iot_hub_name)
    }
}

/// A Device Provisioning Service operation failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("DPS error ({code}): {message}")]
pub struct DpsError {
    pub code: u16,
    pub message: String,
    pub description: String,
    pub dps_name: Option<String>,
    pub resource_group_name: Option<String>,
    pub iot_hub_name: Option<String>,
}

impl DpsError {
    pub(crate) fn new(failure: RequestFailure, resource_group_name: &str, dps_name: &str) -> Self {
        Self {
            code: failure.code,
            message: failure.message,
            description: failure.description,
            dps_name: Some(dps_name.to_string()),
            resource_group_name: Some(resource_group_name.to_string()),
            iot_hub_name: None,
        }
    }

    /// Attach the name of the IoT Hub the DPS instance is linked to.
    pub fn with_iot_hub(mut self, iot_hub_name: impl Into<String>) -> Self {
        self.iot_hub_name = Some(iot_hub_name.into());
        self
    }
}
