//! Common types shared by the authenticator, the request gateway, and the
//! resource handles.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Service principal credentials and the subscription to provision into.
///
/// `Debug` output redacts the client secret.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub subscription_id: String,
}

impl ClientConfig {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        subscription_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            subscription_id: subscription_id.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// SKUs
// ---------------------------------------------------------------------------

/// IoT Hub pricing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IotHubSku {
    F1,
    B1,
    B2,
    B3,
    S1,
    S2,
    S3,
}

impl IotHubSku {
    /// SKU name as Azure expects it in `sku.name`.
    pub fn name(self) -> &'static str {
        match self {
            Self::F1 => "F1",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::B3 => "B3",
            Self::S1 => "S1",
            Self::S2 => "S2",
            Self::S3 => "S3",
        }
    }

    /// Tier the SKU belongs to, as Azure expects it in `sku.tier`.
    pub fn tier(self) -> &'static str {
        match self {
            Self::F1 => "Free",
            Self::B1 | Self::B2 | Self::B3 => "Basic",
            Self::S1 | Self::S2 | Self::S3 => "Standard",
        }
    }
}

/// Device Provisioning Service pricing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DpsSku {
    #[default]
    S1,
}

impl DpsSku {
    pub fn name(self) -> &'static str {
        match self {
            Self::S1 => "S1",
        }
    }

    pub fn tier(self) -> &'static str {
        match self {
            Self::S1 => "Standard",
        }
    }
}

/// The `sku` object of IoT Hub and DPS create requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkuInfo {
    pub name: String,
    pub tier: String,
    pub capacity: u32,
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body of a resource group create request.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceGroupCreateRequest {
    pub location: String,
}

impl ResourceGroupCreateRequest {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

/// Body of an IoT Hub create request.
#[derive(Debug, Clone, Serialize)]
pub struct IotHubCreateRequest {
    pub location: String,
    pub sku: SkuInfo,
}

impl IotHubCreateRequest {
    pub fn new(location: impl Into<String>, sku: IotHubSku, capacity: u32) -> Self {
        Self {
            location: location.into(),
            sku: SkuInfo {
                name: sku.name().to_string(),
                tier: sku.tier().to_string(),
                capacity,
            },
        }
    }
}

/// State of a newly created DPS instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DpsState {
    Active,
}

/// How a DPS instance spreads devices across its linked hubs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AllocationPolicy {
    Hashed,
}

/// An IoT Hub linked to a DPS instance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedIotHub {
    pub connection_string: String,
    pub location: String,
}

/// The `properties` object of a DPS create request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DpsCreateProperties {
    pub state: DpsState,
    pub iot_hubs: Vec<LinkedIotHub>,
    pub allocation_policy: AllocationPolicy,
}

/// Body of a DPS create request.
#[derive(Debug, Clone, Serialize)]
pub struct DpsCreateRequest {
    pub location: String,
    pub sku: SkuInfo,
    pub properties: DpsCreateProperties,
}

impl DpsCreateRequest {
    /// An active DPS instance with hashed allocation over one linked hub.
    pub fn new(
        location: impl Into<String>,
        iot_hub_connection_string: impl Into<String>,
        sku: DpsSku,
        capacity: u32,
    ) -> Self {
        let location = location.into();
        Self {
            sku: SkuInfo {
                name: sku.name().to_string(),
                tier: sku.tier().to_string(),
                capacity,
            },
            properties: DpsCreateProperties {
                state: DpsState::Active,
                iot_hubs: vec![LinkedIotHub {
                    connection_string: iot_hub_connection_string.into(),
                    location: location.clone(),
                }],
                allocation_policy: AllocationPolicy::Hashed,
            },
            location,
        }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A shared access policy returned by the `listkeys` endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedAccessKey {
    pub key_name: Option<String>,
    pub primary_key: String,
    pub secondary_key: Option<String>,
    pub rights: Option<String>,
}

/// The subset of a DPS description this crate reads.
#[derive(Debug, Clone, Deserialize)]
pub struct DpsDescription {
    pub name: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub properties: DpsProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DpsProperties {
    pub id_scope: Option<String>,
    pub state: Option<String>,
    pub service_operations_host_name: Option<String>,
}
