//! Request gateway for the Azure Resource Manager IoT APIs.
//!
//! This module provides [`ManagementClient`], which shapes and sends one HTTP
//! request per provisioning operation and translates failures into the
//! domain errors of [`crate::error`]. The client never obtains tokens on its
//! own: every resource operation takes the bearer token as a parameter, and
//! [`ManagementClient::get_client_token`] is the only call made without one.
//!
//! # Examples
//!
//! ```rust,no_run
//! use azure_iot_manager_core::client::ManagementClient;
//! use azure_iot_manager_core::models::{ClientConfig, IotHubSku};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ManagementClient::builder()
//!     .config(ClientConfig::new("tenant-id", "client-id", "client-secret", "subscription-id"))
//!     .build()?;
//!
//! let token = client.get_client_token().await?;
//! client
//!     .create_iot_hub(token.access_token(), "westeurope", IotHubSku::S1, 1, "my-rg", "my-hub")
//!     .await?;
//! let connection_string = client
//!     .get_iot_hub_connection_string(token.access_token(), "my-rg", "my-hub")
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client as HttpClient, Method, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::Token;
use crate::connection_string;
use crate::error::{
    AuthenticationError, DpsError, IotHubError, ProvisioningError, ProvisioningResult,
    RequestFailure, ResourceGroupError,
};
use crate::models::{
    ClientConfig, DpsCreateRequest, DpsDescription, DpsSku, IotHubCreateRequest, IotHubSku,
    ResourceGroupCreateRequest, SharedAccessKey,
};

/// Default identity provider for the client-credentials exchange.
pub const DEFAULT_AUTHORITY_ENDPOINT: &str = "https://login.microsoftonline.com/";

/// Default Azure Resource Manager endpoint.
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com/";

/// Resource the requested tokens are scoped to.
pub const MANAGEMENT_RESOURCE: &str = "https://management.azure.com";

/// API version for resource group operations.
pub const RESOURCE_GROUP_API_VERSION: &str = "2019-10-01";

/// API version for IoT Hub operations.
pub const IOT_HUB_API_VERSION: &str = "2016-02-03";

/// API version for creating and describing DPS instances.
pub const DPS_API_VERSION: &str = "2018-01-22";

/// API version for listing DPS keys.
pub const DPS_KEYS_API_VERSION: &str = "2018-04-01";

/// Error payload shape returned by a given Azure endpoint.
///
/// Each Azure sub-API reports errors differently, and the shapes are kept
/// apart on purpose: an IoT Hub endpoint answering with lowercase keys is an
/// unrecognized payload, not a `Nested` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorEnvelope {
    /// `{"error": "...", "error_description": "..."}` from the token endpoint.
    OAuth,
    /// `{"error": {"code": "...", "message": "..."}}` from Resource Manager.
    Nested,
    /// `{"Code": "...", "Message": "..."}` from the IoT Hub resource provider.
    Capitalized,
    /// `{"httpStatusCode": "...", "message": "..."}` from the DPS resource provider.
    Flat,
}

impl ErrorEnvelope {
    /// Build the failure for a non-2xx response.
    ///
    /// `code` is always the HTTP status. Payloads that do not match the
    /// envelope fall back to the reason phrase and the raw body.
    pub(crate) fn parse(self, status: StatusCode, body: &str) -> RequestFailure {
        let fields = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| self.extract(&value));

        match fields {
            Some((message, description)) => RequestFailure {
                code: status.as_u16(),
                message,
                description: ManagementClient::truncate_message(
                    description.as_deref().unwrap_or(body),
                ),
            },
            None => RequestFailure {
                code: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
                description: ManagementClient::truncate_message(body),
            },
        }
    }

    fn extract(self, value: &serde_json::Value) -> Option<(String, Option<String>)> {
        let (code, text) = match self {
            Self::OAuth => (value.get("error")?, value.get("error_description")),
            Self::Nested => {
                let error = value.get("error")?;
                (error.get("code")?, error.get("message"))
            }
            Self::Capitalized => (value.get("Code")?, value.get("Message")),
            Self::Flat => (value.get("httpStatusCode")?, value.get("message")),
        };

        Some((value_to_string(code)?, text.and_then(value_to_string)))
    }
}

fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// How a request body is encoded.
#[derive(Debug)]
pub(crate) enum RequestBody {
    /// No body and no content headers.
    None,
    /// No body, with an explicit `Content-Length: 0`.
    Empty,
    Json(serde_json::Value),
    Form(Vec<(&'static str, String)>),
}

impl RequestBody {
    fn json<T: Serialize>(body: &T) -> Result<Self, RequestFailure> {
        serde_json::to_value(body)
            .map(Self::Json)
            .map_err(|e| RequestFailure::unexpected(e.to_string(), "request body could not be serialized"))
    }
}

/// Everything needed to send one request.
#[derive(Debug)]
pub(crate) struct RequestDescriptor<'a> {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) body: RequestBody,
    pub(crate) bearer: Option<&'a str>,
    pub(crate) envelope: ErrorEnvelope,
}

/// Token endpoint payload. `expires_in` and `expires_on` arrive as strings
/// from the v1 endpoint and as numbers from some proxies.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<Seconds>,
    expires_on: Option<Seconds>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(u64),
    Text(String),
}

impl Seconds {
    fn as_secs(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl TokenResponse {
    /// Expiry from the relative `expires_in`, else the absolute `expires_on`,
    /// else `now` so the token is refreshed on next use.
    ///
    /// An expiry that does not fit in a `SystemTime` also yields `now`.
    fn expires_at(&self, now: SystemTime) -> SystemTime {
        if let Some(secs) = self.expires_in.as_ref().and_then(Seconds::as_secs) {
            return now.checked_add(Duration::from_secs(secs)).unwrap_or(now);
        }
        if let Some(secs) = self.expires_on.as_ref().and_then(Seconds::as_secs) {
            return UNIX_EPOCH
                .checked_add(Duration::from_secs(secs))
                .unwrap_or(now);
        }
        now
    }
}

/// The gateway to Azure Resource Manager for IoT provisioning.
///
/// Holds no mutable state; it is cheaply cloneable and can be shared across
/// tasks.
#[derive(Debug, Clone)]
pub struct ManagementClient {
    pub(crate) http: HttpClient,
    pub(crate) config: ClientConfig,
    pub(crate) authority: Url,
    pub(crate) management: Url,
}

/// Builder for constructing a [`ManagementClient`].
///
/// Use [`ManagementClient::builder()`] to create a new builder.
#[derive(Debug, Default)]
pub struct ManagementClientBuilder {
    config: Option<ClientConfig>,
    authority_endpoint: Option<String>,
    management_endpoint: Option<String>,
    http_client: Option<HttpClient>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

impl ManagementClient {
    /// Create a new builder for configuring a `ManagementClient`.
    pub fn builder() -> ManagementClientBuilder {
        ManagementClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn subscription_id(&self) -> &str {
        &self.config.subscription_id
    }

    pub fn authority_endpoint(&self) -> &Url {
        &self.authority
    }

    pub fn management_endpoint(&self) -> &Url {
        &self.management
    }

    /// Build a Resource Manager URL from path segments and an `api-version`.
    ///
    /// Each segment is percent-encoded as exactly one path segment, so a
    /// resource name can never change the route or the query.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError::InvalidResourceName`] for an empty, `.`,
    /// or `..` segment.
    pub fn url(&self, segments: &[&str], api_version: &str) -> ProvisioningResult<Url> {
        let mut url = endpoint_url(&self.management, segments)?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    fn resource_group_segments<'a>(&'a self, resource_group: &'a str) -> Vec<&'a str> {
        vec![
            "subscriptions",
            self.config.subscription_id.as_str(),
            "resourcegroups",
            resource_group,
        ]
    }

    fn iot_hub_segments<'a>(&'a self, resource_group: &'a str, name: &'a str) -> Vec<&'a str> {
        let mut segments = self.resource_group_segments(resource_group);
        segments.extend(["providers", "Microsoft.Devices", "IotHubs", name]);
        segments
    }

    fn dps_segments<'a>(&'a self, resource_group: &'a str, name: &'a str) -> Vec<&'a str> {
        let mut segments = self.resource_group_segments(resource_group);
        segments.extend(["providers", "Microsoft.Devices", "provisioningServices", name]);
        segments
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Exchange the configured client credentials for a Resource Manager token.
    ///
    /// Sends a URL-encoded `client_credentials` grant to
    /// `{authority}/{tenant_id}/oauth2/token`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError::Auth`] with the HTTP status, the provider's
    /// `error` and `error_description` on rejection, or code 500 when the
    /// identity provider cannot be reached.
    ///
    /// # Tracing
    ///
    /// Emits a span named `iot::auth::client_token` with field `tenant_id`.
    #[tracing::instrument(
        name = "iot::auth::client_token",
        skip(self),
        fields(tenant_id = %self.config.tenant_id)
    )]
    pub async fn get_client_token(&self) -> ProvisioningResult<Token> {
        tracing::debug!("requesting client token");

        let url = endpoint_url(
            &self.authority,
            &[self.config.tenant_id.as_str(), "oauth2", "token"],
        )?;
        let form = vec![
            ("grant_type", "client_credentials".to_string()),
            ("client_id", self.config.client_id.clone()),
            (
                "client_secret",
                self.config.client_secret.expose_secret().to_string(),
            ),
            ("resource", MANAGEMENT_RESOURCE.to_string()),
        ];

        let response = self
            .dispatch(RequestDescriptor {
                method: Method::POST,
                url,
                body: RequestBody::Form(form),
                bearer: None,
                envelope: ErrorEnvelope::OAuth,
            })
            .await
            .map_err(AuthenticationError::from)?;
        let payload: TokenResponse = Self::read_json(response)
            .await
            .map_err(AuthenticationError::from)?;

        let expires_on = payload.expires_at(SystemTime::now());
        let access_token = payload
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AuthenticationError::from(RequestFailure::unexpected(
                    "missing access_token",
                    "token response did not contain an access token",
                ))
            })?;

        tracing::debug!("client token received");
        Ok(Token::new(access_token, expires_on))
    }

    /// Create (or update) a resource group.
    ///
    /// Returns the Resource Manager response body unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError::ResourceGroup`] with kind
    /// [`FailedToCreate`](crate::error::ResourceGroupErrorKind::FailedToCreate).
    ///
    /// # Tracing
    ///
    /// Emits a span named `iot::resource_groups::create` with fields
    /// `resource_group` and `location`.
    #[tracing::instrument(
        name = "iot::resource_groups::create",
        skip(self, token),
        fields(resource_group = %name, location = %location)
    )]
    pub async fn create_resource_group(
        &self,
        token: &str,
        location: &str,
        name: &str,
    ) -> ProvisioningResult<serde_json::Value> {
        tracing::debug!("creating resource group");
        let fail = |failure| ResourceGroupError::failed_to_create(failure, name);

        let url = self.url(&self.resource_group_segments(name), RESOURCE_GROUP_API_VERSION)?;
        let body = RequestBody::json(&ResourceGroupCreateRequest::new(location)).map_err(fail)?;

        let response = self
            .dispatch(RequestDescriptor {
                method: Method::PUT,
                url,
                body,
                bearer: Some(token),
                envelope: ErrorEnvelope::Nested,
            })
            .await
            .map_err(fail)?;
        let created = Self::read_value(response).await.map_err(fail)?;

        tracing::debug!("resource group created");
        Ok(created)
    }

    /// Create an IoT Hub inside a resource group.
    ///
    /// Returns the Resource Manager response body unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError::IotHub`] with kind
    /// [`FailedToCreate`](crate::error::IotHubErrorKind::FailedToCreate). The
    /// IoT Hub provider reports errors as `{"Code", "Message"}`.
    ///
    /// # Tracing
    ///
    /// Emits a span named `iot::iot_hubs::create` with fields `resource_group`,
    /// `iot_hub`, and `sku`.
    #[tracing::instrument(
        name = "iot::iot_hubs::create",
        skip(self, token),
        fields(resource_group = %resource_group, iot_hub = %name, sku = sku.name())
    )]
    pub async fn create_iot_hub(
        &self,
        token: &str,
        location: &str,
        sku: IotHubSku,
        capacity: u32,
        resource_group: &str,
        name: &str,
    ) -> ProvisioningResult<serde_json::Value> {
        tracing::debug!(capacity, "creating IoT Hub");
        let fail = |failure| IotHubError::failed_to_create(failure, resource_group, name);

        let url = self.url(&self.iot_hub_segments(resource_group, name), IOT_HUB_API_VERSION)?;
        let body =
            RequestBody::json(&IotHubCreateRequest::new(location, sku, capacity)).map_err(fail)?;

        let response = self
            .dispatch(RequestDescriptor {
                method: Method::PUT,
                url,
                body,
                bearer: Some(token),
                envelope: ErrorEnvelope::Capitalized,
            })
            .await
            .map_err(fail)?;
        let created = Self::read_value(response).await.map_err(fail)?;

        tracing::debug!("IoT Hub created");
        Ok(created)
    }

    /// Fetch the `iothubowner` key of an IoT Hub and build its connection string.
    ///
    /// # Tracing
    ///
    /// Emits a span named `iot::iot_hubs::connection_string` with fields
    /// `resource_group` and `iot_hub`.
    #[tracing::instrument(
        name = "iot::iot_hubs::connection_string",
        skip(self, token),
        fields(resource_group = %resource_group, iot_hub = %name)
    )]
    pub async fn get_iot_hub_connection_string(
        &self,
        token: &str,
        resource_group: &str,
        name: &str,
    ) -> ProvisioningResult<String> {
        tracing::debug!("listing IoT Hub keys");
        let fail = |failure| IotHubError::request(failure, resource_group, name);

        let mut segments = self.iot_hub_segments(resource_group, name);
        segments.extend(["IotHubKeys", connection_string::IOT_HUB_OWNER_POLICY, "listkeys"]);
        let url = self.url(&segments, IOT_HUB_API_VERSION)?;

        let response = self
            .dispatch(RequestDescriptor {
                method: Method::POST,
                url,
                body: RequestBody::Empty,
                bearer: Some(token),
                envelope: ErrorEnvelope::Capitalized,
            })
            .await
            .map_err(fail)?;
        let key: SharedAccessKey = Self::read_json(response).await.map_err(fail)?;

        Ok(connection_string::iot_hub(name, &key.primary_key))
    }

    /// Create a DPS instance linked to an IoT Hub, with hashed allocation.
    ///
    /// Returns the Resource Manager response body unchanged.
    ///
    /// # Tracing
    ///
    /// Emits a span named `iot::dps::create` with fields `resource_group` and `dps`.
    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(
        name = "iot::dps::create",
        skip(self, token, iot_hub_connection_string),
        fields(resource_group = %resource_group, dps = %name)
    )]
    pub async fn create_dps(
        &self,
        token: &str,
        location: &str,
        iot_hub_connection_string: &str,
        sku: DpsSku,
        capacity: u32,
        resource_group: &str,
        name: &str,
    ) -> ProvisioningResult<serde_json::Value> {
        tracing::debug!(capacity, "creating DPS instance");
        let fail = |failure| DpsError::new(failure, resource_group, name);

        let url = self.url(&self.dps_segments(resource_group, name), DPS_API_VERSION)?;
        let request = DpsCreateRequest::new(location, iot_hub_connection_string, sku, capacity);
        let body = RequestBody::json(&request).map_err(fail)?;

        let response = self
            .dispatch(RequestDescriptor {
                method: Method::PUT,
                url,
                body,
                bearer: Some(token),
                envelope: ErrorEnvelope::Nested,
            })
            .await
            .map_err(fail)?;
        let created = Self::read_value(response).await.map_err(fail)?;

        tracing::debug!("DPS instance created");
        Ok(created)
    }

    /// Read the ID scope of a DPS instance.
    ///
    /// # Tracing
    ///
    /// Emits a span named `iot::dps::scope_id` with fields `resource_group` and `dps`.
    #[tracing::instrument(
        name = "iot::dps::scope_id",
        skip(self, token),
        fields(resource_group = %resource_group, dps = %name)
    )]
    pub async fn get_dps_scope_id(
        &self,
        token: &str,
        resource_group: &str,
        name: &str,
    ) -> ProvisioningResult<String> {
        tracing::debug!("getting DPS instance");
        let fail = |failure| DpsError::new(failure, resource_group, name);

        let url = self.url(&self.dps_segments(resource_group, name), DPS_API_VERSION)?;

        let response = self
            .dispatch(RequestDescriptor {
                method: Method::GET,
                url,
                body: RequestBody::None,
                bearer: Some(token),
                envelope: ErrorEnvelope::Flat,
            })
            .await
            .map_err(fail)?;
        let description: DpsDescription = Self::read_json(response).await.map_err(fail)?;

        let scope_id = description.properties.id_scope.ok_or_else(|| {
            fail(RequestFailure::unexpected(
                "missing idScope",
                "DPS description did not contain properties.idScope",
            ))
        })?;

        tracing::debug!(scope_id = %scope_id, "DPS scope id read");
        Ok(scope_id)
    }

    /// Fetch the `provisioningserviceowner` key of a DPS instance and build its
    /// connection string.
    ///
    /// # Tracing
    ///
    /// Emits a span named `iot::dps::connection_string` with fields
    /// `resource_group` and `dps`.
    #[tracing::instrument(
        name = "iot::dps::connection_string",
        skip(self, token),
        fields(resource_group = %resource_group, dps = %name)
    )]
    pub async fn get_dps_connection_string(
        &self,
        token: &str,
        resource_group: &str,
        name: &str,
    ) -> ProvisioningResult<String> {
        tracing::debug!("listing DPS keys");
        let fail = |failure| DpsError::new(failure, resource_group, name);

        let mut segments = self.dps_segments(resource_group, name);
        segments.extend(["keys", connection_string::DPS_OWNER_POLICY, "listkeys"]);
        let url = self.url(&segments, DPS_KEYS_API_VERSION)?;

        let response = self
            .dispatch(RequestDescriptor {
                method: Method::POST,
                url,
                body: RequestBody::Empty,
                bearer: Some(token),
                envelope: ErrorEnvelope::Flat,
            })
            .await
            .map_err(fail)?;
        let key: SharedAccessKey = Self::read_json(response).await.map_err(fail)?;

        Ok(connection_string::dps(name, &key.primary_key))
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Send a request and return the response if its status is 2xx.
    pub(crate) async fn dispatch(
        &self,
        request: RequestDescriptor<'_>,
    ) -> Result<reqwest::Response, RequestFailure> {
        let RequestDescriptor {
            method,
            url,
            body,
            bearer,
            envelope,
        } = request;

        tracing::trace!(%method, path = url.path(), "sending request");

        let mut builder = self.http.request(method, url);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match body {
            RequestBody::None => builder,
            RequestBody::Empty => builder.header(CONTENT_LENGTH, "0"),
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| RequestFailure::transport(Self::sanitize_error_message(&e.to_string())))?;

        Self::check_response(response, envelope).await
    }

    /// Check the response status and map error payloads through `envelope`.
    async fn check_response(
        response: reqwest::Response,
        envelope: ErrorEnvelope,
    ) -> Result<reqwest::Response, RequestFailure> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let failure = envelope.parse(status, &body);

        tracing::debug!(status = failure.code, code = %failure.message, "request failed");
        Err(failure)
    }

    async fn read_body(response: reqwest::Response) -> Result<String, RequestFailure> {
        response
            .text()
            .await
            .map_err(|e| RequestFailure::transport(Self::sanitize_error_message(&e.to_string())))
    }

    /// Deserialize a success body into `T`.
    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RequestFailure> {
        let body = Self::read_body(response).await?;
        serde_json::from_str(&body).map_err(|e| {
            RequestFailure::unexpected(e.to_string(), Self::truncate_message(&body))
        })
    }

    /// A success body as JSON; an empty body is `Value::Null`.
    async fn read_value(response: reqwest::Response) -> Result<serde_json::Value, RequestFailure> {
        let body = Self::read_body(response).await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| {
            RequestFailure::unexpected(e.to_string(), Self::truncate_message(&body))
        })
    }

    // -----------------------------------------------------------------------
    // Error text hygiene
    // -----------------------------------------------------------------------

    /// Maximum length for error descriptions built from response bodies.
    const MAX_ERROR_MESSAGE_LEN: usize = 1000;

    /// Replace the value following each occurrence of `marker` with `[REDACTED]`.
    fn redact_after(result: &mut String, marker: &str) {
        let mut search_start = 0;
        while let Some(relative_pos) = result[search_start..].find(marker) {
            let value_start = search_start + relative_pos + marker.len();

            // Skip if already redacted
            if result[value_start..].starts_with("[REDACTED]") {
                search_start = value_start + "[REDACTED]".len();
                continue;
            }

            let value_end = result[value_start..]
                .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ',' | ';'))
                .map(|pos| value_start + pos)
                .unwrap_or(result.len());

            if value_end > value_start {
                result.replace_range(value_start..value_end, "[REDACTED]");
                search_start = value_start + "[REDACTED]".len();
            } else {
                search_start = value_start;
            }
        }
    }

    /// Remove bearer tokens and shared access keys from error text.
    pub(crate) fn sanitize_error_message(msg: &str) -> String {
        let mut result = msg.to_string();
        Self::redact_after(&mut result, "Bearer ");
        Self::redact_after(&mut result, "SharedAccessKey=");
        result
    }

    /// Sanitize, then truncate a message that exceeds the maximum length.
    pub(crate) fn truncate_message(msg: &str) -> String {
        let sanitized = Self::sanitize_error_message(msg);

        if sanitized.len() > Self::MAX_ERROR_MESSAGE_LEN {
            let mut end = Self::MAX_ERROR_MESSAGE_LEN;
            while !sanitized.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated)", &sanitized[..end])
        } else {
            sanitized
        }
    }
}

/// Append `segments` to the path of `base`, one encoded segment each.
fn endpoint_url(base: &Url, segments: &[&str]) -> ProvisioningResult<Url> {
    if let Some(bad) = segments
        .iter()
        .find(|s| s.is_empty() || **s == "." || **s == "..")
    {
        return Err(ProvisioningError::InvalidResourceName(format!(
            "{bad:?} cannot be used as a path segment"
        )));
    }

    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ProvisioningError::InvalidEndpoint {
            message: format!("URL cannot be used as a base: {base}"),
            source: None,
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Parse an endpoint and make sure its path ends with `/`.
fn parse_endpoint(endpoint: &str, what: &str) -> ProvisioningResult<Url> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| ProvisioningError::invalid_endpoint_with_source(format!("invalid {what} URL"), e))?;
    if url.cannot_be_a_base() {
        return Err(ProvisioningError::InvalidEndpoint {
            message: format!("{what} URL cannot be used as a base: {endpoint}"),
            source: None,
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

impl ManagementClientBuilder {
    /// Set the service principal and subscription. Required.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the identity provider endpoint.
    ///
    /// Defaults to [`DEFAULT_AUTHORITY_ENDPOINT`].
    pub fn authority_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.authority_endpoint = Some(endpoint.into());
        self
    }

    /// Override the Resource Manager endpoint.
    ///
    /// Defaults to [`DEFAULT_MANAGEMENT_ENDPOINT`].
    pub fn management_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.management_endpoint = Some(endpoint.into());
        self
    }

    /// Set a custom HTTP client.
    ///
    /// **Note:** If you provide a custom HTTP client, any timeout configuration
    /// via [`connect_timeout`](Self::connect_timeout) or
    /// [`read_timeout`](Self::read_timeout) will be ignored.
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the connection timeout. Unset by default.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the timeout for the whole request/response cycle. Unset by default.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Build the `ManagementClient`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No [`ClientConfig`] was provided
    /// - An endpoint URL is invalid
    /// - The HTTP client cannot be constructed
    pub fn build(self) -> ProvisioningResult<ManagementClient> {
        let config = self
            .config
            .ok_or_else(|| ProvisioningError::MissingConfig("client config is required".into()))?;

        let authority = parse_endpoint(
            self.authority_endpoint
                .as_deref()
                .unwrap_or(DEFAULT_AUTHORITY_ENDPOINT),
            "authority",
        )?;
        let management = parse_endpoint(
            self.management_endpoint
                .as_deref()
                .unwrap_or(DEFAULT_MANAGEMENT_ENDPOINT),
            "management",
        )?;

        let http = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = self.connect_timeout {
                    builder = builder.connect_timeout(timeout);
                }
                if let Some(timeout) = self.read_timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build().map_err(ProvisioningError::HttpClient)?
            }
        };

        Ok(ManagementClient {
            http,
            config,
            authority,
            management,
        })
    }
}
