//! Test helpers shared with sibling crates through the `test-support` feature.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::ManagementClient;
use crate::models::ClientConfig;

pub const TEST_TENANT_ID: &str = "test-tenant";
pub const TEST_CLIENT_ID: &str = "test-client";

/// Test client secret (not a real secret).
pub const TEST_CLIENT_SECRET: &str = "test-client-secret";

pub const TEST_SUBSCRIPTION_ID: &str = "test-subscription";

/// Test access token (not a real token).
pub const TEST_ACCESS_TOKEN: &str = "test-access-token";

/// An endpoint nothing listens on, for transport failures.
pub const UNREACHABLE_ENDPOINT: &str = "http://127.0.0.1:1";

pub fn test_config() -> ClientConfig {
    ClientConfig::new(
        TEST_TENANT_ID,
        TEST_CLIENT_ID,
        TEST_CLIENT_SECRET,
        TEST_SUBSCRIPTION_ID,
    )
}

/// Create a test client whose identity and management endpoints both point
/// at the mock server.
pub async fn setup_mock_client(server: &MockServer) -> ManagementClient {
    setup_client_with_endpoint(&server.uri())
}

/// Create a test client with both endpoints set to `endpoint`.
pub fn setup_client_with_endpoint(endpoint: &str) -> ManagementClient {
    ManagementClient::builder()
        .config(test_config())
        .authority_endpoint(endpoint)
        .management_endpoint(endpoint)
        .build()
        .expect("should build client")
}

/// Path of the token endpoint for [`TEST_TENANT_ID`].
pub fn token_path() -> String {
    format!("/{}/oauth2/token", TEST_TENANT_ID)
}

/// A token endpoint success body, with numbers encoded as strings the way
/// the v1 endpoint sends them.
pub fn token_response(access_token: &str, expires_in: u64) -> serde_json::Value {
    serde_json::json!({
        "token_type": "Bearer",
        "expires_in": expires_in.to_string(),
        "ext_expires_in": expires_in.to_string(),
        "resource": "https://management.azure.com",
        "access_token": access_token
    })
}

/// Mount a token endpoint that always issues [`TEST_ACCESS_TOKEN`] for an hour.
pub async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(token_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_response(TEST_ACCESS_TOKEN, 3599)),
        )
        .mount(server)
        .await;
}
