//! Client-credentials authentication with a cached bearer token.
//!
//! [`ClientAuthenticator`] owns at most one [`Token`] and hands out its access
//! token until the token is within [`TOKEN_EXPIRY_SKEW`] of expiring. The
//! token exchange itself is performed by
//! [`ManagementClient::get_client_token`].
//!
//! # Example
//!
//! ```rust,no_run
//! use azure_iot_manager_core::auth::ClientAuthenticator;
//! use azure_iot_manager_core::client::ManagementClient;
//! use azure_iot_manager_core::models::ClientConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ManagementClient::builder()
//!     .config(ClientConfig::new("tenant-id", "client-id", "client-secret", "subscription-id"))
//!     .build()?;
//! let auth = ClientAuthenticator::new(client.clone());
//!
//! let token = auth.get_token_cached().await?;
//! client.create_resource_group(&token, "westeurope", "my-rg").await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::{Duration, SystemTime};

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use crate::client::ManagementClient;
use crate::error::ProvisioningResult;

/// Tokens expiring within this window are treated as already expired.
pub const TOKEN_EXPIRY_SKEW: Duration = Duration::from_secs(3);

/// A bearer token for Azure Resource Manager and its expiry time.
#[derive(Clone)]
pub struct Token {
    access_token: SecretString,
    expires_on: SystemTime,
}

impl Token {
    pub fn new(access_token: impl Into<String>, expires_on: SystemTime) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            expires_on,
        }
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn expires_on(&self) -> SystemTime {
        self.expires_on
    }

    /// Whether the token can still be handed out at `now`.
    ///
    /// Valid only while `now + TOKEN_EXPIRY_SKEW < expires_on`.
    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        now.checked_add(TOKEN_EXPIRY_SKEW)
            .is_some_and(|deadline| deadline < self.expires_on)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(SystemTime::now())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"****")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

enum TokenState {
    Empty,
    Cached(Token),
}

/// Obtains and caches client-credentials tokens.
///
/// Safe to share across tasks: the check, refresh, and store sequence in
/// [`get_token_cached`](Self::get_token_cached) runs under one lock, so
/// concurrent callers wait for a single refresh instead of issuing their own.
pub struct ClientAuthenticator {
    client: ManagementClient,
    state: Mutex<TokenState>,
}

impl ClientAuthenticator {
    pub fn new(client: ManagementClient) -> Self {
        Self {
            client,
            state: Mutex::new(TokenState::Empty),
        }
    }

    /// The gateway used for token exchanges.
    pub fn client(&self) -> &ManagementClient {
        &self.client
    }

    /// Perform a client-credentials exchange, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError::Auth`](crate::ProvisioningError::Auth) if the
    /// identity provider rejects the credentials or cannot be reached.
    pub async fn get_token(&self) -> ProvisioningResult<Token> {
        self.client.get_client_token().await
    }

    /// Return the cached access token, refreshing it first if it is missing or
    /// about to expire.
    ///
    /// A failed refresh leaves the cache as it was and surfaces the
    /// authentication error unchanged.
    ///
    /// # Tracing
    ///
    /// Emits a span named `iot::auth::get_token_cached`.
    #[tracing::instrument(name = "iot::auth::get_token_cached", skip(self))]
    pub async fn get_token_cached(&self) -> ProvisioningResult<String> {
        let mut state = self.state.lock().await;

        if let TokenState::Cached(token) = &*state {
            if token.is_valid() {
                tracing::trace!("using cached access token");
                return Ok(token.access_token().to_string());
            }
        }

        tracing::debug!("refreshing access token");
        let token = self.get_token().await?;
        let access_token = token.access_token().to_string();
        *state = TokenState::Cached(token);

        tracing::debug!("access token refreshed");
        Ok(access_token)
    }
}

impl fmt::Debug for ClientAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.try_lock() {
            Ok(guard) => match &*guard {
                TokenState::Empty => "empty",
                TokenState::Cached(_) => "[cached]",
            },
            Err(_) => "[refreshing]",
        };
        f.debug_struct("ClientAuthenticator")
            .field("client", &self.client)
            .field("state", &state)
            .finish()
    }
}
