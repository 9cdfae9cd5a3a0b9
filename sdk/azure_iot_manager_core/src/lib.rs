#![doc = include_str!("../README.md")]

pub mod auth;
pub mod client;
pub mod connection_string;
pub mod error;
pub mod models;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use auth::{ClientAuthenticator, Token};
pub use client::ManagementClient;
pub use error::{ProvisioningError, ProvisioningResult};
