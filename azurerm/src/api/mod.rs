//! Azure Resource Manager REST client

pub mod apimanagement;
pub mod auth;
pub mod client;
pub mod error;
pub mod servicebus;

#[cfg(test)]
pub mod test_helpers;

pub use auth::CloudEnvironment;
pub use client::{Client, ClientSettings, PollConfig, RequestOptions, RetryConfig};
pub use error::ApiError;

pub const SERVICEBUS_API_VERSION: &str = "2021-06-01-preview";
pub const API_MANAGEMENT_API_VERSION: &str = "2022-08-01";
