//! Test helpers for the ARM client

use super::{Client, ClientSettings, PollConfig, RetryConfig};
use mockito::{Mock, ServerGuard};
use std::time::Duration;

pub const TEST_SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

/// Client pointed at a mock server for both ARM and token requests, with no waiting
pub fn create_test_client(url: &str) -> Client {
    let settings = ClientSettings {
        subscription_id: TEST_SUBSCRIPTION.to_string(),
        tenant_id: "tenant".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        resource_manager_endpoint: url.to_string(),
        authority_host: url.to_string(),
    };
    let retry = RetryConfig {
        max_retries: 2,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        timeout_seconds: 5,
    };
    let poll = PollConfig {
        default_interval: Duration::ZERO,
        timeout: Duration::from_secs(5),
    };
    Client::with_config(&settings, retry, poll).unwrap()
}

/// Token endpoint used by [`create_test_client`]
pub async fn mock_token(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/tenant/oauth2/v2.0/token")
        .with_header("content-type", "application/json")
        .with_body(r#"{"token_type":"Bearer","expires_in":3600,"access_token":"test-token"}"#)
        .create_async()
        .await
}
