//! Azure AD client-credentials authentication

use super::error::ApiError;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Tokens are refreshed this long before they expire
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Azure cloud the provider talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudEnvironment {
    Public,
    UsGovernment,
    China,
}

impl CloudEnvironment {
    pub const NAMES: [&'static str; 3] = ["public", "usgovernment", "china"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "public" => Some(CloudEnvironment::Public),
            "usgovernment" => Some(CloudEnvironment::UsGovernment),
            "china" => Some(CloudEnvironment::China),
            _ => None,
        }
    }

    pub fn resource_manager_endpoint(&self) -> &'static str {
        match self {
            CloudEnvironment::Public => "https://management.azure.com",
            CloudEnvironment::UsGovernment => "https://management.usgovcloudapi.net",
            CloudEnvironment::China => "https://management.chinacloudapi.cn",
        }
    }

    pub fn authority_host(&self) -> &'static str {
        match self {
            CloudEnvironment::Public => "https://login.microsoftonline.com",
            CloudEnvironment::UsGovernment => "https://login.microsoftonline.us",
            CloudEnvironment::China => "https://login.chinacloudapi.cn",
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: ExpiresIn,
}

// AAD v1 endpoints send expires_in as a string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
    Seconds(u64),
    Text(String),
}

impl ExpiresIn {
    fn as_duration(&self) -> Duration {
        let secs = match self {
            ExpiresIn::Seconds(s) => *s,
            ExpiresIn::Text(s) => s.parse().unwrap_or(0),
        };
        Duration::from_secs(secs)
    }
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Service principal credential using a client secret
pub struct ClientSecretCredential {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    authority_host: String,
    scope: String,
    cache: Mutex<Option<CachedToken>>,
}

impl ClientSecretCredential {
    pub fn new(
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
        authority_host: &str,
        resource_manager_endpoint: &str,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            authority_host: authority_host.trim_end_matches('/').to_string(),
            scope: format!("{}/.default", resource_manager_endpoint.trim_end_matches('/')),
            cache: Mutex::new(None),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host, self.tenant_id
        )
    }

    /// Bearer token for ARM, fetched once and reused until shortly before expiry
    pub async fn token(&self, http: &reqwest::Client) -> Result<String, ApiError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }

        tracing::debug!("Requesting access token from {}", self.token_url());
        let response = http
            .post(self.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::AuthError(format!(
                "token request returned HTTP {}: {}",
                status.as_u16(),
                text
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::AuthError(format!("invalid token response: {}", e)))?;

        let lifetime = body.expires_in.as_duration();
        let refresh_at = Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN);
        *cache = Some(CachedToken {
            token: body.access_token.clone(),
            refresh_at,
        });

        Ok(body.access_token)
    }
}
