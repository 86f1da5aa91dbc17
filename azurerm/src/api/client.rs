use reqwest::header::{HeaderMap, IF_MATCH, LOCATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tfplug::context::Context;
use url::Url;

use super::auth::ClientSecretCredential;
use super::error::{ApiError, ArmErrorResponse};

const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Azure Resource Manager client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    subscription_id: String,
    credential: ClientSecretCredential,
    retry_config: RetryConfig,
    poll_config: PollConfig,
}

/// Credentials and endpoints for a client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub subscription_id: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub resource_manager_endpoint: String,
    pub authority_host: String,
}

#[derive(Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 30,
        }
    }
}

/// Long-running operation polling
#[derive(Clone)]
pub struct PollConfig {
    /// Used when the service sends no Retry-After header
    pub default_interval: Duration,
    /// Give up on an operation after this long
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(3 * 60 * 60),
        }
    }
}

/// Extra knobs for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub if_match: Option<String>,
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn if_match_any() -> Self {
        Self {
            if_match: Some("*".to_string()),
            query: vec![],
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: String,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListPage<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

impl Client {
    /// Create a new client with default retry and polling behaviour
    pub fn new(settings: &ClientSettings) -> Result<Self, ApiError> {
        Self::with_config(settings, RetryConfig::default(), PollConfig::default())
    }

    pub fn with_config(
        settings: &ClientSettings,
        retry_config: RetryConfig,
        poll_config: PollConfig,
    ) -> Result<Self, ApiError> {
        let base_url = settings.resource_manager_endpoint.trim_end_matches('/');
        Url::parse(base_url)
            .map_err(|e| ApiError::InvalidEndpoint(format!("{}: {}", base_url, e)))?;
        Url::parse(&settings.authority_host).map_err(|e| {
            ApiError::InvalidEndpoint(format!("{}: {}", settings.authority_host, e))
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(retry_config.timeout_seconds))
            .user_agent(concat!("terraform-provider-azurerm/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let credential = ClientSecretCredential::new(
            &settings.tenant_id,
            &settings.client_id,
            &settings.client_secret,
            &settings.authority_host,
            base_url,
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url: base_url.to_string(),
                subscription_id: settings.subscription_id.clone(),
                credential,
                retry_config,
                poll_config,
            }),
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.inner.subscription_id
    }

    /// Service Bus operations
    pub fn servicebus(&self) -> crate::api::servicebus::ServiceBusApi<'_> {
        crate::api::servicebus::ServiceBusApi::new(self)
    }

    /// API Management operations
    pub fn api_management(&self) -> crate::api::apimanagement::ApiManagementApi<'_> {
        crate::api::apimanagement::ApiManagementApi::new(self)
    }

    /// GET a resource
    pub async fn get<T: DeserializeOwned>(&self, path: &str, api_version: &str) -> Result<T, ApiError> {
        let url = self.url(path, api_version, &RequestOptions::default())?;
        let response = self
            .execute_with_retry(Method::GET, url, None, None, path)
            .await?;
        parse_json(response).await
    }

    /// GET every page of a list endpoint
    pub async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
    ) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut url = self.url(path, api_version, &RequestOptions::default())?;
        loop {
            let response = self
                .execute_with_retry(Method::GET, url, None, None, path)
                .await?;
            let page: ListPage<T> = parse_json(response).await?;
            items.extend(page.value);
            match page.next_link {
                Some(next) if !next.is_empty() => {
                    url = Url::parse(&next).map_err(|e| ApiError::ParseError(e.to_string()))?;
                }
                _ => break,
            }
        }
        Ok(items)
    }

    /// PUT a resource and wait for any long-running operation, returning the final resource
    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        ctx: &Context,
        path: &str,
        api_version: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.write(ctx, Method::PUT, path, api_version, body).await
    }

    /// PATCH a resource and wait for any long-running operation
    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        ctx: &Context,
        path: &str,
        api_version: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.write(ctx, Method::PATCH, path, api_version, body).await
    }

    /// POST an action that returns data (listKeys and friends)
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
    ) -> Result<T, ApiError> {
        let url = self.url(path, api_version, &RequestOptions::default())?;
        let response = self
            .execute_with_retry(Method::POST, url, Some(&serde_json::json!({})), None, path)
            .await?;
        parse_json(response).await
    }

    /// POST an action and wait for it to finish
    pub async fn post_and_wait(
        &self,
        ctx: &Context,
        path: &str,
        api_version: &str,
    ) -> Result<(), ApiError> {
        let url = self.url(path, api_version, &RequestOptions::default())?;
        let response = self
            .execute_with_retry(Method::POST, url, Some(&serde_json::json!({})), None, path)
            .await?;
        self.wait_for_completion(ctx, response.headers(), response.status())
            .await
    }

    /// DELETE a resource and wait until the service reports it gone
    ///
    /// A resource that is already gone counts as deleted.
    pub async fn delete(&self, ctx: &Context, path: &str, api_version: &str) -> Result<(), ApiError> {
        self.delete_with(ctx, path, api_version, &RequestOptions::default())
            .await
    }

    pub async fn delete_with(
        &self,
        ctx: &Context,
        path: &str,
        api_version: &str,
        options: &RequestOptions,
    ) -> Result<(), ApiError> {
        let url = self.url(path, api_version, options)?;
        let response = match self
            .execute_with_retry(Method::DELETE, url, None, options.if_match.as_deref(), path)
            .await
        {
            Ok(response) => response,
            Err(ApiError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        match self
            .wait_for_completion(ctx, response.headers(), response.status())
            .await
        {
            Err(ApiError::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    /// Poll `check` until it reports completion, honouring the poll timeout and cancellation
    pub async fn poll_until<F, Fut>(&self, ctx: &Context, what: &str, check: F) -> Result<(), ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<bool, ApiError>>,
    {
        let deadline = Instant::now() + self.inner.poll_config.timeout;
        loop {
            if check().await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ApiError::Timeout(self.inner.poll_config.timeout.as_secs()));
            }
            tracing::debug!("Waiting for {}", what);
            self.sleep(ctx, self.inner.poll_config.default_interval)
                .await?;
        }
    }

    async fn write<B: Serialize, T: DeserializeOwned>(
        &self,
        ctx: &Context,
        method: Method,
        path: &str,
        api_version: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::ParseError(e.to_string()))?;
        let url = self.url(path, api_version, &RequestOptions::default())?;
        let response = self
            .execute_with_retry(method, url, Some(&body), None, path)
            .await?;

        if is_long_running(response.headers(), response.status()) {
            self.wait_for_completion(ctx, response.headers(), response.status())
                .await?;
            return self.get(path, api_version).await;
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return self.get(path, api_version).await;
        }
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    /// Follow Azure-AsyncOperation or Location headers until the operation finishes
    async fn wait_for_completion(
        &self,
        ctx: &Context,
        headers: &HeaderMap,
        status: StatusCode,
    ) -> Result<(), ApiError> {
        if !is_long_running(headers, status) {
            return Ok(());
        }

        let async_operation = header_string(headers, AZURE_ASYNC_OPERATION);
        let location = header_string(headers, LOCATION.as_str());
        let mut delay = self.retry_after(headers);
        let deadline = Instant::now() + self.inner.poll_config.timeout;

        loop {
            if Instant::now() >= deadline {
                return Err(ApiError::Timeout(self.inner.poll_config.timeout.as_secs()));
            }
            self.sleep(ctx, delay).await?;

            if let Some(operation_url) = &async_operation {
                let url = Url::parse(operation_url).map_err(|e| ApiError::ParseError(e.to_string()))?;
                let response = self
                    .execute_with_retry(Method::GET, url, None, None, operation_url)
                    .await?;
                delay = self.retry_after(response.headers());
                let operation: OperationStatus = parse_json(response).await?;
                tracing::debug!("Operation {} is {}", operation_url, operation.status);
                match operation.status.as_str() {
                    "Succeeded" => return Ok(()),
                    "Failed" | "Canceled" | "Cancelled" => {
                        let message = operation
                            .error
                            .map(|e| format!("{}: {}", e.code, e.message))
                            .unwrap_or_default();
                        return Err(ApiError::OperationFailed {
                            status: operation.status,
                            message,
                        });
                    }
                    _ => continue,
                }
            } else if let Some(location_url) = &location {
                let url = Url::parse(location_url).map_err(|e| ApiError::ParseError(e.to_string()))?;
                let response = self
                    .execute_with_retry(Method::GET, url, None, None, location_url)
                    .await?;
                if response.status() != StatusCode::ACCEPTED {
                    return Ok(());
                }
                delay = self.retry_after(response.headers());
                tracing::debug!("Operation {} still running", location_url);
            } else {
                return Ok(());
            }
        }
    }

    fn retry_after(&self, headers: &HeaderMap) -> Duration {
        header_string(headers, RETRY_AFTER.as_str())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .map(|d| d.min(self.inner.poll_config.timeout))
            .unwrap_or(self.inner.poll_config.default_interval)
    }

    async fn sleep(&self, ctx: &Context, delay: Duration) -> Result<(), ApiError> {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(ApiError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    fn url(&self, path: &str, api_version: &str, options: &RequestOptions) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}{}", self.inner.base_url, path))
            .map_err(|e| ApiError::InvalidEndpoint(format!("{}: {}", path, e)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api-version", api_version);
            for (key, value) in &options.query {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Execute request with retry logic
    async fn execute_with_retry(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
        if_match: Option<&str>,
        path: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.inner.retry_config.max_retries {
            if attempt > 0 {
                let backoff = std::cmp::min(
                    self.inner.retry_config.initial_backoff_ms * (2_u64.pow(attempt - 1)),
                    self.inner.retry_config.max_backoff_ms,
                );
                tracing::warn!(
                    "Retrying {} {} after {}ms (attempt {})",
                    method,
                    path,
                    backoff,
                    attempt
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let token = self
                .inner
                .credential
                .token(&self.inner.http_client)
                .await?;

            tracing::debug!("{} request to: {}", method, url);
            let mut request = self
                .inner
                .http_client
                .request(method.clone(), url.clone())
                .bearer_auth(token);
            if let Some(body) = body {
                request = request.json(body);
            }
            if let Some(etag) = if_match {
                request = request.header(IF_MATCH, etag);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if status == StatusCode::UNAUTHORIZED {
                        let text = response.text().await.unwrap_or_default();
                        return Err(ApiError::AuthError(text));
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Err(ApiError::NotFound(path.to_string()));
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if status.is_server_error() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(error_from_response(response).await);
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error =
                            Some(ApiError::Timeout(self.inner.retry_config.timeout_seconds));
                    } else if e.is_connect() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(ApiError::RequestError(e));
                    }
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }
}

fn is_long_running(headers: &HeaderMap, status: StatusCode) -> bool {
    status == StatusCode::ACCEPTED
        || headers.contains_key(AZURE_ASYNC_OPERATION)
        || (status == StatusCode::CREATED && headers.contains_key(LOCATION))
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let text = response.text().await?;
    tracing::trace!("API response body: {}", text);

    serde_json::from_str::<T>(&text).map_err(|e| {
        tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
        ApiError::ParseError(format!("Failed to parse response: {}", e))
    })
}

async fn error_from_response(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    match serde_json::from_str::<ArmErrorResponse>(&text) {
        Ok(body) => ApiError::Arm {
            status,
            code: body.error.code,
            message: body.error.message,
        },
        Err(_) => ApiError::Arm {
            status,
            code: "Unknown".to_string(),
            message: text,
        },
    }
}

#[cfg(test)]
#[path = "./client_test.rs"]
mod client_test;
