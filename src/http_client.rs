use anyhow::Context;
use rand::Rng;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::TokenManager;
use crate::config::ClientConfig;
use crate::error::{body_from_text, parse_api_error, ApiError, Error, Result};

/// Upper bound for any single backoff delay
pub const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Statuses that are retried with backoff
const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// HTTP method for API requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(Error::Config(format!("Unsupported HTTP method: {}", other))),
        }
    }
}

/// Build the shared HTTP client with the per-attempt timeout
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("backstage-client/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;
    Ok(client)
}

/// Authenticated HTTP transport with retry logic
pub struct Transport {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Source of bearer tokens
    token_manager: Arc<TokenManager>,

    /// API root every path is resolved against
    base_url: String,

    /// Maximum number of retries for transient failures
    max_retries: u32,

    /// Base delay for exponential backoff
    base_delay: Duration,

    /// Log every completed response
    debug: bool,
}

impl Transport {
    pub fn new(client: Client, token_manager: Arc<TokenManager>, config: &ClientConfig) -> Self {
        Self {
            client,
            token_manager,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
            debug: config.debug,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.token_manager
    }

    /// Resolve a resource path against the API root
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        self.request::<T, ()>(HttpMethod::Get, path, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: Option<&B>) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(HttpMethod::Post, path, body).await
    }

    pub async fn put<T, B>(&self, path: &str, body: Option<&B>) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(HttpMethod::Put, path, body).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: Option<&B>) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(HttpMethod::Patch, path, body).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        self.request::<T, ()>(HttpMethod::Delete, path, None).await
    }

    /// Execute one logical API request.
    ///
    /// Transient failures are retried with backoff. A final 401 triggers one
    /// forced token refresh and a single reissue. Non-JSON success responses
    /// yield `Ok(None)`.
    pub async fn request<T, B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url_for(path);
        let payload = body.map(serde_json::to_vec).transpose()?;

        let token = self.token_manager.get_token().await?;
        let mut response = self
            .send_with_retry(method, &url, payload.as_deref(), &token)
            .await?;

        // 401: refresh the token and reissue once
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(method = %method, url = %url, "Received 401, refreshing token and retrying...");

            let token = self
                .token_manager
                .force_refresh()
                .await
                .map_err(|e| refresh_failure(e, &url))?;

            response = self
                .send_with_retry(method, &url, payload.as_deref(), &token)
                .await?;
        }

        self.read_response(method, &url, response).await
    }

    /// Send a request, retrying transient statuses and network failures.
    /// Any response the retry policy gives up on is returned as-is.
    async fn send_with_retry(
        &self,
        method: HttpMethod,
        url: &str,
        payload: Option<&[u8]>,
        token: &str,
    ) -> Result<Response> {
        let mut attempt: u32 = 0;

        loop {
            let mut builder = self
                .client
                .request(method.to_reqwest(), url)
                .bearer_auth(token)
                .header(ACCEPT, "application/json");
            if let Some(payload) = payload {
                builder = builder
                    .header(CONTENT_TYPE, "application/json")
                    .body(payload.to_vec());
            }

            tracing::debug!(
                method = %method,
                url = %url,
                attempt = attempt + 1,
                max_retries = self.max_retries,
                "Executing request attempt"
            );

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    self.log_response(method, status, url);

                    if RETRYABLE_STATUSES.contains(&status.as_u16()) && attempt < self.max_retries {
                        let delay = match retry_after_header(response.headers()) {
                            Some(secs) if status == StatusCode::TOO_MANY_REQUESTS => {
                                Duration::from_secs(secs).min(MAX_BACKOFF)
                            }
                            _ => self.calculate_backoff_delay(attempt),
                        };
                        tracing::warn!(
                            "Received {}, retrying after {}ms (attempt {}/{})",
                            status,
                            delay.as_millis(),
                            attempt + 1,
                            self.max_retries
                        );

                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Ok(response);
                }

                Err(e) => {
                    if e.is_builder() {
                        return Err(Error::Internal(
                            anyhow::Error::new(e).context("Failed to build HTTP request"),
                        ));
                    }

                    let error_kind = if e.is_timeout() {
                        "timeout"
                    } else if e.is_connect() {
                        "connection_failed"
                    } else if e.is_request() {
                        "request_error"
                    } else {
                        "unknown"
                    };

                    tracing::warn!(
                        error_kind = error_kind,
                        error = %e,
                        url = %url,
                        attempt = attempt + 1,
                        "HTTP request error"
                    );

                    let retryable = e.is_timeout() || e.is_connect() || e.is_request();
                    if retryable && attempt < self.max_retries {
                        let delay = self.calculate_backoff_delay(attempt);
                        tracing::warn!(
                            "Request failed: {}, retrying after {}ms (attempt {}/{})",
                            e,
                            delay.as_millis(),
                            attempt + 1,
                            self.max_retries
                        );

                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    tracing::error!(
                        error_kind = error_kind,
                        error = %e,
                        url = %url,
                        total_attempts = attempt + 1,
                        "HTTP request failed after all retries"
                    );

                    return Err(ApiError::network(format!("{} (kind: {})", e, error_kind))
                        .with_url(url)
                        .into());
                }
            }
        }
    }

    /// Turn the final response into a value or a typed error
    async fn read_response<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        url: &str,
        response: Response,
    ) -> Result<Option<T>> {
        let status = response.status();

        if !status.is_success() {
            let retry_after = retry_after_header(response.headers());
            let text = response.text().await.unwrap_or_default();
            let error = parse_api_error(status.as_u16(), body_from_text(&text), Some(url))
                .with_retry_after_fallback(retry_after);

            tracing::error!(
                method = %method,
                status = status.as_u16(),
                url = %url,
                kind = error.kind().name(),
                response_body = %text,
                "HTTP request failed with error response"
            );
            return Err(error.into());
        }

        if !is_json(response.headers()) {
            tracing::debug!(status = %status, url = %url, "Non-JSON response, returning no content");
            return Ok(None);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::network(format!("failed to read response body: {}", e)).with_url(url))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn log_response(&self, method: HttpMethod, status: StatusCode, url: &str) {
        if self.debug {
            tracing::info!("{} {} {}", method, status.as_u16(), url);
        } else {
            tracing::debug!(method = %method, status = %status, url = %url, "Received HTTP response");
        }
    }

    /// Exponential backoff: base_delay * 2^attempt plus up to 10% jitter,
    /// capped at [`MAX_BACKOFF`]
    fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let delay = base_ms.saturating_mul(2_u64.saturating_pow(attempt));
        let jitter = if delay >= 10 {
            rand::thread_rng().gen_range(0..=delay / 10)
        } else {
            0
        };
        Duration::from_millis(delay.saturating_add(jitter)).min(MAX_BACKOFF)
    }
}

/// Auth error reported when the forced refresh after a 401 fails
fn refresh_failure(cause: ApiError, url: &str) -> ApiError {
    tracing::error!("Token refresh failed: {}", cause);

    let mut error = ApiError::auth("Token refresh failed").with_url(url);
    if let Some(status) = cause.status_code() {
        error = error.with_status(status);
    }
    if let Some(response) = cause.response() {
        error = error.with_response(response.clone());
    }
    error
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().starts_with("application/json"))
}

/// `Retry-After` in its delta-seconds form
fn retry_after_header(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
