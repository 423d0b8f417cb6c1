use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::AuditError;

/// Public instance of the Nu HTML checker
pub const DEFAULT_VALIDATOR_URL: &str = "https://validator.w3.org/nu/?out=json";

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds (for exponential backoff cap)
    pub max_retry_delay_ms: u64,
    /// User agent string
    pub user_agent: String,
    /// Endpoint accepting a POSTed page and answering with JSON messages
    pub validator_url: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 500,
            max_retry_delay_ms: 30000,
            user_agent: format!("html-audit/{}", env!("CARGO_PKG_VERSION")),
            validator_url: DEFAULT_VALIDATOR_URL.to_string(),
        }
    }
}

/// Outcome of probing a remote link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    /// 2xx or 3xx
    Ok,
    /// 4xx
    ClientError,
    /// 5xx
    ServerError,
    Timeout,
    /// No HTTP status could be obtained
    Unknown,
}

impl RemoteStatus {
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_client_error() {
            RemoteStatus::ClientError
        } else if status.is_server_error() {
            RemoteStatus::ServerError
        } else {
            RemoteStatus::Ok
        }
    }

    /// Only definite HTTP failures and timeouts make a link broken.
    pub fn is_reachable(self) -> bool {
        matches!(self, RemoteStatus::Ok | RemoteStatus::Unknown)
    }
}

/// One entry of the validator's `messages` array. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorMessage {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub sub_type: Option<String>,
    pub message: Option<String>,
    pub extract: Option<String>,
    pub first_line: Option<i64>,
    pub first_column: Option<i64>,
    pub last_line: Option<i64>,
    pub last_column: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ValidatorResponse {
    #[serde(default)]
    messages: Vec<ValidatorMessage>,
}

/// Parse a validator answer; blank or malformed bodies yield `None`.
pub fn parse_validator_response(body: &str) -> Option<Vec<ValidatorMessage>> {
    if body.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<ValidatorResponse>(body) {
        Ok(response) => Some(response.messages),
        Err(e) => {
            warn!("Discarding unparseable validator response: {}", e);
            None
        }
    }
}

/// Checks whether a remote URL answers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, url: &str) -> RemoteStatus;
}

/// Runs a page through an HTML conformance checker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConformanceValidator: Send + Sync {
    /// `None` when the checker could not be reached or gave no usable answer
    async fn check(&self, path: &Path) -> Option<Vec<ValidatorMessage>>;
}

/// Collaborators for running without network access: every remote link is
/// reachable and the conformance checker never answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineCollaborators;

#[async_trait]
impl ReachabilityProbe for OfflineCollaborators {
    async fn probe(&self, _url: &str) -> RemoteStatus {
        RemoteStatus::Unknown
    }
}

#[async_trait]
impl ConformanceValidator for OfflineCollaborators {
    async fn check(&self, _path: &Path) -> Option<Vec<ValidatorMessage>> {
        None
    }
}

/// Async HTTP client for link probing and conformance checks
pub struct AsyncHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl AsyncHttpClient {
    /// Create a new async HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> Result<Self, AuditError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(true)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(AuditError::from)?;

        Ok(Self { client, config })
    }

    /// HEAD a link and classify the answer.
    pub async fn probe_url(&self, url: &str) -> RemoteStatus {
        let url = normalize_remote_url(url);

        match self
            .send_with_retry(&url, || self.client.head(url.as_str()))
            .await
        {
            Ok(response) => RemoteStatus::from_status(response.status()),
            Err(AuditError::HttpStatus { status, .. }) => StatusCode::from_u16(status)
                .map(RemoteStatus::from_status)
                .unwrap_or(RemoteStatus::Unknown),
            Err(AuditError::Timeout { .. }) => RemoteStatus::Timeout,
            Err(AuditError::Http(e)) if e.is_timeout() => RemoteStatus::Timeout,
            Err(e) => {
                debug!("No status for {}: {}", url, e);
                RemoteStatus::Unknown
            }
        }
    }

    /// POST a page to the conformance checker and collect its messages.
    pub async fn validate_html(&self, path: &Path) -> Option<Vec<ValidatorMessage>> {
        let body = match tokio::fs::read(path).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Cannot read {} for validation: {}", path.display(), e);
                return None;
            }
        };

        let url = self.config.validator_url.as_str();
        let response = self
            .send_with_retry(url, || {
                self.client
                    .post(url)
                    .header(CONTENT_TYPE, "text/html; charset=utf-8")
                    .body(body.clone())
            })
            .await;

        let text = match response {
            Ok(response) => response.text().await,
            Err(e) => {
                warn!("Validator request for {} failed: {}", path.display(), e);
                return None;
            }
        };

        match text {
            Ok(text) => parse_validator_response(&text),
            Err(e) => {
                warn!("Cannot read validator response for {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Send a request with retry logic and exponential backoff.
    ///
    /// `build` is called once per attempt since a request is consumed by sending it.
    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Response, AuditError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut current_attempt = 0;

        loop {
            match self.make_request(url, build()).await {
                Ok(response) => {
                    if response.status().is_success() || response.status().is_redirection() {
                        return Ok(response);
                    }

                    let status = response.status();
                    let error = AuditError::HttpStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                        message: format!(
                            "HTTP {}: {}",
                            status.as_u16(),
                            status.canonical_reason().unwrap_or("Unknown")
                        ),
                    };

                    // Retry on server errors (5xx) but not client errors (4xx)
                    if status.is_server_error() && current_attempt < self.config.retry_attempts {
                        self.wait_before_retry(current_attempt).await;
                        current_attempt += 1;
                        continue;
                    }

                    return Err(error);
                }
                Err(error) => {
                    if current_attempt < self.config.retry_attempts
                        && self.is_retryable_error(&error)
                    {
                        self.wait_before_retry(current_attempt).await;
                        current_attempt += 1;
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Make a single HTTP request with timeout
    async fn make_request(
        &self,
        url: &str,
        request: RequestBuilder,
    ) -> Result<Response, AuditError> {
        timeout(
            Duration::from_secs(self.config.timeout_seconds),
            request.send(),
        )
        .await
        .map_err(|_| AuditError::Timeout {
            url: url.to_string(),
            timeout_seconds: self.config.timeout_seconds,
        })?
        .map_err(AuditError::from)
    }

    /// Wait before retry with exponential backoff
    async fn wait_before_retry(&self, attempt: u32) {
        sleep(self.retry_delay(attempt)).await;
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .config
            .retry_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.config.max_retry_delay_ms))
    }

    /// Check if an error is retryable
    fn is_retryable_error(&self, error: &AuditError) -> bool {
        match error {
            AuditError::Http(reqwest_error) => {
                // Retry on network errors, timeouts, but not on invalid URLs or similar
                reqwest_error.is_timeout() || reqwest_error.is_connect()
            }
            AuditError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

#[async_trait]
impl ReachabilityProbe for AsyncHttpClient {
    async fn probe(&self, url: &str) -> RemoteStatus {
        self.probe_url(url).await
    }
}

#[async_trait]
impl ConformanceValidator for AsyncHttpClient {
    async fn check(&self, path: &Path) -> Option<Vec<ValidatorMessage>> {
        self.validate_html(path).await
    }
}

/// Links written as `www.example.com` have no scheme for the client to use.
pub fn normalize_remote_url(url: &str) -> String {
    if url.starts_with("www") {
        format!("http://{url}")
    } else {
        url.to_string()
    }
}
