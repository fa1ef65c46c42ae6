//! HTTP client for the coordinator daemon
//!
//! Used by the CLI front end. Network failures are retried; HTTP error
//! responses are returned immediately.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{
    ActiveInstance, AddAppRequest, AppInfo, CleanupResponse, PortRequest, PortResponse,
    ReleaseRequest, ReleaseResponse,
};

use super::api::{ConfigSummary, ErrorResponse, HealthResponse, StatusResponse};

/// Environment variable holding the coordinator base URL
pub const COORDINATOR_URL_ENV: &str = "DEVPORTS_URL";

/// Base URL used when `DEVPORTS_URL` is unset
pub const DEFAULT_COORDINATOR_URL: &str = "http://127.0.0.1:9000";

// ============================================================================
// Client Configuration
// ============================================================================

/// Configuration for the coordinator client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Coordinator server URL
    pub coordinator_url: String,

    /// Request timeout
    pub timeout: Duration,

    /// Retry count for network failures
    pub retry_count: u32,

    /// Retry delay
    pub retry_delay: Duration,
}

impl ClientConfig {
    /// Create a new client config
    pub fn new(coordinator_url: impl Into<String>) -> Self {
        Self {
            coordinator_url: coordinator_url.into(),
            timeout: Duration::from_secs(5),
            retry_count: 2,
            retry_delay: Duration::from_millis(250),
        }
    }

    /// `$DEVPORTS_URL`, else [`DEFAULT_COORDINATOR_URL`]
    pub fn from_env() -> Self {
        let url = std::env::var(COORDINATOR_URL_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_COORDINATOR_URL.to_string());
        Self::new(url)
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry count
    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    /// Set retry delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_COORDINATOR_URL)
    }
}

// ============================================================================
// Coordinator Client
// ============================================================================

/// Client for communicating with the coordinator daemon
pub struct CoordinatorClient {
    config: ClientConfig,
    base_url: Url,
    http_client: Client,
}

impl CoordinatorClient {
    /// Create a new coordinator client
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.coordinator_url)
            .map_err(|e| ClientError::InitError(format!("{}: {e}", config.coordinator_url)))?;

        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self {
            config,
            base_url,
            http_client,
        })
    }

    /// Base URL of the coordinator
    pub fn base_url(&self) -> &str {
        &self.config.coordinator_url
    }

    /// Check coordinator health
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.get(&["health"]).await
    }

    /// Allocate a port
    pub async fn allocate(&self, request: &PortRequest) -> Result<PortResponse, ClientError> {
        self.post(&["port", "allocate"], request).await
    }

    /// Release a port; `true` when something was released
    pub async fn release(&self, request: &ReleaseRequest) -> Result<bool, ClientError> {
        let response: ReleaseResponse = self.post(&["port", "release"], request).await?;
        Ok(response.released)
    }

    /// Live instances, optionally for one app
    pub async fn instances(&self, app: Option<&str>) -> Result<Vec<ActiveInstance>, ClientError> {
        match app {
            Some(name) => self.get(&["instances", name]).await,
            None => self.get(&["instances"]).await,
        }
    }

    /// Sweep dead instances; returns how many were removed
    pub async fn cleanup(&self) -> Result<usize, ClientError> {
        let response: CleanupResponse = self
            .send(Method::POST, &["instances", "cleanup"], None::<&()>)
            .await?;
        Ok(response.cleaned)
    }

    /// All registered apps
    pub async fn list_apps(&self) -> Result<BTreeMap<String, AppInfo>, ClientError> {
        self.get(&["apps"]).await
    }

    /// One app, or `None` when it is not registered
    pub async fn get_app(&self, name: &str) -> Result<Option<AppInfo>, ClientError> {
        match self.get(&["apps", name]).await {
            Ok(info) => Ok(Some(info)),
            Err(ClientError::HttpError { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Register or replace an app
    pub async fn add_app(&self, request: &AddAppRequest) -> Result<StatusResponse, ClientError> {
        self.post(&["apps"], request).await
    }

    /// Remove an app
    pub async fn remove_app(&self, name: &str) -> Result<StatusResponse, ClientError> {
        self.send(Method::DELETE, &["apps", name], None::<&()>).await
    }

    /// Ask the daemon to re-read its config file
    pub async fn reload_config(&self) -> Result<StatusResponse, ClientError> {
        self.send(Method::POST, &["config", "reload"], None::<&()>)
            .await
    }

    /// Daemon-level config values
    pub async fn config(&self) -> Result<ConfigSummary, ClientError> {
        self.get(&["config"]).await
    }

    async fn get<R: DeserializeOwned>(&self, segments: &[&str]) -> Result<R, ClientError> {
        self.send(Method::GET, segments, None::<&()>).await
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<R, ClientError> {
        self.send(Method::POST, segments, Some(body)).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InitError(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // Internal: request with retry on network failures
    async fn send<B: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<R, ClientError> {
        let url = self.endpoint(segments)?;
        let mut last_error = None;

        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                tracing::debug!(%url, attempt, "Retrying coordinator request");
                tokio::time::sleep(self.config.retry_delay).await;
            }

            let mut request = self.http_client.request(method.clone(), url.clone());
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(ClientError::NetworkError(e.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return response
                    .json::<R>()
                    .await
                    .map_err(|e| ClientError::ParseError(e.to_string()));
            }

            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status, &text));
        }

        Err(last_error.unwrap_or_else(|| ClientError::NetworkError("Unknown error".to_string())))
    }
}

// ============================================================================
// Client Errors
// ============================================================================

/// Client errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Initialization error
    #[error("Initialization error: {0}")]
    InitError(String),

    /// The coordinator could not be reached
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The coordinator answered with an error status
    #[error("HTTP error ({status}): {message}")]
    HttpError {
        status: u16,
        kind: Option<String>,
        message: String,
    },

    /// The response body did not match the expected shape
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ClientError {
    fn from_response(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(parsed) => Self::HttpError {
                status: status.as_u16(),
                kind: Some(parsed.kind),
                message: parsed.error,
            },
            Err(_) => Self::HttpError {
                status: status.as_u16(),
                kind: None,
                message: body.to_string(),
            },
        }
    }

    /// Whether the coordinator is simply not running or unreachable
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NetworkError(_))
    }

    /// Error kind reported by the coordinator, if any
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::HttpError { kind, .. } => kind.as_deref(),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
