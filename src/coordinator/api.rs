//! REST API handlers for the coordinator daemon
//!
//! Bodies are plain JSON documents; failures share one shape,
//! `{"success": false, "error": "...", "kind": "..."}`.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, MatchedPath, Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::error::Error;
use crate::metrics;
use crate::models::{
    ActiveInstance, AddAppRequest, AppConfig, AppInfo, CleanupResponse, PortRequest,
    PortResponse, ReleaseRequest, ReleaseResponse,
};

use super::server::AppState;

// ============================================================================
// API Response Types
// ============================================================================

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub kind: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
            kind: kind.into(),
        }
    }
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        Self::new(err.to_string(), err.kind())
    }
}

/// Acknowledgement for app and config mutations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl StatusResponse {
    fn new(status: &str, name: Option<&str>) -> Self {
        Self {
            status: status.to_string(),
            name: name.map(str::to_string),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub apps_registered: usize,
    pub active_instances: usize,
}

/// Daemon-level config values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub coordinator_port: u16,
    pub default_port_range: (u16, u16),
    pub config_path: String,
}

// ============================================================================
// Error Mapping
// ============================================================================

/// [`Error`] rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::InvalidRequest {
            reason: rejection.body_text(),
        })
    }
}

/// HTTP status for a coordinator error
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::PortExhaustion { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::AppNotFound { .. } => StatusCode::NOT_FOUND,
        Error::InvalidStrategy { .. } | Error::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
        Error::Config(ConfigError::InvalidValue { .. }) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, kind = self.0.kind(), "Request failed");
        }
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Port endpoints
        .route("/port/allocate", post(allocate_port))
        .route("/port/release", post(release_port))
        // Instance endpoints
        .route("/instances", get(list_instances))
        .route("/instances/cleanup", post(cleanup_instances))
        .route("/instances/{app}", get(list_app_instances))
        // App registry endpoints
        .route("/apps", get(list_apps).post(add_app))
        .route("/apps/{name}", get(get_app).delete(remove_app))
        // Config endpoints
        .route("/config", get(get_config))
        .route("/config/reload", post(reload_config))
        // Health and metrics
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn(track_requests))
        .with_state(state)
}

async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    metrics::record_api_request(
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

// ============================================================================
// Port Handlers
// ============================================================================

async fn allocate_port(
    State(state): State<AppState>,
    body: Result<Json<PortRequest>, JsonRejection>,
) -> ApiResult<PortResponse> {
    let Json(request) = body?;
    let response = state.coordinator.allocate_port(&request).await?;
    Ok(Json(response))
}

async fn release_port(
    State(state): State<AppState>,
    body: Result<Json<ReleaseRequest>, JsonRejection>,
) -> ApiResult<ReleaseResponse> {
    let Json(request) = body?;
    let released = state
        .coordinator
        .release_port(&request.app_name, request.instance_id.as_deref(), request.pid)
        .await;
    Ok(Json(ReleaseResponse { released }))
}

// ============================================================================
// Instance Handlers
// ============================================================================

async fn list_instances(State(state): State<AppState>) -> Json<Vec<ActiveInstance>> {
    Json(state.coordinator.list_active_instances(None).await)
}

async fn list_app_instances(
    State(state): State<AppState>,
    Path(app): Path<String>,
) -> Json<Vec<ActiveInstance>> {
    Json(state.coordinator.list_active_instances(Some(&app)).await)
}

async fn cleanup_instances(State(state): State<AppState>) -> Json<CleanupResponse> {
    let cleaned = state.coordinator.cleanup_dead_instances().await;
    Json(CleanupResponse { cleaned })
}

// ============================================================================
// App Handlers
// ============================================================================

async fn list_apps(State(state): State<AppState>) -> Json<BTreeMap<String, AppInfo>> {
    let apps = state.coordinator.list_apps().await;
    Json(
        apps.iter()
            .map(|(name, app)| (name.clone(), AppInfo::summary(app)))
            .collect(),
    )
}

async fn get_app(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<AppInfo> {
    match state.coordinator.get_app(&name).await {
        Some(app) => Ok(Json(AppInfo::from(&app))),
        None => Err(Error::app_not_found(name).into()),
    }
}

async fn add_app(
    State(state): State<AppState>,
    body: Result<Json<AddAppRequest>, JsonRejection>,
) -> ApiResult<StatusResponse> {
    let Json(request) = body?;
    let name = request.name.clone();
    let app = AppConfig::try_from(request).map_err(|source| Error::InvalidStrategy {
        app: name.clone(),
        source,
    })?;

    state.coordinator.add_app(app).await?;
    Ok(Json(StatusResponse::new("added", Some(&name))))
}

async fn remove_app(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<StatusResponse> {
    state.coordinator.remove_app(&name).await?;
    Ok(Json(StatusResponse::new("removed", Some(&name))))
}

// ============================================================================
// Config Handlers
// ============================================================================

async fn get_config(State(state): State<AppState>) -> Json<ConfigSummary> {
    let store = state.coordinator.store();
    let config = store.read().await;
    Json(ConfigSummary {
        coordinator_port: config.coordinator_port,
        default_port_range: config.default_port_range,
        config_path: store.path().display().to_string(),
    })
}

async fn reload_config(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    state.coordinator.reload_config().await?;
    Ok(Json(StatusResponse::new("reloaded", None)))
}

// ============================================================================
// Health Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let health = state.coordinator.health().await;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        apps_registered: health.apps_registered,
        active_instances: health.active_instances,
    })
}

async fn metrics_handler() -> Response {
    match metrics::encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => ApiError(Error::other(format!("Failed to encode metrics: {e}"))).into_response(),
    }
}

// ============================================================================
// Tests
// ============================================================================
