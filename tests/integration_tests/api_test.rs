//! HTTP API tests
//!
//! Requests go straight into the axum router with `tower::ServiceExt::oneshot`;
//! no socket is bound.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use devports::coordinator::api::create_router;
use devports::coordinator::AppState;

use crate::common::{coordinator_in, FakeProbe};

fn router(dir: &TempDir, probe: Arc<FakeProbe>) -> Router {
    let coordinator = Arc::new(coordinator_in(dir, probe));
    create_router(AppState::new(coordinator))
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

// ============================================================================
// Apps
// ============================================================================

#[tokio::test]
async fn test_add_get_remove_app() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, FakeProbe::new());

    let (status, body) = call(
        &router,
        Method::POST,
        "/apps",
        Some(json!({
            "name": "web1",
            "path": "/src/web1",
            "port_strategy": "range",
            "port_range": [8010, 8012]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "added", "name": "web1"}));

    let (status, body) = call(&router, Method::GET, "/apps/web1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["port_strategy"], "range");
    assert_eq!(body["command"], "uvicorn app.main:app --reload");
    assert_eq!(body["available_ports"], json!([8010, 8011, 8012]));

    let (status, body) = call(&router, Method::GET, "/apps", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["web1"].is_object());

    let (status, _) = call(&router, Method::DELETE, "/apps/web1", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&router, Method::DELETE, "/apps/web1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "app_not_found");
}

#[tokio::test]
async fn test_unknown_app_is_404() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, FakeProbe::new());

    let (status, body) = call(&router, Method::GET, "/apps/ghost", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "App 'ghost' not found");
}

#[tokio::test]
async fn test_invalid_strategy_is_400_and_not_stored() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, FakeProbe::new());

    let (status, body) = call(
        &router,
        Method::POST,
        "/apps",
        Some(json!({
            "name": "bad",
            "path": "/src/bad",
            "port_strategy": "stepped",
            "port_step": {"start": 8000, "step": 0, "count": 3}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_strategy");

    let (status, body) = call(
        &router,
        Method::POST,
        "/apps",
        Some(json!({
            "name": "mixed",
            "path": "/src/mixed",
            "port_strategy": "dedicated",
            "port": 8500,
            "ports": [8501]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_strategy");

    let (_, apps) = call(&router, Method::GET, "/apps", None).await;
    assert_eq!(apps, json!({}));
}

#[tokio::test]
async fn test_malformed_body_uses_error_shape() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, FakeProbe::new());

    let (status, body) = call(
        &router,
        Method::POST,
        "/apps",
        Some(json!({
            "name": "big",
            "path": "/src/big",
            "port_strategy": "dedicated",
            "port": 70000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "invalid_request");
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request"));

    let (status, body) = call(
        &router,
        Method::POST,
        "/port/allocate",
        Some(json!({"app_name": "api"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
}

#[tokio::test]
async fn test_app_listing_previews_ports() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, FakeProbe::new());
    call(
        &router,
        Method::POST,
        "/apps",
        Some(json!({
            "name": "wide",
            "path": "/src/wide",
            "port_strategy": "range",
            "port_range": [9000, 9049]
        })),
    )
    .await;

    let (_, apps) = call(&router, Method::GET, "/apps", None).await;
    assert_eq!(apps["wide"]["available_ports"].as_array().unwrap().len(), 10);

    let (_, app) = call(&router, Method::GET, "/apps/wide", None).await;
    let ports = app["available_ports"].as_array().unwrap();
    assert_eq!(ports.len(), 50);
    assert_eq!(ports[49], 9049);
}

// ============================================================================
// Ports and Instances
// ============================================================================

#[tokio::test]
async fn test_allocate_release_roundtrip() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, FakeProbe::new());

    let (status, body) = call(
        &router,
        Method::POST,
        "/port/allocate",
        Some(json!({"app_name": "api", "instance_id": "main", "pid": 4242})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"port": 8100, "app_name": "api", "instance_id": "main"}));

    let (_, instances) = call(&router, Method::GET, "/instances/api", None).await;
    assert_eq!(instances.as_array().unwrap().len(), 1);
    assert_eq!(instances[0]["pid"], 4242);

    let (status, body) = call(
        &router,
        Method::POST,
        "/port/release",
        Some(json!({"app_name": "api", "instance_id": "main"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"released": true}));

    let (_, instances) = call(&router, Method::GET, "/instances", None).await;
    assert_eq!(instances, json!([]));
}

#[tokio::test]
async fn test_exhaustion_is_503() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, FakeProbe::new());
    call(
        &router,
        Method::POST,
        "/apps",
        Some(json!({
            "name": "solo",
            "path": "/src/solo",
            "port_strategy": "dedicated",
            "port": 8500
        })),
    )
    .await;

    let first = json!({"app_name": "solo", "instance_id": "a", "pid": 1});
    let second = json!({"app_name": "solo", "instance_id": "b", "pid": 2});
    let (status, _) = call(&router, Method::POST, "/port/allocate", Some(first)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&router, Method::POST, "/port/allocate", Some(second)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "port_exhaustion");
}

#[tokio::test]
async fn test_cleanup_reports_count() {
    let dir = TempDir::new().unwrap();
    let probe = FakeProbe::new();
    let router = router(&dir, probe.clone());

    for pid in [10, 11] {
        call(
            &router,
            Method::POST,
            "/port/allocate",
            Some(json!({"app_name": "api", "pid": pid})),
        )
        .await;
    }
    probe.kill(10);

    let (status, body) = call(&router, Method::POST, "/instances/cleanup", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"cleaned": 1}));
}

// ============================================================================
// Config, Health and Metrics
// ============================================================================

#[tokio::test]
async fn test_reload_corrupt_file_is_500() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, FakeProbe::new());

    let (status, body) = call(&router, Method::POST, "/config/reload", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "reloaded"}));

    std::fs::write(dir.path().join("config.json"), "{ truncated").unwrap();

    let (status, body) = call(&router, Method::POST, "/config/reload", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "config_corrupt");
}

#[tokio::test]
async fn test_config_summary() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, FakeProbe::new());

    let (status, body) = call(&router, Method::GET, "/config", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["coordinator_port"], 9000);
    assert_eq!(body["default_port_range"], json!([8100, 8199]));
    assert!(body["config_path"].as_str().unwrap().ends_with("config.json"));
}

#[tokio::test]
async fn test_health() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, FakeProbe::new());
    call(
        &router,
        Method::POST,
        "/port/allocate",
        Some(json!({"app_name": "api", "pid": 1})),
    )
    .await;

    let (status, body) = call(&router, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["apps_registered"], 0);
    assert_eq!(body["active_instances"], 1);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    devports::metrics::init_metrics().unwrap();
    let dir = TempDir::new().unwrap();
    let router = router(&dir, FakeProbe::new());
    call(
        &router,
        Method::POST,
        "/port/allocate",
        Some(json!({"app_name": "metered", "pid": 1})),
    )
    .await;

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("devports_allocations_total"));
    assert!(text.contains("devports_api_requests_total"));
}
