//! Coordinator client tests using wiremock

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use devports::coordinator::{ClientConfig, ClientError, CoordinatorClient};
use devports::models::{PortRequest, ReleaseRequest};

fn client_for(server: &MockServer) -> CoordinatorClient {
    let config = ClientConfig::new(server.uri())
        .with_retry_count(2)
        .with_retry_delay(Duration::from_millis(10));
    CoordinatorClient::new(config).unwrap()
}

#[tokio::test]
async fn test_allocate_sends_request_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/port/allocate"))
        .and(body_json(json!({"app_name": "web1", "instance_id": "A", "pid": 99})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "port": 8010,
            "app_name": "web1",
            "instance_id": "A"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .allocate(&PortRequest::new("web1", 99).with_instance_id("A"))
        .await
        .unwrap();

    assert_eq!(response.port, 8010);
    assert_eq!(response.instance_id, "A");
}

#[tokio::test]
async fn test_exhaustion_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/port/allocate"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "success": false,
            "error": "No available ports for app 'web1'",
            "kind": "port_exhaustion"
        })))
        .expect(1) // Should only be called once (no retry)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .allocate(&PortRequest::new("web1", 1))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::HttpError { status: 503, .. }));
    assert_eq!(err.kind(), Some("port_exhaustion"));
    assert!(!err.is_unavailable());
}

#[tokio::test]
async fn test_get_app_404_is_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/apps/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "error": "App 'ghost' not found",
            "kind": "app_not_found"
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert!(client.get_app("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_release_and_cleanup() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/port/release"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"released": true})))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/instances/cleanup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cleaned": 3})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let release = ReleaseRequest {
        app_name: "web1".to_string(),
        instance_id: Some("A".to_string()),
        pid: None,
    };

    assert!(client.release(&release).await.unwrap());
    assert_eq!(client.cleanup().await.unwrap(), 3);
}

#[tokio::test]
async fn test_unexpected_body_is_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.health().await.unwrap_err();

    assert!(matches!(err, ClientError::ParseError(_)));
}

#[tokio::test]
async fn test_unreachable_coordinator_is_unavailable() {
    // Bind then drop to get a port nobody listens on
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let config = ClientConfig::new(format!("http://127.0.0.1:{port}"))
        .with_retry_count(1)
        .with_retry_delay(Duration::from_millis(10))
        .with_timeout(Duration::from_secs(2));
    let client = CoordinatorClient::new(config).unwrap();

    let err = client.health().await.unwrap_err();
    assert!(err.is_unavailable());
}
