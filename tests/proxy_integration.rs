//! End-to-end tests for the development proxy against a mock upstream.

use sammy_shell::proxy::{ProxyConfig, ProxyServer};
use serde_json::json;
use std::time::Duration;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Test Helpers
// ============================================================================

/// Start a proxy on an ephemeral port in front of `target`.
async fn start_proxy(target: &str) -> (String, broadcast::Sender<()>) {
    let config = ProxyConfig::new("127.0.0.1:0", target, ORIGIN).unwrap();
    let server = ProxyServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        server.run_until_shutdown().await.unwrap();
    });

    // Small delay to ensure server is ready
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{addr}"), shutdown)
}

fn header<'a>(response: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn api_requests_are_forwarded_without_prefix() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/guides/42"))
        .and(query_param("lang", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "guideId": "42" })))
        .expect(1)
        .mount(&upstream)
        .await;

    let (base, shutdown) = start_proxy(&upstream.uri()).await;

    let response = reqwest::Client::new()
        .get(format!("{base}/api/guides/42?lang=en"))
        .header("Origin", ORIGIN)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(header(&response, "access-control-allow-origin"), Some(ORIGIN));
    assert_eq!(header(&response, "access-control-allow-credentials"), Some("true"));
    assert_eq!(header(&response, "access-control-allow-methods"), None);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "guideId": "42" }));

    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(received[0].headers.get("origin").is_none());
    assert_eq!(
        received[0].headers.get("accept").and_then(|v| v.to_str().ok()),
        Some("application/json")
    );

    let _ = shutdown.send(());
}

#[tokio::test]
async fn validate_requests_keep_path_and_get_full_cors() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/validate/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "valid": false })))
        .mount(&upstream)
        .await;

    let (base, shutdown) = start_proxy(&upstream.uri()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/validate/token"))
        .header("Origin", ORIGIN)
        .body(r#"{"token":"abc"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    assert_eq!(header(&response, "access-control-allow-origin"), Some(ORIGIN));
    assert_eq!(
        header(&response, "access-control-allow-methods"),
        Some("GET, POST, PUT, DELETE, OPTIONS")
    );
    assert_eq!(
        header(&response, "access-control-allow-headers"),
        Some("Origin, X-Requested-With, Content-Type, Accept, Authorization")
    );

    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received[0].body, br#"{"token":"abc"}"#.to_vec());
    assert_eq!(
        received[0].headers.get("content-type").and_then(|v| v.to_str().ok()),
        Some("application/json")
    );

    let _ = shutdown.send(());
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    // Nothing listens on the discard port.
    let (base, shutdown) = start_proxy("http://127.0.0.1:9").await;

    let response = reqwest::get(format!("{base}/api/health")).await.unwrap();

    assert_eq!(response.status(), 502);
    assert_eq!(header(&response, "access-control-allow-origin"), Some(ORIGIN));

    let _ = shutdown.send(());
}

#[tokio::test]
async fn other_paths_are_not_proxied() {
    let upstream = MockServer::start().await;
    let (base, shutdown) = start_proxy(&upstream.uri()).await;

    let response = reqwest::get(format!("{base}/static/app.js")).await.unwrap();

    assert_eq!(response.status(), 404);
    assert!(upstream.received_requests().await.unwrap().is_empty());

    let _ = shutdown.send(());
}
