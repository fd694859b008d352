// crates/network/tests/network_tests.rs
//! Integration tests for the HTTP client against a local server

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use bookshelf_network::{Client, ClientConfig, NetworkError};
use bookshelf_resilience::RetryPolicy;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{}", addr)
}

fn fast_config() -> ClientConfig {
    ClientConfig {
        timeout: Duration::from_secs(5),
        retry_policy: RetryPolicy::new(3).with_initial_delay(Duration::from_millis(1)),
        ..ClientConfig::default()
    }
}

async fn flaky(State(hits): State<Arc<AtomicUsize>>) -> Result<Json<Value>, StatusCode> {
    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    } else {
        Ok(Json(json!({"book_ids": [1, 2, 3]})))
    }
}

#[tokio::test]
async fn test_get_json_retries_server_errors() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/ajax/search/library", get(flaky))
        .with_state(hits.clone());
    let base = spawn(app).await;

    let client = Client::with_config(&base, fast_config()).expect("client");
    let body: Value = client
        .get_json("/ajax/search/library", &[("num", "10".to_string())])
        .await
        .expect("eventually succeeds");

    assert_eq!(body["book_ids"], json!([1, 2, 3]));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_post_json_is_not_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/swap-indexes", post(flaky))
        .with_state(hits.clone());
    let base = spawn(app).await;

    let client = Client::with_config(&base, fast_config()).expect("client");
    let result: Result<Value, _> = client.post_json("/swap-indexes", &json!([])).await;

    assert!(matches!(result, Err(NetworkError::Status { status: 503, .. })));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_post_query_is_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/cdb/cmd/list/0", post(flaky))
        .with_state(hits.clone());
    let base = spawn(app).await;

    let client = Client::with_config(&base, fast_config()).expect("client");
    let result: Result<Value, _> = client.post_query("/cdb/cmd/list/0", &json!([])).await;

    assert!(result.is_ok());
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_not_found_is_reported() {
    let app = Router::new();
    let base = spawn(app).await;

    let client = Client::with_config(&base, fast_config()).expect("client");
    let result: Result<Value, _> = client.get_json("/indexes/missing", &[]).await;

    let err = result.expect_err("404");
    assert!(err.is_not_found());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    async fn echo_auth(headers: HeaderMap) -> Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Json(json!({ "auth": auth }))
    }

    let base = spawn(Router::new().route("/health", get(echo_auth))).await;
    let config = ClientConfig {
        bearer_token: Some("masterKey".to_string()),
        ..fast_config()
    };
    let client = Client::with_config(&base, config).expect("client");

    let body: Value = client.get_json("/health", &[]).await.expect("health");
    assert_eq!(body["auth"], "Bearer masterKey");
}

#[tokio::test]
async fn test_get_bytes_keeps_content_type() {
    async fn cover() -> ([(&'static str, &'static str); 1], &'static [u8]) {
        ([("content-type", "image/jpeg")], b"\xff\xd8\xff")
    }

    let base = spawn(Router::new().route("/get/cover/1/library", get(cover))).await;
    let client = Client::with_config(&base, fast_config()).expect("client");

    let download = client.get_bytes("/get/cover/1/library").await.expect("cover");
    assert_eq!(download.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(download.bytes.as_ref(), b"\xff\xd8\xff");
}
