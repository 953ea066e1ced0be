mod common;

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use axum::body::Body;
use serde_json::json;

use common::*;

#[tokio::test]
async fn health_is_public() {
    let (status, _, body) = send(default_router(), anonymous("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("ok"));
}

#[tokio::test]
async fn health_reports_degraded_pool() {
    let app = router(state(config(), catalog(), Arc::new(orders().unhealthy())));
    let (status, _, body) = send(app, anonymous("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["data"]["status"], json!("degraded"));
}

#[tokio::test]
async fn health_ping_is_bounded_by_the_deadline() {
    let mut config = config();
    config.api.request_timeout_secs = 1;
    let executor = orders().with_delay(std::time::Duration::from_secs(3));
    let app = router(state(config, catalog(), Arc::new(executor)));
    let (status, _, body) = send(app, anonymous("/health")).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Request exceeded the 1s time limit"));
}

#[tokio::test]
async fn api_rejects_missing_credentials() {
    let (status, _, body) = send(default_router(), anonymous("/api/tables")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Unauthorized - invalid token"));
}

#[tokio::test]
async fn bearer_token_is_accepted() {
    let request = Request::builder()
        .uri("/api/tables")
        .header("authorization", format!("Bearer {}", token()))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(default_router(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
}

#[tokio::test]
async fn static_key_is_a_fallback_for_tokens() {
    let (status, _, _) = send(default_router(), get("/api/tables")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn wrong_key_is_rejected_with_the_token_error() {
    let request = Request::builder()
        .uri("/api/tables")
        .header("x-api-key", "not-a-real-key")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(default_router(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Unauthorized - invalid token"));
}

#[tokio::test]
async fn fallback_disabled_means_keys_are_not_enough() {
    let mut config = config();
    config.security.allow_api_key_fallback = false;
    let app = router(state(config, catalog(), Arc::new(orders())));
    let (status, _, _) = send(app, get("/api/tables")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn open_mode_needs_no_credentials() {
    let mut config = config();
    config.security.require_jwt = false;
    config.security.require_api_key = false;
    let app = router(state(config, catalog(), Arc::new(orders())));
    let (status, _, _) = send(app, anonymous("/api/tables")).await;
    assert_eq!(status, StatusCode::OK);
}
