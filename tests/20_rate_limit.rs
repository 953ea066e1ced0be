mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use tourwow_api_rust::rate_limit::{InMemoryRateLimitStore, ManualClock, RateLimiter};

use common::*;

fn limited(clock: Arc<ManualClock>, max: u32) -> axum::Router {
    let store = Arc::new(InMemoryRateLimitStore::new(clock));
    let limiter = RateLimiter::new(store, max, Duration::from_secs(60));
    router(state(config(), catalog(), Arc::new(orders())).with_rate_limiter(limiter))
}

#[tokio::test]
async fn quota_is_enforced_per_caller() {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let app = limited(clock.clone(), 2);

    let (status, headers, _) = send(app.clone(), get("/api/tables")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-ratelimit-limit"], "2");
    assert_eq!(headers["x-ratelimit-remaining"], "1");

    send(app.clone(), get("/api/tables")).await;
    let (status, headers, body) = send(app.clone(), get("/api/tables")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(headers["retry-after"], "60");
    assert_eq!(body["retryAfter"], json!(60));
    assert_eq!(body["success"], json!(false));

    // a different caller has its own window
    let request = Request::builder()
        .uri("/api/tables")
        .header("authorization", format!("Bearer {}", token()))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);

    clock.advance(61_000);
    let (status, _, _) = send(app, get("/api/tables")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn limiter_runs_before_authentication() {
    let clock = Arc::new(ManualClock::new(0));
    let app = limited(clock, 1);

    let (status, _, _) = send(app.clone(), anonymous("/api/tables")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, _) = send(app, anonymous("/api/tables")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn public_routes_are_not_counted() {
    let clock = Arc::new(ManualClock::new(0));
    let app = limited(clock, 1);
    for _ in 0..3 {
        let (status, _, _) = send(app.clone(), anonymous("/health")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
