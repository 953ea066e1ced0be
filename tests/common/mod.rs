#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use tourwow_api_rust::auth::{generate_token, Claims};
use tourwow_api_rust::config::AppConfig;
use tourwow_api_rust::testing::{InMemoryCatalog, InMemoryExecutor};
use tourwow_api_rust::{app, AppState};

pub const SECRET: &str = "integration-secret";
pub const API_KEY: &str = "tw_live_integration_key";

/// Development preset with known credentials and no rate limiting.
pub fn config() -> AppConfig {
    let mut config = AppConfig::development();
    config.security.jwt_secret = SECRET.to_string();
    config.security.api_keys = vec![API_KEY.to_string()];
    config.api.enable_rate_limiting = false;
    config
}

pub fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_table("tourwow", "v_Xqc7k7_orders", &["id", "order_code", "status", "amount"])
        .with_table("tourwow", "v_Xqc7k7_customers", &["id", "name", "email"])
        .with_table("locations", "countries", &["id", "name_en", "code"])
        .with_table("suppliers", "suppliers", &["id", "name", "active"])
}

/// Fifteen orders, odd ids paid, even ids pending.
pub fn orders() -> InMemoryExecutor {
    let rows = (1..=15)
        .map(|id| {
            json!({
                "id": id,
                "order_code": format!("TW{:04}", id),
                "status": if id % 2 == 1 { "paid" } else { "pending" },
                "amount": id * 1000,
            })
        })
        .collect();
    InMemoryExecutor::new().with_rows("tourwow", "v_Xqc7k7_orders", rows)
}

pub fn state(config: AppConfig, catalog: InMemoryCatalog, executor: Arc<InMemoryExecutor>) -> AppState {
    AppState::new(config, Arc::new(catalog), executor)
}

pub fn router(state: AppState) -> Router {
    app(Arc::new(state))
}

pub fn default_router() -> Router {
    router(state(config(), catalog(), Arc::new(orders())))
}

pub fn token() -> String {
    let claims = Claims::new("user-42", chrono::Duration::hours(1)).with_username("ops");
    generate_token(&claims, SECRET).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).header("x-api-key", API_KEY).body(Body::empty()).unwrap()
}

pub fn anonymous(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn with_json(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", API_KEY)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, headers, body)
}
