mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;

use tourwow_api_rust::testing::InMemoryExecutor;

use common::*;

#[tokio::test]
async fn insert_returns_201_with_the_new_id() {
    let executor = Arc::new(InMemoryExecutor::new());
    let app = router(state(config(), catalog(), executor.clone()));
    let body = json!({"name": "Ann", "email": "ann@example.com"});
    let (status, _, body) = send(app, with_json(Method::POST, "/api/tables/tourwow/customers", body)).await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["id"], json!(1));
    assert_eq!(body["data"]["table"], json!("customers"));
    let statement = &executor.statements()[0];
    assert!(statement.query.starts_with("INSERT INTO `tourwow`.`v_Xqc7k7_customers`"));
}

#[tokio::test]
async fn update_requires_an_id() {
    let body = json!({"name": "Ann"});
    let (status, _, body) = send(default_router(), with_json(Method::PUT, "/api/tables/tourwow/customers", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn unknown_body_keys_are_rejected() {
    let body = json!({"id": 3, "is_admin": true});
    let (status, _, body) = send(default_router(), with_json(Method::PUT, "/api/tables/tourwow/customers", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["valid_columns"].as_array().unwrap().contains(&json!("email")));
}

#[tokio::test]
async fn delete_by_query_id() {
    let executor = Arc::new(InMemoryExecutor::new());
    let app = router(state(config(), catalog(), executor.clone()));
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/tables/suppliers/suppliers?id=7")
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["rows_affected"], json!(1));
    assert_eq!(executor.statements()[0].params, vec![json!(7)]);
}

#[tokio::test]
async fn writes_are_forbidden_when_disabled() {
    let mut config = config();
    config.api.enable_mutations = false;
    let executor = Arc::new(InMemoryExecutor::new());
    let app = router(state(config, catalog(), executor.clone()));
    let (status, _, body) = send(app, with_json(Method::POST, "/api/tables/tourwow/customers", json!({"name": "x"}))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], json!("Write operations are disabled"));
    assert!(executor.statements().is_empty());
}

#[tokio::test]
async fn repeated_columns_are_a_400() {
    let executor = Arc::new(InMemoryExecutor::new());
    let app = router(state(config(), catalog(), executor.clone()));
    let body = json!({"name": "Ann", "NAME": "Bob"});
    let (status, _, body) = send(app, with_json(Method::POST, "/api/tables/tourwow/customers", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(executor.statements().is_empty());
}
