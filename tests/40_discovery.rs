mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use common::*;

#[tokio::test]
async fn discovery_lists_every_logical_database() {
    let (status, _, body) = send(default_router(), get("/api/tables")).await;
    assert_eq!(status, StatusCode::OK);

    let databases = body["data"]["databases"].as_array().unwrap();
    assert_eq!(databases.len(), 3);
    assert_eq!(databases[0]["database_key"], json!("tourwow"));
    assert_eq!(databases[0]["tables"][0]["table_name"], json!("customers"));
    assert_eq!(databases[0]["tables"][1]["endpoint"], json!("/api/tables/tourwow/orders"));
    assert_eq!(body["data"]["summary"]["total_tables"], json!(4));
}

#[tokio::test]
async fn one_failing_database_is_isolated() {
    let app = router(state(config(), catalog().with_unavailable_schema("suppliers"), Arc::new(orders())));
    let (status, _, body) = send(app, get("/api/database/tables")).await;

    assert_eq!(status, StatusCode::OK);
    let databases = body["data"]["databases"].as_array().unwrap();
    assert_eq!(databases[0]["table_count"], json!(2));
    assert_eq!(databases[2]["database"], json!("SUPPLIERS"));
    assert_eq!(databases[2]["error"], json!("connection error while reading catalog"));
    assert!(databases[0].get("error").is_none());
}

#[tokio::test]
async fn single_database_route_rejects_unknown_keys() {
    let (status, _, body) = send(default_router(), get("/api/tables/billing")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["valid_databases"], json!(["TOURWOW", "LOCATIONS", "SUPPLIERS"]));

    let (status, _, body) = send(default_router(), get("/api/tables/locations")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tables"][0]["table_name"], json!("countries"));
}

#[tokio::test]
async fn table_listing_can_include_columns() {
    let (_, _, body) = send(default_router(), get("/api/database/tables?database=LOCATIONS&include_columns=true")).await;
    let countries = &body["data"]["databases"][0]["tables"][0];
    assert_eq!(countries["columns"][1]["column_name"], json!("name_en"));
}

#[tokio::test]
async fn schema_dump_filters_by_table_substring() {
    let (status, _, body) = send(default_router(), get("/api/database/schema?database=tourwow&table=cust")).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["summary"], json!({"total_databases": 1, "total_tables": 1, "total_columns": 3}));
    assert_eq!(body["data"]["databases"][0]["tables"][0]["table_name"], json!("customers"));
}

#[tokio::test]
async fn slow_catalog_listings_hit_the_deadline() {
    let mut config = config();
    config.api.request_timeout_secs = 1;
    let slow = catalog().with_listing_delay(Duration::from_secs(3));
    let app = router(state(config, slow, Arc::new(orders())));

    for uri in ["/api/database/tables?database=tourwow", "/api/database/schema", "/api/tables", "/api/tables/tourwow"] {
        let (status, _, body) = send(app.clone(), get(uri)).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT, "{}", uri);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], json!("Request exceeded the 1s time limit"));
    }
}
