use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::catalog::DatabaseKey;
use crate::error::ApiError;

/// GET / - service index
pub async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    let databases: Vec<Value> = state
        .catalog
        .databases()
        .iter()
        .map(|db| {
            json!({
                "database": db.key.as_str(),
                "description": db.key.description(),
                "endpoint": format!("/api/tables/{}", db.key.slug()),
            })
        })
        .collect();

    Json(json!({
        "success": true,
        "data": {
            "name": "TourWow API (Rust)",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
            "databases": databases,
            "endpoints": {
                "health": "GET /health (public)",
                "query": "GET|POST /api/database/query",
                "tables": "GET /api/database/tables[?database=&include_columns=true]",
                "schema": "GET /api/database/schema[?database=&table=]",
                "discovery": "GET /api/tables[/:database[/:table]]",
                "records": "POST|PUT|DELETE /api/tables/:database/:table",
            },
            "valid_databases": DatabaseKey::ALL.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
        }
    }))
}

/// GET /health - pings the pool within the request deadline
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let now = chrono::Utc::now();
    let deadline = Duration::from_secs(state.config.api.request_timeout_secs.max(1));

    let Ok(ping) = tokio::time::timeout(deadline, state.executor.ping()).await else {
        tracing::error!("health check exceeded {:?} deadline", deadline);
        return ApiError::Timeout(deadline.as_secs()).into_response();
    };

    match ping {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": e.kind()
                    }
                })),
            )
                .into_response()
        }
    }
}
