use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::app::AppState;
use crate::auth::{AuthMethod, AuthResult};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::MutationOutcome;

#[derive(Debug, Default, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

/// POST /api/tables/:database/:table - insert one row
pub async fn record_insert(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthResult>,
    Path((database, table)): Path<(String, String)>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<MutationOutcome> {
    let Json(body) = body?;
    audit(&auth, "insert", &database, &table);
    let outcome = state.mutations.insert(&database, &table, body).await?;
    Ok(ApiResponse::created(outcome))
}

/// PUT /api/tables/:database/:table - update by the body's `id`
pub async fn record_update(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthResult>,
    Path((database, table)): Path<(String, String)>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<MutationOutcome> {
    let Json(body) = body?;
    audit(&auth, "update", &database, &table);
    Ok(ApiResponse::success(state.mutations.update(&database, &table, body).await?))
}

/// DELETE /api/tables/:database/:table?id=
pub async fn record_delete(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthResult>,
    Path((database, table)): Path<(String, String)>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> ApiResult<MutationOutcome> {
    let Query(query) = query?;
    audit(&auth, "delete", &database, &table);
    let id = query.id.map(|raw| match raw.trim().parse::<i64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::String(raw),
    });
    Ok(ApiResponse::success(state.mutations.delete(&database, &table, id).await?))
}

fn audit(auth: &AuthResult, operation: &str, database: &str, table: &str) {
    let caller = match (&auth.subject, auth.method) {
        (Some(claims), _) => claims.display_name(),
        (None, AuthMethod::StaticKey) => "static-key",
        _ => "anonymous",
    };
    tracing::info!(caller, method = ?auth.method, operation, database, table, "mutation requested");
}
