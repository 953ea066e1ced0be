use std::sync::Arc;

use axum::extract::{rejection::QueryRejection, Query, State};
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::discovery_service::Listing;

#[derive(Debug, Default, Deserialize)]
pub struct SchemaQuery {
    pub database: Option<String>,
    /// Substring filter on table names.
    pub table: Option<String>,
}

/// GET /api/database/schema - every table with its columns
pub async fn database_schema(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SchemaQuery>, QueryRejection>,
) -> ApiResult<Listing> {
    let Query(query) = query?;
    let listing = state
        .discovery
        .schema(query.database.as_deref(), query.table.as_deref())
        .await?;
    Ok(ApiResponse::success(listing))
}
