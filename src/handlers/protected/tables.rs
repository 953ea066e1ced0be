use std::sync::Arc;

use axum::extract::{rejection::QueryRejection, Path, Query, State};
use serde::Deserialize;

use super::query::page;
use crate::app::AppState;
use crate::database::JsonRow;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::discovery_service::{DiscoveredDatabase, Discovery, Listing};
use crate::services::QueryParams;

#[derive(Debug, Default, Deserialize)]
pub struct TablesQuery {
    pub database: Option<String>,
    pub include_columns: Option<String>,
}

impl TablesQuery {
    fn include_columns(&self) -> bool {
        matches!(self.include_columns.as_deref().map(str::trim), Some("true") | Some("1"))
    }
}

/// GET /api/database/tables
pub async fn database_tables(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TablesQuery>, QueryRejection>,
) -> ApiResult<Listing> {
    let Query(query) = query?;
    let listing = state
        .discovery
        .list_tables(query.database.as_deref(), query.include_columns())
        .await?;
    Ok(ApiResponse::success(listing))
}

/// GET /api/tables
pub async fn tables_index(State(state): State<Arc<AppState>>) -> ApiResult<Discovery> {
    Ok(ApiResponse::success(state.discovery.discover().await?))
}

/// GET /api/tables/:database
pub async fn tables_database(
    State(state): State<Arc<AppState>>,
    Path(database): Path<String>,
) -> ApiResult<DiscoveredDatabase> {
    Ok(ApiResponse::success(state.discovery.database(&database).await?))
}

/// GET /api/tables/:database/:table - query one table by logical name
pub async fn table_query(
    State(state): State<Arc<AppState>>,
    Path((database, table)): Path<(String, String)>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> ApiResult<Vec<JsonRow>> {
    let Query(params) = params?;
    let result = state.query.run(params.into_table_request(database, table)).await?;
    Ok(page(result))
}
