use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};

use crate::app::AppState;
use crate::database::JsonRow;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{QueryBody, QueryParams, QueryResult};

/// GET /api/database/query - single-predicate query string form
pub async fn query_get(
    State(state): State<Arc<AppState>>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> ApiResult<Vec<JsonRow>> {
    let Query(params) = params?;
    let result = state.query.run(params.into_request()?).await?;
    Ok(page(result))
}

/// POST /api/database/query - JSON body with any number of predicates
pub async fn query_post(
    State(state): State<Arc<AppState>>,
    body: Result<Json<QueryBody>, JsonRejection>,
) -> ApiResult<Vec<JsonRow>> {
    let Json(body) = body?;
    let result = state.query.run(body.into_request()?).await?;
    Ok(page(result))
}

pub(super) fn page(result: QueryResult) -> ApiResponse<Vec<JsonRow>> {
    ApiResponse::success(result.rows)
        .with_pagination(result.pagination)
        .with_meta(result.meta)
}
