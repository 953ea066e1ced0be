use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ServiceError;
use crate::catalog::CatalogRouter;
use crate::config::ApiConfig;
use crate::database::executor::{JsonRow, QueryExecutor};
use crate::filter::{clamp_limit, clamp_offset, parse_int, Filter, OrderInput, WhereInput};
use crate::filter::filter_order::FilterOrder;

/// Query-string form shared by `GET /api/database/query` and
/// `GET /api/tables/{database}/{table}`. Everything arrives as text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryParams {
    pub database: Option<String>,
    pub table: Option<String>,
    pub columns: Option<String>,
    pub where_column: Option<String>,
    pub where_value: Option<String>,
    pub where_operator: Option<String>,
    pub order_by: Option<String>,
    pub order_dir: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl QueryParams {
    /// `database` and `table` come from the query string.
    pub fn into_request(self) -> Result<QueryRequest, ServiceError> {
        let database = non_empty(self.database.clone());
        let table = non_empty(self.table.clone());
        match (database, table) {
            (Some(database), Some(table)) => Ok(self.into_table_request(database, table)),
            _ => Err(ServiceError::MissingParameters("database and table")),
        }
    }

    /// `database` and `table` come from the path.
    pub fn into_table_request(self, database: String, table: String) -> QueryRequest {
        let filters = match non_empty(self.where_column) {
            Some(column) => {
                let operator = non_empty(self.where_operator).unwrap_or_else(|| "=".to_string());
                let value = match self.where_value {
                    None => Value::Null,
                    Some(raw) if operator.trim().eq_ignore_ascii_case("IN") => {
                        Value::Array(raw.split(',').map(|v| Value::String(v.trim().to_string())).collect())
                    }
                    Some(raw) => Value::String(raw),
                };
                vec![WhereInput { column, operator: Some(operator), value }]
            }
            None => vec![],
        };

        QueryRequest {
            database,
            table,
            columns: self
                .columns
                .map(|c| c.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            filters,
            sort: FilterOrder::from_query(self.order_by.as_deref(), self.order_dir.as_deref()),
            limit: parse_int(self.limit.as_deref()),
            offset: parse_int(self.offset.as_deref()),
        }
    }
}

/// Projection as a JSON array or a comma-separated string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Projection {
    List(Vec<String>),
    Csv(String),
}

impl Projection {
    fn into_columns(self) -> Vec<String> {
        match self {
            Projection::List(list) => list,
            Projection::Csv(csv) => csv.split(',').map(|s| s.trim().to_string()).collect(),
        }
    }
}

/// JSON body form of `POST /api/database/query`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryBody {
    pub database: Option<String>,
    pub table: Option<String>,
    #[serde(default)]
    pub columns: Option<Projection>,
    #[serde(default, rename = "where")]
    pub filters: Vec<WhereInput>,
    #[serde(default)]
    pub order_by: Vec<OrderInput>,
    #[serde(default)]
    pub limit: Option<Value>,
    #[serde(default)]
    pub offset: Option<Value>,
}

impl QueryBody {
    pub fn into_request(self) -> Result<QueryRequest, ServiceError> {
        let (Some(database), Some(table)) = (non_empty(self.database), non_empty(self.table)) else {
            return Err(ServiceError::MissingParameters("database and table"));
        };
        Ok(QueryRequest {
            database,
            table,
            columns: self.columns.map(Projection::into_columns).unwrap_or_default(),
            filters: self.filters,
            sort: self.order_by,
            limit: self.limit.as_ref().and_then(json_int),
            offset: self.offset.as_ref().and_then(json_int),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub database: String,
    pub table: String,
    pub columns: Vec<String>,
    #[serde(rename = "where")]
    pub filters: Vec<WhereInput>,
    #[serde(rename = "order_by")]
    pub sort: Vec<OrderInput>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub returned: i64,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(total: i64, limit: i64, offset: i64, returned: i64) -> Self {
        Self { total, limit, offset, returned, has_more: offset + returned < total }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMeta {
    pub database: String,
    pub schema: String,
    pub table: String,
    pub full_table_name: String,
    pub query: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub rows: Vec<JsonRow>,
    pub pagination: Pagination,
    pub meta: QueryMeta,
}

/// Resolve, validate, build and execute one dynamic query under a deadline.
#[derive(Clone)]
pub struct QueryService {
    catalog: CatalogRouter,
    executor: Arc<dyn QueryExecutor>,
    default_limit: i64,
    max_limit: i64,
    deadline: Duration,
}

impl QueryService {
    pub fn new(catalog: CatalogRouter, executor: Arc<dyn QueryExecutor>, api: &ApiConfig) -> Self {
        Self {
            catalog,
            executor,
            default_limit: api.default_limit,
            max_limit: api.max_limit,
            deadline: Duration::from_secs(api.request_timeout_secs.max(1)),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn run(&self, request: QueryRequest) -> Result<QueryResult, ServiceError> {
        match tokio::time::timeout(self.deadline, self.execute(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("query exceeded {:?} deadline", self.deadline);
                Err(ServiceError::Timeout(self.deadline.as_secs()))
            }
        }
    }

    async fn execute(&self, request: QueryRequest) -> Result<QueryResult, ServiceError> {
        let db = self.catalog.resolve_database(&request.database)?.clone();
        let table = self.catalog.resolve_table(&db, &request.table).await?;
        let columns = self.catalog.column_whitelist(&table).await?;

        let mut filter = Filter::new(&table.schema, &table.physical_name, columns)?;
        filter
            .select(&request.columns)?
            .where_clause(&request.filters)?
            .order(&request.sort)?
            .limit(
                clamp_limit(request.limit, self.default_limit, self.max_limit),
                clamp_offset(request.offset),
            );
        let compiled = filter.compile();

        let (rows, total) = self.executor.fetch_page(&compiled.rows, &compiled.count).await?;
        let pagination = Pagination::new(total, compiled.limit, compiled.offset, rows.len() as i64);

        tracing::debug!(
            database = db.key.as_str(),
            table = %table.physical_name,
            returned = pagination.returned,
            total = pagination.total,
            "query executed"
        );

        let echo = serde_json::json!({
            "columns": if request.columns.is_empty() { Value::from("*") } else { Value::from(request.columns.clone()) },
            "where": request.filters,
            "order_by": request.sort,
        });

        Ok(QueryResult {
            rows,
            pagination,
            meta: QueryMeta {
                database: db.key.as_str().to_string(),
                schema: table.schema,
                table: table.display_name,
                full_table_name: table.physical_name,
                query: echo,
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn json_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => parse_int(Some(s)),
        _ => None,
    }
}
