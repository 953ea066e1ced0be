// HTTP API Error Types
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::{response::IntoResponse, Json};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::catalog::CatalogError;
use crate::database::manager::DatabaseError;
use crate::filter::{FilterError, FilterOp};
use crate::services::ServiceError;

/// Extra envelope fields that help a caller fix the request
/// (`valid_tables`, `valid_columns`, `hint`, ...).
pub type Hint = Map<String, Value>;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    Validation { message: String, hint: Hint },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound { message: String, hint: Hint },

    // 429 Too Many Requests
    TooManyRequests { retry_after: u64 },

    // 500 Internal Server Error; details stay in the server log
    Execution { kind: &'static str, correlation_id: Uuid },

    // 503 Service Unavailable
    ServiceUnavailable(String),

    // 504 Gateway Timeout
    Timeout(u64),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound { .. } => 404,
            ApiError::TooManyRequests { .. } => 429,
            ApiError::Execution { .. } => 500,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Timeout(_) => 504,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> String {
        match self {
            ApiError::Validation { message, .. } | ApiError::NotFound { message, .. } => message.clone(),
            ApiError::Unauthorized(error) => format!("Unauthorized - {}", error),
            ApiError::Forbidden(msg) | ApiError::ServiceUnavailable(msg) => msg.clone(),
            ApiError::TooManyRequests { .. } => "Too many requests, please try again later".to_string(),
            ApiError::Execution { kind, .. } => format!("Database {} error while processing the request", kind),
            ApiError::Timeout(secs) => format!("Request exceeded the {}s time limit", secs),
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(false));
        body.insert("error".into(), Value::String(self.message()));

        match self {
            ApiError::Validation { hint, .. } | ApiError::NotFound { hint, .. } => {
                body.extend(hint.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            ApiError::TooManyRequests { retry_after } => {
                body.insert("retryAfter".into(), json!(retry_after));
            }
            ApiError::Execution { correlation_id, .. } => {
                body.insert("correlation_id".into(), json!(correlation_id.to_string()));
            }
            _ => {}
        }
        Value::Object(body)
    }
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation { message: message.into(), hint: Hint::new() }
    }

    pub fn validation_with(message: impl Into<String>, key: &str, value: impl Into<Value>) -> Self {
        let mut hint = Hint::new();
        hint.insert(key.to_string(), value.into());
        ApiError::Validation { message: message.into(), hint }
    }

    pub fn unauthorized(error: impl Into<String>) -> Self {
        ApiError::Unauthorized(error.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found_with(message: impl Into<String>, key: &str, value: impl Into<Value>) -> Self {
        let mut hint = Hint::new();
        hint.insert(key.to_string(), value.into());
        ApiError::NotFound { message: message.into(), hint }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        let message = err.to_string();
        match err {
            FilterError::UnknownColumn { valid_columns, .. } => {
                ApiError::validation_with(message, "valid_columns", valid_columns)
            }
            FilterError::UnsupportedOperator(_) => {
                ApiError::validation_with(message, "valid_operators", FilterOp::names())
            }
            _ => ApiError::validation(message),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let message = err.to_string();
        match err {
            CatalogError::UnknownDatabase { valid_databases, .. } => {
                ApiError::validation_with(message, "valid_databases", valid_databases)
            }
            CatalogError::TableNotFound { valid_tables, .. } => {
                ApiError::not_found_with(message, "valid_tables", valid_tables)
            }
            CatalogError::Database(db) => db.into(),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        let correlation_id = Uuid::new_v4();
        let kind = err.kind();
        // Don't expose driver errors to clients
        tracing::error!(%correlation_id, kind, "database error: {}", err);
        ApiError::Execution { kind, correlation_id }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::MissingParameters(which) => ApiError::validation_with(
                format!("Missing required parameters: {}", which),
                "hint",
                "Provide both 'database' and 'table'",
            ),
            ServiceError::Filter(e) => e.into(),
            ServiceError::Catalog(e) => e.into(),
            ServiceError::Database(e) => e.into(),
            ServiceError::Timeout(secs) => {
                tracing::warn!("request exceeded {}s deadline", secs);
                ApiError::Timeout(secs)
            }
            ServiceError::MutationsDisabled => ApiError::forbidden("Write operations are disabled"),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.to_json())).into_response();
        if let ApiError::TooManyRequests { retry_after } = self {
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response
    }
}
