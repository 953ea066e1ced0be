//! Statement execution against the MySQL pool.
//!
//! Rows come back as ordered JSON maps; the column's declared type picks the decoder.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Timelike;
use serde_json::{Map, Number, Value};
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlRow};
use sqlx::types::BigDecimal;
use sqlx::{Column, MySql, Row, TypeInfo};

use crate::database::manager::DatabaseError;
use crate::filter::types::SqlResult;

pub type JsonRow = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub last_insert_id: u64,
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run the page query and its count query back to back on one connection.
    async fn fetch_page(&self, rows: &SqlResult, count: &SqlResult) -> Result<(Vec<JsonRow>, i64), DatabaseError>;

    async fn execute(&self, statement: &SqlResult) -> Result<ExecOutcome, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}

pub struct MySqlExecutor {
    pool: MySqlPool,
    log_queries: bool,
    slow_query_threshold_ms: u64,
}

impl MySqlExecutor {
    pub fn new(pool: MySqlPool, log_queries: bool, slow_query_threshold_ms: u64) -> Self {
        Self { pool, log_queries, slow_query_threshold_ms }
    }

    fn observe(&self, statement: &SqlResult, started: Instant) {
        let elapsed = started.elapsed().as_millis() as u64;
        if self.log_queries {
            tracing::debug!(elapsed_ms = elapsed, params = statement.params.len(), "{}", statement.query);
        }
        if elapsed > self.slow_query_threshold_ms {
            tracing::warn!(elapsed_ms = elapsed, "slow statement: {}", statement.query);
        }
    }
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
    async fn fetch_page(&self, rows: &SqlResult, count: &SqlResult) -> Result<(Vec<JsonRow>, i64), DatabaseError> {
        let mut conn = self.pool.acquire().await?;

        let started = Instant::now();
        let mut q = sqlx::query(&rows.query);
        for p in rows.params.iter() {
            q = bind_param(q, p);
        }
        let fetched = q.fetch_all(&mut *conn).await?;
        self.observe(rows, started);

        let started = Instant::now();
        let mut q = sqlx::query(&count.query);
        for p in count.params.iter() {
            q = bind_param(q, p);
        }
        let count_row = q.fetch_one(&mut *conn).await?;
        self.observe(count, started);

        let total: i64 = count_row.try_get(0)?;
        Ok((fetched.iter().map(row_to_json).collect(), total))
    }

    async fn execute(&self, statement: &SqlResult) -> Result<ExecOutcome, DatabaseError> {
        let started = Instant::now();
        let mut q = sqlx::query(&statement.query);
        for p in statement.params.iter() {
            q = bind_param(q, p);
        }
        let result = q.execute(&self.pool).await?;
        self.observe(statement, started);

        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_id(),
        })
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        crate::database::manager::DatabaseManager::health_check(&self.pool).await
    }
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, MySql, MySqlArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                q.bind(u)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // IN lists are expanded before binding; anything nested is stored as JSON text
        Value::Array(_) | Value::Object(_) => q.bind(v.to_string()),
    }
}

/// Convert one row into a JSON object keyed by column label.
pub fn row_to_json(row: &MySqlRow) -> JsonRow {
    let mut map = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name().to_ascii_uppercase();
        map.insert(column.name().to_string(), decode_column(row, i, &type_name));
    }
    map
}

/// Decoder family for a MySQL column type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Unsigned,
    Signed,
    Float,
    Decimal,
    DateTime,
    Timestamp,
    Date,
    Time,
    Json,
    Text,
}

impl ColumnKind {
    fn of(type_name: &str) -> Self {
        match type_name {
            "BOOLEAN" => ColumnKind::Bool,
            "DECIMAL" | "DECIMAL UNSIGNED" => ColumnKind::Decimal,
            t if t.ends_with("UNSIGNED") => ColumnKind::Unsigned,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => ColumnKind::Signed,
            "FLOAT" | "DOUBLE" => ColumnKind::Float,
            "DATETIME" => ColumnKind::DateTime,
            "TIMESTAMP" => ColumnKind::Timestamp,
            "DATE" => ColumnKind::Date,
            "TIME" => ColumnKind::Time,
            "JSON" => ColumnKind::Json,
            _ => ColumnKind::Text,
        }
    }
}

fn decode_column(row: &MySqlRow, i: usize, type_name: &str) -> Value {
    let decoded = match ColumnKind::of(type_name) {
        ColumnKind::Bool => row.try_get::<Option<bool>, _>(i).map(|v| v.map(Value::Bool)),
        ColumnKind::Unsigned => row.try_get::<Option<u64>, _>(i).map(|v| v.map(Value::from)),
        ColumnKind::Signed => row.try_get::<Option<i64>, _>(i).map(|v| v.map(Value::from)),
        ColumnKind::Float => row
            .try_get::<Option<f64>, _>(i)
            .map(|v| v.map(|f| Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null))),
        // String keeps DECIMAL precision intact
        ColumnKind::Decimal => row
            .try_get::<Option<BigDecimal>, _>(i)
            .map(|v| v.map(|d| Value::String(d.to_string()))),
        ColumnKind::DateTime => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(i)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S").to_string()))),
        ColumnKind::Timestamp => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i)
            .map(|v| v.map(|d| Value::String(d.to_rfc3339()))),
        ColumnKind::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(i)
            .map(|v| v.map(|d| Value::String(d.to_string()))),
        ColumnKind::Time => row
            .try_get::<Option<chrono::NaiveTime>, _>(i)
            .map(|v| v.map(|t| Value::String(format_time(t)))),
        ColumnKind::Json => row.try_get::<Option<Value>, _>(i),
        ColumnKind::Text => row.try_get::<Option<String>, _>(i).map(|v| v.map(Value::String)),
    };

    match decoded {
        Ok(Some(value)) => value,
        Ok(None) => Value::Null,
        Err(_) => fallback_decode(row, i),
    }
}

/// `HH:MM:SS`, with fractional seconds only when present.
fn format_time(t: chrono::NaiveTime) -> String {
    if t.nanosecond() == 0 {
        t.format("%H:%M:%S").to_string()
    } else {
        t.format("%H:%M:%S%.6f").to_string()
    }
}

fn fallback_decode(row: &MySqlRow, i: usize) -> Value {
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(i) {
        Value::String(s)
    } else if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(i) {
        Value::from(n)
    } else if let Ok(Some(f)) = row.try_get::<Option<f64>, _>(i) {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    } else if let Ok(Some(bytes)) = row.try_get::<Option<Vec<u8>>, _>(i) {
        Value::String(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn type_names_pick_a_decoder() {
        assert_eq!(ColumnKind::of("TIME"), ColumnKind::Time);
        assert_eq!(ColumnKind::of("DECIMAL UNSIGNED"), ColumnKind::Decimal);
        assert_eq!(ColumnKind::of("INT UNSIGNED"), ColumnKind::Unsigned);
        assert_eq!(ColumnKind::of("BIGINT"), ColumnKind::Signed);
        assert_eq!(ColumnKind::of("DATETIME"), ColumnKind::DateTime);
        assert_eq!(ColumnKind::of("VARCHAR"), ColumnKind::Text);
    }

    #[test]
    fn time_values_render_as_clock_strings() {
        let t = NaiveTime::from_hms_opt(9, 5, 0).unwrap();
        assert_eq!(format_time(t), "09:05:00");
        let t = NaiveTime::from_hms_micro_opt(23, 59, 1, 250_000).unwrap();
        assert_eq!(format_time(t), "23:59:01.250000");
    }
}
