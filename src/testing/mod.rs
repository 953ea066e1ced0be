//! In-memory stand-ins for the catalog and the executor.
//!
//! The executor understands exactly the statement shapes the query builder
//! emits, so router-level tests exercise real compiled SQL end to end.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::catalog::{CatalogSource, ColumnDescriptor, TableDescriptor};
use crate::database::executor::{ExecOutcome, JsonRow, QueryExecutor};
use crate::database::manager::DatabaseError;
use crate::filter::SqlResult;

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    schemas: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    unavailable: HashSet<String>,
    listing_delay: Option<Duration>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, schema: &str, table: &str, columns: &[&str]) -> Self {
        self.schemas
            .entry(schema.to_string())
            .or_default()
            .insert(table.to_string(), columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Every call against `schema` fails with a connection error.
    pub fn with_unavailable_schema(mut self, schema: &str) -> Self {
        self.unavailable.insert(schema.to_string());
        self
    }

    /// `list_tables` sleeps this long before answering.
    pub fn with_listing_delay(mut self, delay: Duration) -> Self {
        self.listing_delay = Some(delay);
        self
    }

    fn schema(&self, schema: &str) -> Result<Option<&BTreeMap<String, Vec<String>>>, DatabaseError> {
        if self.unavailable.contains(schema) {
            return Err(DatabaseError::Connection(format!("schema {} unreachable", schema)));
        }
        Ok(self.schemas.get(schema))
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn table_exists(&self, schema: &str, table: &str) -> Result<bool, DatabaseError> {
        Ok(self.schema(schema)?.map_or(false, |tables| tables.contains_key(table)))
    }

    async fn list_tables(&self, schema: &str, name_like: Option<&str>) -> Result<Vec<TableDescriptor>, DatabaseError> {
        if let Some(delay) = self.listing_delay {
            tokio::time::sleep(delay).await;
        }
        let Some(tables) = self.schema(schema)? else {
            return Ok(vec![]);
        };
        let needle = name_like.map(str::to_ascii_lowercase);
        Ok(tables
            .keys()
            .filter(|name| needle.as_ref().map_or(true, |n| name.to_ascii_lowercase().contains(n.as_str())))
            .map(TableDescriptor::new)
            .collect())
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>, DatabaseError> {
        let columns = self.schema(schema)?.and_then(|tables| tables.get(table)).cloned().unwrap_or_default();
        Ok(columns
            .into_iter()
            .enumerate()
            .map(|(i, name)| ColumnDescriptor::new(name, "varchar", i as u32 + 1))
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryExecutor {
    tables: Mutex<HashMap<String, Vec<JsonRow>>>,
    statements: Mutex<Vec<SqlResult>>,
    failure: Mutex<Option<DatabaseError>>,
    delay: Mutex<Option<Duration>>,
    unhealthy: Mutex<bool>,
}

impl InMemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows for a physical table. Non-object values are skipped.
    pub fn with_rows(self, schema: &str, table: &str, rows: Vec<Value>) -> Self {
        let rows = rows.into_iter().filter_map(|r| r.as_object().cloned()).collect();
        lock(&self.tables).insert(format!("`{}`.`{}`", schema, table), rows);
        self
    }

    pub fn failing_with(self, error: DatabaseError) -> Self {
        *lock(&self.failure) = Some(error);
        self
    }

    /// Statements and pings sleep this long first.
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.delay) = Some(delay);
        self
    }

    pub fn unhealthy(self) -> Self {
        *lock(&self.unhealthy) = true;
        self
    }

    /// Every statement received, in order.
    pub fn statements(&self) -> Vec<SqlResult> {
        lock(&self.statements).clone()
    }

    async fn enter(&self, statement: &SqlResult) -> Result<(), DatabaseError> {
        lock(&self.statements).push(statement.clone());
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match lock(&self.failure).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Unseeded tables read as empty.
    fn rows_for(&self, target: &str) -> Vec<JsonRow> {
        lock(&self.tables).get(target).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl QueryExecutor for InMemoryExecutor {
    async fn fetch_page(&self, rows: &SqlResult, count: &SqlResult) -> Result<(Vec<JsonRow>, i64), DatabaseError> {
        self.enter(rows).await?;
        lock(&self.statements).push(count.clone());

        let select = ParsedSelect::parse(&rows.query)?;
        let mut params = rows.params.iter();
        let mut matched: Vec<JsonRow> = self
            .rows_for(&select.target)
            .into_iter()
            .filter(|row| select.predicates.iter().all(|p| p.matches(row, &rows.params)))
            .collect();
        // skip past the WHERE parameters to reach LIMIT/OFFSET
        for _ in 0..select.param_count {
            params.next();
        }
        let limit = params.next().and_then(Value::as_i64).unwrap_or(0).max(0) as usize;
        let offset = params.next().and_then(Value::as_i64).unwrap_or(0).max(0) as usize;

        for (column, descending) in select.order.iter().rev() {
            matched.sort_by(|a, b| {
                let ord = sort_cmp(a.get(column), b.get(column));
                if *descending { ord.reverse() } else { ord }
            });
        }

        let page = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| project(row, &select.columns))
            .collect();

        let counted = ParsedSelect::parse(&count.query)?;
        let total = self
            .rows_for(&counted.target)
            .iter()
            .filter(|row| counted.predicates.iter().all(|p| p.matches(row, &count.params)))
            .count() as i64;

        Ok((page, total))
    }

    async fn execute(&self, statement: &SqlResult) -> Result<ExecOutcome, DatabaseError> {
        self.enter(statement).await?;
        let inserted = statement.query.starts_with("INSERT");
        Ok(ExecOutcome { rows_affected: 1, last_insert_id: if inserted { 1 } else { 0 } })
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *lock(&self.unhealthy) {
            Err(DatabaseError::Connection("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct ParsedSelect {
    columns: Vec<String>,
    target: String,
    predicates: Vec<Predicate>,
    param_count: usize,
    order: Vec<(String, bool)>,
}

enum Predicate {
    Never,
    Null { column: String, negated: bool },
    Compare { column: String, op: String, param: usize },
    In { column: String, params: Vec<usize> },
}

impl ParsedSelect {
    fn parse(sql: &str) -> Result<Self, DatabaseError> {
        let malformed = || DatabaseError::QueryError(format!("unsupported statement: {}", sql));

        let rest = sql.strip_prefix("SELECT ").ok_or_else(malformed)?;
        let (projection, rest) = rest.split_once(" FROM ").ok_or_else(malformed)?;
        let rest = rest.trim_end_matches(" LIMIT ? OFFSET ?");

        let (head, order_sql) = match rest.split_once(" ORDER BY ") {
            Some((h, o)) => (h, Some(o)),
            None => (rest, None),
        };
        let (target, where_sql) = match head.split_once(" WHERE ") {
            Some((t, w)) => (t, Some(w)),
            None => (head, None),
        };

        let columns = if projection == "*" || projection.starts_with("COUNT(") {
            vec![]
        } else {
            projection.split(", ").map(unquote).collect()
        };

        let mut param = 0;
        let mut predicates = vec![];
        for part in where_sql.map(|w| w.split(" AND ").collect::<Vec<_>>()).unwrap_or_default() {
            if part == "1=0" {
                predicates.push(Predicate::Never);
                continue;
            }
            let (column, tail) = part.split_once("` ").ok_or_else(malformed)?;
            let column = column.trim_start_matches('`').to_string();
            let predicate = match tail {
                "IS NULL" => Predicate::Null { column, negated: false },
                "IS NOT NULL" => Predicate::Null { column, negated: true },
                t if t.starts_with("IN (") => {
                    let n = t.matches('?').count();
                    let params = (param..param + n).collect();
                    param += n;
                    Predicate::In { column, params }
                }
                t => {
                    let op = t.trim_end_matches(" ?").to_string();
                    param += 1;
                    Predicate::Compare { column, op, param: param - 1 }
                }
            };
            predicates.push(predicate);
        }

        let order = order_sql
            .map(|o| {
                o.split(", ")
                    .filter_map(|key| key.rsplit_once(' '))
                    .map(|(col, dir)| (unquote(col), dir == "DESC"))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { columns, target: target.to_string(), predicates, param_count: param, order })
    }
}

impl Predicate {
    fn matches(&self, row: &JsonRow, params: &[Value]) -> bool {
        let field = |c: &str| row.get(c).cloned().unwrap_or(Value::Null);
        match self {
            Predicate::Never => false,
            Predicate::Null { column, negated } => field(column).is_null() != *negated,
            Predicate::In { column, params: idx } => {
                let v = field(column);
                idx.iter().any(|i| compare(&v, &params[*i]) == Some(Ordering::Equal))
            }
            Predicate::Compare { column, op, param } => {
                let v = field(column);
                let p = &params[*param];
                if op == "LIKE" {
                    let needle = p.as_str().unwrap_or_default().trim_matches('%').to_lowercase();
                    return text(&v).map_or(false, |s| s.to_lowercase().contains(&needle));
                }
                match (op.as_str(), compare(&v, p)) {
                    (_, None) => false,
                    ("=", Some(o)) => o == Ordering::Equal,
                    ("!=", Some(o)) => o != Ordering::Equal,
                    (">", Some(o)) => o == Ordering::Greater,
                    ("<", Some(o)) => o == Ordering::Less,
                    (">=", Some(o)) => o != Ordering::Less,
                    ("<=", Some(o)) => o != Ordering::Greater,
                    _ => false,
                }
            }
        }
    }
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('`').to_string()
}

fn text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// SQL-ish comparison: NULL compares as unknown, numbers and numeric
/// strings compare numerically, everything else as text.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_null() || b.is_null() {
        return None;
    }
    let num = |v: &Value| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse::<f64>().ok()));
    match (num(a), num(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => Some(text(a)?.cmp(&text(b)?)),
    }
}

fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

fn project(row: JsonRow, columns: &[String]) -> JsonRow {
    if columns.is_empty() {
        return row;
    }
    columns.iter().map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null))).collect()
}
