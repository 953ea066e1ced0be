use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{
    ColumnWhitelist, CompiledQuery, FilterOrderInfo, FilterWhereInfo, OrderInput, SqlResult, WhereInput, HARD_LIMIT,
};
use crate::database::manager::DatabaseManager;

/// Builds a paged SELECT and its COUNT twin for one physical table.
///
/// Every identifier that reaches SQL text is either the resolved table or a
/// name taken from the table's column whitelist.
pub struct Filter {
    schema: String,
    table_name: String,
    columns: ColumnWhitelist,
    select_columns: Vec<String>,
    where_data: Vec<FilterWhereInfo>,
    order_data: Vec<FilterOrderInfo>,
    limit: i64,
    offset: i64,
}

impl Filter {
    pub fn new(
        schema: impl Into<String>,
        table_name: impl Into<String>,
        columns: ColumnWhitelist,
    ) -> Result<Self, FilterError> {
        let schema = schema.into();
        let table_name = table_name.into();
        if !DatabaseManager::is_valid_schema_name(&schema) {
            return Err(FilterError::InvalidTableName(format!("invalid schema name: {}", schema)));
        }
        if table_name.trim().is_empty() {
            return Err(FilterError::InvalidTableName("Table name cannot be empty".to_string()));
        }
        Ok(Self {
            schema,
            table_name,
            columns,
            select_columns: vec![],
            where_data: vec![],
            order_data: vec![],
            limit: 100,
            offset: 0,
        })
    }

    /// Projection list. Empty or `*` selects every column.
    pub fn select(&mut self, columns: &[String]) -> Result<&mut Self, FilterError> {
        let requested: Vec<&str> = columns.iter().map(|c| c.trim()).filter(|c| !c.is_empty()).collect();
        if requested.is_empty() || requested == ["*"] {
            self.select_columns.clear();
            return Ok(self);
        }
        if requested.contains(&"*") {
            return Err(FilterError::InvalidColumnList("'*' cannot be combined with named columns".to_string()));
        }

        self.select_columns = requested
            .into_iter()
            .map(|c| self.columns.resolve(c).map(str::to_string))
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    /// Comma-separated projection as sent in a query string.
    pub fn select_str(&mut self, columns: &str) -> Result<&mut Self, FilterError> {
        let list: Vec<String> = columns.split(',').map(str::to_string).collect();
        self.select(&list)
    }

    pub fn where_clause(&mut self, conditions: &[WhereInput]) -> Result<&mut Self, FilterError> {
        self.where_data = FilterWhere::parse(conditions, &self.columns)?;
        Ok(self)
    }

    pub fn order(&mut self, order_spec: &[OrderInput]) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::parse(order_spec, &self.columns)?;
        Ok(self)
    }

    /// Set pagination. Values must already be clamped; see [`clamp_limit`].
    pub fn limit(&mut self, limit: i64, offset: i64) -> &mut Self {
        self.limit = limit.clamp(0, HARD_LIMIT);
        self.offset = offset.max(0);
        self
    }

    /// Compile the WHERE clause once and emit both statements from it.
    pub fn compile(&self) -> CompiledQuery {
        let (where_sql, where_params) = FilterWhere::generate(&self.where_data);
        let from = self.from_clause();
        let where_clause = if where_sql.is_empty() { String::new() } else { format!("WHERE {}", where_sql) };

        let rows_query = [
            format!("SELECT {}", self.build_select_clause()),
            from.clone(),
            where_clause.clone(),
            FilterOrder::generate(&self.order_data),
            "LIMIT ? OFFSET ?".to_string(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        let mut row_params = where_params.clone();
        row_params.push(Value::from(self.limit));
        row_params.push(Value::from(self.offset));

        let count_query = [format!("SELECT COUNT(*) AS total {}", from), where_clause]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        CompiledQuery {
            rows: SqlResult { query: rows_query, params: row_params },
            count: SqlResult { query: count_query, params: where_params },
            limit: self.limit,
            offset: self.offset,
        }
    }

    pub fn to_sql(&self) -> SqlResult {
        self.compile().rows
    }

    pub fn to_count_sql(&self) -> SqlResult {
        self.compile().count
    }

    fn from_clause(&self) -> String {
        format!(
            "FROM {}.{}",
            DatabaseManager::quote_identifier(&self.schema),
            DatabaseManager::quote_identifier(&self.table_name)
        )
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() {
            "*".to_string()
        } else {
            self.select_columns
                .iter()
                .map(|c| DatabaseManager::quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// Effective page size: the caller's value (or the default), clamped to
/// `[0, min(max, 1000)]`.
pub fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    let ceiling = max.clamp(0, HARD_LIMIT);
    requested.unwrap_or(default).clamp(0, ceiling)
}

pub fn clamp_offset(requested: Option<i64>) -> i64 {
    requested.unwrap_or(0).max(0)
}

/// Query-string integers: anything non-numeric counts as absent.
pub fn parse_int(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
}
