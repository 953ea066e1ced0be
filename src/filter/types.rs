use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::error::FilterError;

/// Hard ceiling on page size; configuration may only lower it.
pub const HARD_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    In,
    IsNull,
    IsNotNull,
}

impl FilterOp {
    pub const ALL: [FilterOp; 10] = [
        FilterOp::Eq,
        FilterOp::Ne,
        FilterOp::Gt,
        FilterOp::Lt,
        FilterOp::Gte,
        FilterOp::Lte,
        FilterOp::Like,
        FilterOp::In,
        FilterOp::IsNull,
        FilterOp::IsNotNull,
    ];

    pub fn to_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Gt => ">",
            FilterOp::Lt => "<",
            FilterOp::Gte => ">=",
            FilterOp::Lte => "<=",
            FilterOp::Like => "LIKE",
            FilterOp::In => "IN",
            FilterOp::IsNull => "IS NULL",
            FilterOp::IsNotNull => "IS NOT NULL",
        }
    }

    /// Whether the predicate binds a value at all.
    pub fn takes_value(&self) -> bool {
        !matches!(self, FilterOp::IsNull | FilterOp::IsNotNull)
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(FilterOp::to_sql).collect()
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_sql())
    }
}

impl FromStr for FilterOp {
    type Err = FilterError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.to_sql() == normalized)
            .ok_or_else(|| FilterError::UnsupportedOperator(raw.to_string()))
    }
}

impl Serialize for FilterOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.to_sql())
    }
}

impl<'de> Deserialize<'de> for FilterOp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One predicate as the caller sent it. The operator stays a string until
/// the builder validates it, so an unknown operator is a filter error rather
/// than a body parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereInput {
    pub column: String,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub value: Value,
}

impl WhereInput {
    pub fn new(column: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Self { column: column.into(), operator: Some(operator.into()), value }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInput {
    pub column: String,
    #[serde(default)]
    pub direction: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterWhereInfo {
    pub column: String,
    pub operator: FilterOp,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// `DESC` only when asked for exactly (any case); everything else sorts ascending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.trim().eq_ignore_ascii_case("desc") => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

/// Row statement and count statement built from a single WHERE compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub rows: SqlResult,
    pub count: SqlResult,
    pub limit: i64,
    pub offset: i64,
}

/// Column names a table actually has, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnWhitelist {
    names: Vec<String>,
}

impl ColumnWhitelist {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::into).collect() }
    }

    /// Map a caller-supplied name to the catalog's spelling. MySQL column
    /// names are case-insensitive, so an exact match wins and a case-folded
    /// match is accepted.
    pub fn resolve(&self, column: &str) -> Result<&str, FilterError> {
        let column = column.trim();
        self.names
            .iter()
            .find(|n| n.as_str() == column)
            .or_else(|| self.names.iter().find(|n| n.eq_ignore_ascii_case(column)))
            .map(String::as_str)
            .ok_or_else(|| FilterError::UnknownColumn {
                column: column.to_string(),
                valid_columns: self.names.clone(),
            })
    }

    pub fn contains(&self, column: &str) -> bool {
        self.resolve(column).is_ok()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_listed_operator() {
        for op in FilterOp::ALL {
            assert_eq!(op.to_sql().parse::<FilterOp>().unwrap(), op);
        }
        assert_eq!("like".parse::<FilterOp>().unwrap(), FilterOp::Like);
        assert_eq!("is  not null".parse::<FilterOp>().unwrap(), FilterOp::IsNotNull);
    }

    #[test]
    fn rejects_operators_outside_the_enumeration() {
        for raw in ["<>", "BETWEEN", "; DROP TABLE x", "", "ILIKE", "NOT IN"] {
            assert!(matches!(raw.parse::<FilterOp>(), Err(FilterError::UnsupportedOperator(_))), "{raw}");
        }
    }

    #[test]
    fn sort_direction_defaults_to_ascending() {
        assert_eq!(SortDirection::parse(Some("desc")), SortDirection::Desc);
        assert_eq!(SortDirection::parse(Some("DESC")), SortDirection::Desc);
        assert_eq!(SortDirection::parse(Some("descending")), SortDirection::Asc);
        assert_eq!(SortDirection::parse(None), SortDirection::Asc);
    }

    #[test]
    fn whitelist_returns_catalog_spelling() {
        let columns = ColumnWhitelist::new(["id", "name_en", "continent_id"]);
        assert_eq!(columns.resolve("NAME_EN").unwrap(), "name_en");
        match columns.resolve("password") {
            Err(FilterError::UnknownColumn { column, valid_columns }) => {
                assert_eq!(column, "password");
                assert_eq!(valid_columns.len(), 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
