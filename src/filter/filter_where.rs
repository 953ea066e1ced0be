use serde_json::Value;

use super::error::FilterError;
use super::types::{ColumnWhitelist, FilterOp, FilterWhereInfo, WhereInput};
use crate::database::manager::DatabaseManager;

/// Compiles validated predicates into a MySQL WHERE body with `?` placeholders.
pub struct FilterWhere {
    param_values: Vec<Value>,
}

impl FilterWhere {
    fn new() -> Self {
        Self { param_values: vec![] }
    }

    /// Validate caller predicates: known operator, known column, value shape.
    /// Column names come back in the catalog's spelling.
    pub fn parse(inputs: &[WhereInput], columns: &ColumnWhitelist) -> Result<Vec<FilterWhereInfo>, FilterError> {
        inputs
            .iter()
            .map(|input| {
                let operator: FilterOp = input.operator.as_deref().unwrap_or("=").parse()?;
                let column = columns.resolve(&input.column)?.to_string();

                if operator.takes_value() && input.value.is_null() {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "operator {} on '{}' requires a value",
                        operator, column
                    )));
                }
                if operator != FilterOp::In && matches!(input.value, Value::Array(_) | Value::Object(_)) {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "operator {} on '{}' takes a scalar value",
                        operator, column
                    )));
                }

                Ok(FilterWhereInfo { column, operator, data: input.value.clone() })
            })
            .collect()
    }

    /// Returns the predicate body (no `WHERE` keyword) and its parameters.
    /// An empty condition list yields an empty body.
    pub fn generate(conditions: &[FilterWhereInfo]) -> (String, Vec<Value>) {
        let mut filter_where = Self::new();
        let parts: Vec<String> = conditions.iter().map(|c| filter_where.build_sql_condition(c)).collect();
        (parts.join(" AND "), filter_where.param_values)
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> String {
        let quoted_column = DatabaseManager::quote_identifier(&condition.column);
        match condition.operator {
            FilterOp::IsNull | FilterOp::IsNotNull => {
                format!("{} {}", quoted_column, condition.operator.to_sql())
            }
            FilterOp::Like => {
                let pattern = match &condition.data {
                    Value::String(s) => format!("%{}%", s),
                    other => format!("%{}%", other),
                };
                format!("{} LIKE {}", quoted_column, self.param(Value::String(pattern)))
            }
            FilterOp::In => match &condition.data {
                Value::Array(values) if values.is_empty() => "1=0".to_string(),
                Value::Array(values) => {
                    let params: Vec<&str> = values.iter().map(|v| self.param(v.clone())).collect();
                    format!("{} IN ({})", quoted_column, params.join(", "))
                }
                scalar => format!("{} IN ({})", quoted_column, self.param(scalar.clone())),
            },
            op => format!("{} {} {}", quoted_column, op.to_sql(), self.param(condition.data.clone())),
        }
    }

    fn param(&mut self, value: Value) -> &'static str {
        self.param_values.push(value);
        "?"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns() -> ColumnWhitelist {
        ColumnWhitelist::new(["id", "name_en", "continent_id", "deleted_at"])
    }

    fn compile(inputs: Vec<WhereInput>) -> Result<(String, Vec<Value>), FilterError> {
        let parsed = FilterWhere::parse(&inputs, &columns())?;
        Ok(FilterWhere::generate(&parsed))
    }

    #[test]
    fn equality_binds_literal_value() {
        let (sql, params) = compile(vec![WhereInput::new("continent_id", "=", json!(2))]).unwrap();
        assert_eq!(sql, "`continent_id` = ?");
        assert_eq!(params, vec![json!(2)]);
    }

    #[test]
    fn missing_operator_means_equality() {
        let input = WhereInput { column: "id".into(), operator: None, value: json!(7) };
        let (sql, _) = compile(vec![input]).unwrap();
        assert_eq!(sql, "`id` = ?");
    }

    #[test]
    fn like_wraps_value_in_wildcards() {
        let (sql, params) = compile(vec![WhereInput::new("name_en", "LIKE", json!("thai"))]).unwrap();
        assert_eq!(sql, "`name_en` LIKE ?");
        assert_eq!(params, vec![json!("%thai%")]);
    }

    #[test]
    fn in_expands_one_placeholder_per_element() {
        let (sql, params) = compile(vec![WhereInput::new("id", "IN", json!([1, 2, 3]))]).unwrap();
        assert_eq!(sql, "`id` IN (?, ?, ?)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn empty_in_is_constant_false() {
        let (sql, params) = compile(vec![WhereInput::new("id", "IN", json!([]))]).unwrap();
        assert_eq!(sql, "1=0");
        assert!(params.is_empty());
    }

    #[test]
    fn scalar_in_binds_single_placeholder() {
        let (sql, params) = compile(vec![WhereInput::new("id", "in", json!(5))]).unwrap();
        assert_eq!(sql, "`id` IN (?)");
        assert_eq!(params, vec![json!(5)]);
    }

    #[test]
    fn null_checks_take_no_parameters() {
        let (sql, params) = compile(vec![
            WhereInput::new("deleted_at", "IS NULL", Value::Null),
            WhereInput::new("name_en", "is not null", json!("ignored")),
        ])
        .unwrap();
        assert_eq!(sql, "`deleted_at` IS NULL AND `name_en` IS NOT NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn rejects_unknown_operator_and_column() {
        let bad_op = compile(vec![WhereInput::new("id", "OR 1=1 --", json!(1))]);
        assert!(matches!(bad_op, Err(FilterError::UnsupportedOperator(_))));

        let bad_col = compile(vec![WhereInput::new("id`; DROP TABLE x; --", "=", json!(1))]);
        assert!(matches!(bad_col, Err(FilterError::UnknownColumn { .. })));
    }

    #[test]
    fn value_operators_require_a_value() {
        let result = compile(vec![WhereInput::new("id", ">", Value::Null)]);
        assert!(matches!(result, Err(FilterError::InvalidOperatorData(_))));
    }
}
