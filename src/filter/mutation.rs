use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{ColumnWhitelist, SqlResult};
use crate::database::manager::DatabaseManager;

/// INSERT / UPDATE / DELETE statements for one table, keyed by `id`.
/// Body keys go through the same column whitelist as queries.
pub struct Mutation {
    target: String,
    columns: ColumnWhitelist,
}

impl Mutation {
    pub fn new(schema: &str, table_name: &str, columns: ColumnWhitelist) -> Result<Self, FilterError> {
        if !DatabaseManager::is_valid_schema_name(schema) {
            return Err(FilterError::InvalidTableName(format!("invalid schema name: {}", schema)));
        }
        if table_name.trim().is_empty() {
            return Err(FilterError::InvalidTableName("Table name cannot be empty".to_string()));
        }
        Ok(Self {
            target: format!(
                "{}.{}",
                DatabaseManager::quote_identifier(schema),
                DatabaseManager::quote_identifier(table_name)
            ),
            columns,
        })
    }

    pub fn insert(&self, body: &Map<String, Value>) -> Result<SqlResult, FilterError> {
        let (names, params) = self.assignments(body, false)?;
        let placeholders = vec!["?"; names.len()].join(", ");
        Ok(SqlResult {
            query: format!("INSERT INTO {} ({}) VALUES ({})", self.target, names.join(", "), placeholders),
            params,
        })
    }

    /// `id` in the body selects the row and is never itself updated.
    pub fn update(&self, body: &Map<String, Value>) -> Result<SqlResult, FilterError> {
        let id = record_id(body.get("id"))?;
        let id_column = self.id_column()?;
        let (names, mut params) = self.assignments(body, true)?;

        let sets: Vec<String> = names.iter().map(|n| format!("{} = ?", n)).collect();
        params.push(id);
        Ok(SqlResult {
            query: format!("UPDATE {} SET {} WHERE {} = ?", self.target, sets.join(", "), id_column),
            params,
        })
    }

    pub fn delete(&self, id: Option<&Value>) -> Result<SqlResult, FilterError> {
        let id = record_id(id)?;
        Ok(SqlResult {
            query: format!("DELETE FROM {} WHERE {} = ?", self.target, self.id_column()?),
            params: vec![id],
        })
    }

    fn id_column(&self) -> Result<String, FilterError> {
        Ok(DatabaseManager::quote_identifier(self.columns.resolve("id")?))
    }

    fn assignments(&self, body: &Map<String, Value>, skip_id: bool) -> Result<(Vec<String>, Vec<Value>), FilterError> {
        let mut names = Vec::with_capacity(body.len());
        let mut params = Vec::with_capacity(body.len());
        for (key, value) in body {
            if skip_id && key.eq_ignore_ascii_case("id") {
                continue;
            }
            let column = DatabaseManager::quote_identifier(self.columns.resolve(key)?);
            if names.contains(&column) {
                return Err(FilterError::DuplicateColumn(key.clone()));
            }
            names.push(column);
            params.push(value.clone());
        }
        if names.is_empty() {
            return Err(FilterError::EmptyMutation);
        }
        Ok((names, params))
    }
}

fn record_id(raw: Option<&Value>) -> Result<Value, FilterError> {
    match raw {
        Some(Value::Number(n)) => Ok(Value::Number(n.clone())),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(Value::String(s.trim().to_string())),
        _ => Err(FilterError::MissingId),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn customers() -> Mutation {
        Mutation::new("tourwow", "v_Xqc7k7_customers", ColumnWhitelist::new(["id", "name", "email"])).unwrap()
    }

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn keys_differing_only_in_case_are_rejected() {
        let err = customers().insert(&body(json!({"name": "a", "NAME": "b"}))).unwrap_err();
        assert!(matches!(err, FilterError::DuplicateColumn(_)));
        let err = customers().update(&body(json!({"id": 1, "email": "a", "Email": "b"}))).unwrap_err();
        assert!(matches!(err, FilterError::DuplicateColumn(_)));
    }

    #[test]
    fn insert_uses_whitelisted_columns() {
        let sql = customers().insert(&body(json!({"name": "Somchai", "email": "s@example.com"}))).unwrap();
        assert_eq!(
            sql.query,
            "INSERT INTO `tourwow`.`v_Xqc7k7_customers` (`name`, `email`) VALUES (?, ?)"
        );
        assert_eq!(sql.params, vec![json!("Somchai"), json!("s@example.com")]);
    }

    #[test]
    fn insert_rejects_unknown_keys() {
        let err = customers().insert(&body(json!({"name": "x", "is_admin": true}))).unwrap_err();
        assert!(matches!(err, FilterError::UnknownColumn { .. }));
        assert_eq!(customers().insert(&Map::new()).unwrap_err(), FilterError::EmptyMutation);
    }

    #[test]
    fn update_binds_id_last() {
        let sql = customers().update(&body(json!({"id": 42, "email": "new@example.com"}))).unwrap();
        assert_eq!(sql.query, "UPDATE `tourwow`.`v_Xqc7k7_customers` SET `email` = ? WHERE `id` = ?");
        assert_eq!(sql.params, vec![json!("new@example.com"), json!(42)]);
    }

    #[test]
    fn update_and_delete_need_an_id() {
        assert_eq!(customers().update(&body(json!({"email": "x"}))).unwrap_err(), FilterError::MissingId);
        assert_eq!(customers().delete(None).unwrap_err(), FilterError::MissingId);
        let sql = customers().delete(Some(&json!("17"))).unwrap();
        assert_eq!(sql.query, "DELETE FROM `tourwow`.`v_Xqc7k7_customers` WHERE `id` = ?");
        assert_eq!(sql.params, vec![json!("17")]);
    }
}
