use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum FilterError {
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Unknown column: {column}")]
    UnknownColumn { column: String, valid_columns: Vec<String> },

    #[error("Invalid column list: {0}")]
    InvalidColumnList(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operator data: {0}")]
    InvalidOperatorData(String),

    #[error("Invalid WHERE clause: {0}")]
    InvalidWhereClause(String),

    #[error("Column supplied more than once: {0}")]
    DuplicateColumn(String),

    #[error("No writable columns supplied")]
    EmptyMutation,

    #[error("Missing record id")]
    MissingId,
}
