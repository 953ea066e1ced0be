use serde::{Deserialize, Serialize};

/// Snapshot of one table from `information_schema.TABLES`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Logical name, with the database's table prefix removed.
    pub table_name: String,
    pub full_table_name: String,
    pub table_type: String,
    pub table_rows: Option<u64>,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
    pub table_comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnDescriptor>>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table_name: name.clone(),
            full_table_name: name,
            table_type: "BASE TABLE".to_string(),
            table_rows: None,
            create_time: None,
            update_time: None,
            table_comment: String::new(),
            columns: None,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.as_ref().map_or(0, Vec::len)
    }
}

/// Snapshot of one column from `information_schema.COLUMNS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub column_name: String,
    pub data_type: String,
    pub column_type: String,
    pub is_nullable: bool,
    pub column_key: Option<String>,
    pub column_default: Option<String>,
    pub extra: Option<String>,
    pub column_comment: String,
    pub ordinal_position: u32,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal_position: u32) -> Self {
        let data_type = data_type.into();
        Self {
            column_name: name.into(),
            column_type: data_type.clone(),
            data_type,
            is_nullable: true,
            column_key: None,
            column_default: None,
            extra: None,
            column_comment: String::new(),
            ordinal_position,
        }
    }
}

/// A table the router has confirmed exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTable {
    pub schema: String,
    pub physical_name: String,
    pub display_name: String,
}
