use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::mysql::MySqlPool;
use sqlx::FromRow;

use super::types::{ColumnDescriptor, TableDescriptor};
use super::CatalogSource;
use crate::database::manager::DatabaseError;

// information_schema columns are cast so the driver sees plain CHAR/UNSIGNED
// regardless of server version and collation.
const TABLES_SQL: &str = "SELECT \
        CAST(TABLE_NAME AS CHAR) AS table_name, \
        CAST(TABLE_TYPE AS CHAR) AS table_type, \
        CAST(TABLE_ROWS AS UNSIGNED) AS table_rows, \
        CREATE_TIME AS create_time, \
        UPDATE_TIME AS update_time, \
        CAST(COALESCE(TABLE_COMMENT, '') AS CHAR) AS table_comment \
    FROM information_schema.TABLES \
    WHERE TABLE_SCHEMA = ?";

const COLUMNS_SQL: &str = "SELECT \
        CAST(COLUMN_NAME AS CHAR) AS column_name, \
        CAST(DATA_TYPE AS CHAR) AS data_type, \
        CAST(COLUMN_TYPE AS CHAR) AS column_type, \
        CAST(IS_NULLABLE AS CHAR) AS is_nullable, \
        CAST(COLUMN_KEY AS CHAR) AS column_key, \
        CAST(COLUMN_DEFAULT AS CHAR) AS column_default, \
        CAST(EXTRA AS CHAR) AS extra, \
        CAST(COALESCE(COLUMN_COMMENT, '') AS CHAR) AS column_comment, \
        CAST(ORDINAL_POSITION AS UNSIGNED) AS ordinal_position \
    FROM information_schema.COLUMNS \
    WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
    ORDER BY ORDINAL_POSITION";

#[derive(Debug, FromRow)]
struct TableRow {
    table_name: String,
    table_type: String,
    table_rows: Option<u64>,
    create_time: Option<NaiveDateTime>,
    update_time: Option<NaiveDateTime>,
    table_comment: String,
}

impl From<TableRow> for TableDescriptor {
    fn from(row: TableRow) -> Self {
        Self {
            full_table_name: row.table_name.clone(),
            table_name: row.table_name,
            table_type: row.table_type,
            table_rows: row.table_rows,
            create_time: row.create_time.map(|t| t.and_utc().to_rfc3339()),
            update_time: row.update_time.map(|t| t.and_utc().to_rfc3339()),
            table_comment: row.table_comment,
            columns: None,
        }
    }
}

#[derive(Debug, FromRow)]
struct ColumnRow {
    column_name: String,
    data_type: String,
    column_type: String,
    is_nullable: String,
    column_key: Option<String>,
    column_default: Option<String>,
    extra: Option<String>,
    column_comment: String,
    ordinal_position: u64,
}

impl From<ColumnRow> for ColumnDescriptor {
    fn from(row: ColumnRow) -> Self {
        let non_empty = |s: Option<String>| s.filter(|v| !v.is_empty());
        Self {
            column_name: row.column_name,
            data_type: row.data_type,
            column_type: row.column_type,
            is_nullable: row.is_nullable.eq_ignore_ascii_case("YES"),
            column_key: non_empty(row.column_key),
            column_default: row.column_default,
            extra: non_empty(row.extra),
            column_comment: row.column_comment,
            ordinal_position: u32::try_from(row.ordinal_position).unwrap_or(u32::MAX),
        }
    }
}

/// Catalog introspection over `information_schema`. Nothing is cached, so
/// every call reflects the live schema.
pub struct MySqlCatalog {
    pool: MySqlPool,
}

impl MySqlCatalog {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogSource for MySqlCatalog {
    async fn table_exists(&self, schema: &str, table: &str) -> Result<bool, DatabaseError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.TABLES WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?",
        )
        .bind(schema)
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn list_tables(&self, schema: &str, name_like: Option<&str>) -> Result<Vec<TableDescriptor>, DatabaseError> {
        let rows: Vec<TableRow> = match name_like {
            Some(fragment) => {
                let sql = format!("{} AND TABLE_NAME LIKE ? ORDER BY TABLE_NAME", TABLES_SQL);
                sqlx::query_as(&sql)
                    .bind(schema)
                    .bind(format!("%{}%", fragment))
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("{} ORDER BY TABLE_NAME", TABLES_SQL);
                sqlx::query_as(&sql).bind(schema).fetch_all(&self.pool).await?
            }
        };
        Ok(rows.into_iter().map(TableDescriptor::from).collect())
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>, DatabaseError> {
        let rows: Vec<ColumnRow> = sqlx::query_as(COLUMNS_SQL)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ColumnDescriptor::from).collect())
    }
}
