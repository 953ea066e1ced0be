//! Logical database routing and schema introspection.
//!
//! Callers name one of three logical databases and a logical table. The router
//! maps those onto a physical schema and a physical table name, and is the only
//! place that knows about table-name prefixes.

pub mod mysql;
pub mod types;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::CatalogConfig;
use crate::database::manager::DatabaseError;
use crate::filter::ColumnWhitelist;

pub use mysql::MySqlCatalog;
pub use types::{ColumnDescriptor, ResolvedTable, TableDescriptor};

/// Read-only view of the server catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn table_exists(&self, schema: &str, table: &str) -> Result<bool, DatabaseError>;

    /// Tables in `schema`, ordered by name. `name_like` is a substring filter.
    async fn list_tables(&self, schema: &str, name_like: Option<&str>) -> Result<Vec<TableDescriptor>, DatabaseError>;

    /// Columns of one table in ordinal order. Empty when the table is missing.
    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>, DatabaseError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DatabaseKey {
    Tourwow,
    Locations,
    Suppliers,
}

impl DatabaseKey {
    pub const ALL: [DatabaseKey; 3] = [DatabaseKey::Tourwow, DatabaseKey::Locations, DatabaseKey::Suppliers];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKey::Tourwow => "TOURWOW",
            DatabaseKey::Locations => "LOCATIONS",
            DatabaseKey::Suppliers => "SUPPLIERS",
        }
    }

    /// Lowercase form used in `/api/tables/{database}` paths.
    pub fn slug(&self) -> &'static str {
        match self {
            DatabaseKey::Tourwow => "tourwow",
            DatabaseKey::Locations => "locations",
            DatabaseKey::Suppliers => "suppliers",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DatabaseKey::Tourwow => "Orders, Customers, Bookings, Order Items, Installments",
            DatabaseKey::Locations => "Countries, Provinces, Regions, Continents, Airports",
            DatabaseKey::Suppliers => "Suppliers/Wholesales",
        }
    }
}

impl fmt::Display for DatabaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKey {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        Self::ALL.iter().copied().find(|k| k.as_str().eq_ignore_ascii_case(raw)).ok_or(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogicalDatabase {
    pub key: DatabaseKey,
    pub physical_schema_name: String,
    pub table_name_prefix: String,
}

impl LogicalDatabase {
    /// Physical names to try for a logical table, most likely first.
    fn candidate_names(&self, logical: &str) -> Vec<String> {
        if self.table_name_prefix.is_empty() || logical.starts_with(&self.table_name_prefix) {
            vec![logical.to_string()]
        } else {
            vec![format!("{}{}", self.table_name_prefix, logical), logical.to_string()]
        }
    }

    pub fn physical_table_name(&self, logical: &str) -> String {
        self.candidate_names(logical).swap_remove(0)
    }

    pub fn display_table_name<'a>(&self, physical: &'a str) -> &'a str {
        if self.table_name_prefix.is_empty() {
            return physical;
        }
        physical.strip_prefix(self.table_name_prefix.as_str()).unwrap_or(physical)
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Invalid database: {database}")]
    UnknownDatabase { database: String, valid_databases: Vec<String> },

    #[error("Table not found: {table}")]
    TableNotFound { table: String, valid_tables: Vec<String> },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Maps logical names to physical ones and fronts the catalog source.
#[derive(Clone)]
pub struct CatalogRouter {
    databases: Vec<LogicalDatabase>,
    source: Arc<dyn CatalogSource>,
}

impl CatalogRouter {
    pub fn new(config: &CatalogConfig, source: Arc<dyn CatalogSource>) -> Self {
        let entry = |key, schema: &crate::config::SchemaConfig| LogicalDatabase {
            key,
            physical_schema_name: schema.schema.clone(),
            table_name_prefix: schema.table_prefix.clone(),
        };
        Self {
            databases: vec![
                entry(DatabaseKey::Tourwow, &config.tourwow),
                entry(DatabaseKey::Locations, &config.locations),
                entry(DatabaseKey::Suppliers, &config.suppliers),
            ],
            source,
        }
    }

    pub fn databases(&self) -> &[LogicalDatabase] {
        &self.databases
    }

    pub fn valid_database_keys() -> Vec<String> {
        DatabaseKey::ALL.iter().map(|k| k.as_str().to_string()).collect()
    }

    /// Case-insensitive key lookup; the physical schema name is accepted too.
    /// Never falls back to a default database.
    pub fn resolve_database(&self, key: &str) -> Result<&LogicalDatabase, CatalogError> {
        let by_key = key.parse::<DatabaseKey>().ok();
        self.databases
            .iter()
            .find(|db| Some(db.key) == by_key || db.physical_schema_name == key.trim())
            .ok_or_else(|| CatalogError::UnknownDatabase {
                database: key.to_string(),
                valid_databases: Self::valid_database_keys(),
            })
    }

    pub async fn table_exists(&self, db: &LogicalDatabase, logical: &str) -> Result<bool, CatalogError> {
        for candidate in db.candidate_names(logical) {
            if self.source.table_exists(&db.physical_schema_name, &candidate).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Confirm the table exists right now. On a miss the error carries the
    /// schema's real tables by logical name.
    pub async fn resolve_table(&self, db: &LogicalDatabase, logical: &str) -> Result<ResolvedTable, CatalogError> {
        let logical = logical.trim();
        if !logical.is_empty() {
            for candidate in db.candidate_names(logical) {
                if self.source.table_exists(&db.physical_schema_name, &candidate).await? {
                    return Ok(ResolvedTable {
                        schema: db.physical_schema_name.clone(),
                        display_name: db.display_table_name(&candidate).to_string(),
                        physical_name: candidate,
                    });
                }
            }
        }

        let valid_tables = self
            .list_tables(db, None)
            .await?
            .into_iter()
            .map(|t| t.table_name)
            .filter(|name| name != logical)
            .collect();
        Err(CatalogError::TableNotFound { table: logical.to_string(), valid_tables })
    }

    /// Tables with `table_name` set to the logical (prefix-stripped) name.
    pub async fn list_tables(
        &self,
        db: &LogicalDatabase,
        name_like: Option<&str>,
    ) -> Result<Vec<TableDescriptor>, CatalogError> {
        let mut tables = self.source.list_tables(&db.physical_schema_name, name_like).await?;
        for table in tables.iter_mut() {
            table.table_name = db.display_table_name(&table.full_table_name).to_string();
        }
        Ok(tables)
    }

    pub async fn list_columns(&self, table: &ResolvedTable) -> Result<Vec<ColumnDescriptor>, CatalogError> {
        Ok(self.source.list_columns(&table.schema, &table.physical_name).await?)
    }

    pub async fn list_columns_physical(
        &self,
        db: &LogicalDatabase,
        physical: &str,
    ) -> Result<Vec<ColumnDescriptor>, CatalogError> {
        Ok(self.source.list_columns(&db.physical_schema_name, physical).await?)
    }

    pub async fn column_whitelist(&self, table: &ResolvedTable) -> Result<ColumnWhitelist, CatalogError> {
        let columns = self.list_columns(table).await?;
        Ok(ColumnWhitelist::new(columns.into_iter().map(|c| c.column_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryCatalog;

    fn router() -> CatalogRouter {
        let catalog = InMemoryCatalog::new()
            .with_table("tourwow", "v_Xqc7k7_orders", &["id", "order_code"])
            .with_table("tourwow", "v_Xqc7k7_customers", &["id", "name"])
            .with_table("locations", "countries", &["id", "continent_id", "name_en"])
            .with_table("locations", "provinces", &["id", "name_th"]);
        CatalogRouter::new(&CatalogConfig::default(), Arc::new(catalog))
    }

    #[test]
    fn resolves_keys_case_insensitively() {
        let router = router();
        assert_eq!(router.resolve_database("locations").unwrap().key, DatabaseKey::Locations);
        assert_eq!(router.resolve_database("TourWow").unwrap().key, DatabaseKey::Tourwow);
        assert_eq!(router.resolve_database("suppliers").unwrap().physical_schema_name, "suppliers");
    }

    #[test]
    fn unknown_database_is_never_defaulted() {
        let router = router();
        for key in ["", "tourwow2", "mysql", "information_schema", "LOCATIONS;--"] {
            match router.resolve_database(key) {
                Err(CatalogError::UnknownDatabase { valid_databases, .. }) => {
                    assert_eq!(valid_databases, vec!["TOURWOW", "LOCATIONS", "SUPPLIERS"]);
                }
                other => panic!("{key:?} resolved to {other:?}"),
            }
        }
    }

    #[test]
    fn prefix_is_added_and_stripped_by_the_router() {
        let db = LogicalDatabase {
            key: DatabaseKey::Tourwow,
            physical_schema_name: "tourwow".into(),
            table_name_prefix: "v_Xqc7k7_".into(),
        };
        assert_eq!(db.physical_table_name("orders"), "v_Xqc7k7_orders");
        assert_eq!(db.physical_table_name("v_Xqc7k7_orders"), "v_Xqc7k7_orders");
        assert_eq!(db.display_table_name("v_Xqc7k7_orders"), "orders");
        assert_eq!(db.display_table_name("plain"), "plain");
    }

    #[tokio::test]
    async fn resolves_logical_and_physical_table_names() {
        let router = router();
        let db = router.resolve_database("TOURWOW").unwrap().clone();

        let by_logical = router.resolve_table(&db, "orders").await.unwrap();
        assert_eq!(by_logical.physical_name, "v_Xqc7k7_orders");
        assert_eq!(by_logical.display_name, "orders");

        let by_physical = router.resolve_table(&db, "v_Xqc7k7_orders").await.unwrap();
        assert_eq!(by_physical, by_logical);
    }

    #[tokio::test]
    async fn missing_table_lists_real_tables() {
        let router = router();
        let db = router.resolve_database("LOCATIONS").unwrap().clone();
        match router.resolve_table(&db, "bogus_table").await {
            Err(CatalogError::TableNotFound { table, valid_tables }) => {
                assert_eq!(table, "bogus_table");
                assert_eq!(valid_tables, vec!["countries", "provinces"]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn whitelist_comes_from_live_columns() {
        let router = router();
        let db = router.resolve_database("locations").unwrap().clone();
        let table = router.resolve_table(&db, "countries").await.unwrap();
        let whitelist = router.column_whitelist(&table).await.unwrap();
        assert_eq!(whitelist.names(), ["id", "continent_id", "name_en"]);
    }

    #[tokio::test]
    async fn listed_tables_use_logical_names() {
        let router = router();
        let db = router.resolve_database("tourwow").unwrap().clone();
        let names: Vec<String> = router.list_tables(&db, None).await.unwrap().into_iter().map(|t| t.table_name).collect();
        assert_eq!(names, vec!["customers", "orders"]);
        assert!(router.table_exists(&db, "customers").await.unwrap());
        assert!(!router.table_exists(&db, "payments").await.unwrap());
    }
}
