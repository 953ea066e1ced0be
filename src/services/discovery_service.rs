use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use super::ServiceError;
use crate::catalog::{CatalogError, CatalogRouter, LogicalDatabase, TableDescriptor};
use crate::config::ApiConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseListing {
    pub database: String,
    pub schema: String,
    pub prefix: String,
    pub description: String,
    pub tables: Vec<TableDescriptor>,
    pub table_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListingSummary {
    pub total_databases: usize,
    pub total_tables: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_columns: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub databases: Vec<DatabaseListing>,
    pub summary: ListingSummary,
}

/// A table as shown by the `/api/tables` discovery endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredTable {
    pub table_name: String,
    pub full_table_name: String,
    pub endpoint: String,
    pub table_type: String,
    pub table_rows: Option<u64>,
    pub table_comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredDatabase {
    pub database_key: String,
    pub database_name: String,
    pub description: String,
    pub prefix: String,
    pub endpoint: String,
    pub tables: Vec<DiscoveredTable>,
    pub table_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discovery {
    pub databases: Vec<DiscoveredDatabase>,
    pub summary: ListingSummary,
}

/// Multi-database listings. A failure in one database is reported on that
/// database's entry and never aborts the others. Every listing runs under
/// the same deadline as queries.
#[derive(Clone)]
pub struct DiscoveryService {
    catalog: CatalogRouter,
    deadline: Duration,
}

impl DiscoveryService {
    pub fn new(catalog: CatalogRouter, api: &ApiConfig) -> Self {
        Self {
            catalog,
            deadline: Duration::from_secs(api.request_timeout_secs.max(1)),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// `GET /api/database/tables`
    pub async fn list_tables(&self, database: Option<&str>, include_columns: bool) -> Result<Listing, ServiceError> {
        self.bounded("table listing", self.collect_tables(database, include_columns)).await
    }

    /// `GET /api/database/schema`: every table with its columns.
    pub async fn schema(&self, database: Option<&str>, table: Option<&str>) -> Result<Listing, ServiceError> {
        self.bounded("schema dump", self.collect_schema(database, table)).await
    }

    /// `GET /api/tables`
    pub async fn discover(&self) -> Result<Discovery, ServiceError> {
        let work = async { Ok::<_, ServiceError>(self.collect_discovery().await) };
        self.bounded("discovery", work).await
    }

    /// `GET /api/tables/{database}`. Only one database is involved, so
    /// catalog failures propagate.
    pub async fn database(&self, key: &str) -> Result<DiscoveredDatabase, ServiceError> {
        self.bounded("database discovery", self.collect_database(key)).await
    }

    async fn bounded<T>(
        &self,
        what: &str,
        work: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, ServiceError> {
        match tokio::time::timeout(self.deadline, work).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("{} exceeded {:?} deadline", what, self.deadline);
                Err(ServiceError::Timeout(self.deadline.as_secs()))
            }
        }
    }

    async fn collect_tables(&self, database: Option<&str>, include_columns: bool) -> Result<Listing, ServiceError> {
        let mut databases = vec![];
        for db in self.selected(database)? {
            let entry = match self.describe(&db, None, include_columns).await {
                Ok(tables) => listing(&db, tables, None),
                Err(e) => listing(&db, vec![], Some(isolate(&db, e))),
            };
            databases.push(entry);
        }

        let summary = ListingSummary {
            total_databases: databases.len(),
            total_tables: databases.iter().map(|d| d.table_count).sum(),
            total_columns: None,
        };
        Ok(Listing { databases, summary })
    }

    async fn collect_schema(&self, database: Option<&str>, table: Option<&str>) -> Result<Listing, ServiceError> {
        let table = table.map(str::trim).filter(|t| !t.is_empty());
        let mut databases = vec![];
        for db in self.selected(database)? {
            let entry = match self.describe(&db, table, true).await {
                Ok(tables) => listing(&db, tables, None),
                Err(e) => listing(&db, vec![], Some(isolate(&db, e))),
            };
            databases.push(entry);
        }

        let total_columns = databases
            .iter()
            .flat_map(|d| d.tables.iter())
            .map(TableDescriptor::column_count)
            .sum();
        let summary = ListingSummary {
            total_databases: databases.len(),
            total_tables: databases.iter().map(|d| d.table_count).sum(),
            total_columns: Some(total_columns),
        };
        Ok(Listing { databases, summary })
    }

    async fn collect_database(&self, key: &str) -> Result<DiscoveredDatabase, ServiceError> {
        let db = self.catalog.resolve_database(key)?.clone();
        let tables = self.catalog.list_tables(&db, None).await?;
        Ok(discovered(&db, tables, None))
    }

    async fn collect_discovery(&self) -> Discovery {
        let mut databases = vec![];
        for db in self.catalog.databases().to_vec() {
            let entry = match self.catalog.list_tables(&db, None).await {
                Ok(tables) => discovered(&db, tables, None),
                Err(e) => discovered(&db, vec![], Some(isolate(&db, e))),
            };
            databases.push(entry);
        }

        let summary = ListingSummary {
            total_databases: databases.len(),
            total_tables: databases.iter().map(|d| d.table_count).sum(),
            total_columns: None,
        };
        Discovery { databases, summary }
    }

    fn selected(&self, database: Option<&str>) -> Result<Vec<LogicalDatabase>, ServiceError> {
        match database.map(str::trim).filter(|d| !d.is_empty()) {
            Some(key) => Ok(vec![self.catalog.resolve_database(key)?.clone()]),
            None => Ok(self.catalog.databases().to_vec()),
        }
    }

    async fn describe(
        &self,
        db: &LogicalDatabase,
        name_like: Option<&str>,
        include_columns: bool,
    ) -> Result<Vec<TableDescriptor>, CatalogError> {
        let mut tables = self.catalog.list_tables(db, name_like).await?;
        if include_columns {
            for table in tables.iter_mut() {
                table.columns = Some(self.catalog.list_columns_physical(db, &table.full_table_name).await?);
            }
        }
        Ok(tables)
    }
}

fn listing(db: &LogicalDatabase, tables: Vec<TableDescriptor>, error: Option<String>) -> DatabaseListing {
    DatabaseListing {
        database: db.key.as_str().to_string(),
        schema: db.physical_schema_name.clone(),
        prefix: db.table_name_prefix.clone(),
        description: db.key.description().to_string(),
        table_count: tables.len(),
        tables,
        error,
    }
}

fn discovered(db: &LogicalDatabase, tables: Vec<TableDescriptor>, error: Option<String>) -> DiscoveredDatabase {
    let base = format!("/api/tables/{}", db.key.slug());
    let tables: Vec<DiscoveredTable> = tables
        .into_iter()
        .map(|t| DiscoveredTable {
            endpoint: format!("{}/{}", base, t.table_name),
            table_name: t.table_name,
            full_table_name: t.full_table_name,
            table_type: t.table_type,
            table_rows: t.table_rows,
            table_comment: t.table_comment,
        })
        .collect();
    DiscoveredDatabase {
        database_key: db.key.slug().to_string(),
        database_name: db.physical_schema_name.clone(),
        description: db.key.description().to_string(),
        prefix: db.table_name_prefix.clone(),
        endpoint: base,
        table_count: tables.len(),
        tables,
        error,
    }
}

/// Log the real cause; the entry only carries its class.
fn isolate(db: &LogicalDatabase, err: CatalogError) -> String {
    let kind = match &err {
        CatalogError::Database(e) => e.kind(),
        _ => "catalog",
    };
    tracing::warn!(database = db.key.as_str(), "catalog listing failed: {}", err);
    format!("{} error while reading catalog", kind)
}
