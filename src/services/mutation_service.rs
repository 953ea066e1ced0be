use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use super::ServiceError;
use crate::catalog::{CatalogRouter, ResolvedTable};
use crate::config::ApiConfig;
use crate::database::executor::QueryExecutor;
use crate::filter::{Mutation, SqlResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationOutcome {
    pub operation: &'static str,
    pub database: String,
    pub table: String,
    pub rows_affected: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

/// Single-row INSERT / UPDATE / DELETE with the same database, table and
/// column validation as queries.
#[derive(Clone)]
pub struct MutationService {
    catalog: CatalogRouter,
    executor: Arc<dyn QueryExecutor>,
    enabled: bool,
    deadline: Duration,
}

impl MutationService {
    pub fn new(catalog: CatalogRouter, executor: Arc<dyn QueryExecutor>, api: &ApiConfig) -> Self {
        Self {
            catalog,
            executor,
            enabled: api.enable_mutations,
            deadline: Duration::from_secs(api.request_timeout_secs.max(1)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn insert(&self, database: &str, table: &str, body: Map<String, Value>) -> Result<MutationOutcome, ServiceError> {
        let (resolved, mutation) = self.prepare(database, table).await?;
        let statement = mutation.insert(&body)?;
        let outcome = self.run(&statement).await?;
        let id = (outcome.last_insert_id > 0).then(|| Value::from(outcome.last_insert_id));
        Ok(self.outcome("insert", database, resolved, outcome.rows_affected, id))
    }

    pub async fn update(&self, database: &str, table: &str, body: Map<String, Value>) -> Result<MutationOutcome, ServiceError> {
        let (resolved, mutation) = self.prepare(database, table).await?;
        let statement = mutation.update(&body)?;
        let outcome = self.run(&statement).await?;
        Ok(self.outcome("update", database, resolved, outcome.rows_affected, body.get("id").cloned()))
    }

    pub async fn delete(&self, database: &str, table: &str, id: Option<Value>) -> Result<MutationOutcome, ServiceError> {
        let (resolved, mutation) = self.prepare(database, table).await?;
        let statement = mutation.delete(id.as_ref())?;
        let outcome = self.run(&statement).await?;
        Ok(self.outcome("delete", database, resolved, outcome.rows_affected, id))
    }

    async fn prepare(&self, database: &str, table: &str) -> Result<(ResolvedTable, Mutation), ServiceError> {
        if !self.enabled {
            return Err(ServiceError::MutationsDisabled);
        }
        let db = self.catalog.resolve_database(database)?.clone();
        let resolved = self.catalog.resolve_table(&db, table).await?;
        let columns = self.catalog.column_whitelist(&resolved).await?;
        let mutation = Mutation::new(&resolved.schema, &resolved.physical_name, columns)?;
        Ok((resolved, mutation))
    }

    async fn run(&self, statement: &SqlResult) -> Result<crate::database::ExecOutcome, ServiceError> {
        match tokio::time::timeout(self.deadline, self.executor.execute(statement)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ServiceError::Timeout(self.deadline.as_secs())),
        }
    }

    fn outcome(
        &self,
        operation: &'static str,
        database: &str,
        table: ResolvedTable,
        rows_affected: u64,
        id: Option<Value>,
    ) -> MutationOutcome {
        tracing::info!(operation, table = %table.physical_name, rows_affected, "mutation applied");
        MutationOutcome {
            operation,
            database: database.to_ascii_uppercase(),
            table: table.display_name,
            rows_affected,
            id,
        }
    }
}
