pub mod discovery_service;
pub mod mutation_service;
pub mod query_service;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::database::manager::DatabaseError;
use crate::filter::FilterError;

pub use discovery_service::DiscoveryService;
pub use mutation_service::{MutationOutcome, MutationService};
pub use query_service::{Pagination, QueryBody, QueryParams, QueryRequest, QueryResult, QueryService};

/// Failures while composing catalog, builder and executor for one request.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Missing required parameters: {0}")]
    MissingParameters(&'static str),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("request exceeded {0}s deadline")]
    Timeout(u64),

    #[error("Write operations are disabled")]
    MutationsDisabled,
}
