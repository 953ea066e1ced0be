pub mod executor;
pub mod manager;

pub use executor::{ExecOutcome, JsonRow, MySqlExecutor, QueryExecutor};
pub use manager::{DatabaseError, DatabaseManager};
