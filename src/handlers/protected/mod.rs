// handlers/protected/mod.rs - endpoints behind the gateway middleware
//
// Route Prefix: /api/*
// Every handler here can assume the caller passed the rate limiter and the
// auth resolver; the resolved AuthResult sits in the request extensions.
mod query;
mod records;
mod schema;
mod tables;

pub use query::{query_get, query_post};
pub use records::{record_delete, record_insert, record_update};
pub use schema::database_schema;
pub use tables::{database_tables, table_query, tables_database, tables_index};
