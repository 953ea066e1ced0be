pub mod app;
pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod services;

#[doc(hidden)]
pub mod testing;

pub use app::{app, AppState};
