use std::sync::Arc;

use anyhow::Context;

use crate::app::{app, AppState};
use crate::catalog::MySqlCatalog;
use crate::config::config;
use crate::database::{DatabaseManager, MySqlExecutor};

pub async fn run(bind: &str, port: u16) -> anyhow::Result<()> {
    let config = config();
    tracing::info!("Starting TourWow API in {:?} mode", config.environment);

    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to MySQL")?;

    let executor = MySqlExecutor::new(
        pool.clone(),
        config.database.enable_query_logging,
        config.database.slow_query_threshold_ms,
    );
    let state = AppState::new(config.clone(), Arc::new(MySqlCatalog::new(pool)), Arc::new(executor));

    if state.auth.is_open() {
        tracing::warn!("authentication disabled; every /api route is public");
    }
    let sweeper = state.rate_limiter.is_enabled().then(|| state.rate_limiter.start_sweep_task());

    let bind_addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("TourWow API listening on http://{}", bind_addr);

    axum::serve(listener, app(Arc::new(state)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
