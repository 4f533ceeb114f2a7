//! Sum28 Backend Service
//!
//! Main entry point. This service:
//! - polls the draw provider and ingests results
//! - keeps the current-round betting window projection up to date
//! - settles orders once their round has been drawn

use std::sync::Arc;
use sum28_backend::config::AppConfig;
use sum28_backend::database::{create_pool, run_migrations};
use sum28_backend::error::{AppError, AppResult};
use sum28_backend::scheduler::jobs::standard_scheduler;
use sum28_backend::services::{bootstrap, DrawCollector};
use sum28_backend::AppState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    // Initialize tracing/logging with config
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("sum28_backend={},sqlx=warn", config.log_level).into());
    if config.json_logs() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Sum28 backend starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!(
        "Lottery: {} (period {}s, lock-ahead {}s)",
        config.lottery.code, config.lottery.period_seconds, config.lottery.lock_ahead_seconds
    );

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let pool = create_pool(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        AppError::Database(e)
    })?;

    info!("Max connections: {}", config.database.max_connections);

    info!("Running database migrations...");
    run_migrations(&pool, None).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        AppError::Database(e)
    })?;

    // =========================================================================
    // CORE SERVICES
    // =========================================================================
    let state = AppState::postgres(pool, &config)?;

    bootstrap::run(state.lotteries.as_ref(), &config.lottery, &state.issues).await?;
    info!("✓ Lottery seeded and history projection warmed");

    let collector = Arc::new(DrawCollector::new(&config.collector, state.issues.clone())?);
    info!("✓ Draw collector polling {}", config.collector.url);

    // =========================================================================
    // BACKGROUND JOBS
    // =========================================================================
    let scheduler = standard_scheduler(
        &config.scheduler,
        &config.collector,
        collector,
        state.issues.clone(),
        state.settlement.clone(),
    );
    let handle = scheduler.start();
    info!("✓ Jobs running: {:?}", scheduler.job_names());
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received, shutting down gracefully...");

    handle.shutdown().await;

    info!("Sum28 backend shutdown complete");
    Ok(())
}
