use crate::config::DatabaseConfig;
use sqlx::migrate::Migrator;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::path::Path;
use thiserror::Error;
use tracing::info;

const DEFAULT_MIGRATIONS_DIR: &str = "./migrations";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Could not open the Postgres pool: {0}")]
    PoolCreation(sqlx::Error),

    #[error("Postgres query failed: {0}")]
    QueryError(sqlx::Error),

    #[error("Timed out waiting for a Postgres connection")]
    ConnectionTimeout,

    #[error("Schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid database settings: {0}")]
    Config(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DatabaseError::ConnectionTimeout,
            other => DatabaseError::QueryError(other),
        }
    }
}

/// Handle on the store's pool, kept in `AppState` for health checks
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Readiness probe
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Open the pool and make sure at least one connection works before the
/// scheduler starts issuing settlement queries.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    if config.url.is_empty() {
        return Err(DatabaseError::Config("DATABASE_URL is empty".to_string()));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .max_lifetime(config.max_lifetime())
        .test_before_acquire(config.test_before_acquire)
        .connect(&config.url)
        .await
        .map_err(DatabaseError::PoolCreation)?;

    Database::new(pool.clone()).ping().await?;
    info!(
        "Postgres pool ready (max {} connections)",
        config.max_connections
    );

    Ok(pool)
}

/// Apply the schema under `dir`, `./migrations` when not given
pub async fn run_migrations(pool: &PgPool, dir: Option<&str>) -> Result<(), DatabaseError> {
    let dir = dir.unwrap_or(DEFAULT_MIGRATIONS_DIR);
    let migrator = Migrator::new(Path::new(dir)).await?;
    migrator.run(pool).await?;

    info!("Migrations from {} applied", dir);
    Ok(())
}
