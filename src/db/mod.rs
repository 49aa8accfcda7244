//! Database pools and migrations for the hub and the ledger shards.
//!
//! The hub is connected eagerly, since the engine is useless without it.
//! Shard pools are built lazily so a single unreachable city ledger cannot keep
//! the process from starting; the shard surfaces its failure on first use.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;

/// Database connection error
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),

    #[error("Database health check failed: {0}")]
    HealthCheckError(String),
}

/// Connect the hub pool.
pub async fn create_hub_pool(config: &Config) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.hub_database_url)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    tracing::info!("Hub connection pool created successfully");

    Ok(pool)
}

/// Build a pool without dialing it. Used for shard ledgers, which are
/// independently available from the hub and from each other.
pub fn create_lazy_pool(url: &str, max_connections: u32) -> Result<PgPool, DbError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect_lazy(url)
        .map_err(|e| DbError::ConnectionError(e.to_string()))
}

/// Run hub store migrations
pub async fn run_hub_migrations(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Running hub migrations...");

    sqlx::migrate!("./migrations/hub")
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    Ok(())
}

/// Run ledger shard migrations against one city's pool
pub async fn run_shard_migrations(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Running shard migrations...");

    sqlx::migrate!("./migrations/shard")
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    Ok(())
}

/// Check database connectivity (for health checks)
pub async fn check_health(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| DbError::HealthCheckError(e.to_string()))?;

    Ok(())
}
