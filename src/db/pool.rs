use crate::{config::DatabaseConfig, errors::Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Create a PostgreSQL connection pool
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    tracing::info!("Creating policy store connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect(&config.url)
        .await?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Policy store connection pool created"
    );

    Ok(pool)
}

/// Apply the RBAC schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("Running policy store migrations");
    sqlx::migrate!("./src/db/migrations").run(pool).await?;
    tracing::info!("Policy store migrations completed");
    Ok(())
}

/// Readiness probe for the policy store
pub async fn health_check(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
