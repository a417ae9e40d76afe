//! Record store setup

use anyhow::{Context, Result};
use lumen_core::Config;
use lumen_db::{InMemoryMediaRepository, MediaRecordStore, PgMediaRepository};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

/// Connect to Postgres and apply migrations, or fall back to an in-memory
/// store when no `DATABASE_URL` is configured.
pub async fn setup_record_store(config: &Config) -> Result<Arc<dyn MediaRecordStore>> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, records are kept in memory only");
        return Ok(Arc::new(InMemoryMediaRepository::new()));
    };

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );

    let repository = PgMediaRepository::new(pool);
    repository
        .migrate()
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(Arc::new(repository))
}
