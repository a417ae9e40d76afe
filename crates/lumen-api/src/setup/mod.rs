//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;

use crate::auth::AccessTokens;
use crate::state::AppState;
use anyhow::{Context, Result};
use lumen_core::Config;
use lumen_services::{IngestionCoordinator, MediaDelivery, MediaLibrary};
use lumen_storage::{LocalMasterStore, MasterStore};
use lumen_worker::{TaskQueue, TaskQueueConfig};
use std::sync::Arc;

/// Build services from `config`, start the ingestion queue and assemble the router.
pub async fn initialize_app(config: Config) -> Result<(AppState, axum::Router)> {
    config.validate().context("Configuration validation failed")?;

    tokio::fs::create_dir_all(&config.tmp_directory)
        .await
        .with_context(|| {
            format!(
                "Failed to create temp directory {}",
                config.tmp_directory.display()
            )
        })?;
    let store: Arc<dyn MasterStore> = Arc::new(
        LocalMasterStore::new(&config.storage_directory)
            .await
            .context("Failed to initialize master store")?,
    );
    tracing::info!(
        storage_directory = %config.storage_directory.display(),
        tmp_directory = %config.tmp_directory.display(),
        "Storage ready"
    );

    let records = database::setup_record_store(&config).await?;

    let coordinator = Arc::new(IngestionCoordinator::new(
        store.clone(),
        records.clone(),
        config.transform_limits(),
    ));
    let ingest = TaskQueue::start(
        coordinator,
        TaskQueueConfig {
            max_workers: config.queue_concurrency,
            max_attempts: config.queue_max_attempts,
            ..TaskQueueConfig::default()
        },
    );

    let state = AppState {
        delivery: Arc::new(MediaDelivery::new(
            store.clone(),
            records.clone(),
            config.transform_limits(),
        )),
        library: Arc::new(MediaLibrary::new(store, records)),
        ingest: Arc::new(ingest),
        tokens: AccessTokens::new(&config.secret_key),
        config: Arc::new(config),
    };

    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
