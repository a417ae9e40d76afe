//! Application state shared by every handler.

use lumen_core::Config;
use lumen_services::{IngestionCoordinator, MediaDelivery, MediaLibrary};
use lumen_worker::TaskQueue;
use std::sync::Arc;

use crate::auth::AccessTokens;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Ingestion jobs; uploads wait on their own job.
    pub ingest: Arc<TaskQueue<IngestionCoordinator>>,
    pub delivery: Arc<MediaDelivery>,
    pub library: Arc<MediaLibrary>,
    pub tokens: AccessTokens,
}
