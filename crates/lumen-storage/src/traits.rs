//! Master store abstraction

use async_trait::async_trait;
use lumen_core::models::MediaFormat;
use lumen_core::AppError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) | StorageError::InvalidKey(msg) => AppError::NotFound(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Outcome of publishing a staged master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// This job's bytes became the master.
    Stored,
    /// A master with the same digest already existed; the staged copy was discarded.
    Deduplicated,
}

/// Content-addressed storage for canonical masters.
///
/// One physical object exists per digest. Staging paths live on the same
/// volume as the masters so publishing is a link or rename, never a copy.
#[async_trait]
pub trait MasterStore: Send + Sync {
    /// A fresh, job-private path to write a master to before publishing.
    async fn staging_path(&self, format: MediaFormat) -> StorageResult<PathBuf>;

    /// Atomically publish `staged` as the master for `digest`, or discard it
    /// when that master already exists. `staged` is gone afterwards either way.
    async fn place_or_dedupe(
        &self,
        staged: &Path,
        digest: &str,
        format: MediaFormat,
    ) -> StorageResult<Placement>;

    /// Path of the master backing a media key.
    fn path_for_key(&self, key: &str) -> StorageResult<PathBuf>;

    async fn exists(&self, digest: &str, format: MediaFormat) -> StorageResult<bool>;

    /// Remove the master for `digest`. Missing masters are not an error.
    async fn delete(&self, digest: &str, format: MediaFormat) -> StorageResult<()>;
}
