use async_trait::async_trait;
use lumen_core::models::MediaRecord;
use lumen_core::AppError;

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    /// A record with this key already existed. Not an error.
    AlreadyExists,
}

/// Persistence for media records.
///
/// Implementations report failures other than a duplicate key as
/// [`AppError::StoreUnavailable`].
#[async_trait]
pub trait MediaRecordStore: Send + Sync {
    async fn upsert(&self, key: &str) -> Result<UpsertOutcome, AppError>;

    async fn find_by_key(&self, key: &str) -> Result<Option<MediaRecord>, AppError>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// Number of records whose key starts with `digest`.
    async fn count_with_digest(&self, digest: &str) -> Result<u64, AppError>;
}
