use lumen_core::AppError;
use lumen_db::MediaRecordStore;
use lumen_storage::{parse_key, MasterStore};
use std::sync::Arc;

/// Record-level operations on stored media.
pub struct MediaLibrary {
    store: Arc<dyn MasterStore>,
    records: Arc<dyn MediaRecordStore>,
}

impl MediaLibrary {
    pub fn new(store: Arc<dyn MasterStore>, records: Arc<dyn MediaRecordStore>) -> Self {
        Self { store, records }
    }

    /// Remove the record for `key`, and its master once no other record
    /// shares the digest.
    ///
    /// An identical ingest that records its key after the count usually finds
    /// the master gone and retries, which republishes it. If its check wins
    /// the race the record is left without bytes: reads answer `NotFound`,
    /// the loss is logged here, and uploading the content again restores it.
    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        let parsed = parse_key(key)?;

        if !self.records.delete(key).await? {
            return Err(AppError::NotFound(format!("Media not found: {}", key)));
        }

        let remaining = self.records.count_with_digest(parsed.digest).await?;
        if remaining == 0 {
            self.store.delete(parsed.digest, parsed.format).await?;

            let recorded = self.records.count_with_digest(parsed.digest).await?;
            if recorded > 0 {
                tracing::warn!(
                    digest = parsed.digest,
                    recorded,
                    "Master removed while an identical upload was being recorded"
                );
            }
        } else {
            tracing::debug!(digest = parsed.digest, remaining, "Master still referenced");
        }

        tracing::info!("Media deleted");
        Ok(())
    }
}
