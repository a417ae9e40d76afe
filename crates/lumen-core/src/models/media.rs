use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A stored media record. The key is `<sha256 of master>/<normalized name><ext>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub key: String,
}

impl MediaRecord {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Digest prefix of the key.
    pub fn digest(&self) -> &str {
        self.key.split('/').next().unwrap_or_default()
    }

    /// File-name component of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or_default()
    }
}

/// Payload of one ingestion job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestJob {
    /// Staged upload; owned by the job until it reaches a terminal outcome.
    pub tmp_file_path: PathBuf,
    /// Name supplied by the client, used only to derive the key's file name.
    pub original_file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub key: String,
}
