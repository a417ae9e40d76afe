use async_trait::async_trait;
use lumen_core::models::MediaFormat;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::keys::{is_digest, parse_key};
use crate::traits::{MasterStore, Placement, StorageError, StorageResult};

const STAGING_DIR: &str = ".staging";

/// Local filesystem master store
#[derive(Debug, Clone)]
pub struct LocalMasterStore {
    base_path: PathBuf,
    staging_path: PathBuf,
}

impl LocalMasterStore {
    /// Create the store, making sure the root and staging directories exist.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        let staging_path = base_path.join(STAGING_DIR);

        fs::create_dir_all(&staging_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                staging_path.display(),
                e
            ))
        })?;

        Ok(LocalMasterStore {
            base_path,
            staging_path,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Physical location of the master for `digest`.
    fn master_path(&self, digest: &str, format: MediaFormat) -> StorageResult<PathBuf> {
        if !is_digest(digest) {
            return Err(StorageError::InvalidKey(format!(
                "not a sha256 digest: {}",
                digest
            )));
        }
        Ok(self
            .base_path
            .join(format!("{}{}", digest, format.extension())))
    }

    async fn discard(&self, staged: &Path) {
        match fs::remove_file(staged).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %staged.display(), error = %e, "Failed to remove staged master");
            }
        }
    }

    async fn publish(&self, staged: &Path, dest: &Path) -> StorageResult<Placement> {
        match fs::hard_link(staged, dest).await {
            Ok(()) => Ok(Placement::Stored),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(Placement::Deduplicated),
            Err(link_err) => {
                // Filesystems without hard links: rename is still atomic, and a
                // concurrent winner holds identical bytes.
                tracing::debug!(error = %link_err, "Hard link unavailable, publishing by rename");
                fs::rename(staged, dest).await.map_err(|e| {
                    StorageError::PublishFailed(format!(
                        "Failed to publish {}: {}",
                        dest.display(),
                        e
                    ))
                })?;
                Ok(Placement::Stored)
            }
        }
    }
}

#[async_trait]
impl MasterStore for LocalMasterStore {
    async fn staging_path(&self, format: MediaFormat) -> StorageResult<PathBuf> {
        fs::create_dir_all(&self.staging_path).await?;
        Ok(self
            .staging_path
            .join(format!("{}{}", Uuid::new_v4(), format.extension())))
    }

    #[tracing::instrument(skip(self, staged), fields(storage.digest = %digest))]
    async fn place_or_dedupe(
        &self,
        staged: &Path,
        digest: &str,
        format: MediaFormat,
    ) -> StorageResult<Placement> {
        let dest = self.master_path(digest, format)?;
        let start = std::time::Instant::now();

        let placement = if fs::try_exists(&dest).await? {
            Placement::Deduplicated
        } else {
            match self.publish(staged, &dest).await {
                Ok(placement) => placement,
                Err(e) => {
                    self.discard(staged).await;
                    return Err(e);
                }
            }
        };

        self.discard(staged).await;

        tracing::info!(
            path = %dest.display(),
            placement = ?placement,
            duration_ms = start.elapsed().as_millis(),
            "Master placed"
        );
        Ok(placement)
    }

    fn path_for_key(&self, key: &str) -> StorageResult<PathBuf> {
        let parsed = parse_key(key)?;
        self.master_path(parsed.digest, parsed.format)
    }

    async fn exists(&self, digest: &str, format: MediaFormat) -> StorageResult<bool> {
        let path = self.master_path(digest, format)?;
        Ok(fs::try_exists(&path).await?)
    }

    #[tracing::instrument(skip(self), fields(storage.digest = %digest))]
    async fn delete(&self, digest: &str, format: MediaFormat) -> StorageResult<()> {
        let path = self.master_path(digest, format)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Master deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
