use async_trait::async_trait;
use lumen_core::models::MediaRecord;
use lumen_core::AppError;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::store::{MediaRecordStore, UpsertOutcome};

/// Process-local record store, used when no database is configured and in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMediaRepository {
    keys: Arc<RwLock<BTreeSet<String>>>,
}

impl InMemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

#[async_trait]
impl MediaRecordStore for InMemoryMediaRepository {
    async fn upsert(&self, key: &str) -> Result<UpsertOutcome, AppError> {
        let inserted = self.keys.write().await.insert(key.to_string());
        Ok(if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::AlreadyExists
        })
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<MediaRecord>, AppError> {
        Ok(self
            .keys
            .read()
            .await
            .get(key)
            .map(|k| MediaRecord::new(k.clone())))
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.keys.write().await.remove(key))
    }

    async fn count_with_digest(&self, digest: &str) -> Result<u64, AppError> {
        let prefix = format!("{}/", digest);
        let keys = self.keys.read().await;
        Ok(keys
            .range(prefix.clone()..)
            .take_while(|k| k.starts_with(&prefix))
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_then_find() {
        let repo = InMemoryMediaRepository::new();
        assert_eq!(repo.upsert("abc/one.jpg").await.unwrap(), UpsertOutcome::Created);
        assert_eq!(
            repo.upsert("abc/one.jpg").await.unwrap(),
            UpsertOutcome::AlreadyExists
        );
        assert_eq!(repo.len().await, 1);
        assert_eq!(
            repo.find_by_key("abc/one.jpg").await.unwrap(),
            Some(MediaRecord::new("abc/one.jpg"))
        );
        assert!(repo.find_by_key("abc/two.jpg").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_count_with_digest() {
        let repo = InMemoryMediaRepository::new();
        repo.upsert("abc/one.jpg").await.unwrap();
        repo.upsert("abc/two.jpg").await.unwrap();
        repo.upsert("abd/one.jpg").await.unwrap();
        repo.upsert("ab/one.jpg").await.unwrap();

        assert_eq!(repo.count_with_digest("abc").await.unwrap(), 2);
        assert_eq!(repo.count_with_digest("ab").await.unwrap(), 1);
        assert_eq!(repo.count_with_digest("zzz").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = InMemoryMediaRepository::new();
        repo.upsert("abc/one.jpg").await.unwrap();
        assert!(repo.delete("abc/one.jpg").await.unwrap());
        assert!(!repo.delete("abc/one.jpg").await.unwrap());
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_create_once() {
        let repo = InMemoryMediaRepository::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.upsert("abc/same.jpg").await.unwrap() })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() == UpsertOutcome::Created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }
}
