use async_trait::async_trait;
use lumen_core::models::MediaRecord;
use lumen_core::AppError;
use sqlx::{PgPool, Postgres};

use super::store::{MediaRecordStore, UpsertOutcome};

fn store_error(err: sqlx::Error) -> AppError {
    AppError::StoreUnavailable(err.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

/// Postgres-backed media record store
#[derive(Clone)]
pub struct PgMediaRepository {
    pool: PgPool,
}

impl PgMediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("Migration failed: {}", e)))
    }
}

#[async_trait]
impl MediaRecordStore for PgMediaRepository {
    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "insert"))]
    async fn upsert(&self, key: &str) -> Result<UpsertOutcome, AppError> {
        let result = sqlx::query("INSERT INTO media (key) VALUES ($1) ON CONFLICT (key) DO NOTHING")
            .bind(key)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(UpsertOutcome::Created),
            Ok(_) => Ok(UpsertOutcome::AlreadyExists),
            Err(e) if is_unique_violation(&e) => Ok(UpsertOutcome::AlreadyExists),
            Err(e) => Err(store_error(e)),
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    async fn find_by_key(&self, key: &str) -> Result<Option<MediaRecord>, AppError> {
        let key = sqlx::query_scalar::<Postgres, String>("SELECT key FROM media WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(key.map(MediaRecord::new))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "delete"))]
    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let done = sqlx::query("DELETE FROM media WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(done.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    async fn count_with_digest(&self, digest: &str) -> Result<u64, AppError> {
        let count = sqlx::query_scalar::<Postgres, i64>("SELECT COUNT(*) FROM media WHERE digest = $1")
            .bind(digest)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(count.max(0) as u64)
    }
}
