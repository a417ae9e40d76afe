//! Ingestion coordinator
//!
//! One job turns a staged upload into a canonical master and a record:
//! probe, canonicalize into a staging path, digest, derive the key,
//! place-or-dedupe, upsert. The staged master never outlives the attempt; the
//! upload is removed once the job reaches a terminal outcome.

use async_trait::async_trait;
use lumen_core::models::{IngestJob, IngestOutcome, MediaFormat, TransformLimits, TransformRequest};
use lumen_core::{AppError, ErrorMetadata, TaskError};
use lumen_db::{MediaRecordStore, UpsertOutcome};
use lumen_processing::{decode_file_within, PipelinePhase, TransformPipeline};
use lumen_storage::{derive_key, sha256_file, MasterStore, Placement};
use lumen_worker::{JobAttempt, JobHandler};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Removes a job-private file when dropped, whatever path the job took.
struct StagedFile(PathBuf);

impl Drop for StagedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.0.display(), error = %e, "Failed to remove staged master");
            }
        }
    }
}

async fn remove_upload(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary upload");
        }
    }
}

fn join_error(err: tokio::task::JoinError) -> AppError {
    AppError::Internal(format!("Image task failed: {}", err))
}

pub struct IngestionCoordinator {
    store: Arc<dyn MasterStore>,
    records: Arc<dyn MediaRecordStore>,
    pipeline: TransformPipeline,
    limits: TransformLimits,
}

impl IngestionCoordinator {
    /// Sources larger than `limits` are rejected before they are decoded.
    pub fn new(
        store: Arc<dyn MasterStore>,
        records: Arc<dyn MediaRecordStore>,
        limits: TransformLimits,
    ) -> Self {
        Self {
            store,
            records,
            pipeline: TransformPipeline::new(),
            limits,
        }
    }

    /// Run one attempt of an ingestion job.
    #[tracing::instrument(
        skip(self, job),
        fields(job_id = %attempt.job_id, attempt = attempt.number, file_name = %job.original_file_name)
    )]
    pub async fn ingest(&self, job: &IngestJob, attempt: JobAttempt) -> Result<IngestOutcome, AppError> {
        let result = self.process(job).await;

        let terminal = match &result {
            Ok(_) => true,
            Err(e) => !e.is_recoverable() || attempt.is_last(),
        };
        if terminal {
            remove_upload(&job.tmp_file_path).await;
        }

        result
    }

    async fn process(&self, job: &IngestJob) -> Result<IngestOutcome, AppError> {
        let start = std::time::Instant::now();

        let source = job.tmp_file_path.clone();
        let limits = self.limits;
        let decoded = tokio::task::spawn_blocking(move || decode_file_within(&source, &limits))
            .await
            .map_err(join_error)??;
        let format: MediaFormat = decoded.source_format;

        let staged = self.store.staging_path(format).await?;
        let _guard = StagedFile(staged.clone());

        let pipeline = self.pipeline;
        let out = staged.clone();
        let written = tokio::task::spawn_blocking(move || {
            pipeline
                .run_decoded(decoded, &TransformRequest::default(), format, PipelinePhase::Ingest)?
                .write_to_file(&out)
        })
        .await
        .map_err(join_error)??;

        let digest = sha256_file(&staged).await?;
        let key = derive_key(&digest, &job.original_file_name, format);

        let placement = self.store.place_or_dedupe(&staged, &digest, format).await?;

        let upsert = self.records.upsert(&key).await?;
        if upsert == UpsertOutcome::AlreadyExists {
            tracing::debug!(key = %key, "Record already exists");
        }

        // A delete of the last record sharing this digest may have removed the
        // master between placement and upsert. Retrying republishes it.
        if !self.store.exists(&digest, format).await? {
            return Err(AppError::Storage(format!(
                "master for {} vanished before its record was written",
                digest
            )));
        }

        tracing::info!(
            key = %key,
            format = %format,
            bytes = written,
            deduplicated = placement == Placement::Deduplicated,
            duration_ms = start.elapsed().as_millis(),
            "Ingestion complete"
        );

        Ok(IngestOutcome { key })
    }
}

#[async_trait]
impl JobHandler for IngestionCoordinator {
    type Job = IngestJob;
    type Output = IngestOutcome;

    async fn handle(&self, job: &IngestJob, attempt: JobAttempt) -> anyhow::Result<IngestOutcome> {
        self.ingest(job, attempt)
            .await
            .map_err(|e| TaskError::from_app_error(e).into())
    }
}
