//! Read path: serve a variant of a stored master.

use lumen_core::models::{
    MediaFormat, MediaRecord, TransformLimits, TransformQuery, TransformRequest,
};
use lumen_core::AppError;
use lumen_db::MediaRecordStore;
use lumen_processing::{find_quality_for_budget, PipelinePhase, TransformPipeline};
use lumen_storage::{parse_key, MasterStore};
use std::path::PathBuf;
use std::sync::Arc;

/// An encoded variant ready to be written to a response.
#[derive(Debug, Clone)]
pub struct RenderedMedia {
    pub bytes: Vec<u8>,
    pub format: MediaFormat,
    /// Set only when the output was fitted to a byte budget.
    pub quality_used: Option<u8>,
    /// `<stem><ext of format>`
    pub file_name: String,
}

impl RenderedMedia {
    pub fn content_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn content_disposition(&self) -> String {
        format!("inline; filename=\"{}\"", self.file_name)
    }
}

pub struct MediaDelivery {
    store: Arc<dyn MasterStore>,
    records: Arc<dyn MediaRecordStore>,
    pipeline: TransformPipeline,
    limits: TransformLimits,
}

impl MediaDelivery {
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

    /// Look up the record behind `key`. Malformed keys never reach the store.
    pub async fn find(&self, key: &str) -> Result<MediaRecord, AppError> {
        parse_key(key)?;
        self.records
            .find_by_key(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media not found: {}", key)))
    }

    /// Render `key` according to `query`.
    ///
    /// Unknown or malformed keys are `NotFound` before the query is looked at.
    #[tracing::instrument(skip(self, query), fields(key = %key))]
    pub async fn render(&self, key: &str, query: TransformQuery) -> Result<RenderedMedia, AppError> {
        self.find(key).await?;
        let parsed = parse_key(key)?;

        let request = query.into_request(&self.limits)?;
        let source = self.store.path_for_key(key)?;
        let format = request.output_format(parsed.format);
        let file_name = format!("{}{}", parsed.stem, format.extension());

        let start = std::time::Instant::now();
        let pipeline = self.pipeline;
        let (bytes, quality_used) =
            tokio::task::spawn_blocking(move || transform(pipeline, source, request, format))
                .await
                .map_err(|e| AppError::Internal(format!("Image task failed: {}", e)))??;

        tracing::debug!(
            format = %format,
            bytes = bytes.len(),
            quality_used = ?quality_used,
            duration_ms = start.elapsed().as_millis(),
            "Variant rendered"
        );

        Ok(RenderedMedia {
            bytes,
            format,
            quality_used,
            file_name,
        })
    }
}

fn transform(
    pipeline: TransformPipeline,
    source: PathBuf,
    request: TransformRequest,
    format: MediaFormat,
) -> Result<(Vec<u8>, Option<u8>), AppError> {
    if !source.exists() {
        return Err(AppError::NotFound(format!(
            "Master missing for {}",
            source.display()
        )));
    }

    let transformed = pipeline.run(&source, &request, format, PipelinePhase::Serve)?;

    match request.max_kilobytes {
        None => Ok((transformed.to_bytes()?, None)),
        Some(target_kb) => {
            let output = find_quality_for_budget(
                || Ok(transformed.clone()),
                format,
                target_kb,
                request.quality,
            )?;
            if !output.budget_met {
                tracing::warn!(
                    target_kb,
                    size = output.bytes.len(),
                    quality_used = output.quality_used,
                    "Byte budget not reachable, serving lowest quality"
                );
            }
            Ok((output.bytes, Some(output.quality_used)))
        }
    }
}
