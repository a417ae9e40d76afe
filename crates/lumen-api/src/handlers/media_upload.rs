use axum::{
    extract::{multipart::Field, Multipart, State},
    http::StatusCode,
    Json,
};
use lumen_core::models::IngestJob;
use lumen_core::AppError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::HttpAppError;
use crate::state::AppState;

const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/avif"];

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub key: String,
    pub url: String,
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(format!("Failed to read multipart: {}", err.body_text()))
    }
}

/// Strip parameters, e.g. `image/jpeg; charset=binary` -> `image/jpeg`.
fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase()
}

/// `<uuid><lowercased ext>`, or `.bin` when the client name has no extension.
fn staged_upload_name(original: &str) -> String {
    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    format!("{}.{}", Uuid::new_v4(), ext)
}

/// Stream one multipart field to disk, enforcing `max_bytes`.
async fn stage_field(
    mut field: Field<'_>,
    path: &Path,
    max_bytes: usize,
) -> Result<u64, AppError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written: usize = 0;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        written += chunk.len();
        if written > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File size exceeds maximum allowed size of {} MB",
                max_bytes / 1024 / 1024
            )));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    if written == 0 {
        return Err(AppError::BadRequest("File is empty".to_string()));
    }
    Ok(written as u64)
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
        }
    }
}

/// Stage the `file` field of the form under the temp directory. Nothing is
/// left behind on error.
async fn receive_upload(
    multipart: &mut Multipart,
    tmp_dir: &Path,
    max_bytes: usize,
) -> Result<(PathBuf, String), AppError> {
    let mut staged: Option<(PathBuf, String)> = None;
    let result = read_form(multipart, tmp_dir, max_bytes, &mut staged).await;

    match (result, staged) {
        (Ok(()), Some(upload)) => Ok(upload),
        (Ok(()), None) => Err(AppError::BadRequest("File not provided".to_string())),
        (Err(e), staged) => {
            if let Some((path, _)) = staged {
                discard(&path).await;
            }
            Err(e)
        }
    }
}

async fn read_form(
    multipart: &mut Multipart,
    tmp_dir: &Path,
    max_bytes: usize,
    staged: &mut Option<(PathBuf, String)>,
) -> Result<(), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        if staged.is_some() {
            return Err(AppError::BadRequest(
                "Multiple file fields are not allowed; send exactly one field named 'file'"
                    .to_string(),
            ));
        }

        let content_type = field.content_type().map(normalize_mime_type).unwrap_or_default();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Unsupported content type '{}', allowed: {}",
                content_type,
                ALLOWED_CONTENT_TYPES.join(", ")
            )));
        }

        let original_name = field.file_name().unwrap_or("image").to_string();
        let path = tmp_dir.join(staged_upload_name(&original_name));

        match stage_field(field, &path, max_bytes).await {
            Ok(bytes) => {
                tracing::debug!(path = %path.display(), bytes, "Upload staged");
                *staged = Some((path, original_name));
            }
            Err(e) => {
                discard(&path).await;
                return Err(e);
            }
        }
    }
    Ok(())
}

#[tracing::instrument(skip(state, multipart), fields(operation = "upload_media"))]
pub async fn upload_media(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), HttpAppError> {
    let (tmp_file_path, original_file_name) = receive_upload(
        &mut multipart,
        &state.config.tmp_directory,
        state.config.max_upload_size_bytes,
    )
    .await?;

    let job = IngestJob {
        tmp_file_path,
        original_file_name,
    };
    let outcome = state.ingest.submit_and_wait(job).await?;

    let url = format!("m/{}", outcome.key);
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            key: outcome.key,
            url,
        }),
    ))
}
