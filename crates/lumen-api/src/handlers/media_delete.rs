use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use crate::error::HttpAppError;
use crate::state::AppState;

#[tracing::instrument(skip(state), fields(operation = "delete_media"))]
pub async fn delete_media(
    State(state): State<AppState>,
    Path((hash, filename)): Path<(String, String)>,
) -> Result<StatusCode, HttpAppError> {
    let key = format!("{}/{}", hash, filename);
    state.library.delete(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}
