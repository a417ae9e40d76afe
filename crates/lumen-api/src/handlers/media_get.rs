use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use lumen_core::models::TransformQuery;
use lumen_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

static X_QUALITY: HeaderName = HeaderName::from_static("x-quality");

/// Serve a variant of a stored image. Public.
#[tracing::instrument(skip(state, query), fields(operation = "get_media"))]
pub async fn get_media(
    State(state): State<AppState>,
    Path((hash, filename)): Path<(String, String)>,
    query: Result<Query<TransformQuery>, QueryRejection>,
) -> Result<Response, HttpAppError> {
    let key = format!("{}/{}", hash, filename);

    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            // Unknown media is reported before a malformed query.
            state.delivery.find(&key).await?;
            return Err(AppError::BadRequest(rejection.body_text()).into());
        }
    };

    let rendered = state.delivery.render(&key, query).await?;

    let disposition = HeaderValue::from_str(&rendered.content_disposition())
        .map_err(|e| AppError::Internal(format!("Invalid Content-Disposition: {}", e)))?;

    let mut response = (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(rendered.content_type())),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
            (
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        rendered.bytes,
    )
        .into_response();

    if let Some(quality) = rendered.quality_used {
        response
            .headers_mut()
            .insert(X_QUALITY.clone(), HeaderValue::from(u16::from(quality)));
    }

    Ok(response)
}
