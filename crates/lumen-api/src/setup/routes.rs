//! Route configuration

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{require_delete, require_secret, require_write};
use crate::constants::{API_PREFIX, MAX_CONCURRENT_RENDERS, MULTIPART_OVERHEAD_BYTES};
use crate::handlers;
use crate::state::AppState;

/// Assemble the application router.
///
/// Reads are public; uploads need `write`, deletes need `delete`, and token
/// issuance needs the shared secret.
pub fn setup_routes(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_size_bytes + MULTIPART_OVERHEAD_BYTES;

    let upload = Router::new()
        .route("/", post(handlers::media_upload::upload_media))
        .route_layer(from_fn_with_state(state.clone(), require_write))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit));

    let issue_access = Router::new()
        .route(
            "/issue-access",
            post(handlers::issue_access::issue_access),
        )
        .route_layer(from_fn_with_state(state.clone(), require_secret));

    let delete = Router::new()
        .route(
            "/{hash}/{filename}",
            axum::routing::delete(handlers::media_delete::delete_media),
        )
        .route_layer(from_fn_with_state(state.clone(), require_delete));

    let public = Router::new()
        .route("/{hash}/{filename}", get(handlers::media_get::get_media))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_RENDERS));

    let media = Router::new()
        .merge(upload)
        .merge(issue_access)
        .merge(delete)
        .merge(public);

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest(&format!("{}/media", API_PREFIX), media)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
