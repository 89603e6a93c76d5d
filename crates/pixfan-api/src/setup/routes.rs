//! Route configuration and setup

use crate::api_doc::ApiDoc;
use crate::handlers;
use crate::middleware::json_payload_too_large;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Json, Router,
};
use pixfan_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// Requests in flight at once. Transcoding is CPU-bound; beyond this the
/// queue's own backoff is the better buffer.
const HTTP_CONCURRENCY_LIMIT: usize = 256;

pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router<()> {
    tracing::info!(
        max_upload_bytes = config.max_upload_size_bytes,
        http_concurrency_limit = HTTP_CONCURRENCY_LIMIT,
        "Routes configured"
    );

    Router::new()
        .route(
            "/convert",
            post(handlers::convert::convert).fallback(handlers::convert::method_not_allowed),
        )
        .route(
            "/events/object-finalized",
            post(handlers::events::object_finalized),
        )
        .route("/images/{file_name}", get(handlers::images::get_image))
        .route("/health", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        .route("/api/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_size_bytes))
        .layer(middleware::from_fn_with_state(
            config.max_upload_size_bytes,
            json_payload_too_large,
        ))
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
