//! Application setup: everything `main` needs to go from a [`Config`] to a
//! running router.

pub mod queue;
pub mod routes;
pub mod server;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use pixfan_core::Config;
use pixfan_processing::{HalfSizeTranscoder, ImageEncoder, QualityPreset};
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_tracing(config.log_format)
        .context("Failed to initialize tracing")?;
    crate::error::configure_error_details(config.is_production());

    tracing::info!(
        environment = %config.environment,
        storage_backend = %config.storage.backend,
        task_queue_backend = %config.task_queue_backend,
        dispatch_enabled = config.dispatch.is_some(),
        cdn = config.cdn_url.is_some(),
        "Configuration loaded and validated successfully"
    );

    let config = Arc::new(config);
    let state = build_state(config.clone()).await?;
    let router = routes::setup_routes(&config, state.clone());

    Ok((state, router))
}

/// Buckets, transcoder and (when configured) the dispatcher.
pub async fn build_state(config: Arc<Config>) -> Result<Arc<AppState>> {
    let quality = QualityPreset::parse(&config.output_quality)
        .map_err(|e| anyhow::anyhow!("OUTPUT_QUALITY: {}", e))?;

    let (source, destination) = storage::setup_storage(&config).await?;
    let queue = queue::setup_dispatch(&config)?;

    Ok(Arc::new(AppState {
        config,
        source,
        destination,
        transcoder: Arc::new(HalfSizeTranscoder::new(quality)),
        encoder: ImageEncoder::new(quality),
        dispatcher: queue.dispatcher,
        local_queue: queue.local_queue,
    }))
}
