//! Transform-and-write shared by the task and direct upload surfaces.
//!
//! Neither step retries. A failure surfaces to the caller; for queued tasks
//! the queue redelivers and the full-overwrite write makes the rerun safe.

use bytes::Bytes;
use pixfan_core::{AppError, TargetFormat};
use pixfan_processing::{Transcoded, Transcoder};
use pixfan_storage::ObjectMetadata;
use std::sync::Arc;
use std::time::Instant;

use crate::error::HttpAppError;
use crate::state::AppState;

/// Run the transcoder on the blocking pool.
pub async fn transcode(
    transcoder: Arc<dyn Transcoder>,
    source: Bytes,
    format: TargetFormat,
) -> Result<Transcoded, HttpAppError> {
    let transcoded = tokio::task::spawn_blocking(move || transcoder.transcode(&source, format))
        .await
        .map_err(|e| AppError::Internal(format!("Transcode task failed: {}", e)))??;
    Ok(transcoded)
}

/// Transcode `source` and overwrite `name` in the destination bucket.
#[tracing::instrument(skip(state, source), fields(input_bytes = source.len()))]
pub async fn transform_and_write(
    state: &AppState,
    source: Bytes,
    format: TargetFormat,
    name: &str,
) -> Result<Transcoded, HttpAppError> {
    let start = Instant::now();
    let transcoded = transcode(state.transcoder.clone(), source, format).await?;

    let metadata = ObjectMetadata::with_content_type(transcoded.content_type())
        .cache_control(state.config.dest_cache_control.clone());
    state
        .destination
        .write(name, transcoded.data.clone(), &metadata)
        .await?;

    tracing::info!(
        format = %format,
        name = %name,
        width = transcoded.width,
        height = transcoded.height,
        output_bytes = transcoded.data.len(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Conversion written"
    );

    Ok(transcoded)
}
