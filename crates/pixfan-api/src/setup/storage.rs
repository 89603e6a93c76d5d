//! Storage setup

use anyhow::{Context, Result};
use pixfan_core::Config;
use pixfan_storage::{create_storage, BucketRole, Storage};
use std::sync::Arc;

/// Open the source and destination buckets.
pub async fn setup_storage(config: &Config) -> Result<(Arc<dyn Storage>, Arc<dyn Storage>)> {
    tracing::info!(backend = %config.storage.backend, "Initializing storage...");

    let source = create_storage(&config.storage, BucketRole::Source)
        .await
        .context("Failed to open source bucket")?;
    let destination = create_storage(&config.storage, BucketRole::Destination)
        .await
        .context("Failed to open destination bucket")?;

    tracing::info!(
        source_bucket = %source.bucket(),
        destination_bucket = %destination.bucket(),
        "Storage initialized successfully"
    );

    Ok((source, destination))
}
