use pixfan_core::{Config, DispatchConfig};
use std::sync::Arc;

use crate::cloud_tasks::{CloudTasksGateway, MetadataServerToken, StaticToken, TokenSource};
use crate::gateway::{EnqueueError, EnqueueResult, QueuePath};

/// Build the Cloud Tasks gateway for the configured queue.
///
/// Uses `CLOUD_TASKS_ACCESS_TOKEN` when set, otherwise the metadata server.
pub fn cloud_tasks_gateway(
    config: &Config,
    dispatch: &DispatchConfig,
) -> EnqueueResult<CloudTasksGateway> {
    let tokens: Arc<dyn TokenSource> = match &config.cloud_tasks.access_token {
        Some(token) => Arc::new(StaticToken::new(token.clone())),
        None => {
            let client = reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .map_err(|e| {
                    EnqueueError::Configuration(format!("Failed to create HTTP client: {}", e))
                })?;
            Arc::new(MetadataServerToken::new(client))
        }
    };

    let queue = QueuePath::new(&dispatch.project, &dispatch.location, &dispatch.queue);
    tracing::info!(
        queue = %queue,
        endpoint = %config.cloud_tasks.endpoint,
        static_token = config.cloud_tasks.access_token.is_some(),
        "Cloud Tasks gateway configured"
    );

    CloudTasksGateway::new(config.cloud_tasks.endpoint.clone(), queue, tokens)
}
