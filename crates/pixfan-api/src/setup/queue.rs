//! Task queue and dispatcher setup

use anyhow::{Context, Result};
use pixfan_core::{Config, TaskQueueBackend};
use pixfan_tasks::{
    cloud_tasks_gateway, DispatchSettings, FanOutDispatcher, LocalTaskQueue, TaskQueueGateway,
};
use std::sync::Arc;

#[derive(Default)]
pub struct DispatchSetup {
    pub dispatcher: Option<Arc<FanOutDispatcher>>,
    pub local_queue: Option<Arc<LocalTaskQueue>>,
}

/// Build the dispatcher for the configured queue backend, or nothing when
/// `RUN_URL` is unset.
pub fn setup_dispatch(config: &Config) -> Result<DispatchSetup> {
    let Some(dispatch) = &config.dispatch else {
        tracing::info!("RUN_URL not set, fan-out dispatch disabled");
        return Ok(DispatchSetup::default());
    };

    let settings = DispatchSettings::from(dispatch);

    let (gateway, local_queue): (Arc<dyn TaskQueueGateway>, Option<Arc<LocalTaskQueue>>) =
        match config.task_queue_backend {
            TaskQueueBackend::CloudTasks => {
                let gateway = cloud_tasks_gateway(config, dispatch)
                    .context("Failed to configure Cloud Tasks gateway")?;
                (Arc::new(gateway) as Arc<dyn TaskQueueGateway>, None)
            }
            TaskQueueBackend::Local => {
                let queue = Arc::new(
                    LocalTaskQueue::start(config.local_queue.clone())
                        .context("Failed to start local task queue")?,
                );
                (queue.clone() as Arc<dyn TaskQueueGateway>, Some(queue))
            }
        };

    tracing::info!(
        backend = gateway.backend_name(),
        queue = %settings.queue,
        target = %settings.target_url(),
        oidc = settings.service_account.is_some(),
        "Fan-out dispatch enabled"
    );

    Ok(DispatchSetup {
        dispatcher: Some(Arc::new(FanOutDispatcher::new(gateway, settings))),
        local_queue,
    })
}
