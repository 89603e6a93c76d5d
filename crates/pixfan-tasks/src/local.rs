//! In-process task queue
//!
//! Stands in for Cloud Tasks during development: tasks are deduplicated by
//! name (against the most recently seen names), then POSTed to their URL by a
//! bounded pool of delivery workers.
//! A transport error or non-2xx answer schedules a redelivery with capped
//! exponential backoff until `max_attempts` is reached. Queued tasks live in
//! memory only and are lost on restart.
//!
//! Shutdown: [`LocalTaskQueue::shutdown`] stops accepting deliveries from the
//! channel. Deliveries already in flight keep running until they finish or
//! run out of attempts.

use async_trait::async_trait;
use lru::LruCache;
use pixfan_core::LocalQueueConfig;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;

use crate::gateway::{EnqueueError, EnqueueResult, HttpTask, TaskHandle, TaskQueueGateway};

const QUEUE_CAPACITY: usize = 1024;
/// Task names remembered for deduplication; the oldest are forgotten first.
const SEEN_TASK_NAMES: NonZeroUsize = match NonZeroUsize::new(10_000) {
    Some(n) => n,
    None => panic!("SEEN_TASK_NAMES must be non-zero"),
};
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(120);

/// Backoff before redelivery number `attempt + 1`: `base * 2^attempt`,
/// capped at `max`.
#[inline]
pub(crate) fn compute_backoff_ms(base_ms: u64, max_ms: u64, attempt: u32) -> u64 {
    base_ms
        .saturating_mul(2_u64.saturating_pow(attempt))
        .min(max_ms)
}

pub struct LocalTaskQueue {
    sender: mpsc::Sender<HttpTask>,
    shutdown_tx: mpsc::Sender<()>,
    seen: Mutex<LruCache<String, ()>>,
}

impl LocalTaskQueue {
    /// Start the delivery loop on the current runtime.
    pub fn start(config: LocalQueueConfig) -> EnqueueResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(|e| {
                EnqueueError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self::with_client(config, http_client))
    }

    pub fn with_client(config: LocalQueueConfig, http_client: reqwest::Client) -> Self {
        Self::with_dedup_capacity(config, http_client, SEEN_TASK_NAMES)
    }

    fn with_dedup_capacity(
        config: LocalQueueConfig,
        http_client: reqwest::Client,
        seen_capacity: NonZeroUsize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(Self::worker_pool(config, http_client, receiver, shutdown_rx));

        Self {
            sender,
            shutdown_tx,
            seen: Mutex::new(LruCache::new(seen_capacity)),
        }
    }

    async fn worker_pool(
        config: LocalQueueConfig,
        http_client: reqwest::Client,
        mut receiver: mpsc::Receiver<HttpTask>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(
            workers = config.workers,
            max_attempts = config.max_attempts,
            backoff_ms = config.backoff_ms,
            "Local task queue started"
        );

        let semaphore = Arc::new(Semaphore::new(config.workers));
        let config = Arc::new(config);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Local task queue shutting down");
                    break;
                }
                next = receiver.recv() => {
                    let Some(task) = next else { break };
                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let client = http_client.clone();
                    let config = config.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        deliver_with_retry(&client, &config, task).await;
                    });
                }
            }
        }

        tracing::info!("Local task queue stopped");
    }

    fn seen_names(&self) -> EnqueueResult<std::sync::MutexGuard<'_, LruCache<String, ()>>> {
        self.seen
            .lock()
            .map_err(|_| EnqueueError::Transport("task name registry poisoned".to_string()))
    }

    /// Signal the delivery loop to stop. Returns without waiting for
    /// in-flight deliveries.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[tracing::instrument(skip(client, config, task), fields(task.name = %task.name, url = %task.url))]
async fn deliver_with_retry(client: &reqwest::Client, config: &LocalQueueConfig, task: HttpTask) {
    for attempt in 0..config.max_attempts {
        let start = Instant::now();
        let mut request = client.post(&task.url).body(task.body.clone());
        for (name, value) in &task.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let failure = match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(
                    attempt = attempt + 1,
                    status = response.status().as_u16(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Task delivered"
                );
                return;
            }
            Ok(response) => format!("target answered {}", response.status()),
            Err(e) => e.to_string(),
        };

        if attempt + 1 >= config.max_attempts {
            tracing::error!(
                attempts = config.max_attempts,
                error = %failure,
                "Task dropped after max attempts"
            );
            return;
        }

        let backoff_ms = compute_backoff_ms(config.backoff_ms, config.max_backoff_ms, attempt);
        tracing::warn!(
            attempt = attempt + 1,
            backoff_ms,
            error = %failure,
            "Task delivery failed, scheduling redelivery"
        );
        sleep(Duration::from_millis(backoff_ms)).await;
    }
}

#[async_trait]
impl TaskQueueGateway for LocalTaskQueue {
    async fn create_task(&self, task: HttpTask) -> EnqueueResult<TaskHandle> {
        {
            let mut seen = self.seen_names()?;
            if seen.contains(&task.name) {
                return Err(EnqueueError::AlreadyExists(task.name));
            }
            seen.put(task.name.clone(), ());
        }

        let name = task.name.clone();
        if self.sender.send(task).await.is_err() {
            // Never queued, so the name stays free for a later attempt.
            self.seen_names()?.pop(&name);
            return Err(EnqueueError::Transport(
                "local task queue is shut down".to_string(),
            ));
        }

        tracing::debug!(task.name = %name, "Task queued locally");
        Ok(TaskHandle { name })
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
