//! Application state shared by every handler.

use pixfan_core::Config;
use pixfan_processing::{ImageEncoder, Transcoder};
use pixfan_storage::Storage;
use pixfan_tasks::{FanOutDispatcher, LocalTaskQueue};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Bucket uploads land in; conversion tasks read from here
    pub source: Arc<dyn Storage>,
    /// Bucket derived images are written to and served from
    pub destination: Arc<dyn Storage>,
    pub transcoder: Arc<dyn Transcoder>,
    /// Encoder for on-the-fly resizes on `/images`
    pub encoder: ImageEncoder,
    /// `None` in conversion-only deployments
    pub dispatcher: Option<Arc<FanOutDispatcher>>,
    /// Set when tasks are delivered in-process, so shutdown can stop it
    pub local_queue: Option<Arc<LocalTaskQueue>>,
}

impl AppState {
    pub async fn shutdown(&self) {
        if let Some(queue) = &self.local_queue {
            queue.shutdown().await;
        }
    }
}
