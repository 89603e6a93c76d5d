//! Pixfan Tasks Library
//!
//! One upload event becomes one queued HTTP task per target format. This
//! crate owns that fan-out ([`FanOutDispatcher`]) and the queues it can
//! target: Google Cloud Tasks over REST ([`CloudTasksGateway`]) and an
//! in-process queue that delivers over HTTP ([`LocalTaskQueue`]).
//!
//! Queues deliver at least once. Nothing here deduplicates deliveries; the
//! conversion endpoint is safe to repeat because destination writes are full
//! overwrites.

pub mod cloud_tasks;
pub mod dispatch;
pub mod factory;
pub mod gateway;
pub mod local;

pub use cloud_tasks::{CloudTasksGateway, MetadataServerToken, StaticToken, TokenSource};
pub use dispatch::{DispatchError, DispatchReport, DispatchSettings, DispatchedTask, FanOutDispatcher};
pub use factory::cloud_tasks_gateway;
pub use gateway::{
    EnqueueError, EnqueueResult, HttpTask, OidcToken, QueuePath, TaskHandle, TaskQueueGateway,
};
pub use local::LocalTaskQueue;
