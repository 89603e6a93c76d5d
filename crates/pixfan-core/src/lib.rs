//! Pixfan Core Library
//!
//! Configuration, error types and the domain models (upload events, target
//! formats, conversion payloads) shared by every pixfan crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    CloudTasksConfig, Config, ConfigError, DispatchConfig, LocalQueueConfig, LogFormat,
    StorageConfig, TaskQueueBackend,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{ConversionPayload, EventError, ObjectFinalizedEvent, TargetFormat, UploadEvent};
pub use storage_types::StorageBackend;
