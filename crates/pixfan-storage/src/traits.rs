//! Storage abstraction trait
//!
//! This module defines the Storage trait that every bucket backend implements.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked object body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// HTTP-facing metadata stored alongside an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
}

impl ObjectMetadata {
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            cache_control: None,
        }
    }

    pub fn cache_control(mut self, cache_control: Option<String>) -> Self {
        self.cache_control = cache_control;
        self
    }
}

/// An object opened for streaming.
pub struct ObjectStream {
    pub key: String,
    pub size: u64,
    pub metadata: ObjectMetadata,
    pub body: ByteStream,
}

/// A single bucket.
///
/// The conversion flow holds two of these (source and destination). Keys are
/// plain object names relative to the bucket; they must not be empty, start
/// with `/`, or contain `..` segments.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Bucket name, for logs
    fn bucket(&self) -> &str;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Read the whole object at `key`.
    async fn read(&self, key: &str) -> StorageResult<Bytes>;

    /// Write `data` at `key`.
    ///
    /// Always a full overwrite: after success the object is exactly `data`
    /// with exactly `metadata`, whatever was stored there before. Writing the
    /// same bytes twice leaves the same object as writing them once, which is
    /// what makes redelivered conversion tasks harmless.
    async fn write(&self, key: &str, data: Bytes, metadata: &ObjectMetadata) -> StorageResult<()>;

    /// Open the object at `key` as a stream of chunks, with its metadata.
    async fn read_stream(&self, key: &str) -> StorageResult<ObjectStream>;

    /// Cheap reachability probe used by readiness checks.
    async fn check(&self) -> StorageResult<()>;
}
