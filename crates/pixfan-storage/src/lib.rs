//! Pixfan Storage Library
//!
//! Bucket abstraction used by the conversion service: one [`Storage`] value
//! per bucket (source and destination), with backends for Google Cloud
//! Storage, S3, the local filesystem and process memory.
//!
//! # Storage key format
//!
//! Keys are object names relative to their bucket, e.g. `photo1` or
//! `renders/out1.webp`. Keys must not be empty, start with `/`, or contain
//! `.`/`..`/empty segments; every backend validates them through the
//! `keys` module.
//!
//! # Overwrite contract
//!
//! [`Storage::write`] always replaces the whole object. Conversion tasks are
//! delivered at least once and rely on this to make redelivery harmless.

#[cfg(any(
    feature = "storage-gcs",
    feature = "storage-s3",
    feature = "storage-memory"
))]
pub mod cloud;
pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod traits;

// Re-export commonly used types
#[cfg(any(
    feature = "storage-gcs",
    feature = "storage-s3",
    feature = "storage-memory"
))]
pub use cloud::ObjectStoreStorage;
pub use factory::{create_storage, BucketRole};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use pixfan_core::StorageBackend;
pub use traits::{
    ByteStream, ObjectMetadata, ObjectStream, Storage, StorageError, StorageResult,
};
