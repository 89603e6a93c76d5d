//! Bucket backed by `object_store`: GCS, S3 (and S3-compatible providers) or
//! an in-process memory store.

use crate::keys::validate_key;
use crate::traits::{ObjectMetadata, ObjectStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, GetOptions, GetResult, ObjectStore, PutOptions, PutPayload,
};
use std::sync::Arc;

/// A single bucket on an `object_store` backend.
#[derive(Clone)]
pub struct ObjectStoreStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    backend: StorageBackend,
}

impl ObjectStoreStorage {
    /// Wrap an existing store.
    pub fn from_store(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        backend: StorageBackend,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            backend,
        }
    }

    /// Google Cloud Storage bucket. Credentials come from the environment
    /// (`GOOGLE_APPLICATION_CREDENTIALS`, or the metadata server on GCP).
    #[cfg(feature = "storage-gcs")]
    pub fn gcs(bucket: impl Into<String>) -> StorageResult<Self> {
        use object_store::gcp::GoogleCloudStorageBuilder;

        let bucket = bucket.into();
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket.clone())
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self::from_store(Arc::new(store), bucket, StorageBackend::Gcs))
    }

    /// S3 bucket.
    ///
    /// `endpoint_url` targets S3-compatible providers
    /// (e.g. "http://localhost:9000" for MinIO).
    #[cfg(feature = "storage-s3")]
    pub fn s3(
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        use object_store::aws::AmazonS3Builder;

        let bucket = bucket.into();
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.into())
            .with_bucket_name(bucket.clone());

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self::from_store(Arc::new(store), bucket, StorageBackend::S3))
    }

    /// Empty bucket held in process memory.
    pub fn in_memory(bucket: impl Into<String>) -> Self {
        Self::from_store(
            Arc::new(object_store::memory::InMemory::new()),
            bucket,
            StorageBackend::Memory,
        )
    }

    fn location(key: &str) -> StorageResult<Path> {
        let key = validate_key(key)?;
        Path::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()))
    }

    async fn get(&self, key: &str, start: std::time::Instant) -> StorageResult<GetResult> {
        let location = Self::location(key)?;

        self.store
            .get_opts(&location, GetOptions::default())
            .await
            .map_err(|e| match e {
                ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
                other => {
                    tracing::error!(
                        error = %other,
                        bucket = %self.bucket,
                        key = %key,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Object store read failed"
                    );
                    StorageError::ReadFailed(other.to_string())
                }
            })
    }
}

fn attribute(attributes: &Attributes, key: &Attribute) -> Option<String> {
    attributes.get(key).map(|value| {
        let value: &str = value.as_ref();
        value.to_string()
    })
}

#[async_trait]
impl Storage for ObjectStoreStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }

    async fn read(&self, key: &str) -> StorageResult<Bytes> {
        let start = std::time::Instant::now();
        let result = self.get(key, start).await?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store read successful"
        );

        Ok(bytes)
    }

    async fn write(&self, key: &str, data: Bytes, metadata: &ObjectMetadata) -> StorageResult<()> {
        let location = Self::location(key)?;
        let size = data.len();
        let start = std::time::Instant::now();

        let mut attributes = Attributes::new();
        if let Some(content_type) = &metadata.content_type {
            attributes.insert(Attribute::ContentType, content_type.clone().into());
        }
        if let Some(cache_control) = &metadata.cache_control {
            attributes.insert(Attribute::CacheControl, cache_control.clone().into());
        }
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        // A plain put replaces the object and all of its attributes.
        self.store
            .put_opts(&location, PutPayload::from(data), options)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object store write failed"
                );
                StorageError::WriteFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            content_type = metadata.content_type.as_deref().unwrap_or(""),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store write successful"
        );

        Ok(())
    }

    async fn read_stream(&self, key: &str) -> StorageResult<ObjectStream> {
        let start = std::time::Instant::now();
        let result = self.get(key, start).await?;

        let metadata = ObjectMetadata {
            content_type: attribute(&result.attributes, &Attribute::ContentType),
            cache_control: attribute(&result.attributes, &Attribute::CacheControl),
        };
        let size = result.meta.size as u64;

        let bucket = self.bucket.clone();
        let owned_key = key.to_string();
        let body = result.into_stream().map(move |res| {
            res.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %owned_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object store stream read error"
                );
                StorageError::ReadFailed(e.to_string())
            })
        });

        Ok(ObjectStream {
            key: key.to_string(),
            size,
            metadata,
            body: Box::pin(body),
        })
    }

    async fn check(&self) -> StorageResult<()> {
        self.store
            .list_with_delimiter(None)
            .await
            .map(|_| ())
            .map_err(|e| StorageError::BackendError(e.to_string()))
    }
}
