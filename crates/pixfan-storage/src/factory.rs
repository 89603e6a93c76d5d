#[cfg(any(
    feature = "storage-gcs",
    feature = "storage-s3",
    feature = "storage-memory"
))]
use crate::ObjectStoreStorage;
#[cfg(feature = "storage-local")]
use crate::LocalStorage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use pixfan_core::StorageConfig;
use std::sync::Arc;

/// Which configured bucket to open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketRole {
    Source,
    Destination,
}

/// Open the source or destination bucket described by `config`.
pub async fn create_storage(
    config: &StorageConfig,
    role: BucketRole,
) -> StorageResult<Arc<dyn Storage>> {
    let bucket = match role {
        BucketRole::Source => config.source_bucket.clone(),
        BucketRole::Destination => config.destination_bucket.clone(),
    };

    match config.backend {
        #[cfg(feature = "storage-gcs")]
        StorageBackend::Gcs => Ok(Arc::new(ObjectStoreStorage::gcs(bucket)?)),

        #[cfg(not(feature = "storage-gcs"))]
        StorageBackend::Gcs => Err(StorageError::ConfigError(
            "GCS storage backend not available (storage-gcs feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let region = config.s3_region.clone().ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let storage = ObjectStoreStorage::s3(bucket, region, config.s3_endpoint.clone())?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            Ok(Arc::new(LocalStorage::new(base_path, bucket).await?))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-memory")]
        StorageBackend::Memory => Ok(Arc::new(ObjectStoreStorage::in_memory(bucket))),

        #[cfg(not(feature = "storage-memory"))]
        StorageBackend::Memory => Err(StorageError::ConfigError(
            "Memory storage backend not available (storage-memory feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local", feature = "storage-memory"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn storage_config(backend: StorageBackend, path: Option<String>) -> StorageConfig {
        StorageConfig {
            backend,
            source_bucket: "uploads".to_string(),
            destination_bucket: "derived".to_string(),
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: path,
        }
    }

    #[tokio::test]
    async fn opens_each_bucket_by_role() {
        let dir = tempdir().unwrap();
        let config = storage_config(
            StorageBackend::Local,
            Some(dir.path().to_string_lossy().into_owned()),
        );

        let source = create_storage(&config, BucketRole::Source).await.unwrap();
        let destination = create_storage(&config, BucketRole::Destination)
            .await
            .unwrap();

        assert_eq!(source.bucket(), "uploads");
        assert_eq!(destination.bucket(), "derived");
        assert!(dir.path().join("derived").is_dir());
    }

    #[tokio::test]
    async fn memory_backend_needs_no_settings() {
        let config = storage_config(StorageBackend::Memory, None);
        let storage = create_storage(&config, BucketRole::Destination)
            .await
            .unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Memory);
    }

    #[tokio::test]
    async fn local_backend_without_path_is_config_error() {
        let config = storage_config(StorageBackend::Local, None);
        assert!(matches!(
            create_storage(&config, BucketRole::Source).await,
            Err(StorageError::ConfigError(_))
        ));
    }
}
