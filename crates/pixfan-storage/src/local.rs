use crate::keys::validate_key;
use crate::traits::{ObjectMetadata, ObjectStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use pixfan_core::TargetFormat;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Local filesystem bucket: `<base_path>/<bucket>/<key>`.
///
/// Only the object bytes are persisted. Content type is inferred from the key
/// extension on read and cache-control is not kept.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    bucket: String,
}

impl LocalStorage {
    /// Create a new LocalStorage bucket, creating its directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>, bucket: impl Into<String>) -> StorageResult<Self> {
        let bucket = bucket.into();
        validate_key(&bucket)?;
        let root = base_path.into().join(&bucket);

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalStorage { root, bucket })
    }

    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        let key = validate_key(key)?;
        let path = self.root.join(key);

        if path.strip_prefix(&self.root).is_err() {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn write_and_replace(tmp_path: &Path, path: &Path, data: &[u8]) -> StorageResult<()> {
        let mut file = fs::File::create(tmp_path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create file {}: {}", tmp_path.display(), e))
        })?;

        file.write_all(data).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write file {}: {}", tmp_path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync file {}: {}", tmp_path.display(), e))
        })?;
        drop(file);

        fs::rename(tmp_path, path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to replace file {}: {}", path.display(), e))
        })
    }

    fn metadata_for(key: &str) -> ObjectMetadata {
        ObjectMetadata {
            content_type: TargetFormat::from_file_name(key).map(|f| f.content_type().to_string()),
            cache_control: None,
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    async fn read(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to read file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage read successful"
        );

        Ok(Bytes::from(data))
    }

    async fn write(&self, key: &str, data: Bytes, _metadata: &ObjectMetadata) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        // Each write gets its own temp file next to the target, then renames
        // over it, so concurrent writers of one key never share a file and
        // readers see either the old object or a complete new one.
        let tmp_path = path.with_file_name(format!(
            ".{}.{}.tmp",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Uuid::new_v4()
        ));

        if let Err(e) = Self::write_and_replace(&tmp_path, &path, &data).await {
            if let Err(cleanup) = fs::remove_file(&tmp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %tmp_path.display(),
                        error = %cleanup,
                        "Failed to remove temp file after write error"
                    );
                }
            }
            return Err(e);
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(())
    }

    async fn read_stream(&self, key: &str) -> StorageResult<ObjectStream> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        let size = file.metadata().await?.len();

        let bucket = self.bucket.clone();
        let owned_key = key.to_string();
        let body = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(
                    bucket = %bucket,
                    key = %owned_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage stream read error"
                );
                StorageError::ReadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(ObjectStream {
            key: key.to_string(),
            size,
            metadata: Self::metadata_for(key),
            body: Box::pin(body),
        })
    }

    async fn check(&self) -> StorageResult<()> {
        let meta = fs::metadata(&self.root)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;
        if !meta.is_dir() {
            return Err(StorageError::BackendError(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }
}
