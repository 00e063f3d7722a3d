use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;
use crate::storage::{FileStore, normalize_object_path};

/// File store rooted at a local directory; each bucket is a subdirectory.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf, StorageError> {
        let bucket_dir = normalize_object_path(bucket)?;
        if bucket_dir.components().count() != 1 {
            return Err(StorageError::InvalidPath {
                path: bucket.to_string(),
                reason: "bucket must be a single path segment".to_string(),
            });
        }
        Ok(self.root.join(bucket_dir).join(normalize_object_path(path)?))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, bucket: &str, path: &str, bytes: Bytes) -> Result<String, StorageError> {
        let target = self.resolve(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Objects are immutable once written.
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists {
                    bucket: bucket.to_string(),
                    path: path.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&bytes).await?;
        file.flush().await?;
        tracing::debug!(bucket, path, size = bytes.len(), "stored object");
        Ok(path.to_string())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Bytes, StorageError> {
        let target = self.resolve(bucket, path)?;
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError> {
        for path in paths {
            let target = self.resolve(bucket, path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => tracing::debug!(bucket, path = %path, "removed object"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
