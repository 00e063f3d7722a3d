//! File store collaborator for matter attachments.
//!
//! Objects are addressed by `(bucket, path)` where `path` is a relative,
//! `/`-separated key such as `{matter_id}/{millis}-{suffix}.pdf`.

pub mod local;
pub mod rest;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::StorageError;

pub use local::LocalFileStore;
pub use rest::RestFileStore;

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store `bytes` under a new `path`, returning the stored path. An existing
    /// object is never replaced.
    async fn put(&self, bucket: &str, path: &str, bytes: Bytes) -> Result<String, StorageError>;

    async fn get(&self, bucket: &str, path: &str) -> Result<Bytes, StorageError>;

    /// Remove every listed object. Paths that do not exist are ignored.
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError>;
}

/// Build the configured file store.
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn FileStore>, StorageError> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalFileStore::new(config.local_root.clone()))),
        StorageBackend::Rest => {
            let (Some(url), Some(key)) = (&config.rest_url, &config.rest_api_key) else {
                return Err(StorageError::NotConfigured(
                    "rest storage requires STORAGE_REST_URL and STORAGE_REST_API_KEY".to_string(),
                ));
            };
            Ok(Arc::new(RestFileStore::new(url.clone(), key.clone())?))
        }
    }
}

/// Normalize an object key, rejecting anything that could escape its bucket.
pub fn normalize_object_path(raw: &str) -> Result<PathBuf, StorageError> {
    let invalid = |reason: &str| StorageError::InvalidPath {
        path: raw.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("path must not be empty"));
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(segment) => normalized.push(segment),
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("path must not contain '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("path must be relative"));
            }
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(invalid("path must name an object"));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_relative_keys() {
        let path = normalize_object_path("./abc/123.pdf").expect("valid");
        assert_eq!(path, PathBuf::from("abc/123.pdf"));
    }

    #[test]
    fn rejects_escaping_keys() {
        for raw in ["", "  ", "../etc/passwd", "a/../../b", "/abs/path", "."] {
            assert!(
                normalize_object_path(raw).is_err(),
                "{raw:?} should be rejected"
            );
        }
    }
}
