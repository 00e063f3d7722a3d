//! Remote object storage reached at `{base}/storage/v1/object/...`.

use async_trait::async_trait;
use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::StorageError;
use crate::storage::{FileStore, normalize_object_path};

pub struct RestFileStore {
    client: reqwest::Client,
    base: Url,
    api_key: SecretString,
}

impl RestFileStore {
    pub fn new(base: Url, api_key: SecretString) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base,
            api_key,
        })
    }

    fn object_url(&self, bucket: &str, path: Option<&str>) -> Result<Url, StorageError> {
        let mut rel = format!("storage/v1/object/{}", urlencoding::encode(bucket));
        if let Some(path) = path {
            let normalized = normalize_object_path(path)?;
            for segment in normalized.iter() {
                rel.push('/');
                rel.push_str(&urlencoding::encode(&segment.to_string_lossy()));
            }
        }
        self.base
            .join(&rel)
            .map_err(|e| StorageError::InvalidPath {
                path: rel.clone(),
                reason: e.to_string(),
            })
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(self.api_key.expose_secret())
    }
}

async fn check(
    resp: reqwest::Response,
    bucket: &str,
    path: &str,
) -> Result<reqwest::Response, StorageError> {
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound {
            bucket: bucket.to_string(),
            path: path.to_string(),
        });
    }
    if status == reqwest::StatusCode::CONFLICT {
        return Err(StorageError::AlreadyExists {
            bucket: bucket.to_string(),
            path: path.to_string(),
        });
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(StorageError::Remote {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

#[async_trait]
impl FileStore for RestFileStore {
    async fn put(&self, bucket: &str, path: &str, bytes: Bytes) -> Result<String, StorageError> {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let resp = self
            .request(reqwest::Method::POST, self.object_url(bucket, Some(path))?)
            .header(reqwest::header::CONTENT_TYPE, mime.essence_str())
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        check(resp, bucket, path).await?;
        tracing::debug!(bucket, path, "uploaded object");
        Ok(path.to_string())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Bytes, StorageError> {
        let resp = self
            .request(reqwest::Method::GET, self.object_url(bucket, Some(path))?)
            .send()
            .await?;
        Ok(check(resp, bucket, path).await?.bytes().await?)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError> {
        if paths.is_empty() {
            return Ok(());
        }
        for path in paths {
            normalize_object_path(path)?;
        }
        let resp = self
            .request(reqwest::Method::DELETE, self.object_url(bucket, None)?)
            .json(&serde_json::json!({ "prefixes": paths }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        tracing::debug!(bucket, count = paths.len(), "removed objects");
        Ok(())
    }
}
