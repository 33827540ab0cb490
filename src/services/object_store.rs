//! Object storage for captured screenshots.
//!
//! Two backends: a directory on local disk served from a public base URL,
//! and a hosted bucket behind a storage REST API.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid object path: {0}")]
    InvalidPath(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Storage service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid storage URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Storage is not configured: {0}")]
    NotConfigured(&'static str),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under the slash-separated object `path`.
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str)
        -> Result<(), StorageError>;

    /// Public URL an uploaded object is served from.
    fn public_url(&self, path: &str) -> Result<String, StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory for the local backend. Defaults to `storage/` under
    /// the data directory.
    #[serde(default)]
    pub dir: Option<String>,
    /// Base URL objects are served from (local backend), or the storage
    /// service base URL (http backend).
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Service key for the http backend.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_public_url() -> String {
    "http://127.0.0.1:3040/storage/".to_string()
}
fn default_bucket() -> String {
    "content-captures".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            dir: None,
            public_url: default_public_url(),
            bucket: default_bucket(),
            api_key: None,
        }
    }
}

impl StorageConfig {
    /// Root directory of the local backend.
    pub fn local_dir(&self, data_dir: &Path) -> PathBuf {
        match self.dir.as_deref().filter(|d| !d.is_empty()) {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).as_ref()),
            None => data_dir.join("storage"),
        }
    }
}

/// Build the configured backend.
pub fn build_object_store(
    config: &StorageConfig,
    data_dir: &Path,
) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalObjectStore::new(
            config.local_dir(data_dir),
            &config.public_url,
        )?)),
        StorageBackend::Http => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or(StorageError::NotConfigured("storage.api_key"))?;
            Ok(Arc::new(HttpObjectStore::new(
                &config.public_url,
                &config.bucket,
                api_key,
            )?))
        }
    }
}

/// Reject empty, absolute, and parent-escaping object paths.
fn validate_object_path(path: &str) -> Result<(), StorageError> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || Path::new(path)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if invalid {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Parse a base URL so that `join` appends to it rather than replacing
/// its last segment.
fn base_url(raw: &str) -> Result<Url, StorageError> {
    if raw.ends_with('/') {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("{}/", raw))?)
    }
}

/// Objects as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base: Url,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Result<Self, StorageError> {
        Ok(Self {
            root: root.into(),
            public_base: base_url(public_base)?,
        })
    }

    /// On-disk location of an object.
    pub fn object_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        validate_object_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let target = self.object_path(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        debug!(
            "Stored {} ({} bytes, {}) at {}",
            path,
            bytes.len(),
            content_type,
            target.display()
        );
        Ok(())
    }

    fn public_url(&self, path: &str) -> Result<String, StorageError> {
        validate_object_path(path)?;
        Ok(self.public_base.join(path)?.to_string())
    }
}

/// Hosted bucket behind a storage REST API:
/// `POST {base}/storage/v1/object/{bucket}/{path}` to upload, and
/// `{base}/storage/v1/object/public/{bucket}/{path}` to serve.
pub struct HttpObjectStore {
    client: Client,
    base: Url,
    bucket: String,
    api_key: String,
}

impl HttpObjectStore {
    pub fn new(base: &str, bucket: &str, api_key: String) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base: base_url(base)?,
            bucket: bucket.to_string(),
            api_key,
        })
    }

    fn object_url(&self, prefix: &str, path: &str) -> Result<Url, StorageError> {
        validate_object_path(path)?;
        Ok(self
            .base
            .join(&format!("{}/{}/{}", prefix, self.bucket, path))?)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = self.object_url("storage/v1/object", path)?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> Result<String, StorageError> {
        Ok(self
            .object_url("storage/v1/object/public", path)?
            .to_string())
    }
}
