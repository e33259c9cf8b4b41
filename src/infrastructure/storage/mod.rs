//! Object storage for finalized media.
//!
//! Two backends implement [`ObjectStore`]: [`s3::RemoteStore`] (S3 API behind a
//! CDN) and [`local::LocalStore`] (a statically served directory). Which one is
//! active is decided per upload by the storage mode registry; which one *owns*
//! an already stored asset is recorded next to its URL as a [`StorageBackend`].

pub mod local;
pub mod s3;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend not configured: {0}")]
    NotConfigured(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Remote,
    Local,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Remote => "remote",
            StorageBackend::Local => "local",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(StorageBackend::Remote),
            "local" => Ok(StorageBackend::Local),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

/// A stored file together with the backend that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredAsset {
    pub backend: StorageBackend,
    pub url: String,
}

/// Uniform operations over a storage backend.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the file at `local_path` under `folder` and return its public URL.
    async fn put(&self, local_path: &Path, folder: &str) -> StorageResult<String>;

    /// Remove the object addressed by a URL previously returned from `put`, or
    /// by its backend-relative key. Missing objects are not an error.
    async fn delete(&self, url_or_path: &str) -> StorageResult<()>;

    fn is_owned_url(&self, url: &str) -> bool;

    fn backend(&self) -> StorageBackend;
}

/// Rejects keys that could escape the backend's namespace.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty key".to_string()));
    }
    if key.starts_with('/') || key.contains('\\') || key.split('/').any(|seg| seg == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub(crate) fn object_key(local_path: &Path, folder: &str) -> StorageResult<String> {
    let file_name = local_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::InvalidKey(local_path.display().to_string()))?;
    let folder = folder.trim_matches('/');
    let key = if folder.is_empty() {
        file_name.to_string()
    } else {
        format!("{folder}/{file_name}")
    };
    validate_key(&key)?;
    Ok(key)
}

/// The configured backends. The local store always exists; the remote one only
/// when CDN credentials are present.
#[derive(Clone)]
pub struct StorageBackends {
    pub local: Arc<dyn ObjectStore>,
    pub remote: Option<Arc<dyn ObjectStore>>,
}

impl StorageBackends {
    pub fn new(local: Arc<dyn ObjectStore>, remote: Option<Arc<dyn ObjectStore>>) -> Self {
        Self { local, remote }
    }

    pub fn remote_configured(&self) -> bool {
        self.remote.is_some()
    }

    pub fn get(&self, backend: StorageBackend) -> Option<&Arc<dyn ObjectStore>> {
        match backend {
            StorageBackend::Remote => self.remote.as_ref(),
            StorageBackend::Local => Some(&self.local),
        }
    }

    pub fn for_asset(&self, asset: &StoredAsset) -> Option<&Arc<dyn ObjectStore>> {
        self.get(asset.backend)
    }

    /// Upload through the remote backend when requested and available, falling
    /// back to the local backend if the remote put fails.
    pub async fn put_with_fallback(
        &self,
        use_remote: bool,
        local_path: &Path,
        folder: &str,
    ) -> StorageResult<StoredAsset> {
        if use_remote {
            if let Some(remote) = &self.remote {
                match remote.put(local_path, folder).await {
                    Ok(url) => {
                        return Ok(StoredAsset {
                            backend: remote.backend(),
                            url,
                        });
                    }
                    Err(e) => {
                        warn!(
                            path = %local_path.display(),
                            error = %e,
                            "Remote upload failed, falling back to local storage"
                        );
                    }
                }
            }
        }

        let url = self.local.put(local_path, folder).await?;
        Ok(StoredAsset {
            backend: self.local.backend(),
            url,
        })
    }

    /// Resolve the owner of a URL persisted without a backend tag.
    pub fn legacy_owner(&self, url: &str) -> Option<StorageBackend> {
        if let Some(remote) = &self.remote {
            if remote.is_owned_url(url) {
                return Some(StorageBackend::Remote);
            }
        }
        if self.local.is_owned_url(url) {
            return Some(StorageBackend::Local);
        }
        None
    }

    /// Pair a persisted URL with its backend, consulting the legacy prefix
    /// matcher only when no tag was stored.
    pub fn resolve(&self, url: Option<&str>, tag: Option<StorageBackend>) -> Option<StoredAsset> {
        let url = url?;
        let backend = tag.or_else(|| self.legacy_owner(url))?;
        Some(StoredAsset {
            backend,
            url: url.to_string(),
        })
    }

    /// Best-effort removal: failures are logged and swallowed.
    pub async fn delete_asset(&self, asset: &StoredAsset) {
        let Some(store) = self.for_asset(asset) else {
            warn!(url = %asset.url, backend = %asset.backend, "No backend available to delete asset");
            return;
        };

        match store.delete(&asset.url).await {
            Ok(()) => info!(url = %asset.url, backend = %asset.backend, "🗑️ Deleted stored asset"),
            Err(e) => warn!(url = %asset.url, backend = %asset.backend, error = %e, "Failed to delete stored asset"),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::local::LocalStore;
    use super::testing::FakeRemoteStore;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn validate_key_rejects_traversal() {
        assert!(validate_key("videos/a.mp4").is_ok());
        assert!(matches!(validate_key("../etc/passwd"), Err(StorageError::InvalidKey(_))));
        assert!(matches!(validate_key("videos/../../x"), Err(StorageError::InvalidKey(_))));
        assert!(matches!(validate_key("/abs"), Err(StorageError::InvalidKey(_))));
        assert!(matches!(validate_key(""), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn backend_round_trips_through_str() {
        assert_eq!("remote".parse::<StorageBackend>(), Ok(StorageBackend::Remote));
        assert_eq!("local".parse::<StorageBackend>(), Ok(StorageBackend::Local));
        assert!("cdn".parse::<StorageBackend>().is_err());
    }

    #[tokio::test]
    async fn put_with_fallback_uses_local_when_remote_fails() {
        let dir = tempdir().unwrap();
        let local = LocalStore::new(dir.path().join("public")).await.unwrap();
        let remote = Arc::new(FakeRemoteStore::new(true));
        let backends = StorageBackends::new(Arc::new(local), Some(remote));

        let src = dir.path().join("clip.mp4");
        tokio::fs::write(&src, b"bytes").await.unwrap();

        let asset = backends.put_with_fallback(true, &src, "videos").await.unwrap();
        assert_eq!(asset.backend, StorageBackend::Local);
        assert_eq!(asset.url, "/videos/clip.mp4");
        assert!(dir.path().join("public/videos/clip.mp4").exists());
    }

    #[tokio::test]
    async fn put_with_fallback_prefers_remote() {
        let dir = tempdir().unwrap();
        let local = LocalStore::new(dir.path().join("public")).await.unwrap();
        let remote = Arc::new(FakeRemoteStore::new(false));
        let backends = StorageBackends::new(Arc::new(local), Some(remote.clone()));

        let src = dir.path().join("clip.mp4");
        tokio::fs::write(&src, b"bytes").await.unwrap();

        let asset = backends.put_with_fallback(true, &src, "videos").await.unwrap();
        assert_eq!(asset.backend, StorageBackend::Remote);
        assert_eq!(asset.url, "https://cdn.example.net/videos/clip.mp4");
        assert_eq!(remote.puts.lock().unwrap().len(), 1);
        // the local copy is left for the caller to clean up
        assert!(src.exists());
    }

    #[tokio::test]
    async fn legacy_owner_matches_by_prefix() {
        let dir = tempdir().unwrap();
        let local = LocalStore::new(dir.path()).await.unwrap();
        let backends = StorageBackends::new(
            Arc::new(local),
            Some(Arc::new(FakeRemoteStore::new(false))),
        );

        assert_eq!(
            backends.legacy_owner("https://cdn.example.net/videos/a.mp4"),
            Some(StorageBackend::Remote)
        );
        assert_eq!(backends.legacy_owner("/videos/a.mp4"), Some(StorageBackend::Local));
        assert_eq!(backends.legacy_owner("https://elsewhere.example.com/a.mp4"), None);
    }

    #[tokio::test]
    async fn resolve_prefers_stored_tag() {
        let dir = tempdir().unwrap();
        let local = LocalStore::new(dir.path()).await.unwrap();
        let backends = StorageBackends::new(Arc::new(local), None);

        // tagged rows are trusted even when no matcher would claim the URL
        let tagged = backends.resolve(Some("https://cdn.example.net/videos/a.mp4"), Some(StorageBackend::Remote));
        assert_eq!(tagged.map(|a| a.backend), Some(StorageBackend::Remote));

        let legacy = backends.resolve(Some("/videos/a.mp4"), None);
        assert_eq!(legacy.map(|a| a.backend), Some(StorageBackend::Local));

        assert_eq!(backends.resolve(None, Some(StorageBackend::Local)), None);
    }

    #[tokio::test]
    async fn delete_asset_twice_is_harmless() {
        let dir = tempdir().unwrap();
        let local = LocalStore::new(dir.path().join("public")).await.unwrap();
        let backends = StorageBackends::new(Arc::new(local), None);

        let src = dir.path().join("gone.mp4");
        tokio::fs::write(&src, b"x").await.unwrap();
        let asset = backends.put_with_fallback(false, &src, "videos").await.unwrap();

        backends.delete_asset(&asset).await;
        backends.delete_asset(&asset).await;
        assert!(!dir.path().join("public/videos/gone.mp4").exists());

        // remote-tagged asset without a remote backend is skipped, not a panic
        backends
            .delete_asset(&StoredAsset {
                backend: StorageBackend::Remote,
                url: "https://cdn.example.net/videos/gone.mp4".to_string(),
            })
            .await;
    }
}
