use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use super::{object_key, validate_key, ObjectStore, StorageBackend, StorageError, StorageResult};

/// Filesystem backend rooted at a statically served directory.
///
/// URLs are root-relative (`/videos/<file>`); the host is resolved by whoever
/// renders them for a request.
#[derive(Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::NotConfigured(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self { root })
    }

    fn key_from_url<'a>(&self, url_or_path: &'a str) -> &'a str {
        url_or_path.trim_start_matches('/')
    }

    /// Rename, or copy and remove when the source is on another filesystem.
    async fn move_file(from: &Path, to: &Path) -> StorageResult<()> {
        if fs::rename(from, to).await.is_ok() {
            return Ok(());
        }

        fs::copy(from, to).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to copy {} to {}: {}",
                from.display(),
                to.display(),
                e
            ))
        })?;
        if let Err(e) = fs::remove_file(from).await {
            debug!(path = %from.display(), error = %e, "Could not remove source after copy");
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, local_path: &Path, folder: &str) -> StorageResult<String> {
        let key = object_key(local_path, folder)?;
        let dest = self.root.join(&key);
        let start = std::time::Instant::now();

        if !fs::try_exists(local_path).await.unwrap_or(false) {
            return Err(StorageError::UploadFailed(format!(
                "Source file {} does not exist",
                local_path.display()
            )));
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        if dest != local_path {
            Self::move_file(local_path, &dest).await?;
        }

        let url = format!("/{key}");

        info!(
            path = %dest.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(url)
    }

    async fn delete(&self, url_or_path: &str) -> StorageResult<()> {
        let key = self.key_from_url(url_or_path);
        validate_key(key)?;
        let path = self.root.join(key);

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        info!(path = %path.display(), key = %key, "Local storage delete successful");
        Ok(())
    }

    fn is_owned_url(&self, url: &str) -> bool {
        url.starts_with('/') && !url.starts_with("//")
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
