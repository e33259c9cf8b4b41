use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{config::BehaviorVersion, config::Credentials, config::Region, Client};
use std::path::Path;
use tracing::info;

use super::{object_key, validate_key, ObjectStore, StorageBackend, StorageError, StorageResult};
use crate::config::settings::CdnConfig;

/// CDN-backed store reached through an S3-compatible storage API.
///
/// Objects are written with authenticated PUTs against `endpoint/bucket` and
/// served from `public_base_url/<key>`.
#[derive(Clone)]
pub struct RemoteStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl RemoteStore {
    pub fn new(cdn: &CdnConfig) -> Self {
        let credentials = Credentials::new(&cdn.access_key, &cdn.secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(cdn.region.clone()))
            .endpoint_url(&cdn.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(config);

        info!(endpoint = %cdn.endpoint, bucket = %cdn.bucket, "✅ CDN storage client configured");

        Self {
            client,
            bucket: cdn.bucket.clone(),
            public_base_url: cdn.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Recover the object key from a public URL or accept a bare key.
    fn key_from_url<'a>(&self, url_or_key: &'a str) -> StorageResult<&'a str> {
        let key = match url_or_key.strip_prefix(self.public_base_url.as_str()) {
            Some(rest) => rest.trim_start_matches('/'),
            None if url_or_key.contains("://") => {
                return Err(StorageError::InvalidKey(format!(
                    "{url_or_key} is not served from {}",
                    self.public_base_url
                )));
            }
            None => url_or_key,
        };
        validate_key(key)?;
        Ok(key)
    }
}

#[async_trait]
impl ObjectStore for RemoteStore {
    async fn put(&self, local_path: &Path, folder: &str) -> StorageResult<String> {
        let key = object_key(local_path, folder)?;
        let content_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();
        let start = std::time::Instant::now();

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to read {}: {}", local_path.display(), e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(&content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("PUT {} failed: {}", key, e)))?;

        info!(
            key = %key,
            content_type = %content_type,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "☁️ CDN upload successful"
        );

        Ok(self.public_url(&key))
    }

    async fn delete(&self, url_or_path: &str) -> StorageResult<()> {
        let key = self.key_from_url(url_or_path)?;

        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => {
                info!(key = %key, "CDN delete successful");
                Ok(())
            }
            Err(e) if e.raw_response().map(|r| r.status().as_u16()) == Some(404) => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!("DELETE {} failed: {}", key, e))),
        }
    }

    fn is_owned_url(&self, url: &str) -> bool {
        url.strip_prefix(self.public_base_url.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Remote
    }
}
