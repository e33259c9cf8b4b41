use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::config::env::{self, EnvKey};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Credentials and addressing for the CDN-backed object store.
#[derive(Clone, Debug, Deserialize)]
pub struct CdnConfig {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub public_base_url: String,
}

impl CdnConfig {
    /// Returns `Ok(None)` unless every credential is present. A partial set is
    /// logged and treated as unconfigured so ingestion keeps working locally.
    pub fn from_parts(
        endpoint: Option<String>,
        bucket: Option<String>,
        region: String,
        access_key: Option<String>,
        secret_key: Option<String>,
        public_base_url: Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        let present = [&endpoint, &bucket, &access_key, &secret_key, &public_base_url]
            .iter()
            .filter(|v| v.is_some())
            .count();

        let (Some(endpoint), Some(bucket), Some(access_key), Some(secret_key), Some(base)) =
            (endpoint, bucket, access_key, secret_key, public_base_url)
        else {
            if present > 0 {
                warn!("CDN storage is partially configured ({present}/5 values set), remote uploads disabled");
            }
            return Ok(None);
        };

        let parsed = Url::parse(&base).map_err(|e| ConfigError::Invalid {
            key: EnvKey::CdnPublicBaseUrl.as_str(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(ConfigError::Invalid {
                key: EnvKey::CdnPublicBaseUrl.as_str(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        Ok(Some(Self {
            endpoint,
            bucket,
            region,
            access_key,
            secret_key,
            public_base_url: base.trim_end_matches('/').to_string(),
        }))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TranscodeConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub max_long_edge: u32,
    pub max_short_edge: u32,
    pub max_fps: f64,
    pub crf: u8,
    pub preset: String,
    pub max_bitrate_kbps: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub local_storage_root: PathBuf,
    pub temp_upload_dir: PathBuf,
    pub cdn: Option<CdnConfig>,
    pub transcode: TranscodeConfig,
    pub storage_mode_cache_ttl_secs: u64,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let database_url =
            env::get(EnvKey::DatabaseUrl).map_err(|_| ConfigError::Missing(EnvKey::DatabaseUrl.as_str()))?;
        let jwt_secret =
            env::get(EnvKey::JwtSecret).map_err(|_| ConfigError::Missing(EnvKey::JwtSecret.as_str()))?;

        let local_storage_root = PathBuf::from(env::get_or(EnvKey::LocalStorageRoot, "./storage"));
        let temp_upload_dir = env::get_optional(EnvKey::TempUploadDir)
            .map(PathBuf::from)
            .unwrap_or_else(|| local_storage_root.join("temp"));

        let cdn = CdnConfig::from_parts(
            env::get_optional(EnvKey::CdnStorageEndpoint),
            env::get_optional(EnvKey::CdnStorageBucket),
            env::get_or(EnvKey::CdnStorageRegion, "us-east-1"),
            env::get_optional(EnvKey::CdnAccessKey),
            env::get_optional(EnvKey::CdnSecretKey),
            env::get_optional(EnvKey::CdnPublicBaseUrl),
        )?;

        let transcode = TranscodeConfig {
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg"),
            ffprobe_path: env::get_or(EnvKey::FfprobePath, "ffprobe"),
            max_long_edge: env::get_parsed(EnvKey::TranscodeMaxLongEdge, 1920),
            max_short_edge: env::get_parsed(EnvKey::TranscodeMaxShortEdge, 1080),
            max_fps: env::get_parsed(EnvKey::TranscodeMaxFps, 30.0),
            crf: env::get_parsed(EnvKey::TranscodeCrf, 28),
            preset: env::get_or(EnvKey::TranscodePreset, "medium"),
            max_bitrate_kbps: env::get_parsed(EnvKey::TranscodeMaxBitrateKbps, 2500),
            timeout_secs: env::get_parsed(EnvKey::TranscodeTimeoutSecs, 900),
        };

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url,
            jwt_secret,
            local_storage_root,
            temp_upload_dir,
            cdn,
            transcode,
            storage_mode_cache_ttl_secs: env::get_parsed(EnvKey::StorageModeCacheTtlSecs, 60),
            max_upload_bytes: env::get_parsed(EnvKey::MaxUploadBytes, 500 * 1024 * 1024),
        })
    }
}
