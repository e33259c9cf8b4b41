use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    JwtSecret,
    LocalStorageRoot,
    TempUploadDir,
    CdnStorageEndpoint,
    CdnStorageBucket,
    CdnStorageRegion,
    CdnAccessKey,
    CdnSecretKey,
    CdnPublicBaseUrl,
    FfmpegPath,
    FfprobePath,
    TranscodeMaxLongEdge,
    TranscodeMaxShortEdge,
    TranscodeMaxFps,
    TranscodeCrf,
    TranscodePreset,
    TranscodeMaxBitrateKbps,
    TranscodeTimeoutSecs,
    StorageModeCacheTtlSecs,
    MaxUploadBytes,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::JwtSecret => "JWT_SECRET",
            EnvKey::LocalStorageRoot => "LOCAL_STORAGE_ROOT",
            EnvKey::TempUploadDir => "TEMP_UPLOAD_DIR",
            EnvKey::CdnStorageEndpoint => "CDN_STORAGE_ENDPOINT",
            EnvKey::CdnStorageBucket => "CDN_STORAGE_BUCKET",
            EnvKey::CdnStorageRegion => "CDN_STORAGE_REGION",
            EnvKey::CdnAccessKey => "CDN_ACCESS_KEY",
            EnvKey::CdnSecretKey => "CDN_SECRET_KEY",
            EnvKey::CdnPublicBaseUrl => "CDN_PUBLIC_BASE_URL",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::FfprobePath => "FFPROBE_PATH",
            EnvKey::TranscodeMaxLongEdge => "TRANSCODE_MAX_LONG_EDGE",
            EnvKey::TranscodeMaxShortEdge => "TRANSCODE_MAX_SHORT_EDGE",
            EnvKey::TranscodeMaxFps => "TRANSCODE_MAX_FPS",
            EnvKey::TranscodeCrf => "TRANSCODE_CRF",
            EnvKey::TranscodePreset => "TRANSCODE_PRESET",
            EnvKey::TranscodeMaxBitrateKbps => "TRANSCODE_MAX_BITRATE_KBPS",
            EnvKey::TranscodeTimeoutSecs => "TRANSCODE_TIMEOUT_SECS",
            EnvKey::StorageModeCacheTtlSecs => "STORAGE_MODE_CACHE_TTL_SECS",
            EnvKey::MaxUploadBytes => "MAX_UPLOAD_BYTES",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

/// Unset and blank values are both treated as absent.
pub fn get_optional(key: EnvKey) -> Option<String> {
    env::var(key.as_str())
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
