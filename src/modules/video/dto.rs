use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use super::model::{CompressionStatus, VideoRecord};
use crate::infrastructure::storage::{StorageBackend, StoredAsset};

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadAcceptedResponse {
    pub video_id: Uuid,
    pub status: CompressionStatus,
    /// 1-based position among jobs waiting for the worker.
    pub queue_position: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThumbnailResponse {
    pub video_id: Uuid,
    pub thumbnail_url: String,
    pub storage_backend: StorageBackend,
}

impl ThumbnailResponse {
    pub fn new(video_id: Uuid, asset: StoredAsset) -> Self {
        Self {
            video_id,
            thumbnail_url: asset.url,
            storage_backend: asset.backend,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompressionStatusResponse {
    pub video_id: Uuid,
    pub status: CompressionStatus,
    pub original_size_bytes: Option<u64>,
    pub compressed_size_bytes: Option<u64>,
    pub savings_percent: Option<f64>,
    pub final_url: Option<String>,
    pub storage_backend: Option<StorageBackend>,
    pub thumbnail_url: Option<String>,
    #[schema(value_type = String, format = DateTime)]
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Percent of the original size saved, rounded to two decimals.
pub fn savings_percent(original: Option<u64>, compressed: Option<u64>) -> Option<f64> {
    let (original, compressed) = (original?, compressed?);
    if original == 0 {
        return None;
    }
    let pct = (1.0 - compressed as f64 / original as f64) * 100.0;
    Some((pct * 100.0).round() / 100.0)
}

impl From<VideoRecord> for CompressionStatusResponse {
    fn from(r: VideoRecord) -> Self {
        Self {
            video_id: r.id,
            status: r.status,
            original_size_bytes: r.original_size_bytes,
            compressed_size_bytes: r.compressed_size_bytes,
            savings_percent: savings_percent(r.original_size_bytes, r.compressed_size_bytes),
            final_url: r.final_url,
            storage_backend: r.storage_backend,
            thumbnail_url: r.thumbnail_url,
            updated_at: r.updated_at,
        }
    }
}
