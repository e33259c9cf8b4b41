use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::infrastructure::storage::StorageBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CompressionStatus {
    Pending,
    Processing,
    Completed,
    Skipped,
    Error,
}

impl CompressionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionStatus::Pending => "pending",
            CompressionStatus::Processing => "processing",
            CompressionStatus::Completed => "completed",
            CompressionStatus::Skipped => "skipped",
            CompressionStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CompressionStatus::Completed | CompressionStatus::Skipped | CompressionStatus::Error
        )
    }
}

impl fmt::Display for CompressionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CompressionStatus::Pending),
            "processing" => Ok(CompressionStatus::Processing),
            "completed" => Ok(CompressionStatus::Completed),
            "skipped" => Ok(CompressionStatus::Skipped),
            "error" => Ok(CompressionStatus::Error),
            other => Err(format!("unknown compression status '{other}'")),
        }
    }
}

/// Row as stored in `videos`.
#[derive(Debug, Clone, FromRow)]
pub struct VideoRow {
    pub id: Uuid,
    pub source_filename: Option<String>,
    pub compression_status: String,
    pub final_url: Option<String>,
    pub storage_backend: Option<String>,
    pub original_size_bytes: Option<i64>,
    pub compressed_size_bytes: Option<i64>,
    pub thumbnail_url: Option<String>,
    pub thumbnail_backend: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Compression state of one video entity.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct VideoRecord {
    pub id: Uuid,
    pub source_filename: Option<String>,
    pub status: CompressionStatus,
    pub final_url: Option<String>,
    /// `None` for rows written before the backend was recorded.
    pub storage_backend: Option<StorageBackend>,
    pub original_size_bytes: Option<u64>,
    pub compressed_size_bytes: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub thumbnail_backend: Option<StorageBackend>,
    #[schema(value_type = String, format = DateTime)]
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<VideoRow> for VideoRecord {
    fn from(row: VideoRow) -> Self {
        Self {
            id: row.id,
            source_filename: row.source_filename,
            status: row.compression_status.parse().unwrap_or(CompressionStatus::Pending),
            final_url: row.final_url,
            storage_backend: row.storage_backend.and_then(|b| b.parse().ok()),
            original_size_bytes: row.original_size_bytes.map(|v| v.max(0) as u64),
            compressed_size_bytes: row.compressed_size_bytes.map(|v| v.max(0) as u64),
            thumbnail_url: row.thumbnail_url,
            thumbnail_backend: row.thumbnail_backend.and_then(|b| b.parse().ok()),
            updated_at: row.updated_at,
        }
    }
}
