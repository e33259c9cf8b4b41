use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::model::{CompressionStatus, VideoRecord, VideoRow};
use crate::infrastructure::storage::StoredAsset;

#[derive(Debug, Error)]
pub enum StatusStoreError {
    #[error("video {0} not found")]
    NotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A compression status transition. Terminal updates carry the stored asset
/// and sizes, and all fields are written together.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: CompressionStatus,
    pub asset: Option<StoredAsset>,
    pub original_size_bytes: Option<u64>,
    pub compressed_size_bytes: Option<u64>,
}

impl StatusUpdate {
    pub fn processing() -> Self {
        Self::bare(CompressionStatus::Processing)
    }

    pub fn error() -> Self {
        Self::bare(CompressionStatus::Error)
    }

    pub fn finished(status: CompressionStatus, asset: StoredAsset, original_size: u64, compressed_size: u64) -> Self {
        Self {
            status,
            asset: Some(asset),
            original_size_bytes: Some(original_size),
            compressed_size_bytes: Some(compressed_size),
        }
    }

    fn bare(status: CompressionStatus) -> Self {
        Self {
            status,
            asset: None,
            original_size_bytes: None,
            compressed_size_bytes: None,
        }
    }
}

/// Persistence of per-video compression state.
#[async_trait]
pub trait EntityStatusStore: Send + Sync {
    /// Create the row if needed and reset it to `pending` for a fresh upload.
    async fn mark_pending(&self, id: Uuid, source_filename: &str) -> Result<(), StatusStoreError>;

    async fn set_status(&self, id: Uuid, update: StatusUpdate) -> Result<(), StatusStoreError>;

    async fn set_thumbnail(&self, id: Uuid, asset: &StoredAsset) -> Result<(), StatusStoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<VideoRecord>, StatusStoreError>;
}

fn to_db_size(v: Option<u64>) -> Option<i64> {
    v.map(|v| i64::try_from(v).unwrap_or(i64::MAX))
}

#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStatusStore for VideoRepository {
    async fn mark_pending(&self, id: Uuid, source_filename: &str) -> Result<(), StatusStoreError> {
        sqlx::query(
            r#"
            INSERT INTO videos (id, source_filename, compression_status)
            VALUES ($1, $2, 'pending')
            ON CONFLICT (id) DO UPDATE
            SET source_filename = EXCLUDED.source_filename,
                compression_status = 'pending',
                updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(source_filename)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_status(&self, id: Uuid, update: StatusUpdate) -> Result<(), StatusStoreError> {
        let (url, backend) = match &update.asset {
            Some(asset) => (Some(asset.url.as_str()), Some(asset.backend.as_str())),
            None => (None, None),
        };

        let result = sqlx::query(
            r#"
            UPDATE videos
            SET
                compression_status = $1,
                final_url = COALESCE($2, final_url),
                storage_backend = COALESCE($3, storage_backend),
                original_size_bytes = COALESCE($4, original_size_bytes),
                compressed_size_bytes = COALESCE($5, compressed_size_bytes),
                updated_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(update.status.as_str())
        .bind(url)
        .bind(backend)
        .bind(to_db_size(update.original_size_bytes))
        .bind(to_db_size(update.compressed_size_bytes))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StatusStoreError::NotFound(id));
        }
        Ok(())
    }

    async fn set_thumbnail(&self, id: Uuid, asset: &StoredAsset) -> Result<(), StatusStoreError> {
        let result = sqlx::query(
            "UPDATE videos SET thumbnail_url = $1, thumbnail_backend = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(&asset.url)
        .bind(asset.backend.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StatusStoreError::NotFound(id));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<VideoRecord>, StatusStoreError> {
        let row = sqlx::query_as::<_, VideoRow>("SELECT * FROM videos WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(VideoRecord::from))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use time::OffsetDateTime;

    /// In-memory store that keeps the full write history.
    #[derive(Default)]
    pub struct MemoryStatusStore {
        pub records: Mutex<HashMap<Uuid, VideoRecord>>,
        pub history: Mutex<Vec<(Uuid, StatusUpdate)>>,
        pub fail_writes: bool,
        pub fail_thumbnail_writes: AtomicBool,
    }

    impl MemoryStatusStore {
        pub fn failing() -> Self {
            Self {
                fail_writes: true,
                ..Self::default()
            }
        }

        pub fn statuses_for(&self, id: Uuid) -> Vec<CompressionStatus> {
            self.history
                .lock()
                .unwrap()
                .iter()
                .filter(|(v, _)| *v == id)
                .map(|(_, u)| u.status)
                .collect()
        }

        pub fn terminal_writes(&self, id: Uuid) -> Vec<StatusUpdate> {
            self.history
                .lock()
                .unwrap()
                .iter()
                .filter(|(v, u)| *v == id && u.status.is_terminal())
                .map(|(_, u)| u.clone())
                .collect()
        }

        pub fn processing_order(&self) -> Vec<Uuid> {
            self.history
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, u)| u.status == CompressionStatus::Processing)
                .map(|(v, _)| *v)
                .collect()
        }

        pub fn insert(&self, record: VideoRecord) {
            self.records.lock().unwrap().insert(record.id, record);
        }
    }

    pub fn blank_record(id: Uuid) -> VideoRecord {
        VideoRecord {
            id,
            source_filename: None,
            status: CompressionStatus::Pending,
            final_url: None,
            storage_backend: None,
            original_size_bytes: None,
            compressed_size_bytes: None,
            thumbnail_url: None,
            thumbnail_backend: None,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[async_trait]
    impl EntityStatusStore for MemoryStatusStore {
        async fn mark_pending(&self, id: Uuid, source_filename: &str) -> Result<(), StatusStoreError> {
            let mut records = self.records.lock().unwrap();
            let record = records.entry(id).or_insert_with(|| blank_record(id));
            record.status = CompressionStatus::Pending;
            record.source_filename = Some(source_filename.to_string());
            Ok(())
        }

        async fn set_status(&self, id: Uuid, update: StatusUpdate) -> Result<(), StatusStoreError> {
            self.history.lock().unwrap().push((id, update.clone()));
            if self.fail_writes {
                return Err(StatusStoreError::NotFound(id));
            }
            let mut records = self.records.lock().unwrap();
            let record = records.entry(id).or_insert_with(|| blank_record(id));
            record.status = update.status;
            if let Some(asset) = update.asset {
                record.final_url = Some(asset.url);
                record.storage_backend = Some(asset.backend);
            }
            if update.original_size_bytes.is_some() {
                record.original_size_bytes = update.original_size_bytes;
            }
            if update.compressed_size_bytes.is_some() {
                record.compressed_size_bytes = update.compressed_size_bytes;
            }
            Ok(())
        }

        async fn set_thumbnail(&self, id: Uuid, asset: &StoredAsset) -> Result<(), StatusStoreError> {
            if self.fail_thumbnail_writes.load(Ordering::SeqCst) {
                return Err(StatusStoreError::NotFound(id));
            }
            let mut records = self.records.lock().unwrap();
            let record = records.get_mut(&id).ok_or(StatusStoreError::NotFound(id))?;
            record.thumbnail_url = Some(asset.url.clone());
            record.thumbnail_backend = Some(asset.backend);
            Ok(())
        }

        async fn get(&self, id: Uuid) -> Result<Option<VideoRecord>, StatusStoreError> {
            Ok(self.records.lock().unwrap().get(&id).cloned())
        }
    }
}
