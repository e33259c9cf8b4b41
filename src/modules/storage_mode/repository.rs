use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use super::model::{StorageMode, StorageModeConfig, StorageSettingsRow};

#[derive(Debug, Error)]
pub enum StorageModeError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored storage mode is invalid: {0}")]
    Corrupt(String),

    #[error("storage mode store unavailable: {0}")]
    Unavailable(String),
}

/// Backing record for the storage mode singleton.
#[async_trait]
pub trait StorageModeStore: Send + Sync {
    async fn load(&self) -> Result<Option<StorageModeConfig>, StorageModeError>;

    /// Upsert the single record and return what was written.
    async fn save(&self, mode: StorageMode, actor_id: &str) -> Result<StorageModeConfig, StorageModeError>;
}

impl TryFrom<StorageSettingsRow> for StorageModeConfig {
    type Error = StorageModeError;

    fn try_from(row: StorageSettingsRow) -> Result<Self, Self::Error> {
        Ok(Self {
            mode: row.mode.parse().map_err(StorageModeError::Corrupt)?,
            updated_by: row.updated_by,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct StorageSettingsRepository {
    pool: PgPool,
}

impl StorageSettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StorageModeStore for StorageSettingsRepository {
    async fn load(&self) -> Result<Option<StorageModeConfig>, StorageModeError> {
        let row = sqlx::query_as::<_, StorageSettingsRow>(
            "SELECT mode, updated_by, updated_at FROM storage_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(StorageModeConfig::try_from).transpose()
    }

    async fn save(&self, mode: StorageMode, actor_id: &str) -> Result<StorageModeConfig, StorageModeError> {
        let row = sqlx::query_as::<_, StorageSettingsRow>(
            r#"
            INSERT INTO storage_settings (id, mode, updated_by, updated_at)
            VALUES (1, $1, $2, NOW())
            ON CONFLICT (id) DO UPDATE
            SET mode = EXCLUDED.mode,
                updated_by = EXCLUDED.updated_by,
                updated_at = NOW()
            RETURNING mode, updated_by, updated_at
            "#,
        )
        .bind(mode.as_str())
        .bind(actor_id)
        .fetch_one(&self.pool)
        .await?;

        StorageModeConfig::try_from(row)
    }
}
