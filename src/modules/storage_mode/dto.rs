use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use super::model::{StorageMode, StorageModeConfig};
use crate::infrastructure::storage::StorageBackend;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStorageModeRequest {
    /// `remote` or `local`
    pub mode: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StorageModeResponse {
    pub mode: StorageMode,
    pub updated_by: String,
    #[schema(value_type = String, format = DateTime)]
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub remote_configured: bool,
    /// Backend new uploads will actually target.
    pub effective_backend: StorageBackend,
}

impl StorageModeResponse {
    pub fn new(config: StorageModeConfig, remote_configured: bool) -> Self {
        let effective_backend = if remote_configured && config.mode == StorageMode::Remote {
            StorageBackend::Remote
        } else {
            StorageBackend::Local
        };

        Self {
            mode: config.mode,
            updated_by: config.updated_by,
            updated_at: config.updated_at,
            remote_configured,
            effective_backend,
        }
    }
}
