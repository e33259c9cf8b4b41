use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Which backend new uploads should go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Remote,
    Local,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Remote => "remote",
            StorageMode::Local => "local",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(StorageMode::Remote),
            "local" => Ok(StorageMode::Local),
            other => Err(format!("unknown storage mode '{other}'")),
        }
    }
}

/// The singleton `storage_settings` record.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StorageModeConfig {
    pub mode: StorageMode,
    pub updated_by: String,
    #[schema(value_type = String, format = DateTime)]
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl StorageModeConfig {
    /// Used when the backing record is missing or unreadable.
    pub fn fallback() -> Self {
        Self {
            mode: StorageMode::Remote,
            updated_by: "system".to_string(),
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct StorageSettingsRow {
    pub mode: String,
    pub updated_by: String,
    pub updated_at: OffsetDateTime,
}
