use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::storage::StorageBackends;
use crate::modules::storage_mode::service::StorageModeRegistry;
use crate::modules::video::repository::EntityStatusStore;
use crate::workers::queue::CompressionQueue;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub videos: Arc<dyn EntityStatusStore>,
    pub storage: StorageBackends,
    pub storage_mode: Arc<StorageModeRegistry>,
    pub queue: CompressionQueue,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        videos: Arc<dyn EntityStatusStore>,
        storage: StorageBackends,
        storage_mode: Arc<StorageModeRegistry>,
        queue: CompressionQueue,
    ) -> Self {
        Self {
            config,
            videos,
            storage,
            storage_mode,
            queue,
        }
    }
}
