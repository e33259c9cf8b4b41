use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::model::{StorageMode, StorageModeConfig};
use super::repository::{StorageModeError, StorageModeStore};

struct CachedConfig {
    config: StorageModeConfig,
    fetched_at: Instant,
}

/// Process-wide view of the admin-selected storage mode.
///
/// Reads are served from memory for `ttl`; writes made through [`set_mode`]
/// replace the cached value immediately.
///
/// [`set_mode`]: StorageModeRegistry::set_mode
pub struct StorageModeRegistry {
    store: Arc<dyn StorageModeStore>,
    ttl: Duration,
    remote_configured: bool,
    cache: RwLock<Option<CachedConfig>>,
    // bumped by every write through `set_mode`, under the cache write lock
    generation: AtomicU64,
}

impl StorageModeRegistry {
    pub fn new(store: Arc<dyn StorageModeStore>, ttl: Duration, remote_configured: bool) -> Self {
        Self {
            store,
            ttl,
            remote_configured,
            cache: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn remote_configured(&self) -> bool {
        self.remote_configured
    }

    pub async fn current_mode(&self) -> StorageMode {
        self.snapshot().await.mode
    }

    pub async fn snapshot(&self) -> StorageModeConfig {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return cached.config.clone();
            }
        }

        let seen = self.generation.load(Ordering::Acquire);

        match self.store.load().await {
            Ok(loaded) => {
                let config = loaded.unwrap_or_else(|| {
                    warn!("No storage mode record found, defaulting to remote");
                    StorageModeConfig::fallback()
                });

                let mut cache = self.cache.write().await;
                if self.generation.load(Ordering::Acquire) != seen {
                    // a write landed while loading; it is newer than what we read
                    if let Some(cached) = cache.as_ref() {
                        return cached.config.clone();
                    }
                }
                debug!(mode = %config.mode, "Storage mode cache refreshed");
                *cache = Some(CachedConfig {
                    config: config.clone(),
                    fetched_at: Instant::now(),
                });
                config
            }
            Err(e) => {
                // not cached: the next call retries the store
                warn!(error = %e, "Failed to read storage mode, defaulting to remote");
                StorageModeConfig::fallback()
            }
        }
    }

    pub async fn set_mode(&self, mode: StorageMode, actor_id: &str) -> Result<StorageModeConfig, StorageModeError> {
        let config = self.store.save(mode, actor_id).await?;

        {
            let mut cache = self.cache.write().await;
            self.generation.fetch_add(1, Ordering::AcqRel);
            *cache = Some(CachedConfig {
                config: config.clone(),
                fetched_at: Instant::now(),
            });
        }

        info!(mode = %config.mode, actor = %actor_id, "🔀 Storage mode changed");
        if config.mode == StorageMode::Remote && !self.remote_configured {
            warn!("Storage mode set to remote but CDN credentials are missing, uploads stay local");
        }
        Ok(config)
    }

    /// True only when the mode is remote *and* the CDN backend is configured.
    pub async fn should_use_remote(&self) -> bool {
        if !self.remote_configured {
            return false;
        }
        self.current_mode().await == StorageMode::Remote
    }
}
