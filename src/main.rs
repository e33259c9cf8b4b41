use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod middleware;
mod modules;
mod routes;
mod state;
mod workers;

use config::settings::AppConfig;
use infrastructure::db::pool::{connect_to_db, run_migrations};
use infrastructure::storage::local::LocalStore;
use infrastructure::storage::s3::RemoteStore;
use infrastructure::storage::{ObjectStore, StorageBackends};
use modules::storage_mode::repository::StorageSettingsRepository;
use modules::storage_mode::service::StorageModeRegistry;
use modules::video::repository::VideoRepository;
use workers::pipeline::IngestionPipeline;
use workers::queue::CompressionQueue;
use workers::transcoder::{FfmpegTranscoder, TranscodeParams, Transcoder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting server...");

    let config = AppConfig::new().context("invalid configuration")?;

    let pool = connect_to_db(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    run_migrations(&pool).await.context("failed to run migrations")?;

    let local: Arc<dyn ObjectStore> = Arc::new(
        LocalStore::new(config.local_storage_root.clone())
            .await
            .context("failed to prepare local storage root")?,
    );
    let remote: Option<Arc<dyn ObjectStore>> = match &config.cdn {
        Some(cdn) => Some(Arc::new(RemoteStore::new(cdn))),
        None => {
            warn!("CDN credentials not configured, every upload is stored locally");
            None
        }
    };
    let storage = StorageBackends::new(local, remote);

    let storage_mode = Arc::new(StorageModeRegistry::new(
        Arc::new(StorageSettingsRepository::new(pool.clone())),
        Duration::from_secs(config.storage_mode_cache_ttl_secs),
        storage.remote_configured(),
    ));
    info!(mode = %storage_mode.current_mode().await, "📦 Storage mode loaded");

    let transcoder = Arc::new(FfmpegTranscoder::from_config(&config.transcode));
    if !transcoder.is_available().await {
        warn!(ffmpeg = %config.transcode.ffmpeg_path, "ffmpeg not available, uploads will be stored uncompressed");
    }

    let videos = Arc::new(VideoRepository::new(pool));
    let pipeline = Arc::new(IngestionPipeline::new(
        transcoder,
        storage.clone(),
        storage_mode.clone(),
        videos.clone(),
        TranscodeParams::from(&config.transcode),
    ));

    let cancel = CancellationToken::new();
    let (queue, worker) = CompressionQueue::start(pipeline, cancel.clone());

    let port = config.server_port;
    let state = state::AppState::new(config, videos, storage, storage_mode, queue);
    let app = app::create_app(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // the worker drains whatever is still queued before it exits
    cancel.cancel();
    if let Err(e) = worker.await {
        warn!(error = %e, "Compression worker did not shut down cleanly");
    }
    info!("Server stopped");
    Ok(())
}

/// Resolves on ctrl-c. The worker is cancelled only after in-flight requests
/// have finished, so uploads accepted during shutdown are still queued.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
