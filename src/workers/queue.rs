use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::pipeline::{IngestionJob, IngestionPipeline};

#[derive(Default)]
struct QueueState {
    pending: VecDeque<IngestionJob>,
    current: Option<Uuid>,
}

/// Snapshot of the queue for operators.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct QueueStatus {
    pub queue_length: usize,
    pub is_processing: bool,
    pub current_job_id: Option<Uuid>,
    pub pending_job_ids: Vec<Uuid>,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Notify,
}

/// FIFO of ingestion jobs drained by a single background worker, so at most
/// one transcode runs per process.
#[derive(Clone)]
pub struct CompressionQueue {
    shared: Arc<Shared>,
}

impl CompressionQueue {
    /// Spawn the worker. Once `cancel` fires it keeps draining the queue,
    /// including jobs enqueued after the signal, and exits when it is empty.
    pub fn start(pipeline: Arc<IngestionPipeline>, cancel: CancellationToken) -> (Self, JoinHandle<()>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            wake: Notify::new(),
        });

        let worker = tokio::spawn(run_worker(shared.clone(), pipeline, cancel));
        (Self { shared }, worker)
    }

    /// Append a job and return its 1-based position among waiting jobs.
    pub fn enqueue(&self, job: IngestionJob) -> usize {
        let id = job.id;
        let position = {
            let mut state = lock(&self.shared);
            state.pending.push_back(job);
            state.pending.len()
        };
        self.shared.wake.notify_one();

        info!(video_id = %id, position, "📥 Video queued for compression");
        position
    }

    pub fn status(&self) -> QueueStatus {
        let state = lock(&self.shared);
        QueueStatus {
            queue_length: state.pending.len(),
            is_processing: state.current.is_some(),
            current_job_id: state.current,
            pending_job_ids: state.pending.iter().map(|j| j.id).collect(),
        }
    }
}

fn lock(shared: &Shared) -> std::sync::MutexGuard<'_, QueueState> {
    match shared.state.lock() {
        Ok(state) => state,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn take_next(shared: &Shared) -> Option<IngestionJob> {
    let mut state = lock(shared);
    let job = state.pending.pop_front()?;
    state.current = Some(job.id);
    Some(job)
}

async fn run_worker(shared: Arc<Shared>, pipeline: Arc<IngestionPipeline>, cancel: CancellationToken) {
    info!("🚀 Compression worker started");

    loop {
        let Some(job) = take_next(&shared) else {
            if cancel.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = shared.wake.notified() => continue,
            }
        };

        let id = job.id;
        let run = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.run(job).await })
        };

        // a panicking job must not take the worker down with it
        match run.await {
            Ok(Ok(outcome)) => info!(
                video_id = %id,
                status = %outcome.status,
                backend = %outcome.asset.backend,
                "🏁 Compression job finished"
            ),
            Ok(Err(e)) => error!(video_id = %id, error = %e, "❌ Compression job failed"),
            Err(e) => error!(video_id = %id, error = %e, "💥 Compression job aborted"),
        }

        lock(&shared).current = None;

        if cancel.is_cancelled() {
            let remaining = lock(&shared).pending.len();
            if remaining > 0 {
                warn!(remaining, "Shutdown requested, draining queued compression jobs");
            }
        }
    }

    info!("🛑 Compression worker stopped");
}
