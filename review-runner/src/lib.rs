//! The review worker: polls the queue, drives the pipeline, guarantees that
//! every picked-up run ends in a terminal state, and runs the periodic
//! stalled-job and orphan-run recovery sweeps.

pub mod ai_stage;
pub mod comment;
pub mod errors;
pub mod knowledge_stage;
pub mod pipeline;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use job_queue::{Job, Queue};
use review_store::{RunStatus, Store, runs::UNEXPECTED_TERMINATION};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub use ai_stage::AiProcessConfig;
pub use errors::{RunnerError, RunnerResult};
pub use pipeline::{JobOutcome, PipelineDeps, process_review_job};

/// How long in-flight handlers may finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Worker tuning, straight from the environment surface.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub concurrency: usize,
    pub lock_duration: Duration,
    pub stalled_interval: Duration,
    pub max_stalled_count: u32,
    pub poll_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            lock_duration: Duration::from_secs(300),
            stalled_interval: Duration::from_secs(30),
            max_stalled_count: 1,
            poll_interval: Duration::from_millis(500),
        }
    }
}

pub struct Worker {
    queue: Queue,
    deps: Arc<PipelineDeps>,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(
        store: Store,
        queue: Queue,
        host: git_host::GitLabClient,
        ai: AiProcessConfig,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue,
            deps: Arc::new(PipelineDeps { store, host, ai }),
            settings,
        }
    }

    /// Runs until `shutdown` flips to true, then drains in-flight handlers
    /// within the grace period.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency));
        let mut poll = tokio::time::interval(self.settings.poll_interval);
        let mut sweep = tokio::time::interval(self.settings.stalled_interval);
        let mut tasks: JoinSet<()> = JoinSet::new();

        info!(
            concurrency = self.settings.concurrency,
            lock_duration_ms = self.settings.lock_duration.as_millis() as u64,
            "worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = sweep.tick() => {
                    self.run_sweeps().await;
                }
                _ = poll.tick() => {
                    // Reap finished handlers so the set does not grow.
                    while tasks.try_join_next().is_some() {}
                    self.fill_slots(&semaphore, &mut tasks).await;
                }
            }
        }

        info!("worker draining in-flight jobs");
        let drain = async {
            while tasks.join_next().await.is_some() {}
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!("shutdown grace period elapsed; abandoning remaining handlers");
            tasks.abort_all();
        }
        info!("worker stopped");
    }

    async fn fill_slots(&self, semaphore: &Arc<Semaphore>, tasks: &mut JoinSet<()>) {
        loop {
            let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                return;
            };
            let job = match self.queue.pop(self.settings.lock_duration).await {
                Ok(Some(job)) => job,
                Ok(None) => return,
                Err(e) => {
                    error!(error = %e, "queue pop failed");
                    return;
                }
            };

            let queue = self.queue.clone();
            let deps = self.deps.clone();
            tasks.spawn(async move {
                let _permit = permit;
                handle_job(&deps, &queue, job).await;
            });
        }
    }

    async fn run_sweeps(&self) {
        match self.queue.recover_stalled(self.settings.max_stalled_count).await {
            Ok(0) => {}
            Ok(n) => info!(recovered = n, "stalled jobs returned to the queue"),
            Err(e) => error!(error = %e, "stalled-job sweep failed"),
        }

        // A run is an orphan when it has been RUNNING for two full lease
        // windows: its job either finished or stalled long ago.
        let stale = chrono::Duration::from_std(self.settings.lock_duration * 2)
            .unwrap_or_else(|_| chrono::Duration::seconds(600));
        match self.deps.store.recover_orphan_runs(stale).await {
            Ok(0) => {}
            Ok(n) => warn!(recovered = n, "orphaned RUNNING runs forced to FAILED"),
            Err(e) => error!(error = %e, "orphan-run sweep failed"),
        }
    }
}

/// Drives one job to an acked/failed queue state, guaranteeing the run's
/// terminal status on every path.
pub async fn handle_job(deps: &PipelineDeps, queue: &Queue, job: Job) {
    let payload = job.payload.clone();
    let run_id = payload.review_run_id.clone();

    let result = process_review_job(deps, &payload).await;

    match result {
        Ok(outcome) => {
            debug!(job_id = %job.job_id, ?outcome, "job finished");
            // Belt over braces: a handler bug that returned Ok while the run
            // is still RUNNING must not leave it there.
            if let Ok(Some(run)) = deps.store.get_run_any_tenant(&run_id).await {
                if run.status == RunStatus::Running {
                    error!(run_id = %run_id, "run left RUNNING after success path; forcing FAILED");
                    let _ = deps
                        .store
                        .finalize_failure(&run_id, UNEXPECTED_TERMINATION)
                        .await;
                }
            }
            if let Err(e) = queue.ack(&job.job_id).await {
                error!(job_id = %job.job_id, error = %e, "ack failed");
            }
        }
        Err(err) => {
            let permanent = err.is_permanent();
            let sanitized = privacy_filter::sanitize_error_message(&err.to_string());
            warn!(
                job_id = %job.job_id,
                run_id = %run_id,
                permanent,
                error = %sanitized,
                "job failed"
            );

            // Tenant mismatch must not touch the other tenant's run; a
            // missing run has nothing to finalize.
            let finalize = !matches!(
                err,
                RunnerError::RunNotFound(_) | RunnerError::TenantMismatch { .. }
            );
            if finalize {
                if let Err(e) = deps.store.finalize_failure(&run_id, &sanitized).await {
                    error!(run_id = %run_id, error = %e, "finalize_failure failed");
                }
            }

            if let Err(e) = queue.fail(&job.job_id, &sanitized, !permanent).await {
                error!(job_id = %job.job_id, error = %e, "queue fail() failed");
            }
        }
    }
}

/// Convenience wiring for `main`: spawn the worker on the runtime.
pub fn spawn_worker(worker: Worker, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(worker.run(shutdown))
}
