//! Worker-side error classification.
//!
//! Two axes matter: what to tell the run (`run.error` message) and what to
//! tell the queue (retryable or not). Permanent failures exhaust the job's
//! attempts on the spot; everything else goes back for backoff.

use thiserror::Error;

pub type RunnerResult<T> = std::result::Result<T, RunnerError>;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Host(#[from] git_host::HostError),

    #[error(transparent)]
    Store(#[from] review_store::StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] job_queue::QueueError),

    /// The job references a run that does not exist. No amount of retrying
    /// will create it.
    #[error("review run not found: {0}")]
    RunNotFound(String),

    /// The run exists but belongs to another tenant. Logged as a security
    /// event by the caller; never retried.
    #[error("review run {run_id} does not belong to tenant {tenant_slug}")]
    TenantMismatch { run_id: String, tenant_slug: String },

    /// The diff fetch exceeded its dedicated deadline.
    #[error("diff fetch timed out")]
    DiffTimeout,
}

impl RunnerError {
    /// Permanent errors mark the run FAILED and tell the queue not to retry.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Host(e) => e.is_permanent(),
            Self::RunNotFound(_) | Self::TenantMismatch { .. } => true,
            Self::Store(_) | Self::Queue(_) | Self::DiffTimeout => false,
        }
    }
}
