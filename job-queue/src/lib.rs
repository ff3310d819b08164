//! Durable FIFO job queue over SQLite.
//!
//! Contract: per-job identity with dedup, at-least-once delivery through
//! leases (`locked_until`), exponential backoff on retryable failures,
//! stalled-job recovery with a strike limit. The queue is the coordination
//! primitive of the whole system: at most one live job per identity is ever
//! visible to workers.

pub mod payload;

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use payload::{ReviewJobPayload, build_job_id};

pub type QueueResult<T> = std::result::Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("queue payload error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("job not found: {0}")]
    JobNotFound(String),
}

/// Job lifecycle states, BullMQ vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Waiting,
    Active,
    Delayed,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Delayed => "delayed",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(Self::Waiting),
            "active" => Some(Self::Active),
            "delayed" => Some(Self::Delayed),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, Self::Waiting | Self::Active | Self::Delayed)
    }
}

/// Enqueue knobs; defaults follow the system contract.
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub max_attempts: u32,
    pub backoff_delay: Duration,
    pub remove_on_complete: bool,
    pub remove_on_fail: bool,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_delay: Duration::from_secs(2),
            remove_on_complete: false,
            remove_on_fail: false,
        }
    }
}

/// A stored job as read back from the queue.
#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: String,
    pub state: JobState,
    pub payload: ReviewJobPayload,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub stalled_count: u32,
    pub last_error: Option<String>,
    pub run_at: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
}

/// What `enqueue` did for a given identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Created,
    /// A live job with this id already exists; nothing changed.
    Deduplicated,
    /// A terminal job with this id was revived to `waiting`.
    Revived,
}

fn job_from_row(row: &SqliteRow) -> QueueResult<Job> {
    let state_raw: String = row.try_get("state")?;
    let payload_raw: String = row.try_get("payload")?;
    Ok(Job {
        job_id: row.try_get("job_id")?,
        state: JobState::parse(&state_raw).unwrap_or(JobState::Failed),
        payload: serde_json::from_str(&payload_raw)?,
        attempts_made: row.try_get::<i64, _>("attempts_made")? as u32,
        max_attempts: row.try_get::<i64, _>("max_attempts")? as u32,
        stalled_count: row.try_get::<i64, _>("stalled_count")? as u32,
        last_error: row.try_get("last_error")?,
        run_at: row.try_get("run_at")?,
        locked_until: row.try_get("locked_until")?,
    })
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS jobs (
        job_id TEXT PRIMARY KEY,
        payload TEXT NOT NULL,
        state TEXT NOT NULL DEFAULT 'waiting',
        attempts_made INTEGER NOT NULL DEFAULT 0,
        max_attempts INTEGER NOT NULL DEFAULT 3,
        backoff_delay_ms INTEGER NOT NULL DEFAULT 2000,
        remove_on_complete INTEGER NOT NULL DEFAULT 0,
        remove_on_fail INTEGER NOT NULL DEFAULT 0,
        stalled_count INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        run_at TEXT NOT NULL,
        locked_until TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_jobs_ready ON jobs (state, run_at)",
];

/// Durable queue handle. Cheap to clone.
#[derive(Clone)]
pub struct Queue {
    pool: SqlitePool,
}

impl Queue {
    pub async fn connect(url: &str) -> QueueResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        info!("queue connected");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Enqueues under `job_id`. Live duplicates are a no-op; terminal
    /// duplicates are revived with fresh attempt counters (the FAILED-run
    /// retry path re-enqueues under the same identity).
    pub async fn enqueue(
        &self,
        job_id: &str,
        payload: &ReviewJobPayload,
        opts: &EnqueueOptions,
    ) -> QueueResult<EnqueueOutcome> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let existing = sqlx::query("SELECT state FROM jobs WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?;

        let outcome = match existing {
            Some(row) => {
                let state_raw: String = row.try_get("state")?;
                let state = JobState::parse(&state_raw).unwrap_or(JobState::Failed);
                if state.is_live() {
                    debug!(job_id, state = state.as_str(), "enqueue deduplicated");
                    EnqueueOutcome::Deduplicated
                } else {
                    sqlx::query(
                        "UPDATE jobs SET
                            payload = ?, state = 'waiting', attempts_made = 0,
                            max_attempts = ?, backoff_delay_ms = ?, stalled_count = 0,
                            last_error = NULL, run_at = ?, locked_until = NULL, updated_at = ?
                         WHERE job_id = ?",
                    )
                    .bind(serde_json::to_string(payload)?)
                    .bind(opts.max_attempts as i64)
                    .bind(opts.backoff_delay.as_millis() as i64)
                    .bind(now)
                    .bind(now)
                    .bind(job_id)
                    .execute(&mut *tx)
                    .await?;
                    debug!(job_id, "enqueue revived terminal job");
                    EnqueueOutcome::Revived
                }
            }
            None => {
                sqlx::query(
                    "INSERT INTO jobs
                        (job_id, payload, state, max_attempts, backoff_delay_ms,
                         remove_on_complete, remove_on_fail, run_at, created_at, updated_at)
                     VALUES (?, ?, 'waiting', ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(job_id)
                .bind(serde_json::to_string(payload)?)
                .bind(opts.max_attempts as i64)
                .bind(opts.backoff_delay.as_millis() as i64)
                .bind(opts.remove_on_complete as i64)
                .bind(opts.remove_on_fail as i64)
                .bind(now)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                EnqueueOutcome::Created
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn get_job(&self, job_id: &str) -> QueueResult<Option<Job>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    /// Leases the next due job: oldest `waiting`/`delayed` whose `run_at`
    /// has passed. The lease (`locked_until`) makes the job invisible until
    /// it expires or the worker acks/fails it.
    pub async fn pop(&self, lock_duration: Duration) -> QueueResult<Option<Job>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let row = sqlx::query(
            "SELECT * FROM jobs
             WHERE state IN ('waiting', 'delayed') AND run_at <= ?
             ORDER BY run_at ASC, created_at ASC LIMIT 1",
        )
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let mut job = job_from_row(&row)?;

        let locked_until = now
            + chrono::Duration::from_std(lock_duration)
                .unwrap_or_else(|_| chrono::Duration::seconds(300));
        sqlx::query(
            "UPDATE jobs SET state = 'active', locked_until = ?, updated_at = ? WHERE job_id = ?",
        )
        .bind(locked_until)
        .bind(now)
        .bind(&job.job_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        job.state = JobState::Active;
        job.locked_until = Some(locked_until);
        debug!(job_id = %job.job_id, "job leased");
        Ok(Some(job))
    }

    /// Acknowledges successful completion.
    pub async fn ack(&self, job_id: &str) -> QueueResult<()> {
        let row = sqlx::query("SELECT remove_on_complete FROM jobs WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;
        let remove: i64 = row.try_get("remove_on_complete")?;

        if remove != 0 {
            sqlx::query("DELETE FROM jobs WHERE job_id = ?")
                .bind(job_id)
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query(
                "UPDATE jobs SET state = 'completed', locked_until = NULL, updated_at = ?
                 WHERE job_id = ?",
            )
            .bind(Utc::now())
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Records a failure. Retryable failures below the attempt cap delay the
    /// job with exponential backoff (`delay * 2^attempts_made`); everything
    /// else is terminal.
    pub async fn fail(&self, job_id: &str, error: &str, retryable: bool) -> QueueResult<JobState> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT * FROM jobs WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;

        let attempts_made: i64 = row.try_get("attempts_made")?;
        let max_attempts: i64 = row.try_get("max_attempts")?;
        let backoff_ms: i64 = row.try_get("backoff_delay_ms")?;
        let remove_on_fail: i64 = row.try_get("remove_on_fail")?;

        let now = Utc::now();
        let attempts = attempts_made + 1;

        let next_state = if retryable && attempts < max_attempts {
            let delay_ms = backoff_ms.saturating_mul(1 << (attempts - 1).min(20));
            let run_at = now + chrono::Duration::milliseconds(delay_ms);
            sqlx::query(
                "UPDATE jobs SET state = 'delayed', attempts_made = ?, last_error = ?,
                    run_at = ?, locked_until = NULL, updated_at = ?
                 WHERE job_id = ?",
            )
            .bind(attempts)
            .bind(error)
            .bind(run_at)
            .bind(now)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
            JobState::Delayed
        } else if remove_on_fail != 0 {
            sqlx::query("DELETE FROM jobs WHERE job_id = ?")
                .bind(job_id)
                .execute(&mut *tx)
                .await?;
            JobState::Failed
        } else {
            // Non-retryable failures exhaust attempts on the spot.
            sqlx::query(
                "UPDATE jobs SET state = 'failed', attempts_made = ?, last_error = ?,
                    locked_until = NULL, updated_at = ?
                 WHERE job_id = ?",
            )
            .bind(if retryable { attempts } else { max_attempts })
            .bind(error)
            .bind(now)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
            JobState::Failed
        };

        tx.commit().await?;
        debug!(job_id, retryable, state = next_state.as_str(), "job failed");
        Ok(next_state)
    }

    /// Returns expired leases to `waiting` (one stall strike each); jobs past
    /// `max_stalled_count` strikes fail terminally. Run periodically.
    pub async fn recover_stalled(&self, max_stalled_count: u32) -> QueueResult<u64> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let rows = sqlx::query(
            "SELECT job_id, stalled_count FROM jobs
             WHERE state = 'active' AND locked_until IS NOT NULL AND locked_until < ?",
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        let mut recovered = 0u64;
        for row in rows {
            let job_id: String = row.try_get("job_id")?;
            let stalled: i64 = row.try_get("stalled_count")?;
            if stalled as u32 >= max_stalled_count {
                warn!(job_id = %job_id, "job exceeded stall limit; failing");
                sqlx::query(
                    "UPDATE jobs SET state = 'failed', last_error = 'job stalled',
                        locked_until = NULL, updated_at = ? WHERE job_id = ?",
                )
                .bind(now)
                .bind(&job_id)
                .execute(&mut *tx)
                .await?;
            } else {
                sqlx::query(
                    "UPDATE jobs SET state = 'waiting', stalled_count = stalled_count + 1,
                        locked_until = NULL, run_at = ?, updated_at = ? WHERE job_id = ?",
                )
                .bind(now)
                .bind(now)
                .bind(&job_id)
                .execute(&mut *tx)
                .await?;
                recovered += 1;
            }
        }

        tx.commit().await?;
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(run: &str) -> ReviewJobPayload {
        ReviewJobPayload {
            tenant_slug: "t1".into(),
            provider: "gitlab".into(),
            project_id: "77381939".into(),
            mr_iid: 2,
            head_sha: "abc123".into(),
            title: None,
            is_merged_candidate: false,
            review_run_id: run.into(),
        }
    }

    async fn queue() -> Queue {
        Queue::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn enqueue_dedup_and_revive() {
        let q = queue().await;
        let p = payload("r1");
        let id = p.job_id();

        assert_eq!(
            q.enqueue(&id, &p, &EnqueueOptions::default()).await.unwrap(),
            EnqueueOutcome::Created
        );
        assert_eq!(
            q.enqueue(&id, &p, &EnqueueOptions::default()).await.unwrap(),
            EnqueueOutcome::Deduplicated
        );

        let job = q.pop(Duration::from_secs(60)).await.unwrap().unwrap();
        q.ack(&job.job_id).await.unwrap();
        assert_eq!(
            q.get_job(&id).await.unwrap().unwrap().state,
            JobState::Completed
        );

        // Terminal job revives under the same identity.
        assert_eq!(
            q.enqueue(&id, &p, &EnqueueOptions::default()).await.unwrap(),
            EnqueueOutcome::Revived
        );
        let revived = q.get_job(&id).await.unwrap().unwrap();
        assert_eq!(revived.state, JobState::Waiting);
        assert_eq!(revived.attempts_made, 0);
    }

    #[tokio::test]
    async fn distinct_manual_jobs_coexist() {
        let q = queue().await;
        let a = payload("r1");
        let b = payload("r2");
        q.enqueue(&a.job_id(), &a, &EnqueueOptions::default()).await.unwrap();
        q.enqueue(&b.job_id(), &b, &EnqueueOptions::default()).await.unwrap();

        assert!(q.get_job(&a.job_id()).await.unwrap().is_some());
        assert!(q.get_job(&b.job_id()).await.unwrap().is_some());
        assert_ne!(a.job_id(), b.job_id());
    }

    #[tokio::test]
    async fn lease_makes_job_invisible() {
        let q = queue().await;
        let p = payload("r1");
        q.enqueue(&p.job_id(), &p, &EnqueueOptions::default()).await.unwrap();

        let first = q.pop(Duration::from_secs(60)).await.unwrap();
        assert!(first.is_some());
        // Still leased: nothing else to pop.
        assert!(q.pop(Duration::from_secs(60)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retryable_failure_backs_off_exponentially() {
        let q = queue().await;
        let p = payload("r1");
        let opts = EnqueueOptions {
            backoff_delay: Duration::from_millis(100),
            ..Default::default()
        };
        q.enqueue(&p.job_id(), &p, &opts).await.unwrap();

        let job = q.pop(Duration::from_secs(60)).await.unwrap().unwrap();
        q.fail(&job.job_id, "host server error: status 500", true)
            .await
            .unwrap();

        let delayed = q.get_job(&p.job_id()).await.unwrap().unwrap();
        assert_eq!(delayed.state, JobState::Delayed);
        assert_eq!(delayed.attempts_made, 1);
        let first_run_at = delayed.run_at;

        // Not due yet.
        assert!(q.pop(Duration::from_secs(60)).await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(150)).await;
        let job = q.pop(Duration::from_secs(60)).await.unwrap().unwrap();
        q.fail(&job.job_id, "host server error: status 500", true)
            .await
            .unwrap();
        let delayed = q.get_job(&p.job_id()).await.unwrap().unwrap();
        // Second delay (200ms) is double the first (100ms).
        assert!(delayed.run_at - first_run_at >= chrono::Duration::milliseconds(150));

        tokio::time::sleep(Duration::from_millis(250)).await;
        let job = q.pop(Duration::from_secs(60)).await.unwrap().unwrap();
        let state = q
            .fail(&job.job_id, "host server error: status 500", true)
            .await
            .unwrap();
        // Third failure exhausts the three attempts.
        assert_eq!(state, JobState::Failed);
    }

    #[tokio::test]
    async fn non_retryable_failure_exhausts_immediately() {
        let q = queue().await;
        let p = payload("r1");
        q.enqueue(&p.job_id(), &p, &EnqueueOptions::default()).await.unwrap();

        let job = q.pop(Duration::from_secs(60)).await.unwrap().unwrap();
        let state = q.fail(&job.job_id, "host forbidden (403)", false).await.unwrap();
        assert_eq!(state, JobState::Failed);

        let stored = q.get_job(&p.job_id()).await.unwrap().unwrap();
        assert_eq!(stored.attempts_made, stored.max_attempts);
    }

    #[tokio::test]
    async fn stalled_jobs_are_redelivered_then_failed() {
        let q = queue().await;
        let p = payload("r1");
        q.enqueue(&p.job_id(), &p, &EnqueueOptions::default()).await.unwrap();

        // Lease expires immediately.
        q.pop(Duration::from_millis(0)).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(q.recover_stalled(1).await.unwrap(), 1);
        let job = q.get_job(&p.job_id()).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.stalled_count, 1);

        // Second stall hits the limit and fails terminally.
        q.pop(Duration::from_millis(0)).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(q.recover_stalled(1).await.unwrap(), 0);
        let job = q.get_job(&p.job_id()).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.last_error.as_deref(), Some("job stalled"));
    }
}
