//! Review-run lifecycle queries. The state machine invariants live here:
//! exactly one terminal write, retry only from FAILED, startedAt refreshed on
//! every QUEUED→RUNNING transition, orphan recovery for crashed workers.

use chrono::{Duration, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::errors::{StoreError, StoreResult};
use crate::ids::new_id;
use crate::models::{ReviewRun, RunStatus};
use crate::Store;

/// The message written when a crashed worker left a run in RUNNING.
pub const UNEXPECTED_TERMINATION: &str =
    "Unexpected termination: job completed without setting final status";

pub(crate) fn run_from_row(row: &SqliteRow) -> StoreResult<ReviewRun> {
    let status_raw: String = row.try_get("status")?;
    let status = RunStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::not_found("run_status", status_raw.clone()))?;
    Ok(ReviewRun {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        merge_request_id: row.try_get("merge_request_id")?,
        head_sha: row.try_get("head_sha")?,
        status,
        phase: row.try_get("phase")?,
        progress_message: row.try_get("progress_message")?,
        score: row.try_get("score")?,
        summary: row.try_get("summary")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

impl Store {
    /// Creates a fresh QUEUED run for `(mr, head_sha)`.
    pub async fn create_run(
        &self,
        tenant_id: &str,
        merge_request_id: &str,
        head_sha: &str,
    ) -> StoreResult<ReviewRun> {
        let id = new_id();
        sqlx::query(
            "INSERT INTO review_runs (id, tenant_id, merge_request_id, head_sha, status, created_at)
             VALUES (?, ?, ?, ?, 'QUEUED', ?)",
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(merge_request_id)
        .bind(head_sha)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        self.get_run_any_tenant(&id)
            .await?
            .ok_or_else(|| StoreError::not_found("review_run", id))
    }

    pub async fn get_run(&self, tenant_id: &str, id: &str) -> StoreResult<Option<ReviewRun>> {
        let row = sqlx::query("SELECT * FROM review_runs WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    /// Unscoped lookup: the worker uses this to detect tenant mismatch,
    /// which must be distinguishable from "run does not exist".
    pub async fn get_run_any_tenant(&self, id: &str) -> StoreResult<Option<ReviewRun>> {
        let row = sqlx::query("SELECT * FROM review_runs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    /// Most recent run for `(mr, head_sha)`, the dedup anchor for intake.
    pub async fn latest_run_for_sha(
        &self,
        tenant_id: &str,
        merge_request_id: &str,
        head_sha: &str,
    ) -> StoreResult<Option<ReviewRun>> {
        let row = sqlx::query(
            "SELECT * FROM review_runs
             WHERE tenant_id = ? AND merge_request_id = ? AND head_sha = ?
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(tenant_id)
        .bind(merge_request_id)
        .bind(head_sha)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    /// Most recent run for an MR regardless of SHA (control-API listing).
    pub async fn latest_run_for_mr(
        &self,
        tenant_id: &str,
        merge_request_id: &str,
    ) -> StoreResult<Option<ReviewRun>> {
        let row = sqlx::query(
            "SELECT * FROM review_runs
             WHERE tenant_id = ? AND merge_request_id = ?
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(tenant_id)
        .bind(merge_request_id)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    /// Newest-first run listing.
    pub async fn list_runs(
        &self,
        tenant_id: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<ReviewRun>> {
        let rows = sqlx::query(
            "SELECT * FROM review_runs WHERE tenant_id = ?
             ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
        )
        .bind(tenant_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(run_from_row).collect()
    }

    /// QUEUED/FAILED/RUNNING → RUNNING, unconditionally refreshing
    /// `started_at` and clearing `error`. Returns the prior status so the
    /// worker can no-op on SUCCEEDED and apply its retry gate on FAILED.
    pub async fn mark_running(&self, id: &str) -> StoreResult<RunStatus> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query("SELECT status FROM review_runs WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::not_found("review_run", id))?;
        let prior_raw: String = row.try_get("status")?;
        let prior = RunStatus::parse(&prior_raw)
            .ok_or_else(|| StoreError::not_found("run_status", prior_raw))?;

        if prior != RunStatus::Succeeded {
            sqlx::query(
                "UPDATE review_runs
                 SET status = 'RUNNING', started_at = ?, error = NULL, finished_at = NULL
                 WHERE id = ?",
            )
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(prior)
    }

    /// Progress breadcrumbs between pipeline steps.
    pub async fn set_phase(
        &self,
        id: &str,
        phase: &str,
        progress_message: &str,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE review_runs SET phase = ?, progress_message = ? WHERE id = ?")
            .bind(phase)
            .bind(progress_message)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Terminal success.
    pub async fn finalize_success(
        &self,
        id: &str,
        score: i64,
        summary: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE review_runs
             SET status = 'SUCCEEDED', score = ?, summary = ?, error = NULL, finished_at = ?
             WHERE id = ?",
        )
        .bind(score)
        .bind(summary)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Terminal failure with a sanitized error message.
    pub async fn finalize_failure(&self, id: &str, error: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE review_runs
             SET status = 'FAILED', error = ?, finished_at = ?
             WHERE id = ?",
        )
        .bind(error)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Retry action: FAILED → QUEUED, clearing derived fields. Refuses any
    /// other starting state.
    pub async fn reset_for_retry(&self, tenant_id: &str, id: &str) -> StoreResult<ReviewRun> {
        let result = sqlx::query(
            "UPDATE review_runs
             SET status = 'QUEUED', error = NULL, finished_at = NULL,
                 score = NULL, summary = NULL, phase = NULL, progress_message = NULL
             WHERE tenant_id = ? AND id = ? AND status = 'FAILED'",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvalidTransition(format!(
                "run {id} is not FAILED; only FAILED runs can be retried"
            )));
        }
        self.get_run(tenant_id, id)
            .await?
            .ok_or_else(|| StoreError::not_found("review_run", id))
    }

    /// Recovery sweep: RUNNING runs whose `started_at` is older than
    /// `stale_after` are forced to FAILED with the standard message.
    /// Returns how many runs were recovered.
    pub async fn recover_orphan_runs(&self, stale_after: Duration) -> StoreResult<u64> {
        let cutoff = Utc::now() - stale_after;
        let result = sqlx::query(
            "UPDATE review_runs
             SET status = 'FAILED', error = ?, finished_at = ?
             WHERE status = 'RUNNING' AND started_at IS NOT NULL AND started_at < ?",
        )
        .bind(UNEXPECTED_TERMINATION)
        .bind(Utc::now())
        .bind(cutoff)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::MrUpsert;
    use crate::test_store;

    async fn seed_run(store: &Store) -> ReviewRun {
        let tenant = store.ensure_tenant("t1", "gitlab", "s").await.unwrap();
        let repo = store
            .upsert_repository(&tenant.id, "gitlab", "1", "g", "p", "main")
            .await
            .unwrap();
        let mr = store
            .upsert_merge_request(
                &tenant.id,
                &repo.id,
                &MrUpsert {
                    iid: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store.create_run(&tenant.id, &mr.id, "abc123").await.unwrap()
    }

    #[tokio::test]
    async fn queued_to_running_sets_started_at() {
        let store = test_store().await;
        let run = seed_run(&store).await;
        assert_eq!(run.status, RunStatus::Queued);
        assert!(run.started_at.is_none());

        let prior = store.mark_running(&run.id).await.unwrap();
        assert_eq!(prior, RunStatus::Queued);

        let run = store.get_run_any_tenant(&run.id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.started_at.is_some());
    }

    #[tokio::test]
    async fn succeeded_run_is_not_reentered() {
        let store = test_store().await;
        let run = seed_run(&store).await;
        store.mark_running(&run.id).await.unwrap();
        store.finalize_success(&run.id, 100, "12 checks").await.unwrap();

        let prior = store.mark_running(&run.id).await.unwrap();
        assert_eq!(prior, RunStatus::Succeeded);
        // Status unchanged: terminal stays terminal.
        let run = store.get_run_any_tenant(&run.id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(run.score, Some(100));
    }

    #[tokio::test]
    async fn retry_only_from_failed() {
        let store = test_store().await;
        let run = seed_run(&store).await;
        let err = store.reset_for_retry(&run.tenant_id, &run.id).await;
        assert!(matches!(err, Err(StoreError::InvalidTransition(_))));

        store.mark_running(&run.id).await.unwrap();
        store.finalize_failure(&run.id, "host server error: status 500").await.unwrap();

        let reset = store.reset_for_retry(&run.tenant_id, &run.id).await.unwrap();
        assert_eq!(reset.status, RunStatus::Queued);
        assert!(reset.error.is_none());
        assert!(reset.finished_at.is_none());
        assert!(reset.score.is_none());
    }

    #[tokio::test]
    async fn started_at_refreshes_on_retry_pickup() {
        let store = test_store().await;
        let run = seed_run(&store).await;
        store.mark_running(&run.id).await.unwrap();
        let first_started = store
            .get_run_any_tenant(&run.id)
            .await
            .unwrap()
            .unwrap()
            .started_at
            .unwrap();

        store.finalize_failure(&run.id, "timeout").await.unwrap();
        store.reset_for_retry(&run.tenant_id, &run.id).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.mark_running(&run.id).await.unwrap();

        let second_started = store
            .get_run_any_tenant(&run.id)
            .await
            .unwrap()
            .unwrap()
            .started_at
            .unwrap();
        assert!(second_started > first_started);
    }

    #[tokio::test]
    async fn orphan_recovery_forces_failed() {
        let store = test_store().await;
        let run = seed_run(&store).await;
        store.mark_running(&run.id).await.unwrap();

        // Nothing is stale yet.
        assert_eq!(store.recover_orphan_runs(Duration::minutes(5)).await.unwrap(), 0);
        // With a zero threshold the RUNNING run is an orphan.
        assert_eq!(
            store.recover_orphan_runs(Duration::milliseconds(0)).await.unwrap(),
            1
        );

        let run = store.get_run_any_tenant(&run.id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error.as_deref(), Some(UNEXPECTED_TERMINATION));
    }

    #[tokio::test]
    async fn listing_is_newest_first() {
        let store = test_store().await;
        let first = seed_run(&store).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store
            .create_run(&first.tenant_id, &first.merge_request_id, "def456")
            .await
            .unwrap();

        let runs = store.list_runs(&first.tenant_id, 10, 0).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, second.id);

        let latest = store
            .latest_run_for_sha(&first.tenant_id, &first.merge_request_id, "abc123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, first.id);
    }
}
