//! Check-result persistence. Rows for a run are written atomically as one
//! batch; their presence is the worker's idempotency marker.

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use check_engine::{CheckCategory, CheckResult, CheckStatus, Severity};

use crate::errors::StoreResult;
use crate::ids::new_id;
use crate::models::CheckResultRow;
use crate::Store;

fn row_from_sqlite(row: &SqliteRow) -> StoreResult<CheckResultRow> {
    let evidence: Option<String> = row.try_get("evidence")?;
    Ok(CheckResultRow {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        review_run_id: row.try_get("review_run_id")?,
        check_key: row.try_get("check_key")?,
        category: row.try_get("category")?,
        status: row.try_get("status")?,
        severity: row.try_get("severity")?,
        message: row.try_get("message")?,
        file_path: row.try_get("file_path")?,
        line_start: row.try_get("line_start")?,
        line_end: row.try_get("line_end")?,
        evidence: evidence.and_then(|e| serde_json::from_str(&e).ok()),
    })
}

impl Store {
    /// Inserts the whole result set in one transaction. Re-running for the
    /// same run is rejected by the `(review_run_id, check_key)` uniqueness,
    /// so a racing duplicate worker cannot double-write.
    pub async fn insert_check_results(
        &self,
        tenant_id: &str,
        review_run_id: &str,
        results: &[CheckResult],
    ) -> StoreResult<()> {
        let mut tx = self.pool().begin().await?;
        for r in results {
            let evidence = r
                .evidence
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            sqlx::query(
                "INSERT INTO review_check_results
                    (id, tenant_id, review_run_id, check_key, category, status, severity,
                     message, file_path, line_start, line_end, evidence)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(review_run_id, check_key) DO NOTHING",
            )
            .bind(new_id())
            .bind(tenant_id)
            .bind(review_run_id)
            .bind(&r.check_key)
            .bind(r.category.as_str())
            .bind(r.status.as_str())
            .bind(r.severity.as_str())
            .bind(&r.message)
            .bind(&r.file_path)
            .bind(r.line_start.map(|v| v as i64))
            .bind(r.line_end.map(|v| v as i64))
            .bind(evidence)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// The idempotency marker: any row present means checks already ran.
    pub async fn has_check_results(&self, review_run_id: &str) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM review_check_results WHERE review_run_id = ?",
        )
        .bind(review_run_id)
        .fetch_one(self.pool())
        .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n > 0)
    }

    pub async fn list_check_results(
        &self,
        review_run_id: &str,
    ) -> StoreResult<Vec<CheckResultRow>> {
        let rows = sqlx::query(
            "SELECT * FROM review_check_results WHERE review_run_id = ? ORDER BY check_key",
        )
        .bind(review_run_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(row_from_sqlite).collect()
    }

    /// Rehydrates engine-typed results for rescoring on redelivery.
    pub async fn load_engine_results(
        &self,
        review_run_id: &str,
    ) -> StoreResult<Vec<CheckResult>> {
        let rows = self.list_check_results(review_run_id).await?;
        Ok(rows.into_iter().filter_map(row_to_engine).collect())
    }
}

fn row_to_engine(row: CheckResultRow) -> Option<CheckResult> {
    let category: CheckCategory =
        serde_json::from_value(serde_json::Value::String(row.category)).ok()?;
    let status: CheckStatus =
        serde_json::from_value(serde_json::Value::String(row.status)).ok()?;
    let severity: Severity =
        serde_json::from_value(serde_json::Value::String(row.severity)).ok()?;
    Some(CheckResult {
        check_key: row.check_key,
        title: String::new(),
        category,
        status,
        severity,
        message: row.message,
        file_path: row.file_path,
        line_start: row.line_start.map(|v| v as u32),
        line_end: row.line_end.map(|v| v as u32),
        evidence: row.evidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::MrUpsert;
    use crate::test_store;

    fn engine_result(key: &str, status: CheckStatus) -> CheckResult {
        CheckResult {
            check_key: key.into(),
            title: "T".into(),
            category: CheckCategory::Security,
            status,
            severity: Severity::Warn,
            message: "m".into(),
            file_path: Some("src/a.ts".into()),
            line_start: Some(3),
            line_end: Some(3),
            evidence: None,
        }
    }

    async fn seed_run(store: &Store) -> (String, String) {
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
        let run = store.create_run(&tenant.id, &mr.id, "sha").await.unwrap();
        (tenant.id, run.id)
    }

    #[tokio::test]
    async fn batch_insert_sets_idempotency_marker() {
        let store = test_store().await;
        let (tenant_id, run_id) = seed_run(&store).await;
        assert!(!store.has_check_results(&run_id).await.unwrap());

        let results = vec![
            engine_result("a", CheckStatus::Pass),
            engine_result("b", CheckStatus::Fail),
        ];
        store
            .insert_check_results(&tenant_id, &run_id, &results)
            .await
            .unwrap();
        assert!(store.has_check_results(&run_id).await.unwrap());
        assert_eq!(store.list_check_results(&run_id).await.unwrap().len(), 2);

        // A duplicate batch (racing redelivery) does not double-write.
        store
            .insert_check_results(&tenant_id, &run_id, &results)
            .await
            .unwrap();
        assert_eq!(store.list_check_results(&run_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn engine_round_trip_preserves_scoring_fields() {
        let store = test_store().await;
        let (tenant_id, run_id) = seed_run(&store).await;
        let results = vec![engine_result("security.x", CheckStatus::Fail)];
        store
            .insert_check_results(&tenant_id, &run_id, &results)
            .await
            .unwrap();

        let loaded = store.load_engine_results(&run_id).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].category, CheckCategory::Security);
        assert_eq!(loaded[0].status, CheckStatus::Fail);
        assert_eq!(
            check_engine::calculate_score(&results),
            check_engine::calculate_score(&loaded)
        );
    }
}
