//! AI suggestion persistence.

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::errors::StoreResult;
use crate::ids::new_id;
use crate::models::AiSuggestionRow;
use crate::Store;

fn suggestion_from_row(row: &SqliteRow) -> StoreResult<AiSuggestionRow> {
    let files_raw: String = row.try_get("files")?;
    Ok(AiSuggestionRow {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        review_run_id: row.try_get("review_run_id")?,
        check_key: row.try_get("check_key")?,
        severity: row.try_get("severity")?,
        title: row.try_get("title")?,
        rationale: row.try_get("rationale")?,
        suggested_fix: row.try_get("suggested_fix")?,
        files: serde_json::from_str(&files_raw).unwrap_or(serde_json::Value::Array(vec![])),
    })
}

/// Input for one suggestion insert; the worker maps adapter output here.
#[derive(Debug, Clone)]
pub struct SuggestionInsert {
    pub check_key: String,
    pub severity: String,
    pub title: String,
    pub rationale: String,
    pub suggested_fix: String,
    pub files: serde_json::Value,
}

impl Store {
    pub async fn insert_suggestions(
        &self,
        tenant_id: &str,
        review_run_id: &str,
        suggestions: &[SuggestionInsert],
    ) -> StoreResult<()> {
        let mut tx = self.pool().begin().await?;
        for s in suggestions {
            sqlx::query(
                "INSERT INTO ai_suggestions
                    (id, tenant_id, review_run_id, check_key, severity, title, rationale,
                     suggested_fix, files)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(new_id())
            .bind(tenant_id)
            .bind(review_run_id)
            .bind(&s.check_key)
            .bind(&s.severity)
            .bind(&s.title)
            .bind(&s.rationale)
            .bind(&s.suggested_fix)
            .bind(serde_json::to_string(&s.files)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_suggestions(
        &self,
        review_run_id: &str,
    ) -> StoreResult<Vec<AiSuggestionRow>> {
        let rows = sqlx::query(
            "SELECT * FROM ai_suggestions WHERE review_run_id = ? ORDER BY rowid",
        )
        .bind(review_run_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(suggestion_from_row).collect()
    }

    /// Redelivery guard: suggestions already persisted for this run.
    pub async fn has_suggestions(&self, review_run_id: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM ai_suggestions WHERE review_run_id = ?")
            .bind(review_run_id)
            .fetch_one(self.pool())
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::MrUpsert;
    use crate::test_store;

    #[tokio::test]
    async fn insert_and_list_round_trip() {
        let store = test_store().await;
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

        assert!(!store.has_suggestions(&run.id).await.unwrap());
        store
            .insert_suggestions(
                &tenant.id,
                &run.id,
                &[SuggestionInsert {
                    check_key: "security.eval-usage".into(),
                    severity: "BLOCKER".into(),
                    title: "Remove eval".into(),
                    rationale: "untrusted input".into(),
                    suggested_fix: "- use JSON.parse".into(),
                    files: serde_json::json!([{"path": "src/a.js", "line_start": 3}]),
                }],
            )
            .await
            .unwrap();

        let got = store.list_suggestions(&run.id).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].check_key, "security.eval-usage");
        assert_eq!(got[0].files[0]["path"], "src/a.js");
        assert!(store.has_suggestions(&run.id).await.unwrap());
    }
}
