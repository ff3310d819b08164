//! Posted-comment bookkeeping. The `(review_run_id, comment_type)` unique
//! index is what makes "at most one summary comment per run" a database
//! fact instead of a code convention.

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::errors::StoreResult;
use crate::ids::new_id;
use crate::models::PostedComment;
use crate::Store;

pub const SUMMARY_TYPE: &str = "SUMMARY";

fn comment_from_row(row: &SqliteRow) -> StoreResult<PostedComment> {
    Ok(PostedComment {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        review_run_id: row.try_get("review_run_id")?,
        provider: row.try_get("provider")?,
        provider_id: row.try_get("provider_id")?,
        comment_type: row.try_get("comment_type")?,
        body: row.try_get("body")?,
        ai_included: row.try_get::<i64, _>("ai_included")? != 0,
        ai_summary_hash: row.try_get("ai_summary_hash")?,
    })
}

impl Store {
    pub async fn get_summary_comment(
        &self,
        review_run_id: &str,
    ) -> StoreResult<Option<PostedComment>> {
        let row = sqlx::query(
            "SELECT * FROM posted_comments WHERE review_run_id = ? AND comment_type = ?",
        )
        .bind(review_run_id)
        .bind(SUMMARY_TYPE)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(comment_from_row).transpose()
    }

    /// Creates or replaces the single summary comment row for a run.
    pub async fn upsert_summary_comment(
        &self,
        tenant_id: &str,
        review_run_id: &str,
        provider: &str,
        provider_id: &str,
        body: &str,
        ai_included: bool,
        ai_summary_hash: Option<&str>,
    ) -> StoreResult<PostedComment> {
        sqlx::query(
            "INSERT INTO posted_comments
                (id, tenant_id, review_run_id, provider, provider_id, comment_type, body,
                 ai_included, ai_summary_hash)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(review_run_id, comment_type) DO UPDATE SET
                provider_id = excluded.provider_id,
                body = excluded.body,
                ai_included = excluded.ai_included,
                ai_summary_hash = excluded.ai_summary_hash",
        )
        .bind(new_id())
        .bind(tenant_id)
        .bind(review_run_id)
        .bind(provider)
        .bind(provider_id)
        .bind(SUMMARY_TYPE)
        .bind(body)
        .bind(ai_included as i64)
        .bind(ai_summary_hash)
        .execute(self.pool())
        .await?;

        self.get_summary_comment(review_run_id)
            .await?
            .ok_or_else(|| crate::StoreError::not_found("posted_comment", review_run_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::MrUpsert;
    use crate::test_store;

    #[tokio::test]
    async fn at_most_one_summary_per_run() {
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

        let first = store
            .upsert_summary_comment(&tenant.id, &run.id, "gitlab", "101", "body v1", false, None)
            .await
            .unwrap();
        let second = store
            .upsert_summary_comment(
                &tenant.id,
                &run.id,
                "gitlab",
                "101",
                "body v2",
                true,
                Some("hash"),
            )
            .await
            .unwrap();

        // Same row updated in place.
        assert_eq!(first.id, second.id);
        assert_eq!(second.body, "body v2");
        assert!(second.ai_included);

        let row = sqlx::query("SELECT COUNT(*) AS n FROM posted_comments WHERE review_run_id = ?")
            .bind(&run.id)
            .fetch_one(store.pool())
            .await
            .unwrap();
        let n: i64 = row.try_get("n").unwrap();
        assert_eq!(n, 1);
    }
}
