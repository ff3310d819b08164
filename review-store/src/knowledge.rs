//! Knowledge-base upserts. Identity is two-layered: `(tenant, content_hash)`
//! makes byte-identical re-ingests a no-op; `(tenant, type, provider,
//! provider_id)` is the logical identity that content updates ride on.

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::errors::StoreResult;
use crate::ids::new_id;
use crate::models::{KnowledgeSource, KnowledgeType};
use crate::Store;

fn knowledge_from_row(row: &SqliteRow) -> StoreResult<KnowledgeSource> {
    let type_raw: String = row.try_get("source_type")?;
    let tokens_raw: String = row.try_get("feature_tokens")?;
    let metadata_raw: Option<String> = row.try_get("metadata")?;
    Ok(KnowledgeSource {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        source_type: KnowledgeType::parse(&type_raw).unwrap_or(KnowledgeType::Doc),
        provider: row.try_get("provider")?,
        provider_id: row.try_get("provider_id")?,
        title: row.try_get("title")?,
        source_url: row.try_get("source_url")?,
        content_text: row.try_get("content_text")?,
        content_hash: row.try_get("content_hash")?,
        metadata: metadata_raw.and_then(|m| serde_json::from_str(&m).ok()),
        feature_tokens: serde_json::from_str(&tokens_raw).unwrap_or_default(),
    })
}

/// Input for a knowledge upsert.
#[derive(Debug, Clone)]
pub struct KnowledgeUpsert {
    pub source_type: KnowledgeType,
    pub provider: String,
    pub provider_id: String,
    pub title: String,
    pub source_url: Option<String>,
    pub content_text: String,
    pub content_hash: String,
    pub metadata: Option<serde_json::Value>,
    pub feature_tokens: Vec<String>,
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Byte-identical content already present; nothing written.
    Unchanged,
}

impl Store {
    pub async fn upsert_knowledge_source(
        &self,
        tenant_id: &str,
        input: &KnowledgeUpsert,
    ) -> StoreResult<(KnowledgeSource, UpsertOutcome)> {
        // 1) Same bytes already ingested: no-op.
        if let Some(existing) = self
            .find_knowledge_by_hash(tenant_id, &input.content_hash)
            .await?
        {
            return Ok((existing, UpsertOutcome::Unchanged));
        }

        // 2) Logical identity exists: content changed, update in place.
        let existing = sqlx::query(
            "SELECT id FROM knowledge_sources
             WHERE tenant_id = ? AND source_type = ? AND provider = ? AND provider_id = ?",
        )
        .bind(tenant_id)
        .bind(input.source_type.as_str())
        .bind(&input.provider)
        .bind(&input.provider_id)
        .fetch_optional(self.pool())
        .await?;

        let tokens = serde_json::to_string(&input.feature_tokens)?;
        let metadata = input.metadata.as_ref().map(serde_json::to_string).transpose()?;

        let (id, outcome) = match existing {
            Some(row) => {
                let id: String = row.try_get("id")?;
                sqlx::query(
                    "UPDATE knowledge_sources
                     SET title = ?, source_url = ?, content_text = ?, content_hash = ?,
                         metadata = ?, feature_tokens = ?
                     WHERE id = ?",
                )
                .bind(&input.title)
                .bind(&input.source_url)
                .bind(&input.content_text)
                .bind(&input.content_hash)
                .bind(&metadata)
                .bind(&tokens)
                .bind(&id)
                .execute(self.pool())
                .await?;
                (id, UpsertOutcome::Updated)
            }
            None => {
                let id = new_id();
                sqlx::query(
                    "INSERT INTO knowledge_sources
                        (id, tenant_id, source_type, provider, provider_id, title, source_url,
                         content_text, content_hash, metadata, feature_tokens)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&id)
                .bind(tenant_id)
                .bind(input.source_type.as_str())
                .bind(&input.provider)
                .bind(&input.provider_id)
                .bind(&input.title)
                .bind(&input.source_url)
                .bind(&input.content_text)
                .bind(&input.content_hash)
                .bind(&metadata)
                .bind(&tokens)
                .execute(self.pool())
                .await?;
                (id, UpsertOutcome::Inserted)
            }
        };

        let row = sqlx::query("SELECT * FROM knowledge_sources WHERE id = ?")
            .bind(&id)
            .fetch_one(self.pool())
            .await?;
        Ok((knowledge_from_row(&row)?, outcome))
    }

    pub async fn find_knowledge_by_hash(
        &self,
        tenant_id: &str,
        content_hash: &str,
    ) -> StoreResult<Option<KnowledgeSource>> {
        let row = sqlx::query(
            "SELECT * FROM knowledge_sources WHERE tenant_id = ? AND content_hash = ?",
        )
        .bind(tenant_id)
        .bind(content_hash)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(knowledge_from_row).transpose()
    }

    /// All GOLD signatures for the tenant, for precedent matching.
    pub async fn list_gold_sources(&self, tenant_id: &str) -> StoreResult<Vec<KnowledgeSource>> {
        let rows = sqlx::query(
            "SELECT * FROM knowledge_sources WHERE tenant_id = ? AND source_type = ?",
        )
        .bind(tenant_id)
        .bind(KnowledgeType::GoldMr.as_str())
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(knowledge_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_store;

    fn gold_input(provider_id: &str, hash: &str) -> KnowledgeUpsert {
        KnowledgeUpsert {
            source_type: KnowledgeType::GoldMr,
            provider: "gitlab".into(),
            provider_id: provider_id.into(),
            title: "Add login".into(),
            source_url: Some("https://gitlab.example.com/mr/2".into()),
            content_text: "# Add login\n…".into(),
            content_hash: hash.into(),
            metadata: None,
            feature_tokens: vec!["auth".into(), "login".into()],
        }
    }

    #[tokio::test]
    async fn identical_reingest_is_noop() {
        let store = test_store().await;
        let tenant = store.ensure_tenant("t1", "gitlab", "s").await.unwrap();

        let (first, o1) = store
            .upsert_knowledge_source(&tenant.id, &gold_input("mr-2", "hash-a"))
            .await
            .unwrap();
        assert_eq!(o1, UpsertOutcome::Inserted);

        let (second, o2) = store
            .upsert_knowledge_source(&tenant.id, &gold_input("mr-2", "hash-a"))
            .await
            .unwrap();
        assert_eq!(o2, UpsertOutcome::Unchanged);
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_gold_sources(&tenant.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn changed_content_updates_logical_identity() {
        let store = test_store().await;
        let tenant = store.ensure_tenant("t1", "gitlab", "s").await.unwrap();

        let (first, _) = store
            .upsert_knowledge_source(&tenant.id, &gold_input("mr-2", "hash-a"))
            .await
            .unwrap();
        let (second, outcome) = store
            .upsert_knowledge_source(&tenant.id, &gold_input("mr-2", "hash-b"))
            .await
            .unwrap();

        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(first.id, second.id);
        assert_eq!(second.content_hash, "hash-b");
        assert_eq!(store.list_gold_sources(&tenant.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let store = test_store().await;
        let t1 = store.ensure_tenant("t1", "gitlab", "s1").await.unwrap();
        let t2 = store.ensure_tenant("t2", "gitlab", "s2").await.unwrap();

        store
            .upsert_knowledge_source(&t1.id, &gold_input("mr-2", "hash-a"))
            .await
            .unwrap();
        assert!(store.list_gold_sources(&t2.id).await.unwrap().is_empty());
    }
}
