//! Tenant rows and webhook-secret lookup.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::errors::{StoreError, StoreResult};
use crate::ids::new_id;
use crate::models::Tenant;
use crate::Store;

fn tenant_from_row(row: &SqliteRow) -> StoreResult<Tenant> {
    Ok(Tenant {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        gold_score_threshold: row.try_get::<i64, _>("gold_score_threshold")? as u32,
        gold_min_approvals: row.try_get::<i64, _>("gold_min_approvals")? as u32,
        created_at: row.try_get("created_at")?,
    })
}

impl Store {
    /// Creates the tenant if absent and pins its webhook secret for the
    /// provider. Used at boot for the default tenant and by admin tooling.
    pub async fn ensure_tenant(
        &self,
        slug: &str,
        provider: &str,
        webhook_secret: &str,
    ) -> StoreResult<Tenant> {
        if self.find_tenant_by_slug(slug).await?.is_none() {
            sqlx::query(
                "INSERT INTO tenants (id, slug, created_at) VALUES (?, ?, ?)
                 ON CONFLICT(slug) DO NOTHING",
            )
            .bind(new_id())
            .bind(slug)
            .bind(Utc::now())
            .execute(self.pool())
            .await?;
        }
        let tenant = self
            .find_tenant_by_slug(slug)
            .await?
            .ok_or_else(|| StoreError::not_found("tenant", slug))?;

        sqlx::query(
            "INSERT INTO tenant_secrets (tenant_id, provider, webhook_secret)
             VALUES (?, ?, ?)
             ON CONFLICT(tenant_id, provider) DO UPDATE SET webhook_secret = excluded.webhook_secret",
        )
        .bind(&tenant.id)
        .bind(provider)
        .bind(webhook_secret)
        .execute(self.pool())
        .await?;

        Ok(tenant)
    }

    pub async fn find_tenant_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>> {
        let row = sqlx::query("SELECT * FROM tenants WHERE slug = ?")
            .bind(slug)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(tenant_from_row).transpose()
    }

    pub async fn find_tenant_by_id(&self, id: &str) -> StoreResult<Option<Tenant>> {
        let row = sqlx::query("SELECT * FROM tenants WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(tenant_from_row).transpose()
    }

    /// Webhook authentication: the `(provider, secret)` pair names exactly
    /// one tenant or nothing.
    pub async fn find_tenant_by_webhook_secret(
        &self,
        provider: &str,
        secret: &str,
    ) -> StoreResult<Option<Tenant>> {
        let row = sqlx::query(
            "SELECT t.* FROM tenants t
             JOIN tenant_secrets s ON s.tenant_id = t.id
             WHERE s.provider = ? AND s.webhook_secret = ?",
        )
        .bind(provider)
        .bind(secret)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(tenant_from_row).transpose()
    }

    /// The webhook secret for `(tenant, provider)`; used by control-API auth.
    pub async fn tenant_webhook_secret(
        &self,
        tenant_id: &str,
        provider: &str,
    ) -> StoreResult<Option<String>> {
        let row = sqlx::query(
            "SELECT webhook_secret FROM tenant_secrets WHERE tenant_id = ? AND provider = ?",
        )
        .bind(tenant_id)
        .bind(provider)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|r| r.get("webhook_secret")))
    }
}

#[cfg(test)]
mod tests {
    use crate::test_store;

    #[tokio::test]
    async fn ensure_tenant_is_idempotent() {
        let store = test_store().await;
        let a = store.ensure_tenant("t1", "gitlab", "s3cret").await.unwrap();
        let b = store.ensure_tenant("t1", "gitlab", "s3cret").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.gold_score_threshold, 80);
    }

    #[tokio::test]
    async fn webhook_secret_lookup() {
        let store = test_store().await;
        let t = store.ensure_tenant("t1", "gitlab", "s3cret").await.unwrap();

        let found = store
            .find_tenant_by_webhook_secret("gitlab", "s3cret")
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, t.id);

        assert!(store
            .find_tenant_by_webhook_secret("gitlab", "wrong")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_tenant_by_webhook_secret("github", "s3cret")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn secret_rotation_overwrites() {
        let store = test_store().await;
        store.ensure_tenant("t1", "gitlab", "old").await.unwrap();
        store.ensure_tenant("t1", "gitlab", "new").await.unwrap();
        assert!(store
            .find_tenant_by_webhook_secret("gitlab", "old")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_tenant_by_webhook_secret("gitlab", "new")
            .await
            .unwrap()
            .is_some());
    }
}
