//! Tenant AI config and per-check overlays.

use std::collections::HashMap;

use sqlx::Row;

use check_engine::{CheckOverlay, CheckStatus, Thresholds};

use crate::errors::StoreResult;
use crate::models::TenantAiConfig;
use crate::Store;

impl Store {
    /// The tenant's AI config, or `None` when AI was never configured
    /// (treated as disabled by the worker).
    pub async fn get_ai_config(&self, tenant_id: &str) -> StoreResult<Option<TenantAiConfig>> {
        let row = sqlx::query("SELECT * FROM tenant_ai_configs WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_optional(self.pool())
            .await?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(TenantAiConfig {
            tenant_id: row.try_get("tenant_id")?,
            enabled: row.try_get::<i64, _>("enabled")? != 0,
            provider: row.try_get("provider")?,
            model: row.try_get("model")?,
            max_suggestions: row.try_get::<i64, _>("max_suggestions")? as u32,
            max_prompt_chars: row.try_get::<i64, _>("max_prompt_chars")? as u32,
            max_total_diff_bytes: row.try_get::<i64, _>("max_total_diff_bytes")? as u32,
        }))
    }

    pub async fn upsert_ai_config(&self, cfg: &TenantAiConfig) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO tenant_ai_configs
                (tenant_id, enabled, provider, model, max_suggestions, max_prompt_chars,
                 max_total_diff_bytes)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(tenant_id) DO UPDATE SET
                enabled = excluded.enabled,
                provider = excluded.provider,
                model = excluded.model,
                max_suggestions = excluded.max_suggestions,
                max_prompt_chars = excluded.max_prompt_chars,
                max_total_diff_bytes = excluded.max_total_diff_bytes",
        )
        .bind(&cfg.tenant_id)
        .bind(cfg.enabled as i64)
        .bind(&cfg.provider)
        .bind(&cfg.model)
        .bind(cfg.max_suggestions as i64)
        .bind(cfg.max_prompt_chars as i64)
        .bind(cfg.max_total_diff_bytes as i64)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// The tenant's check overlays keyed by check key, ready for the engine.
    pub async fn load_check_overlays(
        &self,
        tenant_id: &str,
    ) -> StoreResult<HashMap<String, CheckOverlay>> {
        let rows = sqlx::query("SELECT * FROM check_configs WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_all(self.pool())
            .await?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("check_key")?;
            let enabled = row.try_get::<i64, _>("enabled")? != 0;
            let override_raw: Option<String> = row.try_get("severity_override")?;
            let thresholds_raw: String = row.try_get("thresholds")?;

            let severity_override = override_raw.as_deref().and_then(|s| {
                serde_json::from_value::<CheckStatus>(serde_json::Value::String(s.to_string()))
                    .ok()
            });
            let thresholds: Thresholds =
                serde_json::from_str(&thresholds_raw).unwrap_or_default();

            out.insert(
                key,
                CheckOverlay {
                    enabled,
                    severity_override,
                    thresholds,
                },
            );
        }
        Ok(out)
    }

    pub async fn upsert_check_config(
        &self,
        tenant_id: &str,
        check_key: &str,
        overlay: &CheckOverlay,
    ) -> StoreResult<()> {
        let override_str = overlay.severity_override.map(|s| s.as_str().to_string());
        sqlx::query(
            "INSERT INTO check_configs (tenant_id, check_key, enabled, severity_override, thresholds)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(tenant_id, check_key) DO UPDATE SET
                enabled = excluded.enabled,
                severity_override = excluded.severity_override,
                thresholds = excluded.thresholds",
        )
        .bind(tenant_id)
        .bind(check_key)
        .bind(overlay.enabled as i64)
        .bind(override_str)
        .bind(serde_json::to_string(&overlay.thresholds)?)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_store;

    #[tokio::test]
    async fn ai_config_round_trip() {
        let store = test_store().await;
        let tenant = store.ensure_tenant("t1", "gitlab", "s").await.unwrap();
        assert!(store.get_ai_config(&tenant.id).await.unwrap().is_none());

        let cfg = TenantAiConfig {
            tenant_id: tenant.id.clone(),
            enabled: true,
            max_suggestions: 5,
            ..Default::default()
        };
        store.upsert_ai_config(&cfg).await.unwrap();

        let got = store.get_ai_config(&tenant.id).await.unwrap().unwrap();
        assert!(got.enabled);
        assert_eq!(got.max_suggestions, 5);
        assert_eq!(got.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn check_overlays_round_trip() {
        let store = test_store().await;
        let tenant = store.ensure_tenant("t1", "gitlab", "s").await.unwrap();

        let mut thresholds = Thresholds::new();
        thresholds.insert("max_markers".into(), serde_json::json!(0));
        store
            .upsert_check_config(
                &tenant.id,
                "quality.todo-debt",
                &CheckOverlay {
                    enabled: true,
                    severity_override: Some(CheckStatus::Fail),
                    thresholds,
                },
            )
            .await
            .unwrap();
        store
            .upsert_check_config(
                &tenant.id,
                "performance.select-star",
                &CheckOverlay {
                    enabled: false,
                    severity_override: None,
                    thresholds: Thresholds::new(),
                },
            )
            .await
            .unwrap();

        let overlays = store.load_check_overlays(&tenant.id).await.unwrap();
        assert_eq!(overlays.len(), 2);
        let todo = &overlays["quality.todo-debt"];
        assert_eq!(todo.severity_override, Some(CheckStatus::Fail));
        assert_eq!(
            check_engine::types::threshold_u64(&todo.thresholds, "max_markers", 9),
            0
        );
        assert!(!overlays["performance.select-star"].enabled);
    }
}
