//! Repository and merge-request upserts, keyed on the uniqueness tuples
//! `(tenant, provider, provider_repo_id)` and `(tenant, repository, iid)`.

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::errors::{StoreError, StoreResult};
use crate::ids::new_id;
use crate::models::{MergeRequest, Repository};
use crate::Store;

fn repo_from_row(row: &SqliteRow) -> StoreResult<Repository> {
    Ok(Repository {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        provider: row.try_get("provider")?,
        provider_repo_id: row.try_get("provider_repo_id")?,
        namespace: row.try_get("namespace")?,
        name: row.try_get("name")?,
        default_branch: row.try_get("default_branch")?,
    })
}

fn mr_from_row(row: &SqliteRow) -> StoreResult<MergeRequest> {
    Ok(MergeRequest {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        repository_id: row.try_get("repository_id")?,
        iid: row.try_get("iid")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        source_branch: row.try_get("source_branch")?,
        target_branch: row.try_get("target_branch")?,
        state: row.try_get("state")?,
        web_url: row.try_get("web_url")?,
        last_seen_sha: row.try_get("last_seen_sha")?,
    })
}

/// Fields for a merge-request upsert, extracted from an event or a host
/// fetch. Empty strings leave prior values intact where sensible.
#[derive(Debug, Clone, Default)]
pub struct MrUpsert {
    pub iid: i64,
    pub title: String,
    pub author: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
    pub state: String,
    pub web_url: String,
    pub last_seen_sha: Option<String>,
}

impl Store {
    pub async fn upsert_repository(
        &self,
        tenant_id: &str,
        provider: &str,
        provider_repo_id: &str,
        namespace: &str,
        name: &str,
        default_branch: &str,
    ) -> StoreResult<Repository> {
        sqlx::query(
            "INSERT INTO repositories
                (id, tenant_id, provider, provider_repo_id, namespace, name, default_branch)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(tenant_id, provider, provider_repo_id) DO UPDATE SET
                namespace = CASE WHEN excluded.namespace != '' THEN excluded.namespace ELSE repositories.namespace END,
                name = CASE WHEN excluded.name != '' THEN excluded.name ELSE repositories.name END,
                default_branch = CASE WHEN excluded.default_branch != '' THEN excluded.default_branch ELSE repositories.default_branch END",
        )
        .bind(new_id())
        .bind(tenant_id)
        .bind(provider)
        .bind(provider_repo_id)
        .bind(namespace)
        .bind(name)
        .bind(default_branch)
        .execute(self.pool())
        .await?;

        let row = sqlx::query(
            "SELECT * FROM repositories
             WHERE tenant_id = ? AND provider = ? AND provider_repo_id = ?",
        )
        .bind(tenant_id)
        .bind(provider)
        .bind(provider_repo_id)
        .fetch_one(self.pool())
        .await?;
        repo_from_row(&row)
    }

    pub async fn upsert_merge_request(
        &self,
        tenant_id: &str,
        repository_id: &str,
        fields: &MrUpsert,
    ) -> StoreResult<MergeRequest> {
        sqlx::query(
            "INSERT INTO merge_requests
                (id, tenant_id, repository_id, iid, title, author, source_branch,
                 target_branch, state, web_url, last_seen_sha)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(tenant_id, repository_id, iid) DO UPDATE SET
                title = CASE WHEN excluded.title != '' THEN excluded.title ELSE merge_requests.title END,
                author = COALESCE(excluded.author, merge_requests.author),
                source_branch = CASE WHEN excluded.source_branch != '' THEN excluded.source_branch ELSE merge_requests.source_branch END,
                target_branch = CASE WHEN excluded.target_branch != '' THEN excluded.target_branch ELSE merge_requests.target_branch END,
                state = CASE WHEN excluded.state != '' THEN excluded.state ELSE merge_requests.state END,
                web_url = CASE WHEN excluded.web_url != '' THEN excluded.web_url ELSE merge_requests.web_url END,
                last_seen_sha = COALESCE(excluded.last_seen_sha, merge_requests.last_seen_sha)",
        )
        .bind(new_id())
        .bind(tenant_id)
        .bind(repository_id)
        .bind(fields.iid)
        .bind(&fields.title)
        .bind(&fields.author)
        .bind(&fields.source_branch)
        .bind(&fields.target_branch)
        .bind(&fields.state)
        .bind(&fields.web_url)
        .bind(&fields.last_seen_sha)
        .execute(self.pool())
        .await?;

        self.get_merge_request(tenant_id, repository_id, fields.iid)
            .await?
            .ok_or_else(|| StoreError::not_found("merge_request", format!("iid {}", fields.iid)))
    }

    pub async fn get_merge_request(
        &self,
        tenant_id: &str,
        repository_id: &str,
        iid: i64,
    ) -> StoreResult<Option<MergeRequest>> {
        let row = sqlx::query(
            "SELECT * FROM merge_requests
             WHERE tenant_id = ? AND repository_id = ? AND iid = ?",
        )
        .bind(tenant_id)
        .bind(repository_id)
        .bind(iid)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(mr_from_row).transpose()
    }

    pub async fn get_merge_request_by_id(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> StoreResult<Option<MergeRequest>> {
        let row = sqlx::query("SELECT * FROM merge_requests WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(mr_from_row).transpose()
    }

    /// Resolves an MR from provider coordinates (project + iid), the shape
    /// webhook payloads and job payloads carry.
    pub async fn find_mr_by_provider_coords(
        &self,
        tenant_id: &str,
        provider: &str,
        provider_repo_id: &str,
        iid: i64,
    ) -> StoreResult<Option<MergeRequest>> {
        let row = sqlx::query(
            "SELECT m.* FROM merge_requests m
             JOIN repositories r ON r.id = m.repository_id
             WHERE m.tenant_id = ? AND r.provider = ? AND r.provider_repo_id = ? AND m.iid = ?",
        )
        .bind(tenant_id)
        .bind(provider)
        .bind(provider_repo_id)
        .bind(iid)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(mr_from_row).transpose()
    }

    pub async fn get_repository_by_id(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> StoreResult<Option<Repository>> {
        let row = sqlx::query("SELECT * FROM repositories WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(repo_from_row).transpose()
    }

    /// Newest-first MR listing, optionally per repository.
    pub async fn list_merge_requests(
        &self,
        tenant_id: &str,
        repository_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<MergeRequest>> {
        let rows = match repository_id {
            Some(repo) => {
                sqlx::query(
                    "SELECT * FROM merge_requests
                     WHERE tenant_id = ? AND repository_id = ?
                     ORDER BY rowid DESC LIMIT ? OFFSET ?",
                )
                .bind(tenant_id)
                .bind(repo)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM merge_requests
                     WHERE tenant_id = ?
                     ORDER BY rowid DESC LIMIT ? OFFSET ?",
                )
                .bind(tenant_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool())
                .await?
            }
        };
        rows.iter().map(mr_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_store;

    async fn seed(store: &Store) -> (String, Repository) {
        let tenant = store.ensure_tenant("t1", "gitlab", "s").await.unwrap();
        let repo = store
            .upsert_repository(&tenant.id, "gitlab", "77381939", "group", "proj", "main")
            .await
            .unwrap();
        (tenant.id, repo)
    }

    #[tokio::test]
    async fn repository_upsert_is_stable() {
        let store = test_store().await;
        let (tenant_id, repo) = seed(&store).await;
        let again = store
            .upsert_repository(&tenant_id, "gitlab", "77381939", "", "", "")
            .await
            .unwrap();
        assert_eq!(repo.id, again.id);
        // Empty fields did not clobber existing values.
        assert_eq!(again.namespace, "group");
        assert_eq!(again.default_branch, "main");
    }

    #[tokio::test]
    async fn mr_upsert_updates_last_seen_sha() {
        let store = test_store().await;
        let (tenant_id, repo) = seed(&store).await;

        let first = store
            .upsert_merge_request(
                &tenant_id,
                &repo.id,
                &MrUpsert {
                    iid: 2,
                    title: "Add login".into(),
                    state: "opened".into(),
                    last_seen_sha: Some("sha1".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(first.last_seen_sha.as_deref(), Some("sha1"));

        let second = store
            .upsert_merge_request(
                &tenant_id,
                &repo.id,
                &MrUpsert {
                    iid: 2,
                    last_seen_sha: Some("sha2".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.last_seen_sha.as_deref(), Some("sha2"));
        // Title survived the sparse update.
        assert_eq!(second.title, "Add login");
    }

    #[tokio::test]
    async fn provider_coords_lookup() {
        let store = test_store().await;
        let (tenant_id, repo) = seed(&store).await;
        store
            .upsert_merge_request(
                &tenant_id,
                &repo.id,
                &MrUpsert {
                    iid: 7,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let found = store
            .find_mr_by_provider_coords(&tenant_id, "gitlab", "77381939", 7)
            .await
            .unwrap();
        assert!(found.is_some());
        assert!(store
            .find_mr_by_provider_coords(&tenant_id, "gitlab", "other", 7)
            .await
            .unwrap()
            .is_none());
    }
}
