//! Durable store for tenants, repositories, MRs, review runs, check results,
//! suggestions, comments and knowledge sources.
//!
//! SQLite via sqlx (runtime-checked queries). The schema is embedded and
//! applied idempotently at connect time. All uniqueness tuples of the data
//! model are UNIQUE indexes; upserts ride on them. Every query is
//! tenant-scoped; no cross-tenant reads exist in this crate.

pub mod checks;
pub mod comments;
pub mod configs;
pub mod errors;
pub mod ids;
pub mod knowledge;
pub mod models;
pub mod repos;
pub mod runs;
mod schema;
pub mod suggestions;
pub mod tenants;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

pub use errors::{StoreError, StoreResult};
pub use ids::new_id;
pub use models::*;

/// Shared handle over the SQLite pool. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if missing) the database at `url` and applies the
    /// embedded schema. `sqlite::memory:` is honored for tests.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        // In-memory databases live per-connection; cap the pool at one so
        // every query sees the same database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(url = %redact_url(url), "store connected");
        Ok(store)
    }

    async fn migrate(&self) -> StoreResult<()> {
        for statement in schema::MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the pool; part of graceful shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Connection strings may embed credentials; log scheme+path only.
fn redact_url(url: &str) -> String {
    match url.split_once('@') {
        Some((_, tail)) => format!("…@{tail}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
pub(crate) async fn test_store() -> Store {
    Store::connect("sqlite::memory:").await.expect("in-memory store")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connects_and_migrates_idempotently() {
        let store = test_store().await;
        // Second migration pass must be a no-op.
        store.migrate().await.unwrap();
        store.close().await;
    }

    #[test]
    fn url_redaction() {
        assert_eq!(redact_url("sqlite://data/app.db"), "sqlite://data/app.db");
        assert_eq!(redact_url("postgres://u:p@host/db"), "…@host/db");
    }
}
