//! HTTP surface: webhook intake, control API and the activity ring.
//!
//! `build_state` wires the store, queue and host client together and seeds
//! the default tenant; `router` assembles the axum app; `serve` binds and
//! runs until the shutdown future resolves.

pub mod activity;
pub mod core;
pub mod error_handler;
pub mod routes;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tracing::info;

use crate::activity::ActivityBuffer;
use crate::core::app_state::{AppState, PROVIDER};
use crate::core::config::AppConfig;
use crate::error_handler::{AppError, AppResult};

/// Connects all backing services and seeds the default tenant with the
/// configured webhook secret.
pub async fn build_state(config: AppConfig) -> AppResult<Arc<AppState>> {
    let store = review_store::Store::connect(&config.database_url).await?;
    let queue = job_queue::Queue::connect(&config.queue_url).await?;
    let host = git_host::GitLabClient::new(config.host_base_url.clone(), config.host_token.clone())?;

    store
        .ensure_tenant(
            &config.default_tenant_slug,
            PROVIDER,
            &config.host_webhook_secret,
        )
        .await?;
    info!(tenant = %config.default_tenant_slug, "default tenant ready");

    Ok(Arc::new(AppState {
        store,
        queue,
        host,
        activity: ActivityBuffer::new(),
        config,
    }))
}

/// The full route table.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks/{provider}", post(routes::webhook::webhook_route))
        .route("/review-runs", get(routes::runs::list_runs_route))
        .route("/review-runs/{id}", get(routes::runs::get_run_route))
        .route(
            "/review-runs/{id}/retry",
            post(routes::runs::retry_run_route),
        )
        .route(
            "/merge-requests",
            get(routes::merge_requests::list_mrs_route),
        )
        .route(
            "/merge-requests/{project_id}/{iid}",
            get(routes::merge_requests::get_mr_route),
        )
        .route(
            "/merge-requests/{project_id}/{iid}/trigger-review",
            post(routes::merge_requests::trigger_review_route),
        )
        .route("/activity", get(routes::activity::activity_route))
        .route(
            "/knowledge/ingest-docs",
            post(routes::knowledge::ingest_docs_route),
        )
        .with_state(state)
}

/// Binds and serves until `shutdown` resolves; in-flight requests drain.
pub async fn serve(
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> AppResult<()> {
    let addr = state.config.bind_addr.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(AppError::Bind)?;
    info!(addr = %addr, "api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(AppError::Server)?;
    Ok(())
}
