//! Review-run control endpoints: listing, detail, retry.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use job_queue::{EnqueueOptions, ReviewJobPayload};
use review_store::{AiSuggestionRow, CheckResultRow, ReviewRun};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::app_state::AppState;
use crate::error_handler::{AppError, AppResult};
use crate::routes::auth::authorize;

#[derive(Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn page(q: &PageQuery) -> (i64, i64) {
    let limit = q.limit.unwrap_or(20).clamp(1, 100);
    let offset = q.offset.unwrap_or(0).max(0);
    (limit, offset)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunListBody {
    pub runs: Vec<ReviewRun>,
    pub limit: i64,
    pub offset: i64,
}

/// `GET /review-runs?limit&offset`
pub async fn list_runs_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<PageQuery>,
) -> AppResult<Json<RunListBody>> {
    let tenant = authorize(&state, &headers).await?;
    let (limit, offset) = page(&q);
    let runs = state.store.list_runs(&tenant.id, limit, offset).await?;
    Ok(Json(RunListBody {
        runs,
        limit,
        offset,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDetailBody {
    pub run: ReviewRun,
    pub check_results: Vec<CheckResultRow>,
    pub ai_suggestions: Vec<AiSuggestionRow>,
}

/// `GET /review-runs/{id}`
pub async fn get_run_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<Json<RunDetailBody>> {
    let tenant = authorize(&state, &headers).await?;
    let run = state
        .store
        .get_run(&tenant.id, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    let check_results = state.store.list_check_results(&run.id).await?;
    let ai_suggestions = state.store.list_suggestions(&run.id).await?;
    Ok(Json(RunDetailBody {
        run,
        check_results,
        ai_suggestions,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryBody {
    pub review_run_id: String,
    pub job_id: String,
}

/// `POST /review-runs/{id}/retry`. Only FAILED runs are eligible.
pub async fn retry_run_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<Json<RetryBody>> {
    let tenant = authorize(&state, &headers).await?;

    let run = state.store.reset_for_retry(&tenant.id, &id).await?;
    let mr = state
        .store
        .get_merge_request_by_id(&tenant.id, &run.merge_request_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let repo = state
        .store
        .get_repository_by_id(&tenant.id, &mr.repository_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let payload = ReviewJobPayload {
        tenant_slug: tenant.slug.clone(),
        provider: repo.provider.clone(),
        project_id: repo.provider_repo_id.clone(),
        mr_iid: mr.iid,
        head_sha: run.head_sha.clone(),
        title: Some(mr.title.clone()),
        is_merged_candidate: mr.state == "merged",
        review_run_id: run.id.clone(),
    };
    let job_id = payload.job_id();
    state
        .queue
        .enqueue(&job_id, &payload, &EnqueueOptions::default())
        .await?;

    info!(tenant = %tenant.slug, run_id = %run.id, "run retry enqueued");
    state.activity.record(
        "retry",
        Some(&tenant.slug),
        format!("run {} re-queued", run.id),
    );

    Ok(Json(RetryBody {
        review_run_id: run.id,
        job_id,
    }))
}
