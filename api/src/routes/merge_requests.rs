//! Merge-request control endpoints: listing, detail, manual trigger.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use job_queue::{EnqueueOptions, ReviewJobPayload};
use review_store::{MergeRequest, ReviewRun, repos::MrUpsert};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::app_state::{AppState, PROVIDER};
use crate::error_handler::{AppError, AppResult};
use crate::routes::auth::authorize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MrListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub repository_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MrWithLatestRun {
    #[serde(flatten)]
    pub merge_request: MergeRequest,
    pub latest_run: Option<ReviewRun>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MrListBody {
    pub merge_requests: Vec<MrWithLatestRun>,
}

/// `GET /merge-requests?limit&offset&repositoryId`
pub async fn list_mrs_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<MrListQuery>,
) -> AppResult<Json<MrListBody>> {
    let tenant = authorize(&state, &headers).await?;
    let limit = q.limit.unwrap_or(20).clamp(1, 100);
    let offset = q.offset.unwrap_or(0).max(0);

    let mrs = state
        .store
        .list_merge_requests(&tenant.id, q.repository_id.as_deref(), limit, offset)
        .await?;

    let mut out = Vec::with_capacity(mrs.len());
    for mr in mrs {
        let latest_run = state.store.latest_run_for_mr(&tenant.id, &mr.id).await?;
        out.push(MrWithLatestRun {
            merge_request: mr,
            latest_run,
        });
    }
    Ok(Json(MrListBody {
        merge_requests: out,
    }))
}

/// `GET /merge-requests/{projectId}/{iid}`
pub async fn get_mr_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((project_id, iid)): Path<(String, i64)>,
) -> AppResult<Json<MrWithLatestRun>> {
    let tenant = authorize(&state, &headers).await?;
    let mr = state
        .store
        .find_mr_by_provider_coords(&tenant.id, PROVIDER, &project_id, iid)
        .await?
        .ok_or(AppError::NotFound)?;
    let latest_run = state.store.latest_run_for_mr(&tenant.id, &mr.id).await?;
    Ok(Json(MrWithLatestRun {
        merge_request: mr,
        latest_run,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerBody {
    pub review_run_id: String,
    pub job_id: String,
}

/// `POST /merge-requests/{projectId}/{iid}/trigger-review`
///
/// Unlike the webhook path, a manual trigger always mints a fresh run; the
/// MR is fetched from the host first to validate the SHA and refresh
/// repository metadata.
pub async fn trigger_review_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((project_id, iid)): Path<(String, i64)>,
) -> AppResult<Json<TriggerBody>> {
    let tenant = authorize(&state, &headers).await?;

    let host_mr = state.host.get_merge_request(&project_id, iid as u64).await?;
    if host_mr.head_sha.is_empty() {
        return Err(AppError::BadRequest(
            "merge request has no head sha; nothing to review".into(),
        ));
    }

    let repo = state
        .store
        .upsert_repository(&tenant.id, PROVIDER, &project_id, "", "", "")
        .await?;
    let mr = state
        .store
        .upsert_merge_request(
            &tenant.id,
            &repo.id,
            &MrUpsert {
                iid,
                title: host_mr.title.clone(),
                author: host_mr.author_username.clone(),
                source_branch: host_mr.source_branch.clone(),
                target_branch: host_mr.target_branch.clone(),
                state: host_mr.state.clone(),
                web_url: host_mr.web_url.clone(),
                last_seen_sha: Some(host_mr.head_sha.clone()),
            },
        )
        .await?;

    let run = state
        .store
        .create_run(&tenant.id, &mr.id, &host_mr.head_sha)
        .await?;

    let payload = ReviewJobPayload {
        tenant_slug: tenant.slug.clone(),
        provider: PROVIDER.to_string(),
        project_id: project_id.clone(),
        mr_iid: iid,
        head_sha: host_mr.head_sha.clone(),
        title: Some(host_mr.title.clone()),
        is_merged_candidate: host_mr.is_merged(),
        review_run_id: run.id.clone(),
    };
    let job_id = payload.job_id();
    state
        .queue
        .enqueue(&job_id, &payload, &EnqueueOptions::default())
        .await?;

    info!(
        tenant = %tenant.slug,
        run_id = %run.id,
        mr_iid = iid,
        "manual review trigger enqueued"
    );
    state.activity.record(
        "manual_trigger",
        Some(&tenant.slug),
        format!("mr !{} sha {} run {}", iid, host_mr.head_sha, run.id),
    );

    Ok(Json(TriggerBody {
        review_run_id: run.id,
        job_id,
    }))
}
