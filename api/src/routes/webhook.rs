//! Webhook intake: authenticate, extract, upsert, decide, enqueue.
//!
//! The response contract:
//! - 200 `{reviewRunId, jobId, outcome}` when a run exists or was scheduled
//!   (duplicate deliveries return the existing run's id);
//! - 202 `{reason}` for anything ignored;
//! - 401 for a bad secret;
//! - 500 only for genuine internal failures.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use axum::http::StatusCode;
use job_queue::{EnqueueOptions, ReviewJobPayload};
use review_store::{RunStatus, Tenant, repos::MrUpsert};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::app_state::AppState;
use crate::error_handler::AppResult;
use crate::routes::event::{EventDecision, MrEvent};

/// Headers checked for the webhook secret, in order.
const SECRET_HEADERS: [&str; 2] = ["X-Gitlab-Token", "X-Webhook-Token"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AcceptedBody {
    review_run_id: String,
    job_id: String,
    outcome: &'static str,
}

#[derive(Serialize)]
struct IgnoredBody {
    reason: String,
}

fn accepted(review_run_id: String, job_id: String, outcome: &'static str) -> Response {
    (
        StatusCode::OK,
        Json(AcceptedBody {
            review_run_id,
            job_id,
            outcome,
        }),
    )
        .into_response()
}

fn ignored(reason: impl Into<String>) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(IgnoredBody {
            reason: reason.into(),
        }),
    )
        .into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(IgnoredBody {
            reason: "invalid webhook secret".into(),
        }),
    )
        .into_response()
}

/// `POST /webhooks/{provider}`
pub async fn webhook_route(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> AppResult<Response> {
    // --- Authenticate: provider secret header, query fallback -------------
    let secret = SECRET_HEADERS
        .iter()
        .find_map(|h| headers.get(*h).and_then(|v| v.to_str().ok()))
        .map(str::to_string)
        .or_else(|| query.get("secret").cloned());

    let Some(secret) = secret else {
        warn!(provider = %provider, "webhook without secret");
        state.activity.record("webhook_unauthorized", None, "missing secret");
        return Ok(unauthorized());
    };

    let Some(tenant) = state
        .store
        .find_tenant_by_webhook_secret(&provider, &secret)
        .await?
    else {
        warn!(provider = %provider, "webhook secret matched no tenant");
        state.activity.record("webhook_unauthorized", None, "unknown secret");
        return Ok(unauthorized());
    };

    // --- Extract and filter ----------------------------------------------
    let Some(event) = MrEvent::from_value(&body) else {
        debug!(tenant = %tenant.slug, "ignoring non-MR event");
        state
            .activity
            .record("webhook_ignored", Some(&tenant.slug), "unsupported event kind");
        return Ok(ignored("unsupported event kind"));
    };

    let merged_candidate = match event.decision() {
        EventDecision::Trigger { merged_candidate } => merged_candidate,
        EventDecision::Ignore(reason) => {
            debug!(tenant = %tenant.slug, action = %event.action, reason, "event ignored");
            state
                .activity
                .record("webhook_ignored", Some(&tenant.slug), reason);
            return Ok(ignored(reason));
        }
    };
    // decision() only triggers with a sha present
    let head_sha = event.head_sha.clone().unwrap_or_default();

    // --- Upsert repository and MR ----------------------------------------
    let repo = state
        .store
        .upsert_repository(
            &tenant.id,
            &provider,
            &event.project_id,
            &event.project_namespace,
            &event.project_name,
            &event.default_branch,
        )
        .await?;
    let mr = state
        .store
        .upsert_merge_request(
            &tenant.id,
            &repo.id,
            &MrUpsert {
                iid: event.mr_iid,
                title: event.title.clone(),
                author: event.author.clone(),
                source_branch: event.source_branch.clone(),
                target_branch: event.target_branch.clone(),
                state: event.state.clone(),
                web_url: event.web_url.clone(),
                last_seen_sha: Some(head_sha.clone()),
            },
        )
        .await?;

    // --- Dedup decision ----------------------------------------------------
    let prior = state
        .store
        .latest_run_for_sha(&tenant.id, &mr.id, &head_sha)
        .await?;

    let (run_id, outcome) = match prior {
        Some(run) if run.status != RunStatus::Failed => {
            info!(
                tenant = %tenant.slug,
                run_id = %run.id,
                status = %run.status,
                "duplicate delivery for known sha"
            );
            state.activity.record(
                "webhook_duplicate",
                Some(&tenant.slug),
                format!("mr !{} sha {} run {}", event.mr_iid, head_sha, run.id),
            );
            let job_id = job_id_for(&tenant, &provider, &event, &head_sha, &run.id);
            return Ok(accepted(run.id, job_id, "duplicate"));
        }
        Some(run) => {
            // Prior FAILED run: reset in place, re-enqueue under the same id.
            let run = state.store.reset_for_retry(&tenant.id, &run.id).await?;
            (run.id, "requeued-failed")
        }
        None => {
            let run = state.store.create_run(&tenant.id, &mr.id, &head_sha).await?;
            (run.id, "accepted")
        }
    };

    let payload = ReviewJobPayload {
        tenant_slug: tenant.slug.clone(),
        provider: provider.clone(),
        project_id: event.project_id.clone(),
        mr_iid: event.mr_iid,
        head_sha: head_sha.clone(),
        title: Some(event.title.clone()),
        is_merged_candidate: merged_candidate,
        review_run_id: run_id.clone(),
    };
    // The run id must be inside the job identity before anything is queued.
    let job_id = payload.job_id();
    debug_assert!(job_id.ends_with(&run_id));

    state
        .queue
        .enqueue(&job_id, &payload, &EnqueueOptions::default())
        .await?;

    info!(
        tenant = %tenant.slug,
        run_id = %run_id,
        job_id = %job_id,
        outcome,
        "review enqueued"
    );
    state.activity.record(
        "webhook_accepted",
        Some(&tenant.slug),
        format!("mr !{} sha {} run {}", event.mr_iid, head_sha, run_id),
    );

    Ok(accepted(run_id, job_id, outcome))
}

fn job_id_for(
    tenant: &Tenant,
    provider: &str,
    event: &MrEvent,
    head_sha: &str,
    run_id: &str,
) -> String {
    job_queue::build_job_id(
        &tenant.slug,
        provider,
        &event.project_id,
        event.mr_iid,
        head_sha,
        Some(run_id),
    )
}
