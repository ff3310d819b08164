//! The review pipeline: one job in, one terminal run state out.
//!
//! Step order (each sub-stage logs a structured event):
//! 1. locate run + tenant guard          7. run checks, persist batch
//! 2. mark RUNNING (before heavy work)   8. score
//! 3. retry gate on prior FAILED          9. knowledge (GOLD or precedents)
//! 4. idempotency marker                 10. AI augmentation (never fatal)
//! 5. fetch diff (30 s deadline)         11. comment reconciliation
//! 6. load tenant check overlays         12. finalize SUCCEEDED
//!
//! The caller guarantees finalization: any error path ends in FAILED, and a
//! recovery sweep catches runs a crashed process left RUNNING.

use std::time::Duration;

use check_engine::{CheckContext, CheckResult, FileChange, MrInfo};
use git_host::{GitLabClient, HostChange};
use job_queue::ReviewJobPayload;
use precedent_index::PrecedentMatch;
use review_store::{RunStatus, Store, Tenant};
use tracing::{debug, info, warn};

use crate::ai_stage::{AiProcessConfig, run_ai_stage};
use crate::comment::{CommentInput, render_comment};
use crate::errors::{RunnerError, RunnerResult};
use crate::knowledge_stage;
use crate::retry::error_looks_transient;

/// Diff fetch deadline on top of the client's own transport timeouts.
pub const DIFF_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the pipeline needs besides the payload.
pub struct PipelineDeps {
    pub store: Store,
    pub host: GitLabClient,
    pub ai: AiProcessConfig,
}

/// How a successfully handled job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// Run was already SUCCEEDED; nothing to do.
    AlreadySucceeded,
    /// Redelivery of a FAILED run whose error is not transient-looking;
    /// FAILED left in place.
    SkippedNonTransient,
}

pub async fn process_review_job(
    deps: &PipelineDeps,
    payload: &ReviewJobPayload,
) -> RunnerResult<JobOutcome> {
    let store = &deps.store;

    // --- step 1: locate -----------------------------------------------------
    debug!(run_id = %payload.review_run_id, "step1: locate run");
    let run = store
        .get_run_any_tenant(&payload.review_run_id)
        .await?
        .ok_or_else(|| RunnerError::RunNotFound(payload.review_run_id.clone()))?;

    let tenant = store
        .find_tenant_by_slug(&payload.tenant_slug)
        .await?
        .ok_or_else(|| RunnerError::TenantMismatch {
            run_id: run.id.clone(),
            tenant_slug: payload.tenant_slug.clone(),
        })?;
    if run.tenant_id != tenant.id {
        // Security event: a job claiming a run from another tenant.
        warn!(
            run_id = %run.id,
            claimed_tenant = %payload.tenant_slug,
            "tenant mismatch on job payload"
        );
        return Err(RunnerError::TenantMismatch {
            run_id: run.id.clone(),
            tenant_slug: payload.tenant_slug.clone(),
        });
    }

    // --- step 2: mark RUNNING before any heavy work -------------------------
    let prior_error = run.error.clone();
    let prior = store.mark_running(&run.id).await?;
    info!(run_id = %run.id, prior = %prior, "step2: marked RUNNING");
    if prior == RunStatus::Succeeded {
        debug!(run_id = %run.id, "step2: already SUCCEEDED; no-op");
        return Ok(JobOutcome::AlreadySucceeded);
    }

    // --- step 3: retry gate -------------------------------------------------
    if prior == RunStatus::Failed {
        if let Some(prev) = prior_error.as_deref() {
            if !error_looks_transient(prev) {
                info!(run_id = %run.id, "step3: prior failure not transient; leaving FAILED");
                store.finalize_failure(&run.id, prev).await?;
                return Ok(JobOutcome::SkippedNonTransient);
            }
            debug!(run_id = %run.id, "step3: prior failure transient; re-executing");
        }
    }

    // --- step 4: idempotency marker ----------------------------------------
    if store.has_check_results(&run.id).await? {
        info!(run_id = %run.id, "step4: check results exist; rescoring without re-run");
        let results = store.load_engine_results(&run.id).await?;
        let score = check_engine::calculate_score(&results);
        let suggestions = store.list_suggestions(&run.id).await?;

        reconcile_comment(
            deps,
            &tenant,
            payload,
            &run.id,
            &run.head_sha,
            score,
            &results,
            false,
            &[],
            &suggestions,
        )
        .await;

        store
            .finalize_success(&run.id, score as i64, &check_engine::summary_line(&results))
            .await?;
        return Ok(JobOutcome::Completed);
    }

    // --- step 5: fetch diff -------------------------------------------------
    store.set_phase(&run.id, "fetching-diff", "fetching merge request changes").await?;
    debug!(run_id = %run.id, "step5: fetch changes");
    let changes: Vec<HostChange> = tokio::time::timeout(
        DIFF_FETCH_TIMEOUT,
        deps.host
            .get_merge_request_changes(&payload.project_id, payload.mr_iid as u64),
    )
    .await
    .map_err(|_| RunnerError::DiffTimeout)??;
    let pairs: Vec<(String, String)> = changes.iter().map(HostChange::as_path_diff).collect();
    debug!(run_id = %run.id, files = pairs.len(), "step5: changes fetched");

    let mr_row = store
        .find_mr_by_provider_coords(
            &tenant.id,
            &payload.provider,
            &payload.project_id,
            payload.mr_iid,
        )
        .await?;
    let mr_title = mr_row
        .as_ref()
        .map(|m| m.title.clone())
        .or_else(|| payload.title.clone())
        .unwrap_or_default();
    let mr_web_url = mr_row.as_ref().map(|m| m.web_url.clone()).unwrap_or_default();

    // --- step 6: tenant check overlays --------------------------------------
    let overlays = store.load_check_overlays(&tenant.id).await?;
    debug!(run_id = %run.id, overlays = overlays.len(), "step6: overlays loaded");

    // --- step 7: run checks, persist atomically -----------------------------
    store.set_phase(&run.id, "running-checks", "executing deterministic checks").await?;
    let ctx = CheckContext {
        changes: pairs
            .iter()
            .map(|(path, diff)| FileChange {
                path: path.clone(),
                diff: diff.clone(),
            })
            .collect(),
        mr: MrInfo {
            title: mr_title.clone(),
            description: String::new(),
        },
    };
    let results: Vec<CheckResult> = check_engine::run_checks(&ctx, &overlays);
    store
        .insert_check_results(&tenant.id, &run.id, &results)
        .await?;
    info!(run_id = %run.id, checks = results.len(), "step7: checks persisted");

    // --- step 8: score -------------------------------------------------------
    let score = check_engine::calculate_score(&results);
    debug!(run_id = %run.id, score, "step8: scored");

    // --- step 9: knowledge ---------------------------------------------------
    store.set_phase(&run.id, "knowledge", "evaluating knowledge base").await?;
    let mut gold_promoted = false;
    let mut precedents: Vec<PrecedentMatch> = Vec::new();
    if payload.is_merged_candidate {
        let (title, description, web_url) =
            merged_mr_context(&deps.host, payload, &mr_title, &mr_web_url).await;
        // Approvals are best-effort; unknown skips the gate.
        let approvals = match deps
            .host
            .get_merge_request_approvals(&payload.project_id, payload.mr_iid as u64)
            .await
        {
            Ok(a) => a.map(|a| a.approved_count),
            Err(e) => {
                warn!(run_id = %run.id, error = %e, "approvals fetch failed; treating as unknown");
                None
            }
        };
        gold_promoted = knowledge_stage::evaluate_gold(
            store,
            &tenant,
            &payload.provider,
            &web_url,
            payload.mr_iid,
            &title,
            &description,
            &changes,
            score,
            approvals,
            &results,
        )
        .await?;
    } else {
        precedents =
            knowledge_stage::find_precedents(store, &tenant.id, &mr_title, "", &pairs).await?;
    }
    debug!(
        run_id = %run.id,
        gold_promoted,
        precedents = precedents.len(),
        "step9: knowledge done"
    );

    // --- step 10: AI augmentation (never fails the run) ----------------------
    store.set_phase(&run.id, "ai", "generating fix suggestions").await?;
    let tenant_ai = store.get_ai_config(&tenant.id).await?;
    let suggestions = run_ai_stage(
        store,
        &deps.ai,
        tenant_ai.as_ref(),
        &tenant.id,
        &run.id,
        &mr_title,
        "",
        &pairs,
        &results,
        &precedents,
    )
    .await;

    // --- step 11: comment reconciliation -------------------------------------
    store.set_phase(&run.id, "commenting", "reconciling summary comment").await?;
    reconcile_comment(
        deps,
        &tenant,
        payload,
        &run.id,
        &run.head_sha,
        score,
        &results,
        gold_promoted,
        &precedents,
        &suggestions,
    )
    .await;

    // --- step 12: finalize ----------------------------------------------------
    let summary = check_engine::summary_line(&results);
    store
        .finalize_success(&run.id, score as i64, &summary)
        .await?;
    info!(run_id = %run.id, score, %summary, "step12: run SUCCEEDED");
    Ok(JobOutcome::Completed)
}

/// Merged MRs need fresh metadata (description, final state) for the GOLD
/// document; fall back to stored values when the host refuses.
async fn merged_mr_context(
    host: &GitLabClient,
    payload: &ReviewJobPayload,
    fallback_title: &str,
    fallback_url: &str,
) -> (String, String, String) {
    match host
        .get_merge_request(&payload.project_id, payload.mr_iid as u64)
        .await
    {
        Ok(mr) => (mr.title, mr.description, mr.web_url),
        Err(e) => {
            warn!(error = %e, "merged MR metadata fetch failed; using stored fields");
            (
                fallback_title.to_string(),
                String::new(),
                fallback_url.to_string(),
            )
        }
    }
}

/// Renders and reconciles the single summary comment. Post failures are
/// logged and swallowed: the note is a side effect, not run state.
#[allow(clippy::too_many_arguments)]
async fn reconcile_comment(
    deps: &PipelineDeps,
    tenant: &Tenant,
    payload: &ReviewJobPayload,
    run_id: &str,
    head_sha: &str,
    score: u32,
    results: &[CheckResult],
    gold_promoted: bool,
    precedents: &[PrecedentMatch],
    suggestions: &[review_store::AiSuggestionRow],
) {
    let rendered = render_comment(&CommentInput {
        run_id,
        head_sha,
        score,
        results,
        gold_promoted,
        precedents,
        suggestions,
    });

    let existing = match deps.store.get_summary_comment(run_id).await {
        Ok(c) => c,
        Err(e) => {
            warn!(run_id, error = %e, "comment lookup failed; skipping reconciliation");
            return;
        }
    };

    match existing {
        Some(existing)
            if existing.body == rendered.body
                && existing.ai_included == rendered.ai_included
                && existing.ai_summary_hash == rendered.ai_summary_hash =>
        {
            debug!(run_id, "step11: comment unchanged; skipping update");
        }
        Some(existing) => {
            let note_id: u64 = match existing.provider_id.parse() {
                Ok(id) => id,
                Err(_) => {
                    warn!(run_id, provider_id = %existing.provider_id, "stored note id unparsable");
                    return;
                }
            };
            match deps
                .host
                .update_merge_request_note(
                    &payload.project_id,
                    payload.mr_iid as u64,
                    note_id,
                    &rendered.body,
                )
                .await
            {
                Ok(note) => {
                    if let Err(e) = deps
                        .store
                        .upsert_summary_comment(
                            &tenant.id,
                            run_id,
                            &payload.provider,
                            &note.id.to_string(),
                            &rendered.body,
                            rendered.ai_included,
                            rendered.ai_summary_hash.as_deref(),
                        )
                        .await
                    {
                        warn!(run_id, error = %e, "comment row update failed");
                    }
                    info!(run_id, note_id, "step11: summary comment updated");
                }
                Err(e) => warn!(run_id, error = %e, "step11: note update failed; run continues"),
            }
        }
        None => {
            match deps
                .host
                .create_merge_request_note(
                    &payload.project_id,
                    payload.mr_iid as u64,
                    &rendered.body,
                )
                .await
            {
                Ok(note) => {
                    if let Err(e) = deps
                        .store
                        .upsert_summary_comment(
                            &tenant.id,
                            run_id,
                            &payload.provider,
                            &note.id.to_string(),
                            &rendered.body,
                            rendered.ai_included,
                            rendered.ai_summary_hash.as_deref(),
                        )
                        .await
                    {
                        warn!(run_id, error = %e, "comment row insert failed");
                    }
                    info!(run_id, note_id = note.id, "step11: summary comment created");
                }
                Err(e) => warn!(run_id, error = %e, "step11: note create failed; run continues"),
            }
        }
    }
}
