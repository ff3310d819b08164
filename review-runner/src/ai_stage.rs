//! AI augmentation stage: gating, failing-check ranking, snippet building
//! and suggestion persistence. An AI failure of any kind is logged with its
//! classification and the run continues; this stage cannot fail a review.

use check_engine::{CheckCategory, CheckResult, CheckStatus};
use llm_adapter::{
    AiConfig, FailedCheck, LlmClient, MrContext, PrecedentRef, PromptSnippet, SuggestionRequest,
};
use precedent_index::PrecedentMatch;
use privacy_filter::{SnippetRequest, select_snippets};
use review_store::suggestions::SuggestionInsert;
use review_store::TenantAiConfig;
use tracing::{debug, info, warn};

/// Process-wide AI wiring from the environment.
#[derive(Debug, Clone)]
pub struct AiProcessConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    /// OpenAI-compatible endpoint.
    pub endpoint: String,
}

impl AiProcessConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            api_key: None,
            endpoint: "https://api.openai.com".into(),
        }
    }
}

/// Why the stage was skipped, for the step log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiGate {
    Enabled,
    ProcessDisabled,
    TenantDisabled,
    DiffTooLarge { bytes: usize, limit: usize },
    NothingFailing,
}

/// The AI gate: process switch AND tenant switch AND diff-size ceiling.
pub fn evaluate_gate(
    process: &AiProcessConfig,
    tenant: Option<&TenantAiConfig>,
    total_diff_bytes: usize,
    failing: usize,
) -> AiGate {
    if !process.enabled || process.api_key.is_none() {
        return AiGate::ProcessDisabled;
    }
    let Some(tenant) = tenant else {
        return AiGate::TenantDisabled;
    };
    if !tenant.enabled {
        return AiGate::TenantDisabled;
    }
    let limit = tenant.max_total_diff_bytes as usize;
    if total_diff_bytes > limit {
        return AiGate::DiffTooLarge {
            bytes: total_diff_bytes,
            limit,
        };
    }
    if failing == 0 {
        return AiGate::NothingFailing;
    }
    AiGate::Enabled
}

/// Ranks failing checks: category priority first (SECURITY → REPO_HYGIENE),
/// FAIL before WARN within a category, key for a total order. Truncates to
/// `max`.
pub fn select_failing_checks(results: &[CheckResult], max: usize) -> Vec<&CheckResult> {
    let mut failing: Vec<&CheckResult> = results
        .iter()
        .filter(|r| matches!(r.status, CheckStatus::Fail | CheckStatus::Warn))
        .collect();

    failing.sort_by(|a, b| {
        category_rank(a.category)
            .cmp(&category_rank(b.category))
            .then_with(|| status_rank(a.status).cmp(&status_rank(b.status)))
            .then_with(|| a.check_key.cmp(&b.check_key))
    });
    failing.truncate(max);
    failing
}

fn category_rank(category: CheckCategory) -> usize {
    CheckCategory::all()
        .iter()
        .position(|c| *c == category)
        .unwrap_or(usize::MAX)
}

fn status_rank(status: CheckStatus) -> u8 {
    match status {
        CheckStatus::Fail => 0,
        CheckStatus::Warn => 1,
        CheckStatus::Pass => 2,
    }
}

/// Runs the whole stage. Returns persisted-suggestion rows on success, an
/// empty vec when gated/failed.
#[allow(clippy::too_many_arguments)]
pub async fn run_ai_stage(
    store: &review_store::Store,
    process_cfg: &AiProcessConfig,
    tenant_cfg: Option<&TenantAiConfig>,
    tenant_id: &str,
    run_id: &str,
    mr_title: &str,
    mr_description: &str,
    changes: &[(String, String)],
    results: &[CheckResult],
    precedents: &[PrecedentMatch],
) -> Vec<review_store::AiSuggestionRow> {
    let total_diff_bytes: usize = changes.iter().map(|(_, d)| d.len()).sum();
    let max_suggestions = tenant_cfg.map(|c| c.max_suggestions as usize).unwrap_or(3);
    let failing = select_failing_checks(results, max_suggestions);

    match evaluate_gate(process_cfg, tenant_cfg, total_diff_bytes, failing.len()) {
        AiGate::Enabled => {}
        gate => {
            debug!(run_id, ?gate, "ai stage skipped");
            return Vec::new();
        }
    }
    // The gate only opens with a tenant config present and enabled.
    let Some(tenant_cfg) = tenant_cfg else {
        return Vec::new();
    };

    // Redelivery guard: suggestions are written once per run.
    match store.has_suggestions(run_id).await {
        Ok(true) => {
            debug!(run_id, "suggestions already persisted; reusing");
            return store.list_suggestions(run_id).await.unwrap_or_default();
        }
        Ok(false) => {}
        Err(e) => {
            warn!(run_id, error = %e, "suggestion lookup failed; skipping ai stage");
            return Vec::new();
        }
    }

    // Build redacted snippets for the selected checks.
    let requests: Vec<SnippetRequest> = failing
        .iter()
        .filter_map(|r| {
            r.file_path.as_ref().map(|path| SnippetRequest {
                check_key: r.check_key.clone(),
                file_path: path.clone(),
                line_hint: r.line_start,
            })
        })
        .collect();
    let selection = select_snippets(changes, &requests, tenant_cfg.max_prompt_chars as usize);
    if !selection.skipped.is_empty() {
        info!(
            run_id,
            skipped = selection.skipped.len(),
            "snippet files excluded by privacy policy"
        );
    }

    let request = SuggestionRequest {
        mr: MrContext {
            title: mr_title.to_string(),
            description: mr_description.to_string(),
        },
        checks: failing
            .iter()
            .map(|r| FailedCheck {
                check_key: r.check_key.clone(),
                category: r.category,
                severity: r.severity,
                message: r.message.clone(),
                file_path: r.file_path.clone(),
            })
            .collect(),
        snippets: selection
            .snippets
            .iter()
            .map(|s| PromptSnippet {
                check_key: s.check_key.clone(),
                path: s.path.clone(),
                content: s.content.clone(),
                line_start: s.line_start,
                line_end: s.line_end,
            })
            .collect(),
        precedents: precedents
            .iter()
            .map(|p| PrecedentRef {
                title: p.title.clone(),
                source_url: p.source_url.clone(),
            })
            .collect(),
        redaction_note: (selection.report.total_lines_removed > 0).then(|| {
            format!(
                "{} lines removed as sensitive",
                selection.report.total_lines_removed
            )
        }),
    };

    if request.is_check_only() {
        info!(run_id, "no snippets survived redaction; ai runs in check-only mode");
    }

    let api_key = process_cfg.api_key.clone().unwrap_or_default();
    let config = AiConfig::new(
        process_cfg.endpoint.clone(),
        api_key,
        tenant_cfg.model.clone(),
        max_suggestions,
    );

    let client = match LlmClient::from_config(config) {
        Ok(c) => c,
        Err(e) => {
            warn!(run_id, reason = e.reason_label(), error = %e, "llm client construction failed");
            return Vec::new();
        }
    };

    let suggestions = match client.generate_suggestions(&request).await {
        Ok(s) => s,
        Err(e) => {
            // Classified and logged; the run continues without an AI section.
            warn!(run_id, reason = e.reason_label(), error = %e, "ai suggestion generation failed");
            return Vec::new();
        }
    };

    let inserts: Vec<SuggestionInsert> = suggestions
        .iter()
        .map(|s| SuggestionInsert {
            check_key: s.check_key.clone(),
            severity: s.severity.as_str().to_string(),
            title: s.title.clone(),
            rationale: s.rationale.clone(),
            suggested_fix: s.suggested_fix.clone(),
            files: serde_json::to_value(&s.files).unwrap_or(serde_json::Value::Array(vec![])),
        })
        .collect();

    if let Err(e) = store.insert_suggestions(tenant_id, run_id, &inserts).await {
        warn!(run_id, error = %e, "failed to persist suggestions");
        return Vec::new();
    }
    info!(run_id, count = inserts.len(), "ai suggestions persisted");
    store.list_suggestions(run_id).await.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use check_engine::Severity;

    fn result(key: &str, category: CheckCategory, status: CheckStatus) -> CheckResult {
        CheckResult {
            check_key: key.into(),
            title: key.into(),
            category,
            status,
            severity: Severity::Warn,
            message: String::new(),
            file_path: None,
            line_start: None,
            line_end: None,
            evidence: None,
        }
    }

    #[test]
    fn ranking_prefers_security_and_fails() {
        let results = vec![
            result("hygiene.a", CheckCategory::RepoHygiene, CheckStatus::Fail),
            result("security.warn", CheckCategory::Security, CheckStatus::Warn),
            result("security.fail", CheckCategory::Security, CheckStatus::Fail),
            result("testing.warn", CheckCategory::Testing, CheckStatus::Warn),
            result("quality.pass", CheckCategory::CodeQuality, CheckStatus::Pass),
        ];
        let keys: Vec<&str> = select_failing_checks(&results, 3)
            .iter()
            .map(|r| r.check_key.as_str())
            .collect();
        assert_eq!(keys, vec!["security.fail", "security.warn", "testing.warn"]);
    }

    #[test]
    fn gate_requires_every_switch() {
        let mut process = AiProcessConfig {
            enabled: true,
            api_key: Some("k".into()),
            endpoint: "https://api.openai.com".into(),
        };
        let tenant = TenantAiConfig {
            enabled: true,
            ..Default::default()
        };

        assert_eq!(
            evaluate_gate(&process, Some(&tenant), 1000, 2),
            AiGate::Enabled
        );
        assert_eq!(
            evaluate_gate(&process, None, 1000, 2),
            AiGate::TenantDisabled
        );

        let disabled_tenant = TenantAiConfig::default();
        assert_eq!(
            evaluate_gate(&process, Some(&disabled_tenant), 1000, 2),
            AiGate::TenantDisabled
        );

        let big = tenant.max_total_diff_bytes as usize + 1;
        assert!(matches!(
            evaluate_gate(&process, Some(&tenant), big, 2),
            AiGate::DiffTooLarge { .. }
        ));

        assert_eq!(
            evaluate_gate(&process, Some(&tenant), 1000, 0),
            AiGate::NothingFailing
        );

        process.enabled = false;
        assert_eq!(
            evaluate_gate(&process, Some(&tenant), 1000, 2),
            AiGate::ProcessDisabled
        );
    }
}
