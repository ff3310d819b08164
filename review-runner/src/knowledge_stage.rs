//! Knowledge stage: GOLD promotion for merged MRs, precedent lookup for
//! everything else.

use check_engine::CheckResult;
use git_host::HostChange;
use precedent_index::{
    FileStatusTag, GoldFile, GoldPolicy, GoldSignature, GoldVerdict, PrecedentMatch,
    SignatureInput, build_content_document, content_hash, extract_signature, match_precedents,
};
use review_store::knowledge::KnowledgeUpsert;
use review_store::{KnowledgeType, Store, Tenant};
use tracing::{debug, info};

use crate::errors::RunnerResult;

/// Output of the stage: at most one of the two is populated.
#[derive(Debug, Default)]
pub struct KnowledgeOutcome {
    pub gold_promoted: bool,
    pub precedents: Vec<PrecedentMatch>,
}

pub(crate) fn status_tag(change: &HostChange) -> FileStatusTag {
    if change.new_file {
        FileStatusTag::Added
    } else if change.deleted_file {
        FileStatusTag::Deleted
    } else if change.renamed_file {
        FileStatusTag::Renamed
    } else {
        FileStatusTag::Modified
    }
}

/// Merged-MR path: evaluate eligibility and ingest on success.
#[allow(clippy::too_many_arguments)]
pub async fn evaluate_gold(
    store: &Store,
    tenant: &Tenant,
    provider: &str,
    mr_web_url: &str,
    mr_iid: i64,
    title: &str,
    description: &str,
    changes: &[HostChange],
    score: u32,
    approvals: Option<u32>,
    results: &[CheckResult],
) -> RunnerResult<bool> {
    let policy = GoldPolicy {
        score_threshold: tenant.gold_score_threshold,
        min_approvals: tenant.gold_min_approvals,
    };
    let verdict = precedent_index::evaluate(true, score, approvals, results, &policy);
    if verdict != GoldVerdict::Eligible {
        debug!(mr_iid, ?verdict, "gold promotion declined");
        return Ok(false);
    }

    let files: Vec<GoldFile> = changes
        .iter()
        .map(|c| GoldFile {
            path: c.new_path.clone(),
            status_tag: status_tag(c),
            diff: c.diff.clone().unwrap_or_default(),
        })
        .collect();
    let document = build_content_document(title, description, &files);
    let hash = content_hash(&document);

    let pairs: Vec<(String, String)> = files
        .iter()
        .map(|f| (f.path.clone(), f.diff.clone()))
        .collect();
    let signature = extract_signature(&SignatureInput {
        title,
        description,
        changes: &pairs,
    });

    let (_source, outcome) = store
        .upsert_knowledge_source(
            &tenant.id,
            &KnowledgeUpsert {
                source_type: KnowledgeType::GoldMr,
                provider: provider.to_string(),
                provider_id: format!("mr-{mr_iid}"),
                title: title.to_string(),
                source_url: (!mr_web_url.is_empty()).then(|| mr_web_url.to_string()),
                content_text: document,
                content_hash: hash,
                metadata: Some(serde_json::json!({
                    "score": score,
                    "approvals": approvals,
                    "signature_hash": signature.hash,
                })),
                feature_tokens: signature.tokens,
            },
        )
        .await?;

    info!(mr_iid, ?outcome, "merged MR promoted to GOLD");
    Ok(true)
}

/// Non-merged path: fingerprint the MR and rank precedents from the
/// tenant's GOLD index. An empty index is an empty result.
pub async fn find_precedents(
    store: &Store,
    tenant_id: &str,
    title: &str,
    description: &str,
    changes: &[(String, String)],
) -> RunnerResult<Vec<PrecedentMatch>> {
    let signature = extract_signature(&SignatureInput {
        title,
        description,
        changes,
    });

    let index: Vec<GoldSignature> = store
        .list_gold_sources(tenant_id)
        .await?
        .into_iter()
        .map(|k| GoldSignature {
            knowledge_source_id: k.id,
            title: k.title,
            source_url: k.source_url,
            tokens: k.feature_tokens,
        })
        .collect();

    let matches = match_precedents(&signature.tokens, &index);
    debug!(
        candidates = index.len(),
        matched = matches.len(),
        "precedent lookup finished"
    );
    Ok(matches)
}
