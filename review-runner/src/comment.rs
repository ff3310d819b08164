//! Deterministic rendering of the single summary comment.
//!
//! The body is a pure function of its inputs: same results, same precedents,
//! same suggestions give byte-identical markdown. Reconciliation hangs off
//! that determinism plus the AI-section hash.

use check_engine::{CheckCategory, CheckResult, CheckStatus};
use precedent_index::PrecedentMatch;
use review_store::AiSuggestionRow;
use sha2::{Digest, Sha256};

/// Everything needed to render the summary body.
pub struct CommentInput<'a> {
    pub run_id: &'a str,
    pub head_sha: &'a str,
    pub score: u32,
    pub results: &'a [CheckResult],
    pub gold_promoted: bool,
    pub precedents: &'a [PrecedentMatch],
    pub suggestions: &'a [AiSuggestionRow],
}

/// Rendered body plus the idempotency fields stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedComment {
    pub body: String,
    pub ai_included: bool,
    pub ai_summary_hash: Option<String>,
}

fn status_icon(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "✅",
        CheckStatus::Warn => "⚠️",
        CheckStatus::Fail => "❌",
    }
}

pub fn render_comment(input: &CommentInput) -> RenderedComment {
    let (pass, warn, fail) = check_engine::status_counts(input.results);

    let mut body = String::new();
    body.push_str("## 🤖 Automated Review (Deterministic Checks)\n");
    body.push_str(&format!(
        "**Score:** {}/100 — {} PASS / {} WARN / {} FAIL\n",
        input.score, pass, warn, fail
    ));
    body.push_str(&format!("**Head SHA:** `{}`\n", input.head_sha));
    body.push_str(&format!("**Run ID:** `{}`\n", input.run_id));

    // Per-category checklist in fixed category order, keys sorted within.
    for category in CheckCategory::all() {
        let mut rows: Vec<&CheckResult> = input
            .results
            .iter()
            .filter(|r| r.category == category)
            .collect();
        if rows.is_empty() {
            continue;
        }
        rows.sort_by(|a, b| a.check_key.cmp(&b.check_key));

        body.push_str(&format!("\n### {category}\n"));
        for r in rows {
            body.push_str(&format!(
                "- {} `{}` {}\n",
                status_icon(r.status),
                r.check_key,
                r.message
            ));
        }
    }

    if input.gold_promoted {
        body.push_str("\n✅ **Promoted to GOLD precedent**\n");
    }

    if !input.precedents.is_empty() {
        body.push_str("\n**Similar merged MRs:**\n");
        for p in input.precedents {
            let pct = (p.jaccard * 100.0).round() as u32;
            match &p.source_url {
                Some(url) => body.push_str(&format!("- [{}]({url}) ({pct}% overlap)\n", p.title)),
                None => body.push_str(&format!("- {} ({pct}% overlap)\n", p.title)),
            }
        }
    }

    let (ai_included, ai_summary_hash) = if input.suggestions.is_empty() {
        (false, None)
    } else {
        let ai_section = render_ai_section(input.suggestions);
        let hash = sha256_hex(&ai_section);
        body.push('\n');
        body.push_str(&ai_section);
        (true, Some(hash))
    };

    RenderedComment {
        body,
        ai_included,
        ai_summary_hash,
    }
}

fn render_ai_section(suggestions: &[AiSuggestionRow]) -> String {
    let mut section = String::from("### 🤖 AI Fix Suggestions (Preview)\n");
    for s in suggestions {
        section.push_str(&format!(
            "\n**[{}] {}** (`{}`)\n{}\n\n{}\n",
            s.severity, s.title, s.check_key, s.rationale, s.suggested_fix
        ));
    }
    section
}

fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
