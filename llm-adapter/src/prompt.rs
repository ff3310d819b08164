//! Prompt assembly for suggestion generation.
//!
//! The prompt carries only what the privacy filter released: check findings,
//! redacted snippets and precedent titles. The raw diff never appears here.

use crate::types::SuggestionRequest;

/// System + user message pair.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

const SYSTEM_PROMPT: &str = "\
You are a senior code reviewer. You receive findings from deterministic \
static checks on a merge request, optionally with redacted code excerpts and \
precedent merge requests from the same codebase. Propose concrete fixes.

Respond with a single JSON object, no prose, matching exactly:
{\"suggestions\": [{\"check_key\": string, \"severity\": \"BLOCKER\"|\"WARN\"|\"INFO\", \
\"title\": string, \"rationale\": string, \"suggested_fix\": string, \
\"files\": [{\"path\": string, \"line_start\": number?, \"line_end\": number?}], \
\"precedent_refs\": [string]?}]}

Rules: one suggestion per finding at most; cite only files you were shown; \
never invent code you cannot see; keep suggested_fix actionable and short.";

/// Builds the prompt. With no snippets (check-only mode) the user message
/// says so explicitly instead of showing an empty code section.
pub fn build_prompt(req: &SuggestionRequest) -> Prompt {
    let mut user = String::new();

    user.push_str("## Merge request\n");
    user.push_str(&format!("Title: {}\n", req.mr.title.trim()));
    if !req.mr.description.trim().is_empty() {
        user.push_str(&format!("Description: {}\n", req.mr.description.trim()));
    }

    user.push_str("\n## Check findings\n");
    for c in &req.checks {
        user.push_str(&format!(
            "- [{}] {} ({}): {}{}\n",
            c.severity,
            c.check_key,
            c.category,
            c.message,
            c.file_path
                .as_deref()
                .map(|p| format!(" [file: {p}]"))
                .unwrap_or_default(),
        ));
    }

    if req.is_check_only() {
        user.push_str(
            "\n## Code context\nNo code excerpts are available for this review \
             (files were excluded by privacy policy). Base suggestions on the \
             findings alone.\n",
        );
    } else {
        user.push_str("\n## Code context (redacted excerpts)\n");
        for s in &req.snippets {
            user.push_str(&format!(
                "### {} (lines {}-{}, for {})\n```\n{}\n```\n",
                s.path, s.line_start, s.line_end, s.check_key, s.content
            ));
        }
        if let Some(note) = &req.redaction_note {
            user.push_str(&format!("\nRedaction note: {note}\n"));
        }
    }

    if !req.precedents.is_empty() {
        user.push_str("\n## Precedents from this codebase\n");
        for p in &req.precedents {
            match &p.source_url {
                Some(url) => user.push_str(&format!("- {} ({url})\n", p.title)),
                None => user.push_str(&format!("- {}\n", p.title)),
            }
        }
    }

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailedCheck, MrContext, PromptSnippet};
    use check_engine::{CheckCategory, Severity};

    fn base_request() -> SuggestionRequest {
        SuggestionRequest {
            mr: MrContext {
                title: "Add login".into(),
                description: String::new(),
            },
            checks: vec![FailedCheck {
                check_key: "security.eval-usage".into(),
                category: CheckCategory::Security,
                severity: Severity::Blocker,
                message: "dynamic evaluation added".into(),
                file_path: Some("src/a.js".into()),
            }],
            snippets: vec![],
            precedents: vec![],
            redaction_note: None,
        }
    }

    #[test]
    fn check_only_mode_is_explicit() {
        let p = build_prompt(&base_request());
        assert!(p.user.contains("No code excerpts are available"));
        assert!(p.user.contains("security.eval-usage"));
    }

    #[test]
    fn snippets_render_fenced() {
        let mut req = base_request();
        req.snippets.push(PromptSnippet {
            check_key: "security.eval-usage".into(),
            path: "src/a.js".into(),
            content: "eval(input)".into(),
            line_start: 3,
            line_end: 3,
        });
        let p = build_prompt(&req);
        assert!(p.user.contains("```\neval(input)\n```"));
        assert!(!p.user.contains("No code excerpts"));
    }

    #[test]
    fn system_prompt_pins_schema() {
        let p = build_prompt(&base_request());
        assert!(p.system.contains("\"suggestions\""));
        assert!(p.system.contains("suggested_fix"));
    }
}
