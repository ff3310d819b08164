//! Privacy boundary between MR content and the LLM adapter.
//!
//! Everything the prompt builder receives flows through here: path policy
//! (deny beats allow), windowed snippet extraction, secret/PII redaction and
//! a greedy character budget. The raw diff itself never crosses this crate.

pub mod paths;
pub mod redact;
pub mod window;

use tracing::debug;

pub use paths::{is_allowed, is_denied};
pub use redact::{
    RedactionReport, RedactionStats, redact_text, sanitize_error_message,
};
pub use window::{Snippet, WINDOW_RADIUS, window_around};

/// A failing check pointing at a file; the snippet request unit.
#[derive(Debug, Clone)]
pub struct SnippetRequest {
    pub check_key: String,
    pub file_path: String,
    pub line_hint: Option<u32>,
}

/// Outcome of a selection pass.
#[derive(Debug, Clone, Default)]
pub struct SnippetSelection {
    pub snippets: Vec<Snippet>,
    pub report: RedactionReport,
    /// Paths skipped by policy, for the structured log line.
    pub skipped: Vec<String>,
}

/// Builds redacted snippets for the given failing checks under a character
/// budget. At most one snippet per `(file, check)` pair; greedy accumulation
/// in request order until `max_prompt_chars` would be exceeded.
pub fn select_snippets(
    changes: &[(String, String)],
    requests: &[SnippetRequest],
    max_prompt_chars: usize,
) -> SnippetSelection {
    let mut selection = SnippetSelection::default();
    let mut used_chars = 0usize;
    let mut seen: Vec<(String, String)> = Vec::new();

    for req in requests {
        let pair = (req.file_path.clone(), req.check_key.clone());
        if seen.contains(&pair) {
            continue;
        }
        seen.push(pair);

        if !paths::is_allowed(&req.file_path) {
            debug!(path = %req.file_path, "snippet skipped by path policy");
            selection.skipped.push(req.file_path.clone());
            continue;
        }

        let Some((_, diff)) = changes.iter().find(|(p, _)| p == &req.file_path) else {
            debug!(path = %req.file_path, "failing check references a file outside the changeset");
            continue;
        };

        let Some((raw, line_start, line_end)) = window::window_around(diff, req.line_hint) else {
            continue;
        };

        let (content, stats) = redact::redact_text(&raw);
        selection.report.absorb(&stats);

        if content.trim().is_empty() {
            continue;
        }
        if used_chars + content.len() > max_prompt_chars {
            debug!(
                path = %req.file_path,
                used = used_chars,
                budget = max_prompt_chars,
                "prompt budget exhausted; dropping remaining snippets"
            );
            break;
        }
        used_chars += content.len();

        selection.snippets.push(Snippet {
            check_key: req.check_key.clone(),
            path: req.file_path.clone(),
            content,
            line_start,
            line_end,
        });
    }

    selection
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(path: &str, lines: &[&str]) -> Vec<(String, String)> {
        let body: String = lines.iter().map(|l| format!("+{l}\n")).collect();
        vec![(
            path.to_string(),
            format!("@@ -0,0 +1,{} @@\n{}", lines.len(), body),
        )]
    }

    fn request(path: &str) -> SnippetRequest {
        SnippetRequest {
            check_key: "security.hardcoded-secret".into(),
            file_path: path.into(),
            line_hint: Some(1),
        }
    }

    #[test]
    fn denied_file_yields_no_snippet() {
        let ch = changes(".env", &["SECRET=abc"]);
        let sel = select_snippets(&ch, &[request(".env")], 10_000);
        assert!(sel.snippets.is_empty());
        assert_eq!(sel.skipped, vec![".env".to_string()]);
    }

    #[test]
    fn denied_content_never_leaks() {
        let ch = changes("secrets/prod.yaml", &["password: hunter2"]);
        let sel = select_snippets(&ch, &[request("secrets/prod.yaml")], 10_000);
        let all: String = sel.snippets.iter().map(|s| s.content.clone()).collect();
        assert!(!all.contains("hunter2"));
        assert!(sel.snippets.is_empty());
    }

    #[test]
    fn allowed_file_is_windowed_and_redacted() {
        let ch = changes(
            "apps/api/src/auth.ts",
            &["const token = login();", "password=hunter2", "return token;"],
        );
        let sel = select_snippets(&ch, &[request("apps/api/src/auth.ts")], 10_000);
        assert_eq!(sel.snippets.len(), 1);
        let s = &sel.snippets[0];
        assert!(s.content.contains("[REDACTED]"));
        assert!(!s.content.contains("hunter2"));
        assert_eq!(sel.report.files_redacted, 1);
        assert_eq!(sel.report.total_lines_removed, 1);
    }

    #[test]
    fn one_snippet_per_file_check_pair() {
        let ch = changes("apps/a.ts", &["let x = 1;"]);
        let req = request("apps/a.ts");
        let sel = select_snippets(&ch, &[req.clone(), req], 10_000);
        assert_eq!(sel.snippets.len(), 1);
    }

    #[test]
    fn budget_is_greedy_and_hard() {
        let mut ch = changes("apps/a.ts", &["0123456789"]);
        ch.extend(changes("apps/b.ts", &["0123456789"]));
        let reqs = vec![request("apps/a.ts"), request("apps/b.ts")];
        // Budget fits exactly one 10-char snippet.
        let sel = select_snippets(&ch, &reqs, 15);
        assert_eq!(sel.snippets.len(), 1);
        assert_eq!(sel.snippets[0].path, "apps/a.ts");
    }
}
