//! Built-in check library.
//!
//! One module per category. Checks share the scanning helpers below: walk
//! every added line of every changed file, match a pattern, report the first
//! hit as evidence. Binary patches are skipped wholesale.

pub mod architecture;
pub mod code_quality;
pub mod observability;
pub mod performance;
pub mod repo_hygiene;
pub mod security;
pub mod testing;

use regex::Regex;

use crate::diff::{added_lines, looks_like_binary_patch};
use crate::types::{CheckContext, CheckDefinition};

/// A matched added line, used as check evidence.
#[derive(Debug, Clone)]
pub(crate) struct Finding {
    pub path: String,
    pub line: u32,
    pub text: String,
}

/// Runs `pred` over every added line; returns all hits.
pub(crate) fn scan_added(
    ctx: &CheckContext,
    pred: impl Fn(&str) -> bool,
) -> Vec<Finding> {
    let mut out = Vec::new();
    for change in &ctx.changes {
        if looks_like_binary_patch(&change.diff) {
            continue;
        }
        for added in added_lines(&change.diff) {
            if pred(&added.text) {
                out.push(Finding {
                    path: change.path.clone(),
                    line: added.line,
                    text: added.text,
                });
            }
        }
    }
    out
}

/// Regex variant of [`scan_added`].
pub(crate) fn scan_added_re(ctx: &CheckContext, re: &Regex) -> Vec<Finding> {
    scan_added(ctx, |text| re.is_match(text))
}

/// Truncates evidence text so huge minified lines do not bloat results.
pub(crate) fn evidence_snippet(text: &str) -> String {
    const MAX: usize = 120;
    if text.len() <= MAX {
        text.trim().to_string()
    } else {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(MAX);
        format!("{}…", text[..cut].trim())
    }
}

/// Paths the test-coverage heuristics treat as test code.
pub(crate) fn is_test_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.contains("/tests/")
        || lower.starts_with("tests/")
        || lower.contains(".test.")
        || lower.contains(".spec.")
        || lower.contains("_test.")
        || lower.ends_with("_test.go")
        || lower.ends_with("_spec.rb")
}

/// Source files that plausibly deserve test coverage.
pub(crate) fn is_source_path(path: &str) -> bool {
    const EXTS: [&str; 12] = [
        ".ts", ".tsx", ".js", ".jsx", ".rs", ".go", ".py", ".rb", ".java", ".kt", ".cs", ".sql",
    ];
    let lower = path.to_ascii_lowercase();
    !is_test_path(&lower) && EXTS.iter().any(|e| lower.ends_with(e))
}

/// The full built-in registry, priority order within categories preserved.
pub fn registry() -> &'static [CheckDefinition] {
    &REGISTRY
}

static REGISTRY: [CheckDefinition; 23] = [
    // --- SECURITY ---
    security::HARDCODED_SECRET,
    security::EVAL_USAGE,
    security::SQL_STRING_CONCAT,
    security::INSECURE_HTTP,
    security::WEAK_HASH,
    // --- CODE_QUALITY ---
    code_quality::TODO_DEBT,
    code_quality::LONG_LINES,
    code_quality::EMPTY_CATCH,
    code_quality::NOISY_DEBUG_CODE,
    // --- ARCHITECTURE ---
    architecture::DEEP_RELATIVE_IMPORT,
    architecture::OVERSIZED_MODULE,
    architecture::HARDCODED_ENDPOINT,
    // --- PERFORMANCE ---
    performance::SYNC_IO,
    performance::AWAIT_IN_LOOP,
    performance::SELECT_STAR,
    // --- TESTING ---
    testing::MISSING_TESTS,
    testing::SKIPPED_TESTS,
    testing::ASSERTION_FREE_TESTS,
    // --- OBSERVABILITY ---
    observability::PRINT_LOGGING,
    observability::DEBUG_LOG_SPAM,
    // --- REPO_HYGIENE ---
    repo_hygiene::CONFLICT_MARKERS,
    repo_hygiene::DEBUGGER_ARTIFACT,
    repo_hygiene::ENV_FILE_COMMITTED,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn registry_keys_are_unique() {
        let keys: HashSet<_> = registry().iter().map(|d| d.key).collect();
        assert_eq!(keys.len(), registry().len());
    }

    #[test]
    fn registry_covers_every_category() {
        let categories: HashSet<_> = registry().iter().map(|d| d.category).collect();
        assert_eq!(categories.len(), 7);
    }

    #[test]
    fn test_path_detection() {
        assert!(is_test_path("src/user.test.ts"));
        assert!(is_test_path("tests/integration.rs"));
        assert!(is_test_path("pkg/thing_test.go"));
        assert!(!is_test_path("src/user.ts"));
    }

    #[test]
    fn evidence_is_bounded() {
        let long = "x".repeat(500);
        assert!(evidence_snippet(&long).len() < 140);
        assert_eq!(evidence_snippet("  short  "), "short");
    }
}
