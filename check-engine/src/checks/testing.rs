//! Testing checks: coverage presence, skipped suites, assertion-free tests.

use lazy_static::lazy_static;
use regex::Regex;

use super::{evidence_snippet, is_source_path, is_test_path, scan_added_re};
use crate::diff::added_lines;
use crate::types::{
    CheckCategory, CheckContext, CheckDefinition, CheckOutcome, Severity, Thresholds,
    threshold_u64,
};

lazy_static! {
    static ref SKIP_MARKER: Regex = Regex::new(
        r"\.(skip|only)\s*\(|\bxit\s*\(|\bxdescribe\s*\(|#\[ignore\]|@pytest\.mark\.skip"
    )
    .unwrap();
    static ref ASSERTION: Regex = Regex::new(
        r"\b(expect|assert|assert_eq!|assert_ne!|should|verify)\s*[(!.]"
    )
    .unwrap();
}

pub const MISSING_TESTS: CheckDefinition = CheckDefinition {
    key: "testing.missing-tests",
    title: "Source changes without test changes",
    category: CheckCategory::Testing,
    default_severity: Severity::Warn,
    rationale: "Behavior changed with no test touched is the usual prelude to a regression.",
    run: run_missing_tests,
};

fn run_missing_tests(ctx: &CheckContext, t: &Thresholds) -> CheckOutcome {
    // Small MRs (docs, config tweaks) are exempt below this many source lines.
    let min_lines = threshold_u64(t, "min_source_lines", 10) as usize;

    let mut source_lines = 0usize;
    let mut first_source: Option<&str> = None;
    let mut touched_tests = false;

    for change in &ctx.changes {
        if is_test_path(&change.path) {
            touched_tests = true;
        } else if is_source_path(&change.path) {
            source_lines += added_lines(&change.diff).len();
            first_source.get_or_insert(change.path.as_str());
        }
    }

    if touched_tests || source_lines < min_lines {
        return CheckOutcome::pass("test coverage present or change too small to demand it");
    }
    let mut out = CheckOutcome::warn(format!(
        "{source_lines} source lines added with no test file touched"
    ));
    if let Some(path) = first_source {
        out = out.at(path, 1);
    }
    out
}

pub const SKIPPED_TESTS: CheckDefinition = CheckDefinition {
    key: "testing.skipped-tests",
    title: "Skipped or focused tests",
    category: CheckCategory::Testing,
    default_severity: Severity::Warn,
    rationale: ".only silently disables the rest of the suite; .skip hides regressions.",
    run: run_skipped_tests,
};

fn run_skipped_tests(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    match scan_added_re(ctx, &SKIP_MARKER).first() {
        Some(f) => CheckOutcome::warn(format!(
            "test skip/focus marker added: {}",
            evidence_snippet(&f.text)
        ))
        .at(&f.path, f.line),
        None => CheckOutcome::pass("no skipped or focused tests"),
    }
}

pub const ASSERTION_FREE_TESTS: CheckDefinition = CheckDefinition {
    key: "testing.assertion-free-tests",
    title: "Test additions without assertions",
    category: CheckCategory::Testing,
    default_severity: Severity::Info,
    rationale: "A test that asserts nothing passes forever and protects nothing.",
    run: run_assertion_free_tests,
};

fn run_assertion_free_tests(ctx: &CheckContext, t: &Thresholds) -> CheckOutcome {
    let min_lines = threshold_u64(t, "min_test_lines", 5) as usize;

    let mut test_lines = 0usize;
    let mut has_assertion = false;
    let mut first_test: Option<&str> = None;

    for change in &ctx.changes {
        if !is_test_path(&change.path) {
            continue;
        }
        first_test.get_or_insert(change.path.as_str());
        for line in added_lines(&change.diff) {
            test_lines += 1;
            if ASSERTION.is_match(&line.text) {
                has_assertion = true;
            }
        }
    }

    if test_lines < min_lines || has_assertion {
        return CheckOutcome::pass("test additions assert something (or are trivial)");
    }
    let mut out = CheckOutcome::warn(format!(
        "{test_lines} test lines added without a single assertion"
    ));
    if let Some(path) = first_test {
        out = out.at(path, 1);
    }
    out
}
