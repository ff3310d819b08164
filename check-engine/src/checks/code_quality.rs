//! Code-quality checks: tracked debt, readability, error swallowing and
//! leftover debug noise.

use lazy_static::lazy_static;
use regex::Regex;

use super::{evidence_snippet, scan_added, scan_added_re};
use crate::types::{
    CheckCategory, CheckContext, CheckDefinition, CheckOutcome, Severity, Thresholds,
    threshold_u64,
};

lazy_static! {
    static ref TODO_MARKER: Regex = Regex::new(r"(?i)\b(TODO|FIXME|HACK|XXX)\b[:\s]").unwrap();
    static ref EMPTY_CATCH_RE: Regex =
        Regex::new(r"catch\s*(\([^)]*\))?\s*\{\s*\}|except\s*(\w+)?\s*:\s*pass\b").unwrap();
    static ref DEBUG_CALL: Regex =
        Regex::new(r"\bconsole\.(log|debug|trace)\s*\(|\bprint\s*\(|\bvar_dump\s*\(").unwrap();
}

pub const TODO_DEBT: CheckDefinition = CheckDefinition {
    key: "quality.todo-debt",
    title: "New TODO/FIXME debt",
    category: CheckCategory::CodeQuality,
    default_severity: Severity::Info,
    rationale: "Debt markers added without tickets tend to outlive their authors.",
    run: run_todo_debt,
};

fn run_todo_debt(ctx: &CheckContext, t: &Thresholds) -> CheckOutcome {
    let max = threshold_u64(t, "max_markers", 3) as usize;
    let hits = scan_added_re(ctx, &TODO_MARKER);
    if hits.is_empty() {
        return CheckOutcome::pass("no new debt markers");
    }
    if hits.len() <= max {
        return CheckOutcome::pass(format!("{} debt markers (≤ {max} allowed)", hits.len()));
    }
    let f = &hits[0];
    CheckOutcome::warn(format!(
        "{} TODO/FIXME markers added, first: {}",
        hits.len(),
        evidence_snippet(&f.text)
    ))
    .at(&f.path, f.line)
}

pub const LONG_LINES: CheckDefinition = CheckDefinition {
    key: "quality.long-lines",
    title: "Overlong lines",
    category: CheckCategory::CodeQuality,
    default_severity: Severity::Info,
    rationale: "Very long lines usually hide generated or copy-pasted content.",
    run: run_long_lines,
};

fn run_long_lines(ctx: &CheckContext, t: &Thresholds) -> CheckOutcome {
    let limit = threshold_u64(t, "max_line_length", 200) as usize;
    let hits = scan_added(ctx, |text| text.chars().count() > limit);
    match hits.first() {
        Some(f) => CheckOutcome::warn(format!(
            "{} added lines exceed {limit} chars (first in {})",
            hits.len(),
            f.path
        ))
        .at(&f.path, f.line),
        None => CheckOutcome::pass(format!("no lines over {limit} chars")),
    }
}

pub const EMPTY_CATCH: CheckDefinition = CheckDefinition {
    key: "quality.empty-catch",
    title: "Swallowed exception",
    category: CheckCategory::CodeQuality,
    default_severity: Severity::Warn,
    rationale: "Silently discarded errors turn outages into mysteries.",
    run: run_empty_catch,
};

fn run_empty_catch(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    match scan_added_re(ctx, &EMPTY_CATCH_RE).first() {
        Some(f) => CheckOutcome::warn(format!(
            "empty error handler added: {}",
            evidence_snippet(&f.text)
        ))
        .at(&f.path, f.line),
        None => CheckOutcome::pass("no swallowed exceptions"),
    }
}

pub const NOISY_DEBUG_CODE: CheckDefinition = CheckDefinition {
    key: "quality.noisy-debug-code",
    title: "Leftover debug output",
    category: CheckCategory::CodeQuality,
    default_severity: Severity::Info,
    rationale: "console.log/print debugging belongs to the editing session, not the MR.",
    run: run_noisy_debug_code,
};

fn run_noisy_debug_code(ctx: &CheckContext, t: &Thresholds) -> CheckOutcome {
    let max = threshold_u64(t, "max_occurrences", 0) as usize;
    let hits: Vec<_> = scan_added_re(ctx, &DEBUG_CALL)
        .into_iter()
        .filter(|f| !super::is_test_path(&f.path))
        .collect();
    if hits.len() <= max {
        return CheckOutcome::pass("no stray debug output");
    }
    let f = &hits[0];
    CheckOutcome::warn(format!(
        "{} debug print calls added outside tests, first: {}",
        hits.len(),
        evidence_snippet(&f.text)
    ))
    .at(&f.path, f.line)
}
