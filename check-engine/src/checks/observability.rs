//! Observability checks: logging discipline in the added code.

use lazy_static::lazy_static;
use regex::Regex;

use super::{evidence_snippet, is_test_path, scan_added_re};
use crate::types::{
    CheckCategory, CheckContext, CheckDefinition, CheckOutcome, Severity, Thresholds,
    threshold_u64,
};

lazy_static! {
    static ref PRINT_LOG: Regex = Regex::new(
        r"\bprintln!\s*\(|\bSystem\.out\.print|\bfmt\.Print|\becho\s+\$|\bputs\s"
    )
    .unwrap();
    static ref DEBUG_LEVEL_LOG: Regex =
        Regex::new(r"\b(logger|log|tracing)[.:]{1,2}debug\s*[(!]").unwrap();
}

pub const PRINT_LOGGING: CheckDefinition = CheckDefinition {
    key: "observability.print-logging",
    title: "Print-style logging",
    category: CheckCategory::Observability,
    default_severity: Severity::Info,
    rationale: "stdout prints bypass the structured logger: no levels, no fields, no sinks.",
    run: run_print_logging,
};

fn run_print_logging(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    let hits: Vec<_> = scan_added_re(ctx, &PRINT_LOG)
        .into_iter()
        .filter(|f| !is_test_path(&f.path))
        .collect();
    match hits.first() {
        Some(f) => CheckOutcome::warn(format!(
            "print-style logging added outside tests: {}",
            evidence_snippet(&f.text)
        ))
        .at(&f.path, f.line),
        None => CheckOutcome::pass("no print-style logging"),
    }
}

pub const DEBUG_LOG_SPAM: CheckDefinition = CheckDefinition {
    key: "observability.debug-log-spam",
    title: "Debug-level log flood",
    category: CheckCategory::Observability,
    default_severity: Severity::Info,
    rationale: "A burst of debug logs added at once usually means leftover investigation output.",
    run: run_debug_log_spam,
};

fn run_debug_log_spam(ctx: &CheckContext, t: &Thresholds) -> CheckOutcome {
    let max = threshold_u64(t, "max_debug_logs", 10) as usize;
    let hits = scan_added_re(ctx, &DEBUG_LEVEL_LOG);
    if hits.len() <= max {
        return CheckOutcome::pass(format!("{} debug log lines (≤ {max})", hits.len()));
    }
    let f = &hits[0];
    CheckOutcome::warn(format!(
        "{} debug-level log calls added (limit {max})",
        hits.len()
    ))
    .at(&f.path, f.line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckStatus, FileChange, MrInfo};

    fn ctx(path: &str, added: &[&str]) -> CheckContext {
        let body: String = added.iter().map(|l| format!("+{l}\n")).collect();
        CheckContext {
            changes: vec![FileChange {
                path: path.into(),
                diff: format!("@@ -0,0 +1,{} @@\n{}", added.len(), body),
            }],
            mr: MrInfo::default(),
        }
    }

    #[test]
    fn println_flagged_outside_tests() {
        let c = ctx("src/worker.rs", &[r#"println!("got job {id}");"#]);
        assert_eq!(run_print_logging(&c, &Thresholds::new()).status, CheckStatus::Warn);
        let c = ctx("tests/worker.rs", &[r#"println!("debugging");"#]);
        assert_eq!(run_print_logging(&c, &Thresholds::new()).status, CheckStatus::Pass);
    }

    #[test]
    fn debug_flood_threshold() {
        let lines: Vec<String> = (0..12).map(|i| format!(r#"logger.debug("step {i}")"#)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let c = ctx("src/a.ts", &refs);
        assert_eq!(run_debug_log_spam(&c, &Thresholds::new()).status, CheckStatus::Warn);

        let mut t = Thresholds::new();
        t.insert("max_debug_logs".into(), serde_json::json!(20));
        assert_eq!(run_debug_log_spam(&c, &t).status, CheckStatus::Pass);
    }
}
