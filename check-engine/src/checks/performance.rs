//! Performance checks. Textual heuristics only: the engine never executes
//! or parses the changed code, so these aim for cheap, high-signal smells.

use lazy_static::lazy_static;
use regex::Regex;

use super::{evidence_snippet, scan_added_re};
use crate::diff::added_lines;
use crate::types::{
    CheckCategory, CheckContext, CheckDefinition, CheckOutcome, Severity, Thresholds,
    threshold_u64,
};

lazy_static! {
    static ref SYNC_IO_CALL: Regex = Regex::new(
        r"\b(readFileSync|writeFileSync|existsSync|execSync|spawnSync|readdirSync)\s*\("
    )
    .unwrap();
    static ref LOOP_HEADER: Regex =
        Regex::new(r"^\s*(for|while)\b|\.forEach\s*\(|\.map\s*\(").unwrap();
    static ref AWAIT_EXPR: Regex = Regex::new(r"\bawait\s").unwrap();
    static ref SELECT_STAR_Q: Regex = Regex::new(r"(?i)\bSELECT\s+\*\s+FROM\b").unwrap();
    static ref LIMIT_CLAUSE: Regex = Regex::new(r"(?i)\bLIMIT\s+\d").unwrap();
}

pub const SYNC_IO: CheckDefinition = CheckDefinition {
    key: "performance.sync-io",
    title: "Blocking I/O call",
    category: CheckCategory::Performance,
    default_severity: Severity::Warn,
    rationale: "Synchronous filesystem/process calls stall the event loop under load.",
    run: run_sync_io,
};

fn run_sync_io(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    match scan_added_re(ctx, &SYNC_IO_CALL).first() {
        Some(f) => CheckOutcome::warn(format!(
            "blocking call added: {}",
            evidence_snippet(&f.text)
        ))
        .at(&f.path, f.line),
        None => CheckOutcome::pass("no blocking I/O additions"),
    }
}

pub const AWAIT_IN_LOOP: CheckDefinition = CheckDefinition {
    key: "performance.await-in-loop",
    title: "Sequential await inside a loop",
    category: CheckCategory::Performance,
    default_severity: Severity::Info,
    rationale: "Awaiting per iteration serializes what could be a single batch round-trip.",
    run: run_await_in_loop,
};

fn run_await_in_loop(ctx: &CheckContext, t: &Thresholds) -> CheckOutcome {
    // Window: an await on one of the next N added lines after a loop header.
    let window = threshold_u64(t, "lookahead_lines", 8) as usize;

    for change in &ctx.changes {
        let lines = added_lines(&change.diff);
        for (i, line) in lines.iter().enumerate() {
            if !LOOP_HEADER.is_match(&line.text) {
                continue;
            }
            let upper = (i + 1 + window).min(lines.len());
            if let Some(hit) = lines[i + 1..upper].iter().find(|l| AWAIT_EXPR.is_match(&l.text)) {
                return CheckOutcome::warn(format!(
                    "await inside a loop started at line {}: {}",
                    line.line,
                    evidence_snippet(&hit.text)
                ))
                .at(&change.path, hit.line);
            }
        }
    }
    CheckOutcome::pass("no awaits inside added loops")
}

pub const SELECT_STAR: CheckDefinition = CheckDefinition {
    key: "performance.select-star",
    title: "Unbounded SELECT *",
    category: CheckCategory::Performance,
    default_severity: Severity::Info,
    rationale: "SELECT * without a LIMIT fetches columns and rows nobody asked for.",
    run: run_select_star,
};

fn run_select_star(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    let hits: Vec<_> = super::scan_added(ctx, |text| {
        SELECT_STAR_Q.is_match(text) && !LIMIT_CLAUSE.is_match(text)
    });
    match hits.first() {
        Some(f) => CheckOutcome::warn(format!(
            "unbounded query added: {}",
            evidence_snippet(&f.text)
        ))
        .at(&f.path, f.line),
        None => CheckOutcome::pass("no unbounded SELECT *"),
    }
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
    fn await_in_loop_window() {
        let c = ctx(
            "src/sync.ts",
            &[
                "for (const id of ids) {",
                "  const user = await fetchUser(id);",
                "}",
            ],
        );
        let out = run_await_in_loop(&c, &Thresholds::new());
        assert_eq!(out.status, CheckStatus::Warn);
        assert_eq!(out.line_hint, Some(2));
    }

    #[test]
    fn await_far_from_loop_is_ignored() {
        let mut lines = vec!["for (const id of ids) { push(id); }".to_string()];
        for i in 0..10 {
            lines.push(format!("const x{i} = {i};"));
        }
        lines.push("const user = await fetchUser(1);".to_string());
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let c = ctx("src/a.ts", &refs);
        assert_eq!(run_await_in_loop(&c, &Thresholds::new()).status, CheckStatus::Pass);
    }

    #[test]
    fn select_star_with_limit_passes() {
        let c = ctx("src/q.sql", &["SELECT * FROM events LIMIT 100;"]);
        assert_eq!(run_select_star(&c, &Thresholds::new()).status, CheckStatus::Pass);
        let c = ctx("src/q.sql", &["SELECT * FROM events;"]);
        assert_eq!(run_select_star(&c, &Thresholds::new()).status, CheckStatus::Warn);
    }

    #[test]
    fn sync_io_detected() {
        let c = ctx("src/load.ts", &["const raw = readFileSync(path);"]);
        assert_eq!(run_sync_io(&c, &Thresholds::new()).status, CheckStatus::Warn);
    }
}
