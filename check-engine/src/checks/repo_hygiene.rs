//! Repository hygiene checks. The only category allowed to inspect the raw
//! diff (conflict markers appear on context lines too).

use lazy_static::lazy_static;
use regex::Regex;

use super::{evidence_snippet, scan_added_re};
use crate::types::{
    CheckCategory, CheckContext, CheckDefinition, CheckOutcome, Severity, Thresholds,
};

lazy_static! {
    static ref DEBUGGER_STMT: Regex = Regex::new(
        r"^\s*debugger\s*;?\s*$|\bbinding\.pry\b|\bpdb\.set_trace\(\)|\bbyebug\b|\bdbg!\s*\("
    )
    .unwrap();
    static ref ENV_FILE: Regex = Regex::new(r"(^|/)\.env(\.|$)|(^|/)\.env$").unwrap();
}

const CONFLICT_PREFIXES: [&str; 3] = ["<<<<<<< ", "=======", ">>>>>>> "];

pub const CONFLICT_MARKERS: CheckDefinition = CheckDefinition {
    key: "hygiene.conflict-markers",
    title: "Merge conflict markers",
    category: CheckCategory::RepoHygiene,
    default_severity: Severity::Warn,
    rationale: "Committed conflict markers mean the merge was never finished.",
    run: run_conflict_markers,
};

fn run_conflict_markers(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    for change in &ctx.changes {
        // Raw diff scan: a conflict marker is a defect wherever it appears.
        for (idx, line) in change.diff.lines().enumerate() {
            let content = line
                .strip_prefix('+')
                .or_else(|| line.strip_prefix(' '))
                .unwrap_or(line);
            if content.starts_with(CONFLICT_PREFIXES[0])
                || content == CONFLICT_PREFIXES[1]
                || content.starts_with(CONFLICT_PREFIXES[2])
            {
                // Guard against diffs of files that legitimately document markers.
                if change.path.ends_with(".md") {
                    continue;
                }
                return CheckOutcome::fail(format!(
                    "conflict marker in {} (diff line {})",
                    change.path,
                    idx + 1
                ))
                .at(&change.path, 1);
            }
        }
    }
    CheckOutcome::pass("no conflict markers")
}

pub const DEBUGGER_ARTIFACT: CheckDefinition = CheckDefinition {
    key: "hygiene.debugger-artifact",
    title: "Debugger statement",
    category: CheckCategory::RepoHygiene,
    default_severity: Severity::Warn,
    rationale: "A breakpoint shipped to production stops the world for real users.",
    run: run_debugger_artifact,
};

fn run_debugger_artifact(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    let hits: Vec<_> = scan_added_re(ctx, &DEBUGGER_STMT)
        .into_iter()
        .filter(|f| !super::is_test_path(&f.path))
        .collect();
    match hits.first() {
        Some(f) => CheckOutcome::fail(format!(
            "debugger artifact added: {}",
            evidence_snippet(&f.text)
        ))
        .at(&f.path, f.line),
        None => CheckOutcome::pass("no debugger artifacts"),
    }
}

pub const ENV_FILE_COMMITTED: CheckDefinition = CheckDefinition {
    key: "hygiene.env-file-committed",
    title: "Environment file committed",
    category: CheckCategory::RepoHygiene,
    default_severity: Severity::Warn,
    rationale: "A committed .env is a credential leak with version history.",
    run: run_env_file_committed,
};

fn run_env_file_committed(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    for change in &ctx.changes {
        let path = change.path.as_str();
        if ENV_FILE.is_match(path) && !path.ends_with(".example") && !path.ends_with(".sample") {
            return CheckOutcome::fail(format!("environment file in the changeset: {path}"))
                .at(path, 1);
        }
    }
    CheckOutcome::pass("no environment files committed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckStatus, FileChange, MrInfo};

    fn ctx_raw(path: &str, diff: &str) -> CheckContext {
        CheckContext {
            changes: vec![FileChange {
                path: path.into(),
                diff: diff.into(),
            }],
            mr: MrInfo::default(),
        }
    }

    #[test]
    fn conflict_marker_on_context_line_still_fails() {
        let diff = "@@ -1,3 +1,3 @@\n <<<<<<< HEAD\n+let x = 1;\n";
        let out = run_conflict_markers(&ctx_raw("src/a.ts", diff), &Thresholds::new());
        assert_eq!(out.status, CheckStatus::Fail);
    }

    #[test]
    fn markdown_documenting_markers_is_tolerated() {
        let diff = "@@ -1,1 +1,1 @@\n+<<<<<<< HEAD\n";
        let out = run_conflict_markers(&ctx_raw("docs/merging.md", diff), &Thresholds::new());
        assert_eq!(out.status, CheckStatus::Pass);
    }

    #[test]
    fn env_file_paths() {
        let c = ctx_raw(".env", "@@ -0,0 +1,1 @@\n+SECRET=x\n");
        assert_eq!(
            run_env_file_committed(&c, &Thresholds::new()).status,
            CheckStatus::Fail
        );
        let c = ctx_raw(".env.example", "@@ -0,0 +1,1 @@\n+SECRET=\n");
        assert_eq!(
            run_env_file_committed(&c, &Thresholds::new()).status,
            CheckStatus::Pass
        );
        let c = ctx_raw("config/.env.production", "@@ -0,0 +1,1 @@\n+SECRET=x\n");
        assert_eq!(
            run_env_file_committed(&c, &Thresholds::new()).status,
            CheckStatus::Fail
        );
    }

    #[test]
    fn debugger_statement_fails() {
        let c = ctx_raw("src/a.js", "@@ -0,0 +1,1 @@\n+  debugger;\n");
        assert_eq!(
            run_debugger_artifact(&c, &Thresholds::new()).status,
            CheckStatus::Fail
        );
    }
}
