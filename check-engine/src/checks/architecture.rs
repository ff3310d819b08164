//! Architecture checks: layering escapes, module growth, configuration
//! literals where configuration should be injected.

use lazy_static::lazy_static;
use regex::Regex;

use super::{evidence_snippet, scan_added_re};
use crate::diff::added_lines;
use crate::types::{
    CheckCategory, CheckContext, CheckDefinition, CheckOutcome, Severity, Thresholds,
    threshold_u64,
};

lazy_static! {
    // import ... from "../../../x" or require("../../..") three or more levels up.
    static ref DEEP_RELATIVE: Regex =
        Regex::new(r#"(from\s+|require\s*\(\s*|import\s+)['"](\.\./){3,}"#).unwrap();
    // Literal host:port or IP endpoints outside config files.
    static ref ENDPOINT_LITERAL: Regex = Regex::new(
        r#"['"](https?://)?((\d{1,3}\.){3}\d{1,3}|[a-z0-9.-]+\.(internal|corp|local))(:\d{2,5})?['"]"#
    )
    .unwrap();
}

pub const DEEP_RELATIVE_IMPORT: CheckDefinition = CheckDefinition {
    key: "architecture.deep-relative-import",
    title: "Deep relative import",
    category: CheckCategory::Architecture,
    default_severity: Severity::Info,
    rationale: "Imports reaching three-plus levels up couple modules across layer boundaries.",
    run: run_deep_relative_import,
};

fn run_deep_relative_import(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    match scan_added_re(ctx, &DEEP_RELATIVE).first() {
        Some(f) => CheckOutcome::warn(format!(
            "import escapes its layer: {}",
            evidence_snippet(&f.text)
        ))
        .at(&f.path, f.line),
        None => CheckOutcome::pass("no deep relative imports"),
    }
}

pub const OVERSIZED_MODULE: CheckDefinition = CheckDefinition {
    key: "architecture.oversized-module",
    title: "Oversized module growth",
    category: CheckCategory::Architecture,
    default_severity: Severity::Info,
    rationale: "A single file absorbing hundreds of new lines is usually a module waiting to split.",
    run: run_oversized_module,
};

fn run_oversized_module(ctx: &CheckContext, t: &Thresholds) -> CheckOutcome {
    let limit = threshold_u64(t, "max_added_lines_per_file", 400) as usize;
    let worst = ctx
        .changes
        .iter()
        .map(|c| (c, added_lines(&c.diff).len()))
        .max_by_key(|(_, n)| *n);
    match worst {
        Some((change, n)) if n > limit => CheckOutcome::warn(format!(
            "{} gained {n} lines in one MR (limit {limit})",
            change.path
        ))
        .at(&change.path, 1),
        _ => CheckOutcome::pass(format!("no file grew past {limit} lines")),
    }
}

pub const HARDCODED_ENDPOINT: CheckDefinition = CheckDefinition {
    key: "architecture.hardcoded-endpoint",
    title: "Hardcoded service endpoint",
    category: CheckCategory::Architecture,
    default_severity: Severity::Info,
    rationale: "Endpoints baked into code bypass configuration and break per-environment deploys.",
    run: run_hardcoded_endpoint,
};

fn run_hardcoded_endpoint(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    let hits: Vec<_> = scan_added_re(ctx, &ENDPOINT_LITERAL)
        .into_iter()
        .filter(|f| !is_config_path(&f.path))
        .collect();
    match hits.first() {
        Some(f) => CheckOutcome::warn(format!(
            "endpoint literal outside configuration: {}",
            evidence_snippet(&f.text)
        ))
        .at(&f.path, f.line),
        None => CheckOutcome::pass("no hardcoded endpoints"),
    }
}

fn is_config_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".yml")
        || lower.ends_with(".yaml")
        || lower.ends_with(".toml")
        || lower.ends_with(".env.example")
        || lower.contains("config")
        || lower.contains("infra/")
}
