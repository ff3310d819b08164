//! Security checks: secrets, injection, dangerous evaluation, weak transport
//! and hashing. These carry the heaviest score weight and rank first for AI
//! suggestion selection.

use lazy_static::lazy_static;
use regex::Regex;

use super::{evidence_snippet, scan_added, scan_added_re};
use crate::types::{
    CheckCategory, CheckContext, CheckDefinition, CheckOutcome, Severity, Thresholds,
};

lazy_static! {
    // High-confidence secret assignments. Deliberately narrow: a broad net here
    // buries real leaks in noise.
    static ref SECRET_ASSIGNMENT: Regex = Regex::new(
        r#"(?i)(api[_-]?key|secret|token|password|passwd|private[_-]?key)\s*[:=]\s*['"][^'"]{8,}['"]"#
    )
    .unwrap();
    static ref AWS_KEY: Regex = Regex::new(r"AKIA[0-9A-Z]{16}").unwrap();
    static ref PRIVATE_KEY_HEADER: Regex =
        Regex::new(r"-----BEGIN (RSA |EC |OPENSSH |DSA )?PRIVATE KEY-----").unwrap();
    static ref EVAL_CALL: Regex =
        Regex::new(r"\b(eval|exec)\s*\(|new\s+Function\s*\(").unwrap();
    static ref SQL_CONCAT: Regex = Regex::new(
        r#"(?i)["'](SELECT|INSERT|UPDATE|DELETE)\b[^"']*["']\s*(\+|\|\||%s|\$\{)"#
    )
    .unwrap();
    static ref PLAIN_HTTP: Regex = Regex::new(r#"http://[^\s"']+"#).unwrap();
    static ref WEAK_HASH_CALL: Regex =
        Regex::new(r#"(?i)\b(md5|sha1)\s*\(|createHash\(\s*['"](md5|sha1)['"]"#).unwrap();
}

pub const HARDCODED_SECRET: CheckDefinition = CheckDefinition {
    key: "security.hardcoded-secret",
    title: "Hardcoded secret",
    category: CheckCategory::Security,
    default_severity: Severity::Warn,
    rationale: "Credentials in source end up in history forever and leak through forks and CI logs.",
    run: run_hardcoded_secret,
};

fn run_hardcoded_secret(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    let hits = scan_added(ctx, |text| {
        SECRET_ASSIGNMENT.is_match(text)
            || AWS_KEY.is_match(text)
            || PRIVATE_KEY_HEADER.is_match(text)
    });
    match hits.first() {
        Some(f) => CheckOutcome::fail(format!(
            "added line looks like a credential: {}",
            redacted_evidence(&f.text)
        ))
        .at(&f.path, f.line),
        None => CheckOutcome::pass("no credential-shaped additions"),
    }
}

// Evidence for this check must not echo the secret itself.
fn redacted_evidence(text: &str) -> String {
    let masked = SECRET_ASSIGNMENT.replace_all(text, "$1=[MASKED]");
    let masked = AWS_KEY.replace_all(&masked, "AKIA[MASKED]");
    evidence_snippet(&masked)
}

pub const EVAL_USAGE: CheckDefinition = CheckDefinition {
    key: "security.eval-usage",
    title: "Dynamic code evaluation",
    category: CheckCategory::Security,
    default_severity: Severity::Warn,
    rationale: "eval/exec on anything derived from input is remote code execution waiting to happen.",
    run: run_eval_usage,
};

fn run_eval_usage(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    match scan_added_re(ctx, &EVAL_CALL).first() {
        Some(f) => CheckOutcome::fail(format!(
            "dynamic evaluation added: {}",
            evidence_snippet(&f.text)
        ))
        .at(&f.path, f.line),
        None => CheckOutcome::pass("no eval/exec additions"),
    }
}

pub const SQL_STRING_CONCAT: CheckDefinition = CheckDefinition {
    key: "security.sql-string-concat",
    title: "SQL built by string concatenation",
    category: CheckCategory::Security,
    default_severity: Severity::Warn,
    rationale: "Concatenated SQL bypasses parameter binding and invites injection.",
    run: run_sql_concat,
};

fn run_sql_concat(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    match scan_added_re(ctx, &SQL_CONCAT).first() {
        Some(f) => CheckOutcome::fail(format!(
            "SQL string concatenation added: {}",
            evidence_snippet(&f.text)
        ))
        .at(&f.path, f.line),
        None => CheckOutcome::pass("no concatenated SQL"),
    }
}

pub const INSECURE_HTTP: CheckDefinition = CheckDefinition {
    key: "security.insecure-http",
    title: "Plain-HTTP endpoint",
    category: CheckCategory::Security,
    default_severity: Severity::Warn,
    rationale: "Unencrypted endpoints leak tokens and payloads in transit.",
    run: run_insecure_http,
};

fn run_insecure_http(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    let hits = scan_added(ctx, |text| {
        PLAIN_HTTP
            .find(text)
            .map(|m| {
                let url = m.as_str();
                !url.contains("localhost") && !url.contains("127.0.0.1") && !url.contains("0.0.0.0")
            })
            .unwrap_or(false)
    });
    match hits.first() {
        Some(f) => CheckOutcome::warn(format!(
            "non-local plain-http URL added: {}",
            evidence_snippet(&f.text)
        ))
        .at(&f.path, f.line),
        None => CheckOutcome::pass("no plain-http endpoints"),
    }
}

pub const WEAK_HASH: CheckDefinition = CheckDefinition {
    key: "security.weak-hash",
    title: "Weak hash algorithm",
    category: CheckCategory::Security,
    default_severity: Severity::Info,
    rationale: "MD5/SHA-1 are broken for anything security-sensitive.",
    run: run_weak_hash,
};

fn run_weak_hash(ctx: &CheckContext, _t: &Thresholds) -> CheckOutcome {
    match scan_added_re(ctx, &WEAK_HASH_CALL).first() {
        Some(f) => CheckOutcome::warn(format!(
            "weak hash usage added: {}",
            evidence_snippet(&f.text)
        ))
        .at(&f.path, f.line),
        None => CheckOutcome::pass("no weak hash usage"),
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
    fn flags_secret_assignment_with_masked_evidence() {
        let c = ctx("src/cfg.ts", &[r#"const apiKey = "sk_live_abcdef123456""#]);
        let out = run_hardcoded_secret(&c, &Thresholds::new());
        assert_eq!(out.status, CheckStatus::Fail);
        assert!(!out.details.contains("sk_live_abcdef123456"));
        assert_eq!(out.file_path.as_deref(), Some("src/cfg.ts"));
        assert_eq!(out.line_hint, Some(1));
    }

    #[test]
    fn clean_diff_passes() {
        let c = ctx("src/a.ts", &["const x = load(key);"]);
        let out = run_hardcoded_secret(&c, &Thresholds::new());
        assert_eq!(out.status, CheckStatus::Pass);
    }

    #[test]
    fn localhost_http_is_tolerated() {
        let c = ctx("src/a.ts", &[r#"const base = "http://localhost:3000""#]);
        assert_eq!(
            run_insecure_http(&c, &Thresholds::new()).status,
            CheckStatus::Pass
        );
        let c = ctx("src/a.ts", &[r#"fetch("http://example.com/api")"#]);
        assert_eq!(
            run_insecure_http(&c, &Thresholds::new()).status,
            CheckStatus::Warn
        );
    }

    #[test]
    fn sql_concat_detected() {
        let c = ctx(
            "src/db.ts",
            &[r#"const q = "SELECT * FROM users WHERE id = " + id;"#],
        );
        assert_eq!(run_sql_concat(&c, &Thresholds::new()).status, CheckStatus::Fail);
    }

    #[test]
    fn eval_detected() {
        let c = ctx("src/a.js", &["eval(payload)"]);
        assert_eq!(run_eval_usage(&c, &Thresholds::new()).status, CheckStatus::Fail);
    }
}
