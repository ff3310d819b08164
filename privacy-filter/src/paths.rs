//! Path policy: which files may ever reach an LLM prompt.
//!
//! Deny always wins. Allow admits known source roots and a fixed extension
//! list; anything else is skipped (and logged by the caller).

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DENY: Vec<Regex> = vec![
        Regex::new(r"(^|/)\.env($|\.)").unwrap(),
        Regex::new(r"\.pem$").unwrap(),
        Regex::new(r"\.key$").unwrap(),
        Regex::new(r"\.p12$").unwrap(),
        Regex::new(r"\.pfx$").unwrap(),
        Regex::new(r"(^|/)id_rsa").unwrap(),
        Regex::new(r"(^|/)credentials").unwrap(),
        Regex::new(r"(^|/)secrets/").unwrap(),
        Regex::new(r"(^|/)node_modules/").unwrap(),
        Regex::new(r"(^|/)dist/").unwrap(),
        Regex::new(r"(^|/)build/").unwrap(),
        Regex::new(r"(^|/)coverage/").unwrap(),
    ];
}

const ALLOW_ROOTS: [&str; 5] = ["apps/", "packages/", "infra/", "scripts/", "prisma/"];

const ALLOW_EXTS: [&str; 13] = [
    ".ts", ".tsx", ".js", ".jsx", ".json", ".md", ".yml", ".yaml", ".sql", ".prisma", ".sh",
    ".ps1", ".rs",
];

/// True when the path must never be exposed, regardless of allow rules.
pub fn is_denied(path: &str) -> bool {
    DENY.iter().any(|re| re.is_match(path))
}

/// True when the path is admissible for prompt context (and not denied).
pub fn is_allowed(path: &str) -> bool {
    if is_denied(path) {
        return false;
    }
    if ALLOW_ROOTS.iter().any(|root| path.starts_with(root)) {
        return true;
    }
    let lower = path.to_ascii_lowercase();
    ALLOW_EXTS.iter().any(|ext| lower.ends_with(ext))
}
