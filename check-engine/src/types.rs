//! Core types for the deterministic check engine.
//!
//! A check is a pure function over the normalized MR context. The engine owns
//! dispatch, panic containment, tenant overlays and scoring; checks only look
//! at added lines (or, for repo hygiene, the raw diff) and report an outcome.

use serde::{Deserialize, Serialize};

/// Check category. Ordering of variants is the AI-selection priority
/// (security first, hygiene last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckCategory {
    Security,
    CodeQuality,
    Architecture,
    Performance,
    Testing,
    Observability,
    RepoHygiene,
}

impl CheckCategory {
    /// Aggregation weight used by the score formula.
    pub fn weight(self) -> u32 {
        match self {
            Self::Security => 20,
            Self::CodeQuality => 15,
            Self::Architecture => 15,
            Self::Performance => 10,
            Self::Testing => 15,
            Self::Observability => 10,
            Self::RepoHygiene => 5,
        }
    }

    /// All categories in priority order.
    pub fn all() -> [CheckCategory; 7] {
        [
            Self::Security,
            Self::CodeQuality,
            Self::Architecture,
            Self::Performance,
            Self::Testing,
            Self::Observability,
            Self::RepoHygiene,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Security => "SECURITY",
            Self::CodeQuality => "CODE_QUALITY",
            Self::Architecture => "ARCHITECTURE",
            Self::Performance => "PERFORMANCE",
            Self::Testing => "TESTING",
            Self::Observability => "OBSERVABILITY",
            Self::RepoHygiene => "REPO_HYGIENE",
        }
    }
}

impl std::fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of a single check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity attached to a persisted result. FAIL is always a blocker;
/// everything else keeps the check's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Blocker,
    Warn,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocker => "BLOCKER",
            Self::Warn => "WARN",
            Self::Info => "INFO",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One changed file: repository path plus its unified diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub diff: String,
}

/// MR metadata visible to checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MrInfo {
    pub title: String,
    pub description: String,
}

/// The full input a check sees.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub changes: Vec<FileChange>,
    pub mr: MrInfo,
}

/// Opaque per-check tuning map from the tenant overlay.
pub type Thresholds = serde_json::Map<String, serde_json::Value>;

/// What a check's `run` returns.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub status: CheckStatus,
    pub details: String,
    pub file_path: Option<String>,
    pub line_hint: Option<u32>,
}

impl CheckOutcome {
    pub fn pass(details: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Pass,
            details: details.into(),
            file_path: None,
            line_hint: None,
        }
    }

    pub fn warn(details: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Warn,
            details: details.into(),
            file_path: None,
            line_hint: None,
        }
    }

    pub fn fail(details: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Fail,
            details: details.into(),
            file_path: None,
            line_hint: None,
        }
    }

    pub fn at(mut self, path: impl Into<String>, line: u32) -> Self {
        self.file_path = Some(path.into());
        self.line_hint = Some(line);
        self
    }
}

/// A registry entry. `run` must be pure and synchronous; the engine contains
/// panics and never blocks on I/O.
pub struct CheckDefinition {
    pub key: &'static str,
    pub title: &'static str,
    pub category: CheckCategory,
    pub default_severity: Severity,
    pub rationale: &'static str,
    pub run: fn(&CheckContext, &Thresholds) -> CheckOutcome,
}

/// Engine output for one check, ready for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_key: String,
    pub title: String,
    pub category: CheckCategory,
    pub status: CheckStatus,
    pub severity: Severity,
    pub message: String,
    pub file_path: Option<String>,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
    /// Free-form evidence (matched pattern, counts) for the UI.
    pub evidence: Option<serde_json::Value>,
}

/// Per-tenant overlay for a single check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckOverlay {
    pub enabled: bool,
    pub severity_override: Option<CheckStatus>,
    #[serde(default)]
    pub thresholds: Thresholds,
}

impl CheckOverlay {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            severity_override: None,
            thresholds: Thresholds::new(),
        }
    }
}

/// Reads a numeric threshold with a default, tolerating strings and floats.
pub fn threshold_u64(t: &Thresholds, key: &str, default: u64) -> u64 {
    match t.get(key) {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(default),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(default),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_weights_sum() {
        let total: u32 = CheckCategory::all().iter().map(|c| c.weight()).sum();
        assert_eq!(total, 90);
    }

    #[test]
    fn category_serializes_screaming_snake() {
        let s = serde_json::to_string(&CheckCategory::CodeQuality).unwrap();
        assert_eq!(s, "\"CODE_QUALITY\"");
        let s = serde_json::to_string(&CheckCategory::RepoHygiene).unwrap();
        assert_eq!(s, "\"REPO_HYGIENE\"");
    }

    #[test]
    fn threshold_reads_number_and_string() {
        let mut t = Thresholds::new();
        t.insert("max".into(), serde_json::json!(5));
        assert_eq!(threshold_u64(&t, "max", 10), 5);
        t.insert("max".into(), serde_json::json!("7"));
        assert_eq!(threshold_u64(&t, "max", 10), 7);
        assert_eq!(threshold_u64(&t, "missing", 10), 10);
    }
}
