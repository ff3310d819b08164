//! Request/response types for suggestion generation.
//!
//! The adapter owns its own light input shapes so callers decide what is
//! safe to hand over; the privacy filter has already run by the time these
//! structs are populated.

use check_engine::{CheckCategory, Severity};
use serde::{Deserialize, Serialize};

/// A failing deterministic check the model should propose a fix for.
#[derive(Debug, Clone, Serialize)]
pub struct FailedCheck {
    pub check_key: String,
    pub category: CheckCategory,
    pub severity: Severity,
    pub message: String,
    pub file_path: Option<String>,
}

/// A redacted code excerpt (from the privacy filter).
#[derive(Debug, Clone, Serialize)]
pub struct PromptSnippet {
    pub check_key: String,
    pub path: String,
    pub content: String,
    pub line_start: u32,
    pub line_end: u32,
}

/// A GOLD precedent reference the model may cite.
#[derive(Debug, Clone, Serialize)]
pub struct PrecedentRef {
    pub title: String,
    pub source_url: Option<String>,
}

/// MR metadata for prompt context.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MrContext {
    pub title: String,
    pub description: String,
}

/// Everything the adapter needs for one generation call.
#[derive(Debug, Clone)]
pub struct SuggestionRequest {
    pub mr: MrContext,
    pub checks: Vec<FailedCheck>,
    pub snippets: Vec<PromptSnippet>,
    pub precedents: Vec<PrecedentRef>,
    /// Short note about what redaction removed, so the model knows why
    /// context may look incomplete.
    pub redaction_note: Option<String>,
}

impl SuggestionRequest {
    /// True when no snippet survived the privacy filter: the prompt is built
    /// from check results alone.
    pub fn is_check_only(&self) -> bool {
        self.snippets.is_empty()
    }
}

/// A file reference inside a suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionFile {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,
}

/// One normalized suggestion, ready for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub check_key: String,
    pub severity: Severity,
    pub title: String,
    pub rationale: String,
    /// Always a plain string after normalization.
    pub suggested_fix: String,
    #[serde(default)]
    pub files: Vec<SuggestionFile>,
    #[serde(default)]
    pub precedent_refs: Vec<String>,
}
