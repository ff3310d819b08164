//! Persisted entities. Every row is tenant-scoped; identifiers are opaque
//! UUID strings minted by [`crate::ids::new_id`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review run lifecycle. Exactly one terminal state is ever written; the
/// retry action is the only way back (FAILED → QUEUED).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(Self::Queued),
            "RUNNING" => Some(Self::Running),
            "SUCCEEDED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KnowledgeType {
    GoldMr,
    Doc,
}

impl KnowledgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoldMr => "GOLD_MR",
            Self::Doc => "DOC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GOLD_MR" => Some(Self::GoldMr),
            "DOC" => Some(Self::Doc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub slug: String,
    pub gold_score_threshold: u32,
    pub gold_min_approvals: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub tenant_id: String,
    pub provider: String,
    pub provider_repo_id: String,
    pub namespace: String,
    pub name: String,
    pub default_branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: String,
    pub tenant_id: String,
    pub repository_id: String,
    pub iid: i64,
    pub title: String,
    pub author: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
    pub state: String,
    pub web_url: String,
    pub last_seen_sha: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRun {
    pub id: String,
    pub tenant_id: String,
    pub merge_request_id: String,
    pub head_sha: String,
    pub status: RunStatus,
    pub phase: Option<String>,
    pub progress_message: Option<String>,
    pub score: Option<i64>,
    pub summary: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResultRow {
    pub id: String,
    pub tenant_id: String,
    pub review_run_id: String,
    pub check_key: String,
    pub category: String,
    pub status: String,
    pub severity: String,
    pub message: String,
    pub file_path: Option<String>,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub evidence: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSuggestionRow {
    pub id: String,
    pub tenant_id: String,
    pub review_run_id: String,
    pub check_key: String,
    pub severity: String,
    pub title: String,
    pub rationale: String,
    pub suggested_fix: String,
    pub files: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostedComment {
    pub id: String,
    pub tenant_id: String,
    pub review_run_id: String,
    pub provider: String,
    pub provider_id: String,
    pub comment_type: String,
    pub body: String,
    pub ai_included: bool,
    pub ai_summary_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSource {
    pub id: String,
    pub tenant_id: String,
    pub source_type: KnowledgeType,
    pub provider: String,
    pub provider_id: String,
    pub title: String,
    pub source_url: Option<String>,
    pub content_text: String,
    pub content_hash: String,
    pub metadata: Option<serde_json::Value>,
    pub feature_tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantAiConfig {
    pub tenant_id: String,
    pub enabled: bool,
    pub provider: String,
    pub model: String,
    pub max_suggestions: u32,
    pub max_prompt_chars: u32,
    pub max_total_diff_bytes: u32,
}

impl Default for TenantAiConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            enabled: false,
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            max_suggestions: 3,
            max_prompt_chars: 24_000,
            max_total_diff_bytes: 512 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_round_trips() {
        for s in [
            RunStatus::Queued,
            RunStatus::Running,
            RunStatus::Succeeded,
            RunStatus::Failed,
        ] {
            assert_eq!(RunStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(RunStatus::parse("NOPE"), None);
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn knowledge_type_round_trips() {
        assert_eq!(KnowledgeType::parse("GOLD_MR"), Some(KnowledgeType::GoldMr));
        assert_eq!(KnowledgeType::parse("DOC"), Some(KnowledgeType::Doc));
        assert_eq!(KnowledgeType::GoldMr.as_str(), "GOLD_MR");
    }
}
