//! GOLD promotion: eligibility rules and the deterministic content document
//! whose hash makes re-ingestion idempotent.

use check_engine::{CheckCategory, CheckResult, CheckStatus};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Per-file diff budget inside the content document.
pub const MAX_DIFF_BYTES_PER_FILE: usize = 50 * 1024;

const TRUNCATION_MARKER: &str = "\n… [diff truncated at 50 KB]";

/// Tenant-level promotion knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GoldPolicy {
    pub score_threshold: u32,
    pub min_approvals: u32,
}

impl Default for GoldPolicy {
    fn default() -> Self {
        Self {
            score_threshold: 80,
            min_approvals: 1,
        }
    }
}

/// Why a merged MR was (or was not) promoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoldVerdict {
    Eligible,
    NotMerged,
    ScoreTooLow { score: u32, threshold: u32 },
    BlockingFindings { category: CheckCategory },
    NotEnoughApprovals { approvals: u32, required: u32 },
}

/// Evaluates promotion eligibility.
///
/// Approvals are best-effort: when the host refused to disclose them
/// (`None`), the approval gate is skipped rather than failed.
pub fn evaluate(
    merged: bool,
    score: u32,
    approvals: Option<u32>,
    results: &[CheckResult],
    policy: &GoldPolicy,
) -> GoldVerdict {
    if !merged {
        return GoldVerdict::NotMerged;
    }
    if score <= policy.score_threshold {
        return GoldVerdict::ScoreTooLow {
            score,
            threshold: policy.score_threshold,
        };
    }
    for category in [CheckCategory::Security, CheckCategory::CodeQuality] {
        if results
            .iter()
            .any(|r| r.category == category && r.status == CheckStatus::Fail)
        {
            return GoldVerdict::BlockingFindings { category };
        }
    }
    if let Some(n) = approvals {
        if n < policy.min_approvals {
            return GoldVerdict::NotEnoughApprovals {
                approvals: n,
                required: policy.min_approvals,
            };
        }
    }
    GoldVerdict::Eligible
}

/// One changed file for the content document.
#[derive(Debug, Clone)]
pub struct GoldFile {
    pub path: String,
    pub status_tag: FileStatusTag,
    pub diff: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatusTag {
    Added,
    Modified,
    Renamed,
    Deleted,
}

impl FileStatusTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Renamed => "renamed",
            Self::Deleted => "deleted",
        }
    }
}

/// Builds the canonical content document for a GOLD MR. Identical inputs
/// produce identical bytes, so `content_hash` dedupes re-ingestion.
pub fn build_content_document(title: &str, description: &str, files: &[GoldFile]) -> String {
    let mut doc = String::new();
    doc.push_str("# ");
    doc.push_str(title.trim());
    doc.push('\n');
    if !description.trim().is_empty() {
        doc.push('\n');
        doc.push_str(description.trim());
        doc.push('\n');
    }

    doc.push_str("\n## Files\n");
    for f in files {
        doc.push_str(&format!("- [{}] {}\n", f.status_tag.as_str(), f.path));
    }

    for f in files {
        doc.push_str(&format!("\n## Diff: {}\n", f.path));
        if f.diff.len() > MAX_DIFF_BYTES_PER_FILE {
            // Cut on a char boundary at or below the budget.
            let mut cut = MAX_DIFF_BYTES_PER_FILE;
            while !f.diff.is_char_boundary(cut) {
                cut -= 1;
            }
            doc.push_str(&f.diff[..cut]);
            doc.push_str(TRUNCATION_MARKER);
        } else {
            doc.push_str(&f.diff);
        }
        doc.push('\n');
    }

    doc
}

/// sha256 hex of the content document.
pub fn content_hash(document: &str) -> String {
    let digest = Sha256::digest(document.as_bytes());
    let mut s = String::with_capacity(64);
    for b in digest {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use check_engine::Severity;

    fn result(category: CheckCategory, status: CheckStatus) -> CheckResult {
        CheckResult {
            check_key: "k".into(),
            title: "t".into(),
            category,
            status,
            severity: Severity::Info,
            message: String::new(),
            file_path: None,
            line_start: None,
            line_end: None,
            evidence: None,
        }
    }

    #[test]
    fn eligibility_gates() {
        let policy = GoldPolicy::default();
        let clean = vec![result(CheckCategory::Security, CheckStatus::Pass)];

        assert_eq!(
            evaluate(false, 95, Some(2), &clean, &policy),
            GoldVerdict::NotMerged
        );
        assert!(matches!(
            evaluate(true, 80, Some(2), &clean, &policy),
            GoldVerdict::ScoreTooLow { .. }
        ));
        assert_eq!(
            evaluate(true, 95, Some(2), &clean, &policy),
            GoldVerdict::Eligible
        );
    }

    #[test]
    fn security_fail_blocks_promotion() {
        let policy = GoldPolicy::default();
        let results = vec![
            result(CheckCategory::Security, CheckStatus::Fail),
            result(CheckCategory::Testing, CheckStatus::Pass),
        ];
        assert!(matches!(
            evaluate(true, 95, Some(2), &results, &policy),
            GoldVerdict::BlockingFindings {
                category: CheckCategory::Security
            }
        ));
        // WARNs do not block.
        let warns = vec![result(CheckCategory::CodeQuality, CheckStatus::Warn)];
        assert_eq!(
            evaluate(true, 95, Some(2), &warns, &policy),
            GoldVerdict::Eligible
        );
    }

    #[test]
    fn unknown_approvals_skip_the_gate() {
        let policy = GoldPolicy::default();
        let clean = vec![result(CheckCategory::Security, CheckStatus::Pass)];
        assert_eq!(evaluate(true, 95, None, &clean, &policy), GoldVerdict::Eligible);
        assert!(matches!(
            evaluate(true, 95, Some(0), &clean, &policy),
            GoldVerdict::NotEnoughApprovals { .. }
        ));
    }

    #[test]
    fn content_document_is_deterministic() {
        let files = vec![GoldFile {
            path: "src/a.ts".into(),
            status_tag: FileStatusTag::Modified,
            diff: "@@ -1,1 +1,1 @@\n+new\n-old\n".into(),
        }];
        let a = build_content_document("Title", "Desc", &files);
        let b = build_content_document("Title", "Desc", &files);
        assert_eq!(a, b);
        assert_eq!(content_hash(&a), content_hash(&b));
        assert!(a.contains("- [modified] src/a.ts"));
    }

    #[test]
    fn oversized_diff_is_trimmed_with_marker() {
        let files = vec![GoldFile {
            path: "src/big.ts".into(),
            status_tag: FileStatusTag::Added,
            diff: "x".repeat(MAX_DIFF_BYTES_PER_FILE + 100),
        }];
        let doc = build_content_document("Big", "", &files);
        assert!(doc.contains("[diff truncated at 50 KB]"));
        assert!(doc.len() < MAX_DIFF_BYTES_PER_FILE + 500);
    }
}
