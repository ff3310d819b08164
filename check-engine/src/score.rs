//! Weighted score aggregation over check results.
//!
//! Per-category sub-score: `(PASS*100 + WARN*50 + FAIL*0) / count`.
//! Total: weighted average across categories that produced results, rounded
//! to an integer in `[0, 100]`. Categories without results contribute no
//! weight, so a run with only hygiene findings is still scored fairly.

use std::collections::BTreeMap;

use crate::types::{CheckCategory, CheckResult, CheckStatus};

/// Aggregates results into a `[0, 100]` score. An empty slice scores 100
/// (nothing to complain about).
pub fn calculate_score(results: &[CheckResult]) -> u32 {
    let mut per_category: BTreeMap<CheckCategory, (u64, u64)> = BTreeMap::new();

    for r in results {
        let (points, count) = per_category.entry(r.category).or_insert((0, 0));
        *points += match r.status {
            CheckStatus::Pass => 100,
            CheckStatus::Warn => 50,
            CheckStatus::Fail => 0,
        };
        *count += 1;
    }

    if per_category.is_empty() {
        return 100;
    }

    let mut weighted = 0f64;
    let mut weight_total = 0f64;
    for (category, (points, count)) in per_category {
        let sub = points as f64 / count as f64;
        let w = category.weight() as f64;
        weighted += sub * w;
        weight_total += w;
    }

    (weighted / weight_total).round().clamp(0.0, 100.0) as u32
}

/// `(pass, warn, fail)` counts for the run summary line.
pub fn status_counts(results: &[CheckResult]) -> (usize, usize, usize) {
    let mut pass = 0;
    let mut warn = 0;
    let mut fail = 0;
    for r in results {
        match r.status {
            CheckStatus::Pass => pass += 1,
            CheckStatus::Warn => warn += 1,
            CheckStatus::Fail => fail += 1,
        }
    }
    (pass, warn, fail)
}

/// Renders the run summary, e.g. `"12 checks: 10 PASS / 1 WARN / 1 FAIL"`.
pub fn summary_line(results: &[CheckResult]) -> String {
    let (pass, warn, fail) = status_counts(results);
    format!(
        "{} checks: {} PASS / {} WARN / {} FAIL",
        results.len(),
        pass,
        warn,
        fail
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

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
    fn all_pass_scores_100() {
        let results = vec![
            result(CheckCategory::Security, CheckStatus::Pass),
            result(CheckCategory::Testing, CheckStatus::Pass),
        ];
        assert_eq!(calculate_score(&results), 100);
    }

    #[test]
    fn empty_scores_100() {
        assert_eq!(calculate_score(&[]), 100);
    }

    #[test]
    fn fail_drags_weighted_average() {
        // SECURITY (w=20) all fail, TESTING (w=15) all pass:
        // (0*20 + 100*15) / 35 ≈ 42.857 → 43
        let results = vec![
            result(CheckCategory::Security, CheckStatus::Fail),
            result(CheckCategory::Testing, CheckStatus::Pass),
        ];
        assert_eq!(calculate_score(&results), 43);
    }

    #[test]
    fn warn_is_half_credit() {
        let results = vec![result(CheckCategory::Performance, CheckStatus::Warn)];
        assert_eq!(calculate_score(&results), 50);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let results = vec![
            result(CheckCategory::Security, CheckStatus::Warn),
            result(CheckCategory::CodeQuality, CheckStatus::Pass),
            result(CheckCategory::RepoHygiene, CheckStatus::Fail),
        ];
        let a = calculate_score(&results);
        let b = calculate_score(&results);
        assert_eq!(a, b);
    }

    #[test]
    fn summary_line_format() {
        let results = vec![
            result(CheckCategory::Security, CheckStatus::Pass),
            result(CheckCategory::Testing, CheckStatus::Warn),
            result(CheckCategory::Testing, CheckStatus::Fail),
        ];
        assert_eq!(summary_line(&results), "3 checks: 1 PASS / 1 WARN / 1 FAIL");
    }
}
