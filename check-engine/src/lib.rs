//! Deterministic check engine.
//!
//! A stateless library: feed it the normalized MR context (changed files with
//! unified diffs plus title/description) and a per-tenant overlay, get back
//! one `CheckResult` per enabled registry entry and a weighted score.
//!
//! Guarantees:
//! - Checks are pure; the engine never performs I/O.
//! - A panicking check is contained and recorded as FAIL ("check raised").
//! - Identical inputs produce identical results and an identical score.

pub mod checks;
pub mod diff;
pub mod score;
pub mod types;

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, warn};

pub use checks::registry;
pub use score::{calculate_score, status_counts, summary_line};
pub use types::{
    CheckCategory, CheckContext, CheckDefinition, CheckOutcome, CheckOverlay, CheckResult,
    CheckStatus, FileChange, MrInfo, Severity, Thresholds,
};

/// Runs every enabled registry check over `ctx`, applying tenant overlays.
///
/// Overlay semantics, keyed by check key:
/// - missing entry: check runs with defaults;
/// - `enabled = false`: check is skipped entirely (no result row);
/// - `severity_override`: replaces the outcome status verbatim;
/// - `thresholds`: opaque map handed to the check.
pub fn run_checks(
    ctx: &CheckContext,
    overlays: &HashMap<String, CheckOverlay>,
) -> Vec<CheckResult> {
    let mut results = Vec::with_capacity(registry().len());

    for def in registry() {
        let overlay = overlays.get(def.key);
        if let Some(o) = overlay {
            if !o.enabled {
                debug!(check = def.key, "check disabled by tenant overlay");
                continue;
            }
        }
        let empty = Thresholds::new();
        let thresholds = overlay.map(|o| &o.thresholds).unwrap_or(&empty);

        let outcome = match catch_unwind(AssertUnwindSafe(|| (def.run)(ctx, thresholds))) {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(check = def.key, "check panicked; recording FAIL");
                CheckOutcome::fail("check raised")
            }
        };

        let status = overlay
            .and_then(|o| o.severity_override)
            .unwrap_or(outcome.status);

        results.push(CheckResult {
            check_key: def.key.to_string(),
            title: def.title.to_string(),
            category: def.category,
            status,
            severity: severity_for(status, def.default_severity),
            message: outcome.details,
            file_path: outcome.file_path,
            line_start: outcome.line_hint,
            line_end: outcome.line_hint,
            evidence: None,
        });
    }

    results
}

/// FAIL is always a blocker; otherwise the check's default applies.
fn severity_for(status: CheckStatus, default: Severity) -> Severity {
    match status {
        CheckStatus::Fail => Severity::Blocker,
        CheckStatus::Warn | CheckStatus::Pass => default,
    }
}
