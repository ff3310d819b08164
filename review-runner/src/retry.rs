//! The conservative transient-marker classifier.
//!
//! Applied when the queue redelivers a job whose run already ended FAILED:
//! only errors that look transient are re-executed. The match is substring
//! based on purpose; when in doubt it errs on the side of retrying, but a
//! clearly permanent message (403, tenant mismatch) stays failed.

const TRANSIENT_MARKERS: [&str; 10] = [
    "429",
    "500",
    "502",
    "503",
    "504",
    "5xx",
    "timeout",
    "timed out",
    "network",
    "connection",
];

/// True when the prior error message carries any transient marker.
pub fn error_looks_transient(error: &str) -> bool {
    let lower = error.to_ascii_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_markers_match() {
        assert!(error_looks_transient("host server error: status 500"));
        assert!(error_looks_transient("host rate limited (429)"));
        assert!(error_looks_transient("llm call timed out"));
        assert!(error_looks_transient("Connection reset by peer"));
        assert!(error_looks_transient("host request timeout"));
        assert!(error_looks_transient("upstream 5xx observed"));
    }

    #[test]
    fn permanent_messages_do_not_match() {
        assert!(!error_looks_transient("host forbidden (403)"));
        assert!(!error_looks_transient("host unauthorized (401)"));
        assert!(!error_looks_transient("review run not found: r1"));
        assert!(!error_looks_transient(
            "review run r1 does not belong to tenant t2"
        ));
        assert!(!error_looks_transient(
            "Unexpected termination: job completed without setting final status"
        ));
    }
}
