//! Parsing and normalization of model output.
//!
//! The prompt demands a JSON object `{"suggestions": [...]}` but models wrap
//! JSON in chatter and code fences anyway. The parser extracts the outermost
//! object, validates the schema and normalizes every field the rest of the
//! system relies on; in particular `suggested_fix` is always a string
//! afterwards.

use check_engine::Severity;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AiError, AiResult};
use crate::types::{Suggestion, SuggestionFile};

pub const NO_FIX_FALLBACK: &str = "No fix suggestion provided.";

#[derive(Deserialize)]
struct RawBatch {
    #[serde(default)]
    suggestions: Vec<RawSuggestion>,
}

#[derive(Deserialize)]
struct RawSuggestion {
    #[serde(default, alias = "checkKey")]
    check_key: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    rationale: String,
    #[serde(default, alias = "suggestedFix")]
    suggested_fix: Option<Value>,
    #[serde(default)]
    files: Vec<RawFile>,
    #[serde(default, alias = "precedentRefs")]
    precedent_refs: Vec<String>,
}

#[derive(Deserialize)]
struct RawFile {
    #[serde(default)]
    path: String,
    #[serde(default, alias = "lineStart")]
    line_start: Option<u32>,
    #[serde(default, alias = "lineEnd")]
    line_end: Option<u32>,
}

/// Parses raw model text into normalized suggestions, truncated to `max`.
pub fn parse_suggestions(raw: &str, max: usize) -> AiResult<Vec<Suggestion>> {
    let json = extract_json_object(raw)
        .ok_or_else(|| AiError::Parse("no JSON object in response".into()))?;

    let batch: RawBatch =
        serde_json::from_str(json).map_err(|e| AiError::Parse(e.to_string()))?;

    let mut out = Vec::new();
    for raw in batch.suggestions.into_iter().take(max) {
        if raw.title.trim().is_empty() && raw.rationale.trim().is_empty() {
            continue;
        }
        out.push(Suggestion {
            check_key: raw.check_key,
            severity: parse_severity(raw.severity.as_deref()),
            title: raw.title.trim().to_string(),
            rationale: raw.rationale.trim().to_string(),
            suggested_fix: normalize_fix(raw.suggested_fix),
            files: raw
                .files
                .into_iter()
                .filter(|f| !f.path.is_empty())
                .map(|f| SuggestionFile {
                    path: f.path,
                    line_start: f.line_start,
                    line_end: f.line_end,
                })
                .collect(),
            precedent_refs: raw.precedent_refs,
        });
    }
    Ok(out)
}

/// `suggested_fix` may arrive as a string, an array of steps, or nothing.
/// Arrays are joined into a bullet list; anything empty becomes the fallback.
pub fn normalize_fix(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Array(items)) => {
            let bullets: Vec<String> = items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) if !s.trim().is_empty() => {
                        Some(format!("- {}", s.trim()))
                    }
                    _ => None,
                })
                .collect();
            if bullets.is_empty() {
                NO_FIX_FALLBACK.to_string()
            } else {
                bullets.join("\n")
            }
        }
        _ => NO_FIX_FALLBACK.to_string(),
    }
}

fn parse_severity(raw: Option<&str>) -> Severity {
    match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        Some("BLOCKER") | Some("CRITICAL") | Some("HIGH") => Severity::Blocker,
        Some("INFO") | Some("LOW") => Severity::Info,
        _ => Severity::Warn,
    }
}

/// Strips code fences/chatter and returns the outermost `{...}` slice.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_response() {
        let raw = r#"Sure! Here you go:
```json
{"suggestions": [{"checkKey": "security.eval-usage", "severity": "BLOCKER",
  "title": "Remove eval", "rationale": "eval executes untrusted input",
  "suggestedFix": "Use JSON.parse instead.",
  "files": [{"path": "src/a.js", "lineStart": 3}]}]}
```"#;
        let got = parse_suggestions(raw, 5).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].check_key, "security.eval-usage");
        assert_eq!(got[0].severity, Severity::Blocker);
        assert_eq!(got[0].suggested_fix, "Use JSON.parse instead.");
        assert_eq!(got[0].files[0].path, "src/a.js");
        assert_eq!(got[0].files[0].line_start, Some(3));
    }

    #[test]
    fn array_fix_becomes_bullets() {
        let fix = normalize_fix(Some(serde_json::json!(["step one", "step two"])));
        assert_eq!(fix, "- step one\n- step two");
    }

    #[test]
    fn empty_fix_gets_fallback() {
        assert_eq!(normalize_fix(None), NO_FIX_FALLBACK);
        assert_eq!(normalize_fix(Some(serde_json::json!([]))), NO_FIX_FALLBACK);
        assert_eq!(normalize_fix(Some(serde_json::json!(""))), NO_FIX_FALLBACK);
    }

    #[test]
    fn unknown_severity_clamps_to_warn() {
        let raw = r#"{"suggestions": [{"check_key": "x", "severity": "apocalyptic",
            "title": "T", "rationale": "R"}]}"#;
        let got = parse_suggestions(raw, 5).unwrap();
        assert_eq!(got[0].severity, Severity::Warn);
        assert_eq!(got[0].suggested_fix, NO_FIX_FALLBACK);
    }

    #[test]
    fn respects_max_and_skips_empty_items() {
        let raw = r#"{"suggestions": [
            {"check_key": "a", "title": "One", "rationale": "r"},
            {"check_key": "b", "title": "", "rationale": ""},
            {"check_key": "c", "title": "Two", "rationale": "r"},
            {"check_key": "d", "title": "Three", "rationale": "r"}]}"#;
        let got = parse_suggestions(raw, 3).unwrap();
        let keys: Vec<_> = got.iter().map(|s| s.check_key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_suggestions("I could not help with that.", 5),
            Err(AiError::Parse(_))
        ));
    }
}
