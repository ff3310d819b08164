//! Snippet windows: the slice of added lines around a failing check's hint
//! that may be shown to the LLM, post-redaction, under a byte budget.

use check_engine::diff::added_lines;
use serde::{Deserialize, Serialize};

/// Half-window in added lines on each side of the hint.
pub const WINDOW_RADIUS: usize = 40;

/// A redacted code excerpt bound for the prompt builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    pub check_key: String,
    pub path: String,
    pub content: String,
    pub line_start: u32,
    pub line_end: u32,
}

/// Selects up to `2*WINDOW_RADIUS + 1` added lines centered on `line_hint`
/// (the whole set when smaller). Returns `None` for diffs with no additions.
pub fn window_around(diff: &str, line_hint: Option<u32>) -> Option<(String, u32, u32)> {
    let lines = added_lines(diff);
    if lines.is_empty() {
        return None;
    }

    let center = match line_hint {
        Some(hint) => lines
            .iter()
            .position(|l| l.line >= hint)
            .unwrap_or(lines.len() - 1),
        None => lines.len() / 2,
    };

    let span = 2 * WINDOW_RADIUS + 1;
    let start = center.saturating_sub(WINDOW_RADIUS);
    let end = (start + span).min(lines.len());
    let start = end.saturating_sub(span).min(start);

    let selected = &lines[start..end];
    let content: String = selected
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    Some((content, selected[0].line, selected[selected.len() - 1].line))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff_with(n: usize) -> String {
        let mut d = format!("@@ -0,0 +1,{n} @@\n");
        for i in 1..=n {
            d.push_str(&format!("+line number {i}\n"));
        }
        d
    }

    #[test]
    fn small_file_returns_everything() {
        let diff = diff_with(10);
        let (content, start, end) = window_around(&diff, Some(5)).unwrap();
        assert_eq!(start, 1);
        assert_eq!(end, 10);
        assert_eq!(content.lines().count(), 10);
    }

    #[test]
    fn window_is_centered_and_bounded() {
        let diff = diff_with(300);
        let (content, start, end) = window_around(&diff, Some(150)).unwrap();
        assert_eq!(content.lines().count(), 2 * WINDOW_RADIUS + 1);
        assert_eq!(start, 150 - WINDOW_RADIUS as u32);
        assert_eq!(end, 150 + WINDOW_RADIUS as u32);
    }

    #[test]
    fn hint_past_the_end_clamps() {
        let diff = diff_with(100);
        let (content, _, end) = window_around(&diff, Some(4000)).unwrap();
        assert_eq!(end, 100);
        assert_eq!(content.lines().count(), 2 * WINDOW_RADIUS + 1);
    }

    #[test]
    fn no_added_lines_is_none() {
        assert!(window_around("@@ -1,2 +1,0 @@\n-gone\n-also gone\n", Some(1)).is_none());
    }
}
