//! Unified-diff walk for pattern checks.
//!
//! Only `@@` hunk headers are required; file headers may be missing entirely
//! (some providers ship hunks-only diffs). `\ No newline at end of file`
//! markers are skipped. Added lines carry the post-image line number taken
//! from `@@ +start,len @@`; context lines advance the counter, deletions do
//! not.

/// One added line with its post-image line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedLine {
    pub line: u32,
    pub text: String,
}

/// Walks a unified diff and collects added lines in order.
pub fn added_lines(diff: &str) -> Vec<AddedLine> {
    let mut out = Vec::new();
    let mut new_line = 0u32;
    let mut in_hunk = false;

    for line in diff.lines() {
        if line.starts_with("@@") {
            if let Some(start) = parse_new_start(line) {
                new_line = start;
                in_hunk = true;
            } else {
                in_hunk = false;
            }
            continue;
        }

        // "\ No newline at end of file" is not diff content.
        if line.starts_with("\\ ") {
            continue;
        }

        if !in_hunk {
            // Prelude (diff --git, index, ---/+++ headers) until the first @@.
            continue;
        }

        if let Some(rest) = line.strip_prefix('+') {
            out.push(AddedLine {
                line: new_line,
                text: rest.to_string(),
            });
            new_line += 1;
        } else if line.starts_with('-') {
            // Deletions do not advance the post-image counter.
        } else {
            // Context (leading space or provider quirk): advances post-image.
            new_line += 1;
        }
    }

    out
}

/// Extracts the post-image start from `@@ -a,b +c,d @@`.
fn parse_new_start(header: &str) -> Option<u32> {
    let plus = header.find('+')?;
    let rest = &header[plus + 1..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Binary patch heuristics, same shapes git itself emits.
pub fn looks_like_binary_patch(diff: &str) -> bool {
    diff.contains("GIT binary patch")
        || diff.starts_with("Binary files ")
        || (diff.starts_with("Files ") && diff.contains(" differ"))
}
