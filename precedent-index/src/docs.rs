//! DOC ingestion: a local filesystem walk collecting README/markdown files,
//! filtered against the privacy deny-list. Never part of the review hot
//! path; invoked from the control API on demand.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::gold::content_hash;
use crate::signature::{FeatureSignature, SignatureInput, extract_signature};

/// A document ready for knowledge-base upsert.
#[derive(Debug, Clone)]
pub struct DocSource {
    /// Path relative to the walk root, used as the provider id.
    pub rel_path: String,
    pub title: String,
    pub content_text: String,
    pub content_hash: String,
    pub signature: FeatureSignature,
}

/// Walks `root` for documentation: `README*` and `*.md` at the top level plus
/// everything markdown under `docs/`, recursively. Deny-listed paths are
/// skipped.
pub fn walk_docs(root: &Path) -> io::Result<Vec<DocSource>> {
    let mut found: Vec<PathBuf> = Vec::new();

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && is_doc_file(&path) {
            found.push(path);
        }
    }

    let docs_dir = root.join("docs");
    if docs_dir.is_dir() {
        collect_markdown(&docs_dir, &mut found)?;
    }

    found.sort();

    let mut out = Vec::new();
    for path in found {
        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        if privacy_filter::is_denied(&rel) {
            debug!(path = %rel, "doc skipped by deny-list");
            continue;
        }
        let Ok(content) = fs::read_to_string(&path) else {
            debug!(path = %rel, "doc skipped: not valid utf-8");
            continue;
        };
        out.push(build_doc(&rel, content));
    }
    Ok(out)
}

fn collect_markdown(dir: &Path, found: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_markdown(&path, found)?;
        } else if is_doc_file(&path) {
            found.push(path);
        }
    }
    Ok(())
}

fn is_doc_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    name.starts_with("readme") || name.ends_with(".md")
}

fn build_doc(rel_path: &str, content: String) -> DocSource {
    // First markdown heading, else the file name.
    let title = content
        .lines()
        .find_map(|l| l.strip_prefix("# ").map(str::trim))
        .filter(|t| !t.is_empty())
        .unwrap_or(rel_path)
        .to_string();

    let signature = extract_signature(&SignatureInput {
        title: &title,
        description: &content,
        changes: &[],
    });

    let hash = content_hash(&content);

    DocSource {
        rel_path: rel_path.to_string(),
        title,
        content_text: content,
        content_hash: hash,
        signature,
    }
}
