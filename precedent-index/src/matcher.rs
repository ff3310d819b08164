//! Precedent matching: Jaccard overlap between a candidate signature and the
//! tenant's stored GOLD signatures.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Minimum Jaccard similarity for a match.
pub const MIN_JACCARD: f64 = 0.15;
/// Alternative gate: this many shared tokens is a match regardless of Jaccard.
pub const MIN_OVERLAP: usize = 5;
/// Result cap.
pub const MAX_MATCHES: usize = 5;

/// A stored GOLD signature as loaded from the knowledge base.
#[derive(Debug, Clone)]
pub struct GoldSignature {
    pub knowledge_source_id: String,
    pub title: String,
    pub source_url: Option<String>,
    pub tokens: Vec<String>,
}

/// One precedent hit, ranked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecedentMatch {
    pub knowledge_source_id: String,
    pub title: String,
    pub source_url: Option<String>,
    pub jaccard: f64,
    pub overlap: usize,
}

/// Matches the candidate tokens against the tenant's GOLD index.
/// An empty index yields an empty result.
pub fn match_precedents(candidate: &[String], index: &[GoldSignature]) -> Vec<PrecedentMatch> {
    let a: HashSet<&str> = candidate.iter().map(String::as_str).collect();
    if a.is_empty() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for gold in index {
        let b: HashSet<&str> = gold.tokens.iter().map(String::as_str).collect();
        if b.is_empty() {
            continue;
        }
        let overlap = a.intersection(&b).count();
        let union = a.union(&b).count();
        let jaccard = overlap as f64 / union as f64;

        if jaccard >= MIN_JACCARD || overlap >= MIN_OVERLAP {
            matches.push(PrecedentMatch {
                knowledge_source_id: gold.knowledge_source_id.clone(),
                title: gold.title.clone(),
                source_url: gold.source_url.clone(),
                jaccard,
                overlap,
            });
        }
    }

    matches.sort_by(|x, y| {
        y.jaccard
            .partial_cmp(&x.jaccard)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| y.overlap.cmp(&x.overlap))
    });
    matches.truncate(MAX_MATCHES);
    matches
}
