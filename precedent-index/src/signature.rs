//! Feature signatures: a stable top-30 token fingerprint of an MR.
//!
//! Token sources in order: title, description, path components, added diff
//! lines. Normalization drops short tokens, stopwords and pure numbers.
//! Tokens are ranked by frequency (ties broken lexicographically so the
//! ranking is total), truncated to 30, then sorted alphabetically, so the
//! signature is independent of source ordering quirks.

use std::collections::HashMap;
use std::collections::HashSet;

use check_engine::diff::added_lines;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Signature length cap.
pub const MAX_TOKENS: usize = 30;

lazy_static! {
    static ref STOPWORDS: HashSet<&'static str> = [
        "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was",
        "one", "our", "out", "day", "get", "has", "him", "his", "how", "man", "new", "now",
        "old", "see", "two", "way", "who", "did", "its", "let", "put", "say", "she", "too",
        "use", "that", "with", "have", "this", "will", "your", "from", "they", "know", "want",
        "been", "good", "much", "some", "time", "very", "when", "come", "here", "just", "like",
        "long", "make", "many", "more", "only", "over", "such", "take", "than", "them", "well",
        "were", "what", "into", "also", "does", "each", "then", "there", "these", "their",
        "would", "about", "which", "after", "before", "should", "could",
    ]
    .into_iter()
    .collect();
}

/// The stored fingerprint: sorted tokens plus a content hash over them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSignature {
    pub tokens: Vec<String>,
    pub hash: String,
}

/// Inputs for signature extraction.
#[derive(Debug, Clone, Default)]
pub struct SignatureInput<'a> {
    pub title: &'a str,
    pub description: &'a str,
    /// `(path, unified diff)` pairs.
    pub changes: &'a [(String, String)],
}

/// Extracts the feature signature for an MR.
pub fn extract_signature(input: &SignatureInput) -> FeatureSignature {
    let mut freq: HashMap<String, usize> = HashMap::new();

    let mut feed = |text: &str| {
        for token in normalize(text) {
            *freq.entry(token).or_insert(0) += 1;
        }
    };

    feed(input.title);
    feed(input.description);
    for (path, _) in input.changes {
        for component in split_path(path) {
            feed(&component);
        }
    }
    for (_, diff) in input.changes {
        for line in added_lines(diff) {
            feed(&line.text);
        }
    }

    let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
    // Frequency descending; lexicographic ascending for a total order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(MAX_TOKENS);

    let mut tokens: Vec<String> = ranked.into_iter().map(|(t, _)| t).collect();
    tokens.sort();

    let hash = hash_tokens(&tokens);
    FeatureSignature { tokens, hash }
}

/// sha256 over `tokens.join("|")`, hex encoded.
pub fn hash_tokens(tokens: &[String]) -> String {
    let joined = tokens.join("|");
    let digest = Sha256::digest(joined.as_bytes());
    hex_string(&digest)
}

fn hex_string(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

/// Path components: split on `/`, `-`, `_`, dots and camelCase boundaries.
fn split_path(path: &str) -> Vec<String> {
    path.split(['/', '-', '_', '.'])
        .flat_map(split_camel)
        .filter(|s| !s.is_empty())
        .collect()
}

/// `camelCaseWord` → `["camel", "Case", "Word"]`.
fn split_camel(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in word.chars() {
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase();
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Lowercase, split on non-alphanumerics, drop short/stopword/numeric tokens.
fn normalize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() > 2)
        .filter(|t| !STOPWORDS.contains(t))
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(title: &'a str, changes: &'a [(String, String)]) -> SignatureInput<'a> {
        SignatureInput {
            title,
            description: "",
            changes,
        }
    }

    #[test]
    fn signature_is_stable_across_runs() {
        let changes = vec![(
            "apps/api/src/userService.ts".to_string(),
            "@@ -0,0 +1,2 @@\n+function createUser(payload) {\n+  return repository.insert(payload);\n".to_string(),
        )];
        let a = extract_signature(&input("Add user creation", &changes));
        let b = extract_signature(&input("Add user creation", &changes));
        assert_eq!(a, b);
        assert!(!a.hash.is_empty());
    }

    #[test]
    fn stopword_only_additions_do_not_change_hash() {
        let changes = vec![(
            "apps/api/handler.ts".to_string(),
            "@@ -0,0 +1,1 @@\n+const result = processPayment(order);\n".to_string(),
        )];
        let base = extract_signature(&input("Process payment", &changes));

        let noisy = extract_signature(&SignatureInput {
            title: "Process payment",
            description: "the and for with have this will from",
            changes: &changes,
        });
        assert_eq!(base.hash, noisy.hash);
    }

    #[test]
    fn camel_case_paths_contribute_tokens() {
        let changes = vec![(
            "packages/paymentGateway/refundProcessor.ts".to_string(),
            String::new(),
        )];
        let sig = extract_signature(&input("", &changes));
        assert!(sig.tokens.contains(&"payment".to_string()));
        assert!(sig.tokens.contains(&"gateway".to_string()));
        assert!(sig.tokens.contains(&"refund".to_string()));
        assert!(sig.tokens.contains(&"processor".to_string()));
    }

    #[test]
    fn numeric_and_short_tokens_dropped() {
        let sig = extract_signature(&input("v2 42 ab migration 2024", &[]));
        assert_eq!(sig.tokens, vec!["migration".to_string()]);
    }

    #[test]
    fn tokens_capped_and_sorted() {
        let text: String = (0..50).map(|i| format!("uniquetoken{i:02} ")).collect();
        let changes = vec![];
        let sig = extract_signature(&SignatureInput {
            title: &text,
            description: "",
            changes: &changes,
        });
        assert_eq!(sig.tokens.len(), MAX_TOKENS);
        let mut sorted = sig.tokens.clone();
        sorted.sort();
        assert_eq!(sig.tokens, sorted);
    }
}
