//! Precedent index: tokenized MR fingerprints and their matching against the
//! GOLD knowledge base.
//!
//! - `signature`: top-30 token extraction with a stable hash;
//! - `matcher`: Jaccard/overlap ranking against stored GOLD signatures;
//! - `gold`: promotion eligibility and the canonical content document;
//! - `docs`: markdown ingestion from a local tree (control-API only).

pub mod docs;
pub mod gold;
pub mod matcher;
pub mod signature;

pub use docs::{DocSource, walk_docs};
pub use gold::{
    FileStatusTag, GoldFile, GoldPolicy, GoldVerdict, build_content_document, content_hash,
    evaluate,
};
pub use matcher::{GoldSignature, MAX_MATCHES, MIN_JACCARD, MIN_OVERLAP, PrecedentMatch,
    match_precedents};
pub use signature::{FeatureSignature, MAX_TOKENS, SignatureInput, extract_signature};
