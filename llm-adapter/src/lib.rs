//! LLM adapter: schema-constrained fix suggestions for failing checks.
//!
//! Privacy-bounded by construction: callers hand over redacted snippets from
//! the privacy filter, never raw diffs. Errors are classified so the worker
//! can log a stable reason and keep the run alive: AI failure never fails
//! a review.

pub mod client;
pub mod error;
pub mod normalize;
pub mod prompt;
pub mod types;

pub use client::{AiConfig, DEFAULT_TIMEOUT, LlmClient, MAX_ATTEMPTS, OpenAiService};
pub use error::{AiError, AiResult};
pub use normalize::{NO_FIX_FALLBACK, normalize_fix, parse_suggestions};
pub use prompt::{Prompt, build_prompt};
pub use types::{
    FailedCheck, MrContext, PrecedentRef, PromptSnippet, Suggestion, SuggestionFile,
    SuggestionRequest,
};
