//! Classified errors for the LLM adapter.
//!
//! The worker never fails a review run over an AI error; it logs the
//! classification and moves on. `reason_label` is the stable string that
//! lands in those logs and in run progress messages.

use thiserror::Error;

pub type AiResult<T> = std::result::Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    /// Wall-clock deadline exceeded.
    #[error("llm call timed out")]
    Timeout,

    /// Transport failure without an HTTP status (DNS/connect/reset).
    #[error("llm network error: {0}")]
    Network(String),

    /// 401/403 from the provider. Never retried.
    #[error("llm auth rejected: status {0}")]
    Auth(u16),

    /// 429 from the provider.
    #[error("llm rate limited")]
    RateLimited,

    /// Other non-2xx status.
    #[error("llm http status {0}")]
    HttpStatus(u16),

    /// The response body did not contain the expected suggestions schema.
    #[error("llm response parse failed: {0}")]
    Parse(String),

    /// Response arrived without any choices/content.
    #[error("llm returned no content")]
    Empty,

    /// Constructor-time validation.
    #[error("llm config invalid: {0}")]
    InvalidConfig(&'static str),
}

impl AiError {
    /// True for errors worth another attempt (429, 5xx, network, timeout).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) | Self::RateLimited => true,
            Self::HttpStatus(code) => (500..600).contains(code),
            Self::Auth(_) | Self::Parse(_) | Self::Empty | Self::InvalidConfig(_) => false,
        }
    }

    /// Stable classification label for logs and persisted progress messages.
    pub fn reason_label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Network(_) => "network",
            Self::Auth(_) => "auth",
            Self::RateLimited => "rate_limit",
            Self::Parse(_) | Self::Empty => "parse",
            Self::HttpStatus(code) if (500..600).contains(code) => "server",
            Self::HttpStatus(_) | Self::InvalidConfig(_) => "unknown",
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return AiError::Timeout;
        }
        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                401 | 403 => AiError::Auth(code),
                429 => AiError::RateLimited,
                _ => AiError::HttpStatus(code),
            };
        }
        AiError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(AiError::Timeout.is_transient());
        assert!(AiError::RateLimited.is_transient());
        assert!(AiError::Network("reset".into()).is_transient());
        assert!(AiError::HttpStatus(503).is_transient());
        assert!(!AiError::HttpStatus(400).is_transient());
        assert!(!AiError::Auth(401).is_transient());
        assert!(!AiError::Parse("bad json".into()).is_transient());
    }

    #[test]
    fn reason_labels_are_stable() {
        assert_eq!(AiError::Timeout.reason_label(), "timeout");
        assert_eq!(AiError::Auth(403).reason_label(), "auth");
        assert_eq!(AiError::RateLimited.reason_label(), "rate_limit");
        assert_eq!(AiError::HttpStatus(502).reason_label(), "server");
        assert_eq!(AiError::Empty.reason_label(), "parse");
    }
}
