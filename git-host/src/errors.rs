//! Classified transport errors for the host adapter.
//!
//! The worker's retry policy hangs off this classification: permanent
//! statuses (401/403/404) kill a run without queue retries, transient ones
//! (429/5xx/timeout/network) go back to the queue for backoff.

use thiserror::Error;

pub type HostResult<T> = std::result::Result<T, HostError>;

#[derive(Debug, Error)]
pub enum HostError {
    /// Unauthorized (HTTP 401).
    #[error("host unauthorized (401)")]
    Unauthorized,

    /// Forbidden (HTTP 403).
    #[error("host forbidden (403)")]
    Forbidden,

    /// Not found (HTTP 404).
    #[error("host not found (404)")]
    NotFound,

    /// Rate limited (HTTP 429); retry delay from `Retry-After` when present.
    #[error("host rate limited (429)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Server error (HTTP 5xx).
    #[error("host server error: status {0}")]
    Server(u16),

    /// Any other unexpected status.
    #[error("host http status {0}")]
    HttpStatus(u16),

    /// Transport-level timeout.
    #[error("host request timeout")]
    Timeout,

    /// DNS/connect/reset without a status.
    #[error("host network error: {0}")]
    Network(String),

    /// Payload did not deserialize into the expected shape.
    #[error("host invalid response: {0}")]
    InvalidResponse(String),
}

impl HostError {
    /// HTTP status carried by this error, when there is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Forbidden => Some(403),
            Self::NotFound => Some(404),
            Self::RateLimited { .. } => Some(429),
            Self::Server(code) | Self::HttpStatus(code) => Some(*code),
            Self::Timeout | Self::Network(_) | Self::InvalidResponse(_) => None,
        }
    }

    /// Permanent errors must not be retried by the queue.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Forbidden | Self::NotFound)
    }

    /// Worth another attempt inside the adapter's own retry loop.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server(_) | Self::Timeout | Self::Network(_)
        )
    }

    pub fn from_status(code: u16, retry_after_secs: Option<u64>) -> Self {
        match code {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::RateLimited { retry_after_secs },
            500..=599 => Self::Server(code),
            _ => Self::HttpStatus(code),
        }
    }
}

impl From<reqwest::Error> for HostError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return HostError::Timeout;
        }
        if let Some(status) = e.status() {
            return HostError::from_status(status.as_u16(), None);
        }
        if e.is_decode() {
            return HostError::InvalidResponse(e.to_string());
        }
        HostError::Network(e.to_string())
    }
}
