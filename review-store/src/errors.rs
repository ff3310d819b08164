//! Store-level errors.

use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Lookup by id/identity that found nothing.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Transition refused (e.g. retry on a non-FAILED run).
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }
}
