//! Public application error type for the HTTP surface.
//!
//! Every handler returns `AppResult<T>`; the `IntoResponse` impl renders the
//! standard `{error, message}` body with the mapped status.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::core::config::ConfigError;

#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / config ---
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    // --- IO / network / server ---
    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request / routing ---
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    // --- Downstream layers ---
    #[error(transparent)]
    Store(#[from] review_store::StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] job_queue::QueueError),

    #[error("host error: {0}")]
    Host(#[from] git_host::HostError),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingEnv(_) => StatusCode::INTERNAL_SERVER_ERROR, // startup-only
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,     // startup-only
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,

            AppError::Store(review_store::StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Store(review_store::StoreError::InvalidTransition(_)) => {
                StatusCode::CONFLICT
            }
            AppError::Store(_) | AppError::Queue(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // The host rejected us mid-request; from the caller's side that
            // is an upstream failure, not their 4xx.
            AppError::Host(e) => match e.status_code() {
                Some(404) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            },

            AppError::Bind(_) | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::MissingEnv(_) => "MISSING_ENV",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Bind(_) => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::NotFound => "NOT_FOUND",
            AppError::Store(review_store::StoreError::NotFound { .. }) => "NOT_FOUND",
            AppError::Store(review_store::StoreError::InvalidTransition(_)) => "CONFLICT",
            AppError::Store(_) => "STORE_ERROR",
            AppError::Queue(_) => "QUEUE_ERROR",
            AppError::Host(_) => "HOST_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.error_code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<axum::extract::rejection::QueryRejection> for AppError {
    fn from(err: axum::extract::rejection::QueryRejection) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
