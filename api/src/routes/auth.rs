//! Control-API authentication.
//!
//! The login/session surface lives outside this service; control endpoints
//! are tenant-scoped via `X-Tenant-Slug` (default tenant when absent) and a
//! bearer token matching the tenant's webhook secret for the wired provider.

use axum::http::HeaderMap;
use review_store::Tenant;

use crate::core::app_state::{AppState, PROVIDER};
use crate::error_handler::{AppError, AppResult};

pub async fn authorize(state: &AppState, headers: &HeaderMap) -> AppResult<Tenant> {
    let slug = headers
        .get("X-Tenant-Slug")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or(&state.config.default_tenant_slug)
        .to_string();

    let tenant = state
        .store
        .find_tenant_by_slug(&slug)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let expected = state
        .store
        .tenant_webhook_secret(&tenant.id, PROVIDER)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if bearer != expected {
        return Err(AppError::Unauthorized);
    }
    Ok(tenant)
}
