//! Activity tail endpoint.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityEvent, CAPACITY};
use crate::core::app_state::AppState;
use crate::error_handler::AppResult;
use crate::routes::auth::authorize;

#[derive(Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ActivityBody {
    pub events: Vec<ActivityEvent>,
}

/// `GET /activity?limit` (limit capped at the ring size).
pub async fn activity_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<ActivityQuery>,
) -> AppResult<Json<ActivityBody>> {
    authorize(&state, &headers).await?;
    let limit = q.limit.unwrap_or(CAPACITY).min(CAPACITY);
    Ok(Json(ActivityBody {
        events: state.activity.snapshot(limit),
    }))
}
