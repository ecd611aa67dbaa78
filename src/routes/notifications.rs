//! Notification routes, always scoped to the caller.

use axum::Json;
use axum::extract::{Path, State};
use uuid::Uuid;

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::models::Notification;
use crate::services::notification;
use crate::state::AppState;

/// `GET /api/notifications`
pub async fn list(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(notification::list_for_user(&state, auth.user_id).await?))
}

/// `POST /api/notifications/{id}/read`
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    Ok(Json(notification::mark_read(&state, id, auth.user_id).await?))
}
