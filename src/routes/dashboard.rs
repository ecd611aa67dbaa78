//! `GET /api/dashboard`: the caller's role-specific dashboard.

use axum::Json;
use axum::extract::State;

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::services::dashboard::{self, Dashboard};
use crate::state::AppState;

pub async fn get_dashboard(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Dashboard>, ApiError> {
    let role = auth.require_profile()?.role;
    Ok(Json(dashboard::load(&state, auth.user_id, role).await?))
}
