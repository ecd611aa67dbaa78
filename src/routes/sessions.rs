//! Live session and progress routes.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use super::auth::AuthUser;
use super::{ensure_client_reader, ensure_self};
use crate::error::ApiError;
use crate::models::Session;
use crate::services::progress::{self, ProgressView};
use crate::services::session;
use crate::state::AppState;

/// `POST /api/appointments/{id}/session`
pub async fn start(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(appointment_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let row = session::start(&state, appointment_id, auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `POST /api/sessions/{id}/end`
pub async fn end(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(session::end(&state, session_id, auth.user_id).await?))
}

/// `GET /api/psychiatrists/{id}/sessions/active`
pub async fn active(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(psychiatrist_id): Path<Uuid>,
) -> Result<Json<Vec<Session>>, ApiError> {
    ensure_self(&auth, psychiatrist_id)?;
    Ok(Json(session::active_for_psychiatrist(&state, psychiatrist_id).await?))
}

/// `GET /api/clients/{id}/progress`: `null` when no snapshot exists.
pub async fn client_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Option<ProgressView>>, ApiError> {
    ensure_client_reader(&auth, client_id)?;
    Ok(Json(progress::view_for_client(&state, client_id).await?))
}
