//! Profile and psychiatrist directory routes.

use axum::Json;
use axum::extract::{Path, State};
use uuid::Uuid;

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{ClientDetails, ProfilePatch, PsychiatristDetails, PsychiatristListing};
use crate::services::profile::{self, ClientDetailsInput, ProfileView, PsychiatristDetailsInput};
use crate::state::AppState;

/// `GET /api/profiles/{id}`
pub async fn get_profile(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileView>, ApiError> {
    Ok(Json(profile::get(&state, id).await?))
}

/// `PATCH /api/profiles/me`
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<ProfileView>, ApiError> {
    Ok(Json(profile::update(&state, auth.user_id, &patch).await?))
}

/// `PUT /api/profiles/me/psychiatrist`
pub async fn put_psychiatrist_details(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<PsychiatristDetailsInput>,
) -> Result<Json<PsychiatristDetails>, ApiError> {
    Ok(Json(profile::update_psychiatrist_details(&state, auth.user_id, input).await?))
}

/// `PUT /api/profiles/me/client`
pub async fn put_client_details(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<ClientDetailsInput>,
) -> Result<Json<ClientDetails>, ApiError> {
    Ok(Json(profile::update_client_details(&state, auth.user_id, input).await?))
}

/// `GET /api/psychiatrists`
pub async fn list_psychiatrists(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<PsychiatristListing>>, ApiError> {
    Ok(Json(profile::list_psychiatrists(&state).await?))
}
