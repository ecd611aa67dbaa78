//! Assessment routes. Psychiatrists author and edit their own forms;
//! the assigned client submits responses.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::AuthUser;
use super::{ensure_client_reader, ensure_self};
use crate::error::ApiError;
use crate::models::{Answer, Assessment, AssessmentPatch, AssessmentResponse, Role};
use crate::services::assessment::{self, CreateAssessment, HistoryEntry};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResponseBody {
    pub answers: Vec<Answer>,
}

async fn authored(state: &AppState, auth: &AuthUser, id: Uuid) -> Result<Assessment, ApiError> {
    let row = assessment::get(state, id).await?;
    if row.psychiatrist_id == auth.user_id {
        Ok(row)
    } else {
        Err(ApiError::forbidden("only the authoring psychiatrist may change this assessment"))
    }
}

/// `POST /api/assessments`
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateAssessment>,
) -> Result<(StatusCode, Json<Assessment>), ApiError> {
    auth.require_role(Role::Psychiatrist)?;
    let row = assessment::create(&state, auth.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/clients/{id}/assessments`
pub async fn list_for_client(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Vec<Assessment>>, ApiError> {
    ensure_client_reader(&auth, client_id)?;
    Ok(Json(assessment::list_for_client(&state, client_id).await?))
}

/// `GET /api/psychiatrists/{id}/assessments`
pub async fn list_for_psychiatrist(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(psychiatrist_id): Path<Uuid>,
) -> Result<Json<Vec<Assessment>>, ApiError> {
    ensure_self(&auth, psychiatrist_id)?;
    Ok(Json(assessment::list_for_psychiatrist(&state, psychiatrist_id).await?))
}

/// `GET /api/clients/{id}/assessment-history`
pub async fn history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    ensure_client_reader(&auth, client_id)?;
    Ok(Json(assessment::history(&state, client_id).await?))
}

/// `PATCH /api/assessments/{id}`
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<AssessmentPatch>,
) -> Result<Json<Assessment>, ApiError> {
    authored(&state, &auth, id).await?;
    Ok(Json(assessment::update(&state, id, &patch).await?))
}

/// `DELETE /api/assessments/{id}`
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    authored(&state, &auth, id).await?;
    assessment::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/assessments/{id}/responses`
pub async fn submit_response(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ResponseBody>,
) -> Result<(StatusCode, Json<AssessmentResponse>), ApiError> {
    let row = assessment::submit_response(&state, id, auth.user_id, &body.answers).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/assessments/{id}/responses`: the assigned client or the author.
pub async fn list_responses(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AssessmentResponse>>, ApiError> {
    let row = assessment::get(&state, id).await?;
    if auth.user_id != row.client_id && auth.user_id != row.psychiatrist_id {
        return Err(ApiError::forbidden("not a party to this assessment"));
    }
    Ok(Json(assessment::list_responses(&state, id).await?))
}
