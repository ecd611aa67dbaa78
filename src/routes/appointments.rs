//! Appointment routes. Writes are limited to the two parties of an
//! appointment; status changes themselves are unchecked overwrites.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::auth::AuthUser;
use super::{ensure_client_reader, ensure_self};
use crate::error::ApiError;
use crate::models::{Appointment, AppointmentStatus, AppointmentWithParties, NewAppointment, Role};
use crate::services::appointment;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: AppointmentStatus,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleBody {
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_for: OffsetDateTime,
}

fn ensure_party(auth: &AuthUser, appointment: &Appointment) -> Result<(), ApiError> {
    if auth.user_id == appointment.client_id || auth.user_id == appointment.psychiatrist_id {
        Ok(())
    } else {
        Err(ApiError::forbidden("not a party to this appointment"))
    }
}

async fn party_appointment(state: &AppState, auth: &AuthUser, id: Uuid) -> Result<Appointment, ApiError> {
    let appointment = appointment::get(state, id).await?;
    ensure_party(auth, &appointment)?;
    Ok(appointment)
}

/// `POST /api/appointments`
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(new): Json<NewAppointment>,
) -> Result<(StatusCode, Json<AppointmentWithParties>), ApiError> {
    if auth.user_id != new.client_id && auth.user_id != new.psychiatrist_id {
        return Err(ApiError::forbidden("not a party to this appointment"));
    }
    let created = appointment::create(&state, &new).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/appointments`: the caller's appointments for their role.
pub async fn list_mine(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<AppointmentWithParties>>, ApiError> {
    let rows = match auth.require_profile()?.role {
        Role::Client => appointment::list_for_client(&state, auth.user_id).await?,
        Role::Psychiatrist => appointment::list_for_psychiatrist(&state, auth.user_id).await?,
    };
    Ok(Json(rows))
}

/// `GET /api/clients/{id}/appointments`
pub async fn list_for_client(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Vec<AppointmentWithParties>>, ApiError> {
    ensure_client_reader(&auth, client_id)?;
    Ok(Json(appointment::list_for_client(&state, client_id).await?))
}

/// `GET /api/psychiatrists/{id}/appointments`
pub async fn list_for_psychiatrist(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(psychiatrist_id): Path<Uuid>,
) -> Result<Json<Vec<AppointmentWithParties>>, ApiError> {
    ensure_self(&auth, psychiatrist_id)?;
    Ok(Json(appointment::list_for_psychiatrist(&state, psychiatrist_id).await?))
}

/// `PATCH /api/appointments/{id}/status`
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Appointment>, ApiError> {
    party_appointment(&state, &auth, id).await?;
    Ok(Json(appointment::update_status(&state, id, body.status).await?))
}

/// `POST /api/appointments/{id}/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    party_appointment(&state, &auth, id).await?;
    Ok(Json(appointment::cancel(&state, id).await?))
}

/// `POST /api/appointments/{id}/reschedule`
pub async fn reschedule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RescheduleBody>,
) -> Result<Json<Appointment>, ApiError> {
    party_appointment(&state, &auth, id).await?;
    Ok(Json(appointment::reschedule(&state, id, body.scheduled_for).await?))
}
