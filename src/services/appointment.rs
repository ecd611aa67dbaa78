//! Appointment scheduling.
//!
//! DESIGN
//! ======
//! Creation requires a client and a psychiatrist as two distinct users.
//! Status writes are unchecked overwrites: any status may replace any
//! other, and rescheduling performs no overlap check. Reads join each row
//! with the counterpart's profile in one batched lookup.

use std::collections::HashMap;

use axum::http::StatusCode;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::models::{Appointment, AppointmentStatus, AppointmentWithParties, NewAppointment, PartySummary, Role};
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("appointment not found: {0}")]
    NotFound(Uuid),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for AppointmentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_APPOINTMENT_NOT_FOUND",
            Self::Validation(_) => "E_VALIDATION",
            Self::Store(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Store(e) => e.status(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.retryable())
    }
}

#[derive(Clone, Copy)]
enum Join {
    Client,
    Psychiatrist,
    Both,
}

async fn with_parties(
    state: &AppState,
    rows: Vec<Appointment>,
    join: Join,
) -> Result<Vec<AppointmentWithParties>, AppointmentError> {
    let mut ids: Vec<Uuid> = rows
        .iter()
        .flat_map(|a| match join {
            Join::Client => vec![a.client_id],
            Join::Psychiatrist => vec![a.psychiatrist_id],
            Join::Both => vec![a.client_id, a.psychiatrist_id],
        })
        .collect();
    ids.sort_unstable();
    ids.dedup();

    let users: HashMap<Uuid, PartySummary> = state
        .repos
        .profiles
        .users_by_ids(&ids)
        .await?
        .iter()
        .map(|u| (u.id, PartySummary::from(u)))
        .collect();

    Ok(rows
        .into_iter()
        .map(|appointment| {
            let client = match join {
                Join::Client | Join::Both => users.get(&appointment.client_id).cloned(),
                Join::Psychiatrist => None,
            };
            let psychiatrist = match join {
                Join::Psychiatrist | Join::Both => users.get(&appointment.psychiatrist_id).cloned(),
                Join::Client => None,
            };
            AppointmentWithParties { appointment, client, psychiatrist }
        })
        .collect())
}

async fn check_parties(state: &AppState, new: &NewAppointment) -> Result<(), AppointmentError> {
    if new.client_id == new.psychiatrist_id {
        return Err(AppointmentError::Validation("client and psychiatrist must be different users".into()));
    }
    let profiles = &state.repos.profiles;
    let (client_roles, psychiatrist_roles) =
        tokio::try_join!(profiles.roles_for(new.client_id), profiles.roles_for(new.psychiatrist_id))?;
    if !client_roles.contains(&Role::Client) {
        return Err(AppointmentError::Validation(format!("{} is not a client", new.client_id)));
    }
    if !psychiatrist_roles.contains(&Role::Psychiatrist) {
        return Err(AppointmentError::Validation(format!("{} is not a psychiatrist", new.psychiatrist_id)));
    }
    Ok(())
}

/// Insert an appointment (status `scheduled` unless given) and return it
/// joined with both parties.
///
/// # Errors
///
/// `Validation` unless `client_id` is a client and `psychiatrist_id` a
/// different user with the psychiatrist role; nothing is written.
pub async fn create(state: &AppState, new: &NewAppointment) -> Result<AppointmentWithParties, AppointmentError> {
    check_parties(state, new).await?;
    let row = state.repos.appointments.insert_appointment(new).await?;
    info!(
        appointment_id = %row.id,
        client_id = %row.client_id,
        psychiatrist_id = %row.psychiatrist_id,
        "appointment created"
    );
    let mut joined = with_parties(state, vec![row], Join::Both).await?;
    joined
        .pop()
        .ok_or_else(|| AppointmentError::Store(StoreError::Unavailable("appointment join returned no row".into())))
}

/// # Errors
///
/// `NotFound` for an unknown id.
pub async fn get(state: &AppState, id: Uuid) -> Result<Appointment, AppointmentError> {
    state
        .repos
        .appointments
        .appointment(id)
        .await?
        .ok_or(AppointmentError::NotFound(id))
}

/// A client's appointments, soonest first, joined with the psychiatrist.
///
/// # Errors
///
/// Store failures.
pub async fn list_for_client(state: &AppState, client_id: Uuid) -> Result<Vec<AppointmentWithParties>, AppointmentError> {
    let rows = state
        .repos
        .appointments
        .appointments_for_client(client_id)
        .await?;
    with_parties(state, rows, Join::Psychiatrist).await
}

/// A psychiatrist's appointments, soonest first, joined with the client.
///
/// # Errors
///
/// Store failures.
pub async fn list_for_psychiatrist(
    state: &AppState,
    psychiatrist_id: Uuid,
) -> Result<Vec<AppointmentWithParties>, AppointmentError> {
    let rows = state
        .repos
        .appointments
        .appointments_for_psychiatrist(psychiatrist_id)
        .await?;
    with_parties(state, rows, Join::Client).await
}

/// Overwrite the status. No transition rules apply.
///
/// # Errors
///
/// `NotFound` for an unknown id.
pub async fn update_status(
    state: &AppState,
    id: Uuid,
    status: AppointmentStatus,
) -> Result<Appointment, AppointmentError> {
    let row = state
        .repos
        .appointments
        .set_status(id, status)
        .await?
        .ok_or(AppointmentError::NotFound(id))?;
    info!(appointment_id = %id, status = status.as_str(), "appointment status set");
    Ok(row)
}

/// Set status `cancelled`. Cancelling twice succeeds.
///
/// # Errors
///
/// `NotFound` for an unknown id.
pub async fn cancel(state: &AppState, id: Uuid) -> Result<Appointment, AppointmentError> {
    update_status(state, id, AppointmentStatus::Cancelled).await
}

/// Move the appointment to `when`. No overlap check.
///
/// # Errors
///
/// `NotFound` for an unknown id.
pub async fn reschedule(state: &AppState, id: Uuid, when: OffsetDateTime) -> Result<Appointment, AppointmentError> {
    let row = state
        .repos
        .appointments
        .set_scheduled_for(id, when)
        .await?
        .ok_or(AppointmentError::NotFound(id))?;
    info!(appointment_id = %id, "appointment rescheduled");
    Ok(row)
}

#[cfg(test)]
#[path = "appointment_test.rs"]
mod tests;
