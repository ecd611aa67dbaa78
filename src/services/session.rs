//! Live therapy sessions.
//!
//! SYSTEM CONTEXT
//! ==============
//! Starting a session writes the `live` row, then (best effort) notifies
//! the client and publishes both events on the change feed: the session
//! insert to the psychiatrist's topic, the notification to the client's.
//! Subscribers only observe; nothing here waits on them.

use axum::http::StatusCode;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::models::{Appointment, NewNotification, Session};
use crate::realtime::{RealtimeEvent, Subscription, Topic};
use crate::state::AppState;
use crate::store::StoreError;

pub const SESSION_START_KIND: &str = "session_start";
pub const SESSION_START_TITLE: &str = "Session Started";
pub const SESSION_START_MESSAGE: &str = "Your therapist has started the session. You can join now.";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("appointment not found: {0}")]
    AppointmentNotFound(Uuid),
    #[error("session not found: {0}")]
    NotFound(Uuid),
    #[error("only the appointment's psychiatrist may do this")]
    NotYourAppointment,
    #[error("appointment already has a live session")]
    AlreadyLive,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => Self::AlreadyLive,
            other => Self::Store(other),
        }
    }
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::AppointmentNotFound(_) => "E_APPOINTMENT_NOT_FOUND",
            Self::NotFound(_) => "E_SESSION_NOT_FOUND",
            Self::NotYourAppointment => "E_FORBIDDEN",
            Self::AlreadyLive => "E_SESSION_ALREADY_LIVE",
            Self::Store(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::AppointmentNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotYourAppointment => StatusCode::FORBIDDEN,
            Self::AlreadyLive => StatusCode::CONFLICT,
            Self::Store(e) => e.status(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.retryable())
    }
}

#[must_use]
pub fn room_id(appointment_id: Uuid, at: OffsetDateTime) -> String {
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    format!("room-{appointment_id}-{millis}")
}

async fn owned_appointment(state: &AppState, appointment_id: Uuid, actor: Uuid) -> Result<Appointment, SessionError> {
    let appointment = state
        .repos
        .appointments
        .appointment(appointment_id)
        .await?
        .ok_or(SessionError::AppointmentNotFound(appointment_id))?;
    if appointment.psychiatrist_id != actor {
        return Err(SessionError::NotYourAppointment);
    }
    Ok(appointment)
}

/// Start a live session for `appointment_id` on behalf of `actor`.
///
/// # Errors
///
/// `NotYourAppointment` unless `actor` is the appointment's psychiatrist;
/// `AlreadyLive` when a live session already exists.
pub async fn start(state: &AppState, appointment_id: Uuid, actor: Uuid) -> Result<Session, SessionError> {
    let appointment = owned_appointment(state, appointment_id, actor).await?;
    if state
        .repos
        .sessions
        .live_session_for_appointment(appointment_id)
        .await?
        .is_some()
    {
        return Err(SessionError::AlreadyLive);
    }

    let now = OffsetDateTime::now_utc();
    let session = state
        .repos
        .sessions
        .insert_live_session(appointment_id, &room_id(appointment_id, now), now)
        .await?;
    info!(session_id = %session.id, %appointment_id, "session started");

    state.feed.publish(
        Topic::PsychiatristSessions(appointment.psychiatrist_id),
        &RealtimeEvent::SessionInsert { session: session.clone() },
    );
    notify_client(state, &appointment).await;
    Ok(session)
}

/// Best effort: failures are logged and swallowed.
async fn notify_client(state: &AppState, appointment: &Appointment) {
    let new = NewNotification {
        user_id: appointment.client_id,
        title: SESSION_START_TITLE.to_owned(),
        message: SESSION_START_MESSAGE.to_owned(),
        kind: SESSION_START_KIND.to_owned(),
        metadata: serde_json::json!({ "appointmentId": appointment.id }),
    };
    match state.repos.notifications.insert_notification(&new).await {
        Ok(notification) => {
            state.feed.publish(
                Topic::User(appointment.client_id),
                &RealtimeEvent::NotificationInsert { notification },
            );
        }
        Err(e) => warn!(appointment_id = %appointment.id, error = %e, "session start notification failed"),
    }
}

/// End a session on behalf of `actor`.
///
/// # Errors
///
/// `NotFound` for an unknown session; `NotYourAppointment` unless `actor`
/// is the psychiatrist.
pub async fn end(state: &AppState, session_id: Uuid, actor: Uuid) -> Result<Session, SessionError> {
    let session = state
        .repos
        .sessions
        .session(session_id)
        .await?
        .ok_or(SessionError::NotFound(session_id))?;
    owned_appointment(state, session.appointment_id, actor).await?;

    let ended = state
        .repos
        .sessions
        .end_session(session_id, OffsetDateTime::now_utc())
        .await?
        .ok_or(SessionError::NotFound(session_id))?;
    info!(%session_id, "session ended");
    Ok(ended)
}

/// Live sessions across the psychiatrist's appointments.
///
/// # Errors
///
/// Store failures.
pub async fn active_for_psychiatrist(state: &AppState, psychiatrist_id: Uuid) -> Result<Vec<Session>, SessionError> {
    Ok(state
        .repos
        .sessions
        .live_sessions_for_psychiatrist(psychiatrist_id)
        .await?)
}

/// Observe session inserts for one psychiatrist. Drop to unsubscribe.
#[must_use]
pub fn subscribe(state: &AppState, psychiatrist_id: Uuid) -> Subscription {
    state
        .feed
        .subscribe(Topic::PsychiatristSessions(psychiatrist_id))
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
