//! Booking wizard drafts.
//!
//! DESIGN
//! ======
//! One draft per user lives in `AppState::booking_drafts`. The draft is a
//! small state machine:
//!
//! ```text
//! SelectingProfessional -> Scheduling -> Reviewing -> Submitting -> Success
//!                                            ^             |
//!                                            +--- failed --+
//! ```
//!
//! Transitions are plain methods on `BookingDraft` so they can be tested
//! without a runtime. `confirm` holds the table lock only to move the
//! draft into `Submitting` and again to record the outcome; the appointment
//! insert runs unlocked. A failed insert puts the draft back in
//! `Reviewing` with `last_error` set. There is no automatic retry.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use tracing::{info, warn};
use uuid::Uuid;

use super::appointment::{self, AppointmentError};
use super::profile::{self, ProfileError};
use crate::error::ErrorCode;
use crate::models::{Appointment, NewAppointment, PsychiatristListing, SessionType, hour_minute, iso_date};
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStep {
    SelectingProfessional,
    Scheduling,
    Reviewing,
    Submitting,
    Success,
}

impl BookingStep {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelectingProfessional => "selecting_professional",
            Self::Scheduling => "scheduling",
            Self::Reviewing => "reviewing",
            Self::Submitting => "submitting",
            Self::Success => "success",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("no booking in progress")]
    NoDraft,
    #[error("cannot {action} while {}", .step.as_str())]
    InvalidStep { action: &'static str, step: BookingStep },
    #[error("psychiatrist {0} is not in this booking's list")]
    UnknownProfessional(Uuid),
    #[error("date {0} is in the past")]
    DateInPast(Date),
    #[error("{0}")]
    Incomplete(&'static str),
    #[error(transparent)]
    Directory(#[from] ProfileError),
    #[error("booking failed: {0}")]
    Submit(#[from] AppointmentError),
}

impl ErrorCode for BookingError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoDraft => "E_NO_DRAFT",
            Self::InvalidStep { .. } => "E_INVALID_STEP",
            Self::UnknownProfessional(_) | Self::DateInPast(_) | Self::Incomplete(_) => "E_VALIDATION",
            Self::Directory(e) => e.error_code(),
            Self::Submit(_) => "E_BOOKING_FAILED",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NoDraft => StatusCode::NOT_FOUND,
            Self::InvalidStep { .. } => StatusCode::CONFLICT,
            Self::UnknownProfessional(_) | Self::DateInPast(_) | Self::Incomplete(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Directory(e) => e.status(),
            Self::Submit(e) => e.status(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Directory(e) => e.retryable(),
            Self::Submit(e) => e.retryable(),
            _ => false,
        }
    }
}

/// Step 2 of the wizard.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleInput {
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(with = "hour_minute")]
    pub time: Time,
    pub session_type: SessionType,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Display fields handed to the payment-success page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub reference: String,
    pub appointment_id: Uuid,
    pub psychiatrist_name: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(with = "hour_minute")]
    pub time: Time,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingDraft {
    pub client_id: Uuid,
    pub step: BookingStep,
    /// Directory snapshot taken when the draft was started.
    pub candidates: Vec<PsychiatristListing>,
    pub psychiatrist_id: Option<Uuid>,
    #[serde(with = "iso_date::option")]
    pub date: Option<Date>,
    #[serde(with = "hour_minute::option")]
    pub time: Option<Time>,
    pub session_type: Option<SessionType>,
    pub notes: Option<String>,
    pub last_error: Option<String>,
    pub confirmation: Option<BookingConfirmation>,
}

// =============================================================================
// TRANSITIONS
// =============================================================================

impl BookingDraft {
    #[must_use]
    pub fn new(client_id: Uuid, candidates: Vec<PsychiatristListing>) -> Self {
        Self {
            client_id,
            step: BookingStep::SelectingProfessional,
            candidates,
            psychiatrist_id: None,
            date: None,
            time: None,
            session_type: None,
            notes: None,
            last_error: None,
            confirmation: None,
        }
    }

    fn expect_step(&self, action: &'static str, allowed: BookingStep) -> Result<(), BookingError> {
        if self.step == allowed { Ok(()) } else { Err(BookingError::InvalidStep { action, step: self.step }) }
    }

    #[must_use]
    pub fn chosen(&self) -> Option<&PsychiatristListing> {
        let id = self.psychiatrist_id?;
        self.candidates.iter().find(|c| c.user.id == id)
    }

    /// Step 1.
    ///
    /// # Errors
    ///
    /// `UnknownProfessional` for an id outside the candidate list.
    pub fn select_professional(&mut self, psychiatrist_id: Uuid) -> Result<(), BookingError> {
        self.expect_step("select a professional", BookingStep::SelectingProfessional)?;
        if !self.candidates.iter().any(|c| c.user.id == psychiatrist_id) {
            return Err(BookingError::UnknownProfessional(psychiatrist_id));
        }
        self.psychiatrist_id = Some(psychiatrist_id);
        self.step = BookingStep::Scheduling;
        Ok(())
    }

    /// Step 2. `today` is the earliest bookable date.
    ///
    /// # Errors
    ///
    /// `DateInPast` for a date before `today`.
    pub fn schedule(&mut self, input: ScheduleInput, today: Date) -> Result<(), BookingError> {
        self.expect_step("schedule", BookingStep::Scheduling)?;
        if input.date < today {
            return Err(BookingError::DateInPast(input.date));
        }
        self.date = Some(input.date);
        self.time = Some(input.time);
        self.session_type = Some(input.session_type);
        self.notes = input.notes.filter(|n| !n.trim().is_empty());
        self.step = BookingStep::Reviewing;
        Ok(())
    }

    /// Return to the previous step, keeping everything entered so far.
    ///
    /// # Errors
    ///
    /// `InvalidStep` outside `Scheduling` and `Reviewing`.
    pub fn back(&mut self) -> Result<(), BookingError> {
        self.step = match self.step {
            BookingStep::Scheduling => BookingStep::SelectingProfessional,
            BookingStep::Reviewing => BookingStep::Scheduling,
            step => return Err(BookingError::InvalidStep { action: "go back", step }),
        };
        Ok(())
    }

    /// Move to `Submitting` and build the insert.
    ///
    /// # Errors
    ///
    /// `InvalidStep` outside `Reviewing`; `Incomplete` if a field is missing.
    pub fn begin_submit(&mut self) -> Result<NewAppointment, BookingError> {
        self.expect_step("confirm", BookingStep::Reviewing)?;
        let psychiatrist = self.chosen().ok_or(BookingError::Incomplete("no psychiatrist selected"))?;
        let (Some(date), Some(time), Some(session_type)) = (self.date, self.time, self.session_type) else {
            return Err(BookingError::Incomplete("date, time and session type are required"));
        };
        let new = NewAppointment {
            client_id: self.client_id,
            psychiatrist_id: psychiatrist.user.id,
            scheduled_for: PrimitiveDateTime::new(date, time).assume_utc(),
            duration_minutes: None,
            session_type,
            status: None,
            notes: self.notes.clone(),
        };
        self.step = BookingStep::Submitting;
        self.last_error = None;
        Ok(new)
    }

    /// Record a created appointment and return the display fields.
    pub fn succeed(&mut self, appointment: &Appointment, at: OffsetDateTime) -> BookingConfirmation {
        let confirmation = confirmation_for(self.chosen(), appointment, at);
        self.step = BookingStep::Success;
        self.confirmation = Some(confirmation.clone());
        confirmation
    }

    /// A failed submission lands back on the review step.
    pub fn fail(&mut self, message: String) {
        self.last_error = Some(message);
        self.step = BookingStep::Reviewing;
    }
}

fn confirmation_for(
    psychiatrist: Option<&PsychiatristListing>,
    appointment: &Appointment,
    at: OffsetDateTime,
) -> BookingConfirmation {
    let (psychiatrist_name, amount_cents) =
        psychiatrist.map_or((String::new(), 0), |c| (c.user.display_name(), c.details.hourly_rate_cents));
    BookingConfirmation {
        reference: format!("session_{}", at.unix_timestamp_nanos() / 1_000_000),
        appointment_id: appointment.id,
        psychiatrist_name,
        date: appointment.scheduled_for.date(),
        time: appointment.scheduled_for.time(),
        amount_cents,
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Start (or restart) the caller's draft with a fresh directory snapshot.
///
/// # Errors
///
/// Directory lookup failures.
pub async fn start(state: &AppState, client_id: Uuid) -> Result<BookingDraft, BookingError> {
    let candidates = profile::list_psychiatrists(state).await?;
    let draft = BookingDraft::new(client_id, candidates);
    state
        .booking_drafts
        .write()
        .await
        .insert(client_id, draft.clone());
    info!(%client_id, candidates = draft.candidates.len(), "booking draft started");
    Ok(draft)
}

/// # Errors
///
/// `NoDraft` when the caller has not started one.
pub async fn current(state: &AppState, client_id: Uuid) -> Result<BookingDraft, BookingError> {
    state
        .booking_drafts
        .read()
        .await
        .get(&client_id)
        .cloned()
        .ok_or(BookingError::NoDraft)
}

async fn apply<F>(state: &AppState, client_id: Uuid, f: F) -> Result<BookingDraft, BookingError>
where
    F: FnOnce(&mut BookingDraft) -> Result<(), BookingError>,
{
    let mut drafts = state.booking_drafts.write().await;
    let draft = drafts.get_mut(&client_id).ok_or(BookingError::NoDraft)?;
    f(draft)?;
    Ok(draft.clone())
}

/// # Errors
///
/// See `BookingDraft::select_professional`.
pub async fn select_professional(
    state: &AppState,
    client_id: Uuid,
    psychiatrist_id: Uuid,
) -> Result<BookingDraft, BookingError> {
    apply(state, client_id, |d| d.select_professional(psychiatrist_id)).await
}

/// # Errors
///
/// See `BookingDraft::schedule`.
pub async fn schedule(state: &AppState, client_id: Uuid, input: ScheduleInput) -> Result<BookingDraft, BookingError> {
    let today = OffsetDateTime::now_utc().date();
    apply(state, client_id, |d| d.schedule(input, today)).await
}

/// # Errors
///
/// See `BookingDraft::back`.
pub async fn back(state: &AppState, client_id: Uuid) -> Result<BookingDraft, BookingError> {
    apply(state, client_id, BookingDraft::back).await
}

/// Create the appointment for a reviewed draft.
///
/// # Errors
///
/// `InvalidStep` unless the draft is in `Reviewing`; `Submit` when the
/// insert fails, after the draft has returned to `Reviewing`.
pub async fn confirm(state: &AppState, client_id: Uuid) -> Result<BookingConfirmation, BookingError> {
    let (new, chosen) = {
        let mut drafts = state.booking_drafts.write().await;
        let draft = drafts.get_mut(&client_id).ok_or(BookingError::NoDraft)?;
        let new = draft.begin_submit()?;
        (new, draft.chosen().cloned())
    };

    let outcome = appointment::create(state, &new).await;

    let mut drafts = state.booking_drafts.write().await;
    let draft = drafts.get_mut(&client_id).filter(|d| d.step == BookingStep::Submitting);
    match (outcome, draft) {
        (Ok(created), Some(draft)) => {
            let confirmation = draft.succeed(&created.appointment, OffsetDateTime::now_utc());
            info!(%client_id, appointment_id = %created.appointment.id, "booking confirmed");
            Ok(confirmation)
        }
        (Ok(created), None) => {
            // Draft was restarted mid-flight; the appointment still exists.
            warn!(%client_id, appointment_id = %created.appointment.id, "booking draft replaced during submit");
            Ok(confirmation_for(chosen.as_ref(), &created.appointment, OffsetDateTime::now_utc()))
        }
        (Err(e), draft) => {
            warn!(%client_id, error = %e, "booking failed");
            if let Some(draft) = draft {
                draft.fail(e.to_string());
            }
            Err(BookingError::Submit(e))
        }
    }
}

#[cfg(test)]
#[path = "booking_test.rs"]
mod tests;
