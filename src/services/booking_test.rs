use std::sync::Arc;

use super::*;
use crate::models::{AppointmentStatus, PsychiatristDetails, User};
use crate::services::profile::PsychiatristDetailsInput;
use crate::state::test_helpers::{seed_client, seed_psychiatrist, test_app_state};
use crate::store::{AppointmentStore, StoreError};
use time::macros::{date, time};

struct OfflineAppointments;

fn offline<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("appointments offline".into()))
}

#[async_trait::async_trait]
impl AppointmentStore for OfflineAppointments {
    async fn insert_appointment(&self, _new: &NewAppointment) -> Result<Appointment, StoreError> {
        offline()
    }

    async fn appointment(&self, _id: Uuid) -> Result<Option<Appointment>, StoreError> {
        offline()
    }

    async fn appointments_for_client(&self, _client_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        offline()
    }

    async fn appointments_for_psychiatrist(&self, _psychiatrist_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        offline()
    }

    async fn set_status(&self, _id: Uuid, _status: AppointmentStatus) -> Result<Option<Appointment>, StoreError> {
        offline()
    }

    async fn set_scheduled_for(&self, _id: Uuid, _when: OffsetDateTime) -> Result<Option<Appointment>, StoreError> {
        offline()
    }

    async fn set_checkout_session(&self, _id: Uuid, _session_id: &str) -> Result<Option<Appointment>, StoreError> {
        offline()
    }

    async fn confirm_payment(&self, _session_id: &str) -> Result<Option<Appointment>, StoreError> {
        offline()
    }
}

fn listing(first: &str, rate: i64) -> PsychiatristListing {
    let id = Uuid::new_v4();
    PsychiatristListing {
        user: User {
            id,
            email: format!("{first}@example.com"),
            first_name: first.into(),
            last_name: "Doctor".into(),
            phone: None,
            avatar_url: None,
            bio: None,
            created_at: OffsetDateTime::now_utc(),
        },
        details: PsychiatristDetails { hourly_rate_cents: rate, ..PsychiatristDetails::empty(id) },
    }
}

fn slot(date: Date) -> ScheduleInput {
    ScheduleInput { date, time: time!(09:00), session_type: SessionType::Video, notes: Some("first visit".into()) }
}

// =============================================================================
// transitions
// =============================================================================

#[test]
fn happy_path_reaches_submitting_with_a_full_insert() {
    let doc = listing("Ada", 12_000);
    let client = Uuid::new_v4();
    let mut draft = BookingDraft::new(client, vec![doc.clone()]);

    draft.select_professional(doc.user.id).unwrap();
    assert_eq!(draft.step, BookingStep::Scheduling);
    draft.schedule(slot(date!(2030-05-01)), date!(2030-04-30)).unwrap();
    assert_eq!(draft.step, BookingStep::Reviewing);

    let new = draft.begin_submit().unwrap();
    assert_eq!(draft.step, BookingStep::Submitting);
    assert_eq!(new.client_id, client);
    assert_eq!(new.psychiatrist_id, doc.user.id);
    assert_eq!(new.scheduled_for.date(), date!(2030-05-01));
    assert_eq!(new.scheduled_for.time(), time!(09:00));
    assert!(new.status.is_none());
}

#[test]
fn unknown_candidate_is_rejected() {
    let mut draft = BookingDraft::new(Uuid::new_v4(), vec![listing("Ada", 1)]);
    assert!(matches!(
        draft.select_professional(Uuid::new_v4()),
        Err(BookingError::UnknownProfessional(_))
    ));
    assert_eq!(draft.step, BookingStep::SelectingProfessional);
}

#[test]
fn past_dates_are_rejected_but_today_is_fine() {
    let doc = listing("Ada", 1);
    let mut draft = BookingDraft::new(Uuid::new_v4(), vec![doc.clone()]);
    draft.select_professional(doc.user.id).unwrap();

    let today = date!(2030-01-10);
    assert!(matches!(draft.schedule(slot(date!(2030-01-09)), today), Err(BookingError::DateInPast(_))));
    assert_eq!(draft.step, BookingStep::Scheduling);
    draft.schedule(slot(today), today).unwrap();
}

#[test]
fn back_keeps_entered_data() {
    let doc = listing("Ada", 1);
    let mut draft = BookingDraft::new(Uuid::new_v4(), vec![doc.clone()]);
    draft.select_professional(doc.user.id).unwrap();
    draft.schedule(slot(date!(2030-05-01)), date!(2030-01-01)).unwrap();

    draft.back().unwrap();
    assert_eq!(draft.step, BookingStep::Scheduling);
    draft.back().unwrap();
    assert_eq!(draft.step, BookingStep::SelectingProfessional);
    assert_eq!(draft.psychiatrist_id, Some(doc.user.id));
    assert_eq!(draft.date, Some(date!(2030-05-01)));
    assert_eq!(draft.notes.as_deref(), Some("first visit"));

    assert!(matches!(draft.back(), Err(BookingError::InvalidStep { .. })));
}

#[test]
fn confirm_only_from_reviewing() {
    let doc = listing("Ada", 1);
    let mut draft = BookingDraft::new(Uuid::new_v4(), vec![doc.clone()]);
    assert!(matches!(
        draft.begin_submit(),
        Err(BookingError::InvalidStep { step: BookingStep::SelectingProfessional, .. })
    ));
    draft.select_professional(doc.user.id).unwrap();
    assert!(draft.begin_submit().is_err());
}

#[test]
fn failure_returns_to_reviewing() {
    let doc = listing("Ada", 1);
    let mut draft = BookingDraft::new(Uuid::new_v4(), vec![doc.clone()]);
    draft.select_professional(doc.user.id).unwrap();
    draft.schedule(slot(date!(2030-05-01)), date!(2030-01-01)).unwrap();
    draft.begin_submit().unwrap();

    draft.fail("boom".into());
    assert_eq!(draft.step, BookingStep::Reviewing);
    assert_eq!(draft.last_error.as_deref(), Some("boom"));
    draft.begin_submit().unwrap();
    assert!(draft.last_error.is_none());
}

// =============================================================================
// operations
// =============================================================================

#[tokio::test]
async fn confirm_creates_appointment_and_confirmation() {
    let state = test_app_state();
    let client = seed_client(&state).await;
    let doc = seed_psychiatrist(&state).await;
    let rate = PsychiatristDetailsInput {
        specialization: "Anxiety".into(),
        experience_years: 8,
        hourly_rate_cents: 15_000,
        availability: serde_json::Value::Null,
    };
    profile::update_psychiatrist_details(&state, doc.id, rate).await.unwrap();

    let draft = start(&state, client.id).await.unwrap();
    assert_eq!(draft.candidates.len(), 1);
    select_professional(&state, client.id, doc.id).await.unwrap();
    let tomorrow = OffsetDateTime::now_utc().date().next_day().unwrap();
    schedule(&state, client.id, slot(tomorrow)).await.unwrap();

    let confirmation = confirm(&state, client.id).await.unwrap();
    assert!(confirmation.reference.starts_with("session_"));
    assert_eq!(confirmation.psychiatrist_name, "Pat Doctor");
    assert_eq!(confirmation.amount_cents, 15_000);
    assert_eq!(confirmation.date, tomorrow);
    assert_eq!(confirmation.time, time!(09:00));

    let stored = appointment::get(&state, confirmation.appointment_id).await.unwrap();
    assert_eq!(stored.psychiatrist_id, doc.id);
    assert_eq!(stored.status, AppointmentStatus::Scheduled);
    assert_eq!(current(&state, client.id).await.unwrap().step, BookingStep::Success);

    assert!(matches!(confirm(&state, client.id).await, Err(BookingError::InvalidStep { .. })));
}

#[tokio::test]
async fn failed_insert_surfaces_error_and_keeps_draft_reviewable() {
    let mut state = test_app_state();
    let client = seed_client(&state).await;
    let doc = seed_psychiatrist(&state).await;
    state.repos.appointments = Arc::new(OfflineAppointments);

    start(&state, client.id).await.unwrap();
    select_professional(&state, client.id, doc.id).await.unwrap();
    schedule(&state, client.id, slot(OffsetDateTime::now_utc().date())).await.unwrap();

    let err = confirm(&state, client.id).await.unwrap_err();
    assert!(matches!(err, BookingError::Submit(_)));
    assert!(err.retryable());

    let draft = current(&state, client.id).await.unwrap();
    assert_eq!(draft.step, BookingStep::Reviewing);
    assert!(draft.last_error.is_some());
}

#[tokio::test]
async fn operations_without_a_draft() {
    let state = test_app_state();
    let id = Uuid::new_v4();
    assert!(matches!(current(&state, id).await, Err(BookingError::NoDraft)));
    assert!(matches!(back(&state, id).await, Err(BookingError::NoDraft)));
    assert_eq!(confirm(&state, id).await.unwrap_err().status(), StatusCode::NOT_FOUND);
}
