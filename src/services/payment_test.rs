use super::*;
use crate::models::{AppointmentStatus, NewAppointment, PaymentStatus, SessionType};
use crate::state::test_helpers::{seed_client, seed_psychiatrist, test_app_state};
use time::OffsetDateTime;

async fn seed_appointment(state: &AppState, client_id: Uuid) -> Appointment {
    state
        .repos
        .appointments
        .insert_appointment(&NewAppointment {
            client_id,
            psychiatrist_id: seed_psychiatrist(state).await.id,
            scheduled_for: OffsetDateTime::now_utc(),
            duration_minutes: None,
            session_type: SessionType::Chat,
            status: None,
            notes: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn mock_gateway_mints_prefixed_ids_and_success_redirect() {
    let gateway = MockGateway::new("https://mind.example/");
    let id = Uuid::new_v4();
    let a = gateway.create_checkout(id, 100).await.unwrap();
    let b = gateway.create_checkout(id, 100).await.unwrap();

    assert!(a.id.starts_with(MOCK_SESSION_PREFIX));
    assert_eq!(a.id.len(), MOCK_SESSION_PREFIX.len() + 24);
    assert_ne!(a.id, b.id);
    assert_eq!(a.redirect_url, format!("https://mind.example/payment/success?session_id={}", a.id));
}

#[tokio::test]
async fn checkout_then_confirm_marks_paid() {
    let state = test_app_state();
    let client = seed_client(&state).await;
    let appt = seed_appointment(&state, client.id).await;

    let request = CheckoutRequest { appointment_id: appt.id, amount_cents: 15_000 };
    let session = checkout(&state, &request, client.id).await.unwrap();
    let stored = state.repos.appointments.appointment(appt.id).await.unwrap().unwrap();
    assert_eq!(stored.checkout_session_id.as_deref(), Some(session.id.as_str()));
    assert_eq!(stored.payment_status, PaymentStatus::Unpaid);

    let paid = confirm(&state, &session.id).await.unwrap();
    assert_eq!(paid.status, AppointmentStatus::Confirmed);
    assert_eq!(paid.payment_status, PaymentStatus::Paid);

    // Re-confirming just rewrites the same values.
    assert_eq!(confirm(&state, &session.id).await.unwrap().payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn checkout_guards() {
    let state = test_app_state();
    let client = seed_client(&state).await;
    let appt = seed_appointment(&state, client.id).await;

    let zero = CheckoutRequest { appointment_id: appt.id, amount_cents: 0 };
    assert!(matches!(checkout(&state, &zero, client.id).await, Err(PaymentError::InvalidAmount)));

    let ok = CheckoutRequest { appointment_id: appt.id, amount_cents: 100 };
    assert!(matches!(checkout(&state, &ok, Uuid::new_v4()).await, Err(PaymentError::NotYourAppointment)));

    let missing = CheckoutRequest { appointment_id: Uuid::new_v4(), amount_cents: 100 };
    assert!(matches!(
        checkout(&state, &missing, client.id).await,
        Err(PaymentError::AppointmentNotFound(_))
    ));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let state = test_app_state();
    let err = confirm(&state, "cs_mock_nope").await.unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}
