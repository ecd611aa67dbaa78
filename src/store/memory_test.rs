use super::*;
use crate::error::ErrorCode;
use axum::http::StatusCode;
use time::Duration;

fn user(first: &str, last: &str) -> User {
    User {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", first.to_lowercase()),
        first_name: first.into(),
        last_name: last.into(),
        phone: None,
        avatar_url: None,
        bio: None,
        created_at: now(),
    }
}

fn account(user: &User, role: Role) -> NewAccount {
    NewAccount {
        credential: Credential {
            user_id: user.id,
            email: user.email.clone(),
            password_hash: "pbkdf2-sha256$1$00$00".into(),
        },
        user: user.clone(),
        role,
    }
}

async fn seeded(store: &MemoryStore, role: Role) -> Uuid {
    let mut u = user("Seed", "User");
    u.email = format!("{}@example.com", u.id.simple());
    store.create_account(&account(&u, role)).await.unwrap();
    u.id
}

async fn parties(store: &MemoryStore) -> (Uuid, Uuid) {
    (seeded(store, Role::Client).await, seeded(store, Role::Psychiatrist).await)
}

fn new_appointment(client_id: Uuid, psychiatrist_id: Uuid, offset_days: i64) -> NewAppointment {
    NewAppointment {
        client_id,
        psychiatrist_id,
        scheduled_for: now() + Duration::days(offset_days),
        duration_minutes: None,
        session_type: crate::models::SessionType::Video,
        status: None,
        notes: None,
    }
}

// =============================================================================
// Accounts
// =============================================================================

#[tokio::test]
async fn create_account_rejects_duplicate_email() {
    let store = MemoryStore::new();
    let u = user("Ann", "Lee");
    store.create_account(&account(&u, Role::Client)).await.unwrap();

    let mut dup = user("Ann", "Other");
    dup.email = u.email.clone();
    let err = store
        .create_account(&account(&dup, Role::Client))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn create_account_writes_role_and_detail_row() {
    let store = MemoryStore::new();
    let doc = user("Sam", "Stone");
    let client = user("Kim", "Park");
    store.create_account(&account(&doc, Role::Psychiatrist)).await.unwrap();
    store.create_account(&account(&client, Role::Client)).await.unwrap();

    assert_eq!(store.roles_for(doc.id).await.unwrap(), vec![Role::Psychiatrist]);
    assert!(store.psychiatrist_details(doc.id).await.unwrap().is_some());
    assert!(store.client_details(doc.id).await.unwrap().is_none());
    assert_eq!(store.client_details(client.id).await.unwrap().unwrap().profile_id, client.id);
}

#[tokio::test]
async fn auth_session_respects_expiry() {
    let store = MemoryStore::new();
    let id = Uuid::new_v4();
    let t0 = now();
    store
        .insert_auth_session("tok", id, t0 + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(store.auth_session_user("tok", t0).await.unwrap(), Some(id));
    assert_eq!(store.auth_session_user("tok", t0 + Duration::hours(2)).await.unwrap(), None);

    store.delete_auth_session("tok").await.unwrap();
    assert_eq!(store.auth_session_user("tok", t0).await.unwrap(), None);
}

#[tokio::test]
async fn ws_ticket_is_single_use() {
    let store = MemoryStore::new();
    let id = Uuid::new_v4();
    let t0 = now();
    store
        .insert_ws_ticket("t", id, t0 + Duration::seconds(60))
        .await
        .unwrap();
    assert_eq!(store.consume_ws_ticket("t", t0).await.unwrap(), Some(id));
    assert_eq!(store.consume_ws_ticket("t", t0).await.unwrap(), None);
}

#[tokio::test]
async fn expired_ws_ticket_is_rejected_and_removed() {
    let store = MemoryStore::new();
    let t0 = now();
    store
        .insert_ws_ticket("t", Uuid::new_v4(), t0 - Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(store.consume_ws_ticket("t", t0).await.unwrap(), None);
}

// =============================================================================
// Profiles
// =============================================================================

#[tokio::test]
async fn list_psychiatrists_orders_by_last_then_first_name() {
    let store = MemoryStore::new();
    for (first, last) in [("Zoe", "Brown"), ("Amy", "Brown"), ("Bob", "Adams")] {
        store
            .create_account(&account(&user(first, last), Role::Psychiatrist))
            .await
            .unwrap();
    }
    store
        .create_account(&account(&user("Cal", "Client"), Role::Client))
        .await
        .unwrap();

    let names: Vec<String> = store
        .list_psychiatrists()
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.user.display_name())
        .collect();
    assert_eq!(names, vec!["Bob Adams", "Amy Brown", "Zoe Brown"]);
}

#[tokio::test]
async fn update_user_applies_only_present_fields() {
    let store = MemoryStore::new();
    let u = user("Ann", "Lee");
    store.create_account(&account(&u, Role::Client)).await.unwrap();

    let patch = ProfilePatch { bio: Some("hello".into()), ..ProfilePatch::default() };
    let updated = store.update_user(u.id, &patch).await.unwrap().unwrap();
    assert_eq!(updated.bio.as_deref(), Some("hello"));
    assert_eq!(updated.first_name, "Ann");

    assert!(store.update_user(Uuid::new_v4(), &patch).await.unwrap().is_none());
}

// =============================================================================
// Appointments
// =============================================================================

#[tokio::test]
async fn appointments_sorted_ascending_with_defaults() {
    let store = MemoryStore::new();
    let (c, p) = parties(&store).await;
    let later = store.insert_appointment(&new_appointment(c, p, 5)).await.unwrap();
    let sooner = store.insert_appointment(&new_appointment(c, p, 1)).await.unwrap();

    assert_eq!(later.duration_minutes, DEFAULT_APPOINTMENT_MINUTES);
    assert_eq!(later.status, AppointmentStatus::Scheduled);
    assert_eq!(later.payment_status, PaymentStatus::Unpaid);

    let ids: Vec<Uuid> = store
        .appointments_for_client(c)
        .await
        .unwrap()
        .iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(ids, vec![sooner.id, later.id]);
    assert_eq!(store.appointments_for_psychiatrist(p).await.unwrap().len(), 2);
    assert!(store.appointments_for_client(p).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_parties_are_missing_references() {
    let store = MemoryStore::new();
    let (c, p) = parties(&store).await;

    let err = store
        .insert_appointment(&new_appointment(c, Uuid::new_v4(), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingReference(_)));
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let orphan = NewAssessment {
        title: "PHQ".into(),
        description: String::new(),
        questions: vec![],
        client_id: Uuid::new_v4(),
        psychiatrist_id: p,
        status: crate::models::AssessmentStatus::Active,
    };
    assert!(matches!(store.insert_assessment(&orphan).await, Err(StoreError::MissingReference(_))));
    assert!(store.appointments_for_client(c).await.unwrap().is_empty());
}

#[tokio::test]
async fn confirm_payment_marks_paid_and_confirmed() {
    let store = MemoryStore::new();
    let (c, p) = parties(&store).await;
    let appt = store.insert_appointment(&new_appointment(c, p, 1)).await.unwrap();
    store.set_checkout_session(appt.id, "cs_mock_1").await.unwrap();

    assert!(store.confirm_payment("cs_other").await.unwrap().is_none());
    let paid = store.confirm_payment("cs_mock_1").await.unwrap().unwrap();
    assert_eq!(paid.status, AppointmentStatus::Confirmed);
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
}

// =============================================================================
// Assessments
// =============================================================================

#[tokio::test]
async fn delete_assessment_reports_whether_a_row_matched() {
    let store = MemoryStore::new();
    let (client_id, psychiatrist_id) = parties(&store).await;
    let a = store
        .insert_assessment(&NewAssessment {
            title: "PHQ".into(),
            description: String::new(),
            questions: vec![],
            client_id,
            psychiatrist_id,
            status: crate::models::AssessmentStatus::Active,
        })
        .await
        .unwrap();
    store.insert_response(a.id, a.client_id, &[]).await.unwrap();

    assert!(store.delete_assessment(a.id).await.unwrap());
    assert!(!store.delete_assessment(a.id).await.unwrap());
    assert!(store.responses_for(a.id).await.unwrap().is_empty());
}

// =============================================================================
// Sessions / notifications
// =============================================================================

#[tokio::test]
async fn only_one_live_session_per_appointment() {
    let store = MemoryStore::new();
    let (c, p) = parties(&store).await;
    let appt = store.insert_appointment(&new_appointment(c, p, 0)).await.unwrap();
    let live = store
        .insert_live_session(appt.id, "room-a", now())
        .await
        .unwrap();
    let err = store
        .insert_live_session(appt.id, "room-b", now())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    assert_eq!(store.live_sessions_for_psychiatrist(appt.psychiatrist_id).await.unwrap().len(), 1);
    store.end_session(live.id, now()).await.unwrap();
    assert!(store.live_session_for_appointment(appt.id).await.unwrap().is_none());
    assert!(store.insert_live_session(appt.id, "room-c", now()).await.is_ok());
}

#[tokio::test]
async fn mark_read_is_scoped_to_owner() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let n = store
        .insert_notification(&NewNotification {
            user_id: owner,
            title: "t".into(),
            message: "m".into(),
            kind: "session_start".into(),
            metadata: serde_json::json!({}),
        })
        .await
        .unwrap();

    assert!(store.mark_read(n.id, Uuid::new_v4()).await.unwrap().is_none());
    assert!(store.mark_read(n.id, owner).await.unwrap().unwrap().read);
}

#[tokio::test]
async fn settings_round_trip() {
    let store = MemoryStore::new();
    assert!(store.setting("active_home_image").await.unwrap().is_none());
    store.set_setting("active_home_image", "a.png").await.unwrap();
    store.set_setting("active_home_image", "b.png").await.unwrap();
    assert_eq!(store.setting("active_home_image").await.unwrap().as_deref(), Some("b.png"));
}
