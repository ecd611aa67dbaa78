use super::*;
use crate::models::{NewAppointment, ProgressMetrics, SessionType, Trend};
use crate::services::assessment::CreateAssessment;
use crate::state::test_helpers::{seed_client, seed_psychiatrist, test_app_state};
use time::OffsetDateTime;

async fn seed_pair(state: &AppState) -> (Uuid, Uuid, Uuid) {
    let client = seed_client(state).await;
    let doc = seed_psychiatrist(state).await;
    let appt = appointment::create(
        state,
        &NewAppointment {
            client_id: client.id,
            psychiatrist_id: doc.id,
            scheduled_for: OffsetDateTime::now_utc(),
            duration_minutes: None,
            session_type: SessionType::Video,
            status: None,
            notes: None,
        },
    )
    .await
    .unwrap();
    (client.id, doc.id, appt.appointment.id)
}

#[tokio::test]
async fn client_dashboard_joins_all_three_reads() {
    let state = test_app_state();
    let (client_id, doc_id, _) = seed_pair(&state).await;
    let form = CreateAssessment {
        title: "PHQ-9".into(),
        description: String::new(),
        questions: vec![crate::models::Question {
            id: "q1".into(),
            question: "Mood?".into(),
            kind: crate::models::QuestionType::Scale,
            options: Vec::new(),
        }],
        client_id,
        status: Default::default(),
    };
    assessment::create(&state, doc_id, form).await.unwrap();
    state
        .repos
        .progress
        .upsert_progress(&ProgressMetrics {
            client_id,
            current_score: 7.0,
            previous_score: 5.0,
            trend: Trend::Improving,
            insights: Vec::new(),
            assessment_count: 1,
            session_count: 0,
            updated_at: OffsetDateTime::now_utc(),
        })
        .await
        .unwrap();

    let Dashboard::Client { appointments, assessments, progress } =
        load(&state, client_id, Role::Client).await.unwrap()
    else {
        panic!("expected client dashboard");
    };
    assert_eq!(appointments.len(), 1);
    assert_eq!(assessments.len(), 1);
    assert!(progress.unwrap().analysis.improving);
}

#[tokio::test]
async fn psychiatrist_dashboard_lists_active_sessions() {
    let state = test_app_state();
    let (_, doc_id, appt_id) = seed_pair(&state).await;
    session::start(&state, appt_id, doc_id).await.unwrap();

    let dash = load(&state, doc_id, Role::Psychiatrist).await.unwrap();
    let json = serde_json::to_value(&dash).unwrap();
    assert_eq!(json["role"], "psychiatrist");
    assert_eq!(json["appointments"].as_array().unwrap().len(), 1);
    assert_eq!(json["active_sessions"].as_array().unwrap().len(), 1);
    assert!(json["assessments"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn empty_client_has_no_progress() {
    let state = test_app_state();
    let client = seed_client(&state).await;
    match load(&state, client.id, Role::Client).await.unwrap() {
        Dashboard::Client { appointments, progress, .. } => {
            assert!(appointments.is_empty());
            assert!(progress.is_none());
        }
        Dashboard::Psychiatrist { .. } => panic!("wrong dashboard"),
    }
}
