use super::*;
use serde_json::json;
use time::macros::{date, datetime, time};
use time::Time;

fn dummy_user() -> User {
    User {
        id: Uuid::new_v4(),
        email: "john@example.com".into(),
        first_name: "John".into(),
        last_name: "Doe".into(),
        phone: None,
        avatar_url: None,
        bio: None,
        created_at: datetime!(2024-05-01 10:00 UTC),
    }
}

// =============================================================================
// Enum string forms
// =============================================================================

#[test]
fn role_parse_and_as_str_agree() {
    for role in [Role::Client, Role::Psychiatrist] {
        assert_eq!(Role::parse(role.as_str()), Some(role));
    }
    assert_eq!(Role::parse("admin"), None);
}

#[test]
fn appointment_status_rejects_unknown() {
    assert_eq!(AppointmentStatus::parse("cancelled"), Some(AppointmentStatus::Cancelled));
    assert_eq!(AppointmentStatus::parse("Cancelled"), None);
    assert_eq!(AppointmentStatus::parse(""), None);
}

#[test]
fn session_type_defaults_to_video() {
    assert_eq!(SessionType::default(), SessionType::Video);
    assert_eq!(SessionType::parse("chat"), Some(SessionType::Chat));
}

#[test]
fn trend_parse_lenient_falls_back_to_stable() {
    assert_eq!(Trend::parse_lenient("improving"), Trend::Improving);
    assert_eq!(Trend::parse_lenient("declining"), Trend::Declining);
    assert_eq!(Trend::parse_lenient("sideways"), Trend::Stable);
}

// =============================================================================
// Serde shapes
// =============================================================================

#[test]
fn profile_serializes_flat_with_role() {
    let profile = Profile { user: dummy_user(), role: Role::Client };
    let value = serde_json::to_value(&profile).unwrap();
    assert_eq!(value["email"], "john@example.com");
    assert_eq!(value["role"], "client");
    assert_eq!(value["created_at"], "2024-05-01T10:00:00Z");
}

#[test]
fn question_uses_type_key() {
    let q: Question = serde_json::from_value(json!({
        "id": "q1",
        "question": "How are you sleeping?",
        "type": "multiple_choice",
        "options": ["well", "poorly"]
    }))
    .unwrap();
    assert_eq!(q.kind, QuestionType::MultipleChoice);
    assert_eq!(q.options.len(), 2);
}

#[test]
fn question_options_default_to_empty() {
    let q: Question = serde_json::from_value(json!({"id": "q", "question": "Rate", "type": "scale"})).unwrap();
    assert!(q.options.is_empty());
}

#[test]
fn answer_value_accepts_text_and_number() {
    let answers: Vec<Answer> = serde_json::from_value(json!([
        {"question_id": "a", "answer": 7},
        {"question_id": "b", "answer": "some text"}
    ]))
    .unwrap();
    assert_eq!(answers[0].answer, AnswerValue::Number(7.0));
    assert_eq!(answers[1].answer, AnswerValue::Text("some text".into()));
}

#[test]
fn new_appointment_defaults() {
    let new: NewAppointment = serde_json::from_value(json!({
        "client_id": Uuid::new_v4(),
        "psychiatrist_id": Uuid::new_v4(),
        "scheduled_for": "2030-01-02T09:00:00Z"
    }))
    .unwrap();
    assert_eq!(new.session_type, SessionType::Video);
    assert!(new.status.is_none());
    assert!(new.duration_minutes.is_none());
    assert_eq!(new.scheduled_for, datetime!(2030-01-02 9:00 UTC));
}

#[test]
fn client_details_date_of_birth_is_iso() {
    let details = ClientDetails {
        profile_id: Uuid::nil(),
        date_of_birth: Some(date!(1990 - 07 - 15)),
        ..ClientDetails::default()
    };
    let value = serde_json::to_value(&details).unwrap();
    assert_eq!(value["date_of_birth"], "1990-07-15");

    let back: ClientDetails = serde_json::from_value(json!({
        "profile_id": Uuid::nil(),
        "gender": null,
        "emergency_contact": null,
        "insurance_provider": null,
        "insurance_member_id": null
    }))
    .unwrap();
    assert!(back.date_of_birth.is_none());
}

#[test]
fn hour_minute_format_round_trips() {
    #[derive(Serialize, Deserialize)]
    struct Slot {
        #[serde(with = "hour_minute")]
        at: Time,
    }
    let slot: Slot = serde_json::from_value(json!({"at": "09:00"})).unwrap();
    assert_eq!(slot.at, time!(9:00));
    assert_eq!(serde_json::to_value(&slot).unwrap()["at"], "09:00");
}

#[test]
fn party_summary_from_user() {
    let user = dummy_user();
    let party = PartySummary::from(&user);
    assert_eq!(party.id, user.id);
    assert_eq!(party.first_name, "John");
    assert_eq!(user.display_name(), "John Doe");
}
