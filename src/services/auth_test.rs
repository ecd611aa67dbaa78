use super::*;
use crate::state::test_helpers::{TEST_PASSWORD, seed_client, test_app_state};

fn registration(email: &str, role: Role) -> Registration {
    Registration {
        email: email.into(),
        password: "secret1".into(),
        confirm_password: "secret1".into(),
        first_name: "Jo".into(),
        last_name: "March".into(),
        phone: Some("  ".into()),
        role,
    }
}

// =============================================================================
// hex helpers
// =============================================================================

#[test]
fn bytes_to_hex_leading_zero() {
    assert_eq!(bytes_to_hex(&[0x0a, 0xff]), "0aff");
}

#[test]
fn hex_to_bytes_inverts_bytes_to_hex() {
    assert_eq!(hex_to_bytes("deadbeef"), Some(vec![0xde, 0xad, 0xbe, 0xef]));
    assert_eq!(hex_to_bytes(""), Some(vec![]));
    assert_eq!(hex_to_bytes("abc"), None);
    assert_eq!(hex_to_bytes("zz"), None);
}

#[test]
fn generate_token_is_64_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(token, generate_token());
}

#[test]
fn generate_ws_ticket_is_32_hex_chars() {
    assert_eq!(generate_ws_ticket().len(), 32);
}

#[test]
fn normalize_email_trims_and_lowercases() {
    assert_eq!(normalize_email("  Jo@Example.COM "), Some("jo@example.com".into()));
    assert_eq!(normalize_email("no-at-sign"), None);
    assert_eq!(normalize_email("@example.com"), None);
    assert_eq!(normalize_email("a@b@c"), None);
}

// =============================================================================
// registration
// =============================================================================

#[test]
fn validate_registration_rules() {
    let ok = registration("jo@example.com", Role::Client);
    assert_eq!(validate_registration(&ok).unwrap(), "jo@example.com");

    let short = Registration { password: "abc".into(), confirm_password: "abc".into(), ..ok.clone() };
    assert!(matches!(validate_registration(&short), Err(AuthError::Validation(_))));

    let mismatch = Registration { confirm_password: "secret2".into(), ..ok.clone() };
    assert!(matches!(validate_registration(&mismatch), Err(AuthError::Validation("passwords do not match"))));

    let nameless = Registration { first_name: "   ".into(), ..ok };
    assert!(matches!(validate_registration(&nameless), Err(AuthError::Validation(_))));
}

#[tokio::test]
async fn register_creates_profile_with_single_role() {
    let state = test_app_state();
    let signed_in = register(&state, &registration("Doc@Example.com", Role::Psychiatrist))
        .await
        .unwrap();

    let profile = signed_in.profile.unwrap();
    assert_eq!(profile.role, Role::Psychiatrist);
    assert_eq!(profile.user.email, "doc@example.com");
    assert!(profile.user.phone.is_none());
    assert_eq!(
        state.repos.profiles.roles_for(signed_in.user_id).await.unwrap(),
        vec![Role::Psychiatrist]
    );
    assert!(state.repos.profiles.psychiatrist_details(signed_in.user_id).await.unwrap().is_some());
    assert_eq!(session_user(&state, &signed_in.token).await.unwrap(), Some(signed_in.user_id));
}

#[tokio::test]
async fn rejected_registration_writes_nothing() {
    let state = test_app_state();
    let mut reg = registration("jo@example.com", Role::Client);
    reg.confirm_password = "different".into();
    assert!(register(&state, &reg).await.is_err());
    assert!(state.repos.accounts.credential_by_email("jo@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let state = test_app_state();
    register(&state, &registration("jo@example.com", Role::Client)).await.unwrap();
    let err = register(&state, &registration("JO@example.com", Role::Client))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::EmailTaken));
    assert_eq!(err.status(), StatusCode::CONFLICT);
}

// =============================================================================
// login / logout
// =============================================================================

#[tokio::test]
async fn authenticate_checks_password() {
    let state = test_app_state();
    let user = seed_client(&state).await;

    assert!(matches!(
        authenticate(&state, &user.email, "wrong-password").await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(matches!(
        authenticate(&state, "nobody@example.com", TEST_PASSWORD).await,
        Err(AuthError::InvalidCredentials)
    ));

    let signed_in = authenticate(&state, &user.email.to_uppercase(), TEST_PASSWORD)
        .await
        .unwrap();
    assert_eq!(signed_in.user_id, user.id);
    assert_eq!(signed_in.profile.unwrap().role, Role::Client);
}

#[tokio::test]
async fn auth_transitions_are_published_on_user_topic() {
    let state = test_app_state();
    let user = seed_client(&state).await;
    let mut sub = state.feed.subscribe(Topic::User(user.id));

    let signed_in = authenticate(&state, &user.email, TEST_PASSWORD).await.unwrap();
    match sub.recv().await {
        Some(RealtimeEvent::AuthChanged { transition: AuthTransition::SignedIn, profile: Some(p) }) => {
            assert_eq!(p.user.id, user.id);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    deauthenticate(&state, &signed_in.token).await.unwrap();
    assert_eq!(
        sub.recv().await,
        Some(RealtimeEvent::AuthChanged { transition: AuthTransition::SignedOut, profile: None })
    );
    assert_eq!(session_user(&state, &signed_in.token).await.unwrap(), None);
}

#[tokio::test]
async fn deauthenticate_unknown_token_is_noop() {
    let state = test_app_state();
    assert!(deauthenticate(&state, "not-a-token").await.is_ok());
}

// =============================================================================
// profile resolution / tickets
// =============================================================================

#[tokio::test]
async fn resolve_profile_fails_open_for_unknown_user() {
    let state = test_app_state();
    assert!(resolve_profile(&state, Uuid::new_v4()).await.is_none());
}

#[tokio::test]
async fn ws_ticket_is_single_use() {
    let state = test_app_state();
    let user = seed_client(&state).await;
    let ticket = issue_ws_ticket(&state, user.id).await.unwrap();
    assert_eq!(consume_ws_ticket(&state, &ticket).await.unwrap(), Some(user.id));
    assert_eq!(consume_ws_ticket(&state, &ticket).await.unwrap(), None);
}
