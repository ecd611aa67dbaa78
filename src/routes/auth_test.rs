use axum::http::Method;
use serde_json::json;

use super::*;
use crate::routes::app;
use crate::routes::test_http::{get, post, request, send};
use crate::state::test_helpers::{TEST_PASSWORD, seed_client, session_cookie, test_app_state};

fn registration(email: &str, confirm: &str) -> serde_json::Value {
    json!({
        "email": email,
        "password": TEST_PASSWORD,
        "confirm_password": confirm,
        "first_name": "John",
        "last_name": "Doe",
        "role": "client",
    })
}

#[tokio::test]
async fn register_sets_cookie_and_me_reports_client_role() {
    let app = app(test_app_state());
    let reply = post(&app, "/api/auth/register", None, registration("John@Example.com", TEST_PASSWORD)).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json()["profile"]["role"], "client");
    let cookie = reply.cookie(SESSION_COOKIE).expect("session cookie");

    let me = get(&app, "/api/auth/me", Some(&cookie)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["profile"]["email"], "john@example.com");
    assert_eq!(me.json()["profile"]["role"], "client");
}

#[tokio::test]
async fn register_rejects_mismatch_and_duplicates() {
    let state = test_app_state();
    let app = app(state.clone());

    let bad = post(&app, "/api/auth/register", None, registration("a@example.com", "different")).await;
    assert_eq!(bad.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(bad.cookie(SESSION_COOKIE).is_none());
    assert!(state.repos.accounts.credential_by_email("a@example.com").await.unwrap().is_none());

    let ok = post(&app, "/api/auth/register", None, registration("a@example.com", TEST_PASSWORD)).await;
    assert_eq!(ok.status, StatusCode::CREATED);
    let dup = post(&app, "/api/auth/register", None, registration("A@example.com", TEST_PASSWORD)).await;
    assert_eq!(dup.status, StatusCode::CONFLICT);
    assert_eq!(dup.json()["code"], "E_EMAIL_TAKEN");
}

#[tokio::test]
async fn login_checks_password() {
    let state = test_app_state();
    let client = seed_client(&state).await;
    let app = app(state);

    let wrong = post(&app, "/api/auth/login", None, json!({ "email": client.email, "password": "nope" })).await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let ok = post(&app, "/api/auth/login", None, json!({ "email": client.email, "password": TEST_PASSWORD })).await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.json()["user_id"], client.id.to_string());
    assert!(ok.cookie(SESSION_COOKIE).is_some());
}

#[tokio::test]
async fn logout_ends_the_session() {
    let state = test_app_state();
    let client = seed_client(&state).await;
    let cookie = session_cookie(&state, client.id).await;
    let app = app(state);

    let out = send(&app, request(Method::POST, "/api/auth/logout", Some(&cookie), None)).await;
    assert_eq!(out.status, StatusCode::NO_CONTENT);
    assert_eq!(out.cookie(SESSION_COOKIE).as_deref(), Some("session_token="));

    assert_eq!(get(&app, "/api/auth/me", Some(&cookie)).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn anonymous_me_is_unauthorized() {
    let app = app(test_app_state());
    let reply = get(&app, "/api/auth/me", None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["code"], "E_UNAUTHORIZED");

    let bogus = get(&app, "/api/auth/me", Some("session_token=deadbeef")).await;
    assert_eq!(bogus.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ws_ticket_is_single_use() {
    let state = test_app_state();
    let client = seed_client(&state).await;
    let cookie = session_cookie(&state, client.id).await;
    let app = app(state.clone());

    let reply = send(&app, request(Method::POST, "/api/auth/ws-ticket", Some(&cookie), None)).await;
    assert_eq!(reply.status, StatusCode::OK);
    let ticket = reply.json()["ticket"].as_str().unwrap().to_owned();
    assert_eq!(ticket.len(), 32);

    assert_eq!(auth_svc::consume_ws_ticket(&state, &ticket).await.unwrap(), Some(client.id));
    assert_eq!(auth_svc::consume_ws_ticket(&state, &ticket).await.unwrap(), None);
}
