use futures::StreamExt;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::models::{NewAppointment, SessionType};
use crate::routes::app;
use crate::services::{appointment, auth as auth_svc, session};
use crate::state::AppState;
use crate::state::test_helpers::{seed_client, seed_psychiatrist, test_app_state};

async fn serve(state: AppState) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn next_json<S>(ws: &mut S) -> serde_json::Value
where
    S: futures::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("ws receive timed out")
            .expect("ws closed")
            .expect("ws error");
        if let WsMessage::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn psychiatrist_receives_session_inserts() {
    let state = test_app_state();
    let client = seed_client(&state).await;
    let doc = seed_psychiatrist(&state).await;
    let appt = appointment::create(
        &state,
        &NewAppointment {
            client_id: client.id,
            psychiatrist_id: doc.id,
            scheduled_for: time::OffsetDateTime::now_utc(),
            duration_minutes: None,
            session_type: SessionType::Video,
            status: None,
            notes: None,
        },
    )
    .await
    .unwrap();
    let addr = serve(state.clone()).await;

    let ticket = auth_svc::issue_ws_ticket(&state, doc.id).await.unwrap();
    let (mut ws, _) = connect_async(format!("ws://{addr}/api/realtime?ticket={ticket}&topic=sessions"))
        .await
        .unwrap();
    let hello = next_json(&mut ws).await;
    assert_eq!(hello["event"], "realtime:connected");
    assert_eq!(hello["topic"], "sessions");

    let started = session::start(&state, appt.appointment.id, doc.id).await.unwrap();
    let event = next_json(&mut ws).await;
    assert_eq!(event["event"], "session:insert");
    assert_eq!(event["session"]["id"], started.id.to_string());
}

#[tokio::test]
async fn client_user_topic_gets_auth_changes_and_sessions_is_refused() {
    let state = test_app_state();
    let client = seed_client(&state).await;
    let addr = serve(state.clone()).await;

    let refused = auth_svc::issue_ws_ticket(&state, client.id).await.unwrap();
    let err = connect_async(format!("ws://{addr}/api/realtime?ticket={refused}&topic=sessions")).await;
    assert!(err.is_err());

    let ticket = auth_svc::issue_ws_ticket(&state, client.id).await.unwrap();
    let (mut ws, _) = connect_async(format!("ws://{addr}/api/realtime?ticket={ticket}&topic=user"))
        .await
        .unwrap();
    assert_eq!(next_json(&mut ws).await["topic"], "user");

    auth_svc::authenticate(&state, &client.email, crate::state::test_helpers::TEST_PASSWORD)
        .await
        .unwrap();
    let event = next_json(&mut ws).await;
    assert_eq!(event["event"], "auth:changed");
    assert_eq!(event["transition"], "signed_in");
    assert_eq!(event["profile"]["role"], "client");
}

#[tokio::test]
async fn tickets_are_required_and_single_use() {
    let state = test_app_state();
    let client = seed_client(&state).await;
    let addr = serve(state.clone()).await;

    assert!(connect_async(format!("ws://{addr}/api/realtime")).await.is_err());

    let ticket = auth_svc::issue_ws_ticket(&state, client.id).await.unwrap();
    let url = format!("ws://{addr}/api/realtime?ticket={ticket}");
    let (_first, _) = connect_async(url.clone()).await.unwrap();
    assert!(connect_async(url).await.is_err());
}

#[tokio::test]
async fn shutdown_closes_open_sockets() {
    let state = test_app_state();
    let client = seed_client(&state).await;
    let addr = serve(state.clone()).await;

    let ticket = auth_svc::issue_ws_ticket(&state, client.id).await.unwrap();
    let (mut ws, _) = connect_async(format!("ws://{addr}/api/realtime?ticket={ticket}")).await.unwrap();
    next_json(&mut ws).await;

    state.shutdown();
    let closing = timeout(Duration::from_secs(2), ws.next()).await.expect("socket should close");
    assert!(matches!(closing, None | Some(Ok(WsMessage::Close(_)) | Err(_))));
}
