//! Realtime websocket: forwards one change-feed subscription to a client.
//!
//! LIFECYCLE
//! =========
//! 1. `GET /api/realtime?ticket=…&topic=sessions|user` consumes the ticket
//!    and subscribes before upgrading, so nothing published during the
//!    handshake is lost.
//! 2. Send `realtime:connected`.
//! 3. `select!` between inbound frames (ignored, except close) and feed
//!    events (forwarded as JSON text).
//! 4. Socket close or feed shutdown drops the subscription.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::Role;
use crate::realtime::{RealtimeEvent, Subscription, Topic};
use crate::services::{auth as auth_svc, session};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicName {
    Sessions,
    #[default]
    User,
}

impl TopicName {
    fn as_str(self) -> &'static str {
        match self {
            Self::Sessions => "sessions",
            Self::User => "user",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    pub ticket: Option<String>,
    #[serde(default)]
    pub topic: TopicName,
}

pub async fn handle_realtime(
    State(state): State<AppState>,
    Query(query): Query<RealtimeQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let ticket = query.ticket.as_deref().ok_or_else(ApiError::unauthorized)?;
    let user_id = auth_svc::consume_ws_ticket(&state, ticket)
        .await?
        .ok_or_else(ApiError::unauthorized)?;

    let subscription = match query.topic {
        TopicName::Sessions => {
            let role = auth_svc::resolve_profile(&state, user_id).await.map(|p| p.role);
            if role != Some(Role::Psychiatrist) {
                return Err(ApiError::forbidden("the sessions topic is for psychiatrists"));
            }
            session::subscribe(&state, user_id)
        }
        TopicName::User => state.feed.subscribe(Topic::User(user_id)),
    };

    let topic = query.topic;
    Ok(ws
        .on_upgrade(move |socket| run_realtime(socket, subscription, user_id, topic))
        .into_response())
}

async fn send_event(socket: &mut WebSocket, event: &RealtimeEvent) -> Result<(), ()> {
    let json = serde_json::to_string(event).map_err(|e| warn!(error = %e, "realtime: encode failed"))?;
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

async fn run_realtime(mut socket: WebSocket, mut subscription: Subscription, user_id: Uuid, topic: TopicName) {
    let greeting = RealtimeEvent::Connected { topic: topic.as_str().to_owned() };
    if send_event(&mut socket, &greeting).await.is_err() {
        return;
    }
    info!(%user_id, topic = ?subscription.topic(), subscription = %subscription.id(), "realtime: connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    None | Some(Err(_) | Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
            event = subscription.recv() => {
                let Some(event) = event else {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    subscription.unsubscribe();
    info!(%user_id, topic = topic.as_str(), "realtime: disconnected");
}

#[cfg(test)]
#[path = "realtime_test.rs"]
mod tests;
