//! Booking wizard routes and the transient `last_booking` cookie.
//!
//! A confirmed booking writes its display fields to `last_booking` (JSON,
//! hex-encoded to stay within cookie value characters). The payment
//! success page reads them once through `GET /api/booking/last`, which
//! also clears the cookie. A missing or unreadable cookie reads as `null`.

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;
use tracing::warn;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::models::Role;
use crate::services::auth::{bytes_to_hex, hex_to_bytes};
use crate::services::booking::{self, BookingConfirmation, BookingDraft, ScheduleInput};
use crate::state::AppState;

pub const LAST_BOOKING_COOKIE: &str = "last_booking";
const LAST_BOOKING_TTL: Duration = Duration::hours(1);

#[derive(Debug, Deserialize)]
pub struct ProfessionalBody {
    pub psychiatrist_id: Uuid,
}

pub(crate) fn encode_confirmation(confirmation: &BookingConfirmation) -> Option<String> {
    serde_json::to_vec(confirmation).ok().map(|json| bytes_to_hex(&json))
}

pub(crate) fn decode_confirmation(raw: &str) -> Option<BookingConfirmation> {
    let bytes = hex_to_bytes(raw)?;
    serde_json::from_slice(&bytes).ok()
}

fn last_booking_cookie(state: &AppState, value: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((LAST_BOOKING_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(max_age)
        .build()
}

/// `POST /api/booking/draft`: start a fresh draft.
pub async fn start(State(state): State<AppState>, auth: AuthUser) -> Result<Json<BookingDraft>, ApiError> {
    auth.require_role(Role::Client)?;
    Ok(Json(booking::start(&state, auth.user_id).await?))
}

/// `GET /api/booking/draft`
pub async fn current(State(state): State<AppState>, auth: AuthUser) -> Result<Json<BookingDraft>, ApiError> {
    Ok(Json(booking::current(&state, auth.user_id).await?))
}

/// `POST /api/booking/draft/professional`
pub async fn select_professional(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ProfessionalBody>,
) -> Result<Json<BookingDraft>, ApiError> {
    Ok(Json(booking::select_professional(&state, auth.user_id, body.psychiatrist_id).await?))
}

/// `POST /api/booking/draft/schedule`
pub async fn schedule(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<ScheduleInput>,
) -> Result<Json<BookingDraft>, ApiError> {
    Ok(Json(booking::schedule(&state, auth.user_id, input).await?))
}

/// `POST /api/booking/draft/back`
pub async fn back(State(state): State<AppState>, auth: AuthUser) -> Result<Json<BookingDraft>, ApiError> {
    Ok(Json(booking::back(&state, auth.user_id).await?))
}

/// `POST /api/booking/draft/confirm`
pub async fn confirm(
    State(state): State<AppState>,
    auth: AuthUser,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let confirmation = booking::confirm(&state, auth.user_id).await?;
    let jar = match encode_confirmation(&confirmation) {
        Some(value) => jar.add(last_booking_cookie(&state, value, LAST_BOOKING_TTL)),
        None => {
            warn!(appointment_id = %confirmation.appointment_id, "could not encode booking confirmation");
            jar
        }
    };
    Ok((jar, Json(confirmation)))
}

/// `GET /api/booking/last`: read and clear the confirmation cookie.
pub async fn take_last(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let confirmation = jar
        .get(LAST_BOOKING_COOKIE)
        .and_then(|c| decode_confirmation(c.value()));
    let jar = jar.add(last_booking_cookie(&state, String::new(), Duration::ZERO));
    (jar, Json(confirmation))
}

#[cfg(test)]
#[path = "booking_test.rs"]
mod tests;
