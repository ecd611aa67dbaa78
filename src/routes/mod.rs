//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router carries the JSON API under `/api`, the realtime
//! websocket, public object storage under `/storage`, and the SPA pages.
//! Anything else falls through to static files in `WEBSITE_DIR`.

pub mod appointments;
pub mod assessments;
pub mod auth;
pub mod booking;
pub mod dashboard;
pub mod images;
pub mod notifications;
pub mod pages;
pub mod payments;
pub mod preferences;
pub mod profiles;
pub mod realtime;
pub mod sessions;
pub mod storage;
#[cfg(test)]
pub(crate) mod test_http;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::Role;
use crate::state::AppState;
use auth::AuthUser;

/// Largest accepted request body (image uploads).
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

// =============================================================================
// ACCESS RULES
// =============================================================================

/// Client-scoped reads: the client themself or any psychiatrist.
pub(crate) fn ensure_client_reader(auth: &AuthUser, client_id: Uuid) -> Result<(), ApiError> {
    if auth.user_id == client_id || auth.role() == Some(Role::Psychiatrist) {
        Ok(())
    } else {
        Err(ApiError::forbidden("not allowed to view this client"))
    }
}

/// Psychiatrist-scoped reads: only that psychiatrist.
pub(crate) fn ensure_self(auth: &AuthUser, user_id: Uuid) -> Result<(), ApiError> {
    if auth.user_id == user_id {
        Ok(())
    } else {
        Err(ApiError::forbidden("not allowed to view another user's data"))
    }
}

// =============================================================================
// ROUTER
// =============================================================================

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/ws-ticket", post(auth::ws_ticket))
        .route("/api/profiles/me", patch(profiles::update_me))
        .route("/api/profiles/me/psychiatrist", put(profiles::put_psychiatrist_details))
        .route("/api/profiles/me/client", put(profiles::put_client_details))
        .route("/api/profiles/{id}", get(profiles::get_profile))
        .route("/api/psychiatrists", get(profiles::list_psychiatrists))
        .route("/api/appointments", get(appointments::list_mine).post(appointments::create))
        .route("/api/appointments/{id}/status", patch(appointments::update_status))
        .route("/api/appointments/{id}/cancel", post(appointments::cancel))
        .route("/api/appointments/{id}/reschedule", post(appointments::reschedule))
        .route("/api/appointments/{id}/session", post(sessions::start))
        .route("/api/clients/{id}/appointments", get(appointments::list_for_client))
        .route("/api/clients/{id}/assessments", get(assessments::list_for_client))
        .route("/api/clients/{id}/assessment-history", get(assessments::history))
        .route("/api/clients/{id}/progress", get(sessions::client_progress))
        .route("/api/psychiatrists/{id}/appointments", get(appointments::list_for_psychiatrist))
        .route("/api/psychiatrists/{id}/assessments", get(assessments::list_for_psychiatrist))
        .route("/api/psychiatrists/{id}/sessions/active", get(sessions::active))
        .route("/api/assessments", post(assessments::create))
        .route("/api/assessments/{id}", patch(assessments::update).delete(assessments::delete))
        .route(
            "/api/assessments/{id}/responses",
            get(assessments::list_responses).post(assessments::submit_response),
        )
        .route("/api/sessions/{id}/end", post(sessions::end))
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .route("/api/booking/draft", get(booking::current).post(booking::start))
        .route("/api/booking/draft/professional", post(booking::select_professional))
        .route("/api/booking/draft/schedule", post(booking::schedule))
        .route("/api/booking/draft/back", post(booking::back))
        .route("/api/booking/draft/confirm", post(booking::confirm))
        .route("/api/booking/last", get(booking::take_last))
        .route("/api/payments/checkout", post(payments::checkout))
        .route("/api/payments/confirm", post(payments::confirm))
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/{id}/read", post(notifications::mark_read))
        .route("/api/images/{folder}", get(images::list).post(images::upload))
        .route("/api/images/{folder}/active", get(images::get_active).put(images::set_active))
        .route(
            "/api/preferences/accessibility",
            get(preferences::get_prefs).put(preferences::put_prefs),
        )
        .route("/api/realtime", get(realtime::handle_realtime))
        .route("/storage/website-images/{*path}", get(storage::website_image))
        .route("/healthz", get(healthz))
}

fn page_routes() -> Router<AppState> {
    pages::PAGE_PATHS
        .iter()
        .fold(Router::new(), |router, path| router.route(path, get(pages::page)))
}

/// The full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let website = ServeDir::new(&state.config.website_dir);

    api_routes()
        .merge(page_routes())
        .fallback_service(website)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
