//! Auth routes: registration, login, session cookie, websocket tickets.
//!
//! The session token travels in an HttpOnly cookie. `AuthUser` requires a
//! live session; `MaybeAuthUser` is the lenient form used by the page guard.
//! Both resolve the caller's profile fail-open, so a signed-in user whose
//! profile cannot be read is still signed in, with `profile: None`.

use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Profile, Role};
use crate::services::auth::{self as auth_svc, Registration, SignedIn};
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session_token";

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// Authenticated caller extracted from the session cookie.
pub struct AuthUser {
    pub user_id: Uuid,
    pub token: String,
    pub profile: Option<Profile>,
}

impl AuthUser {
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(|p| p.role)
    }

    /// # Errors
    ///
    /// 403 unless the caller's resolved profile has `role`.
    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        if self.role() == Some(role) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("requires the {} role", role.as_str())))
        }
    }

    /// # Errors
    ///
    /// 403 when the profile could not be resolved.
    pub fn require_profile(&self) -> Result<&Profile, ApiError> {
        self.profile
            .as_ref()
            .ok_or_else(|| ApiError::forbidden("profile unavailable"))
    }
}

async fn caller(parts: &Parts, state: &AppState) -> Result<Option<AuthUser>, ApiError> {
    let jar = CookieJar::from_headers(&parts.headers);
    let token = jar.get(SESSION_COOKIE).map(Cookie::value).unwrap_or_default();
    if token.is_empty() {
        return Ok(None);
    }
    let Some(user_id) = auth_svc::session_user(state, token).await? else {
        return Ok(None);
    };
    let profile = auth_svc::resolve_profile(state, user_id).await;
    Ok(Some(AuthUser { user_id, token: token.to_owned(), profile }))
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        caller(parts, &app_state).await?.ok_or_else(ApiError::unauthorized)
    }
}

/// Optional caller. A session lookup failure reads as anonymous.
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        match caller(parts, &app_state).await {
            Ok(user) => Ok(Self(user)),
            Err(e) => {
                warn!(code = e.body.code, "session lookup failed; treating caller as anonymous");
                Ok(Self(None))
            }
        }
    }
}

// =============================================================================
// COOKIES
// =============================================================================

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(Duration::hours(state.config.session_ttl_hours))
        .build()
}

fn cleared_session_cookie(state: &AppState) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(Duration::ZERO)
        .build()
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Debug, Serialize)]
pub struct Me {
    pub user_id: Uuid,
    pub profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn signed_in_response(state: &AppState, jar: CookieJar, status: StatusCode, signed_in: SignedIn) -> Response {
    let body = Me { user_id: signed_in.user_id, profile: signed_in.profile };
    let jar = jar.add(session_cookie(state, signed_in.token));
    (jar, (status, Json(body))).into_response()
}

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(reg): Json<Registration>,
) -> Result<Response, ApiError> {
    let signed_in = auth_svc::register(&state, &reg).await?;
    Ok(signed_in_response(&state, jar, StatusCode::CREATED, signed_in))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let signed_in = auth_svc::authenticate(&state, &req.email, &req.password).await?;
    Ok(signed_in_response(&state, jar, StatusCode::OK, signed_in))
}

/// `POST /api/auth/logout`: delete the session and clear the cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<impl IntoResponse, ApiError> {
    auth_svc::deauthenticate(&state, &auth.token).await?;
    let jar = CookieJar::new().add(cleared_session_cookie(&state));
    Ok((jar, StatusCode::NO_CONTENT))
}

/// `GET /api/auth/me`
pub async fn me(auth: AuthUser) -> Json<Me> {
    Json(Me { user_id: auth.user_id, profile: auth.profile })
}

/// `POST /api/auth/ws-ticket`: create a one-time websocket ticket.
pub async fn ws_ticket(State(state): State<AppState>, auth: AuthUser) -> Result<Json<serde_json::Value>, ApiError> {
    let ticket = auth_svc::issue_ws_ticket(&state, auth.user_id).await?;
    Ok(Json(serde_json::json!({ "ticket": ticket })))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
