//! Accounts, login sessions, websocket tickets and the auth-state stream.
//!
//! ARCHITECTURE
//! ============
//! HTTP requests authenticate with a long-lived session token held in an
//! HttpOnly cookie; websocket upgrades use one-time short-lived tickets so
//! the cookie never appears in a query string. Every sign-in, sign-out and
//! profile edit publishes an `auth:changed` event on the user's topic.
//!
//! ERROR HANDLING
//! ==============
//! Profile resolution is fail-open: a store error or a missing role row
//! yields `None` and a warning, never an error. A session without a
//! profile still counts as signed in.

use std::fmt::Write;

use axum::http::StatusCode;
use rand::Rng;
use serde::Deserialize;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::password::{hash_password, verify_password};
use crate::error::ErrorCode;
use crate::models::{Profile, Role, User};
use crate::realtime::{AuthTransition, RealtimeEvent, Topic};
use crate::state::AppState;
use crate::store::{Credential, NewAccount, StoreError};

pub const MIN_PASSWORD_LEN: usize = 6;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => Self::EmailTaken,
            other => Self::Store(other),
        }
    }
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E_VALIDATION",
            Self::EmailTaken => "E_EMAIL_TAKEN",
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::Store(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::EmailTaken => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Store(e) => e.status(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.retryable())
    }
}

/// Sign-up form.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
}

/// A freshly established login.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub token: String,
    pub user_id: Uuid,
    pub profile: Option<Profile>,
}

// =============================================================================
// TOKENS
// =============================================================================

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Inverse of `bytes_to_hex`; `None` on odd length or a non-hex digit.
pub(crate) fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Generate a short-lived 16-byte hex WS ticket.
#[must_use]
pub(crate) fn generate_ws_ticket() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Check the sign-up form before anything is written.
///
/// # Errors
///
/// `AuthError::Validation` naming the first failing rule.
pub fn validate_registration(reg: &Registration) -> Result<String, AuthError> {
    let email = normalize_email(&reg.email).ok_or(AuthError::Validation("a valid email is required"))?;
    if reg.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation("password must be at least 6 characters"));
    }
    if reg.password != reg.confirm_password {
        return Err(AuthError::Validation("passwords do not match"));
    }
    if reg.first_name.trim().is_empty() {
        return Err(AuthError::Validation("first name is required"));
    }
    Ok(email)
}

/// Create credential, profile, role and detail rows, then sign in.
///
/// # Errors
///
/// Validation failures, `EmailTaken` on a duplicate, or a store failure.
pub async fn register(state: &AppState, reg: &Registration) -> Result<SignedIn, AuthError> {
    let email = validate_registration(reg)?;
    if state.repos.accounts.credential_by_email(&email).await?.is_some() {
        return Err(AuthError::EmailTaken);
    }

    let user = User {
        id: Uuid::new_v4(),
        email: email.clone(),
        first_name: reg.first_name.trim().to_owned(),
        last_name: reg.last_name.trim().to_owned(),
        phone: reg.phone.clone().filter(|p| !p.trim().is_empty()),
        avatar_url: None,
        bio: None,
        created_at: OffsetDateTime::now_utc(),
    };
    let account = NewAccount {
        credential: Credential {
            user_id: user.id,
            email,
            password_hash: hash_password(&reg.password, state.config.password_hash_iterations),
        },
        user,
        role: reg.role,
    };
    state.repos.accounts.create_account(&account).await?;
    info!(user_id = %account.user.id, role = account.role.as_str(), "account registered");

    start_session(state, account.user.id).await
}

/// Verify a password and sign in.
///
/// # Errors
///
/// `InvalidCredentials` for an unknown email or wrong password.
pub async fn authenticate(state: &AppState, email: &str, password: &str) -> Result<SignedIn, AuthError> {
    let email = normalize_email(email).ok_or(AuthError::InvalidCredentials)?;
    let credential = state
        .repos
        .accounts
        .credential_by_email(&email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    if !verify_password(password, &credential.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }
    start_session(state, credential.user_id).await
}

async fn start_session(state: &AppState, user_id: Uuid) -> Result<SignedIn, AuthError> {
    let token = generate_token();
    let expires_at = OffsetDateTime::now_utc() + Duration::hours(state.config.session_ttl_hours);
    state
        .repos
        .accounts
        .insert_auth_session(&token, user_id, expires_at)
        .await?;
    let profile = publish_transition(state, user_id, AuthTransition::SignedIn).await;
    info!(%user_id, "signed in");
    Ok(SignedIn { token, user_id, profile })
}

/// End the session behind `token`. Unknown tokens are a no-op.
///
/// # Errors
///
/// Store failures.
pub async fn deauthenticate(state: &AppState, token: &str) -> Result<(), AuthError> {
    let user_id = state
        .repos
        .accounts
        .auth_session_user(token, OffsetDateTime::now_utc())
        .await?;
    state.repos.accounts.delete_auth_session(token).await?;
    if let Some(user_id) = user_id {
        state.feed.publish(
            Topic::User(user_id),
            &RealtimeEvent::AuthChanged { transition: AuthTransition::SignedOut, profile: None },
        );
        info!(%user_id, "signed out");
    }
    Ok(())
}

/// User id for a live session token.
///
/// # Errors
///
/// Store failures.
pub async fn session_user(state: &AppState, token: &str) -> Result<Option<Uuid>, AuthError> {
    Ok(state
        .repos
        .accounts
        .auth_session_user(token, OffsetDateTime::now_utc())
        .await?)
}

/// Profile joined with its role, or `None` on any failure.
pub async fn resolve_profile(state: &AppState, user_id: Uuid) -> Option<Profile> {
    let user = match state.repos.profiles.user(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(%user_id, "profile row missing");
            return None;
        }
        Err(e) => {
            warn!(%user_id, error = %e, "profile lookup failed");
            return None;
        }
    };
    match state.repos.profiles.roles_for(user_id).await {
        Ok(roles) => match roles.first() {
            Some(role) => Some(Profile { user, role: *role }),
            None => {
                warn!(%user_id, "profile has no role");
                None
            }
        },
        Err(e) => {
            warn!(%user_id, error = %e, "role lookup failed");
            None
        }
    }
}

/// Publish an auth transition carrying the re-fetched profile. Returns the
/// profile that was published.
pub async fn publish_transition(state: &AppState, user_id: Uuid, transition: AuthTransition) -> Option<Profile> {
    let profile = resolve_profile(state, user_id).await;
    state.feed.publish(
        Topic::User(user_id),
        &RealtimeEvent::AuthChanged { transition, profile: profile.clone() },
    );
    profile
}

/// Issue a one-time websocket ticket.
///
/// # Errors
///
/// Store failures.
pub async fn issue_ws_ticket(state: &AppState, user_id: Uuid) -> Result<String, AuthError> {
    let ticket = generate_ws_ticket();
    let expires_at = OffsetDateTime::now_utc() + Duration::seconds(state.config.ws_ticket_ttl_secs);
    state
        .repos
        .accounts
        .insert_ws_ticket(&ticket, user_id, expires_at)
        .await?;
    Ok(ticket)
}

/// Consume a websocket ticket, returning its user if it was valid.
///
/// # Errors
///
/// Store failures.
pub async fn consume_ws_ticket(state: &AppState, ticket: &str) -> Result<Option<Uuid>, AuthError> {
    Ok(state
        .repos
        .accounts
        .consume_ws_ticket(ticket, OffsetDateTime::now_utc())
        .await?)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
