//! Profiles, role-specific details and the psychiatrist directory.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use time::Date;
use tracing::info;
use uuid::Uuid;

use super::auth::publish_transition;
use crate::error::ErrorCode;
use crate::models::{ClientDetails, Profile, ProfilePatch, PsychiatristDetails, PsychiatristListing, Role, iso_date};
use crate::realtime::AuthTransition;
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile not found: {0}")]
    NotFound(Uuid),
    #[error("operation requires the {0} role")]
    WrongRole(&'static str),
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for ProfileError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_PROFILE_NOT_FOUND",
            Self::WrongRole(_) => "E_WRONG_ROLE",
            Self::Validation(_) => "E_VALIDATION",
            Self::Store(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::WrongRole(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Store(e) => e.status(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.retryable())
    }
}

/// Profile plus whichever detail row matches its role.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psychiatrist: Option<PsychiatristDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PsychiatristDetailsInput {
    #[serde(default)]
    pub specialization: String,
    #[serde(default)]
    pub experience_years: i32,
    #[serde(default)]
    pub hourly_rate_cents: i64,
    #[serde(default)]
    pub availability: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientDetailsInput {
    #[serde(default, with = "iso_date::option")]
    pub date_of_birth: Option<Date>,
    pub gender: Option<String>,
    pub emergency_contact: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_member_id: Option<String>,
}

/// Profile with role and role details.
///
/// # Errors
///
/// `NotFound` when the profile or its role row is missing.
pub async fn get(state: &AppState, id: Uuid) -> Result<ProfileView, ProfileError> {
    let user = state
        .repos
        .profiles
        .user(id)
        .await?
        .ok_or(ProfileError::NotFound(id))?;
    let role = *state
        .repos
        .profiles
        .roles_for(id)
        .await?
        .first()
        .ok_or(ProfileError::NotFound(id))?;

    let (psychiatrist, client) = match role {
        Role::Psychiatrist => (state.repos.profiles.psychiatrist_details(id).await?, None),
        Role::Client => (None, state.repos.profiles.client_details(id).await?),
    };
    Ok(ProfileView { profile: Profile { user, role }, psychiatrist, client })
}

/// Apply a patch to the identity fields. The role is not patchable.
///
/// # Errors
///
/// `Validation` for a blank first name, `NotFound` for an unknown id.
pub async fn update(state: &AppState, id: Uuid, patch: &ProfilePatch) -> Result<ProfileView, ProfileError> {
    if patch
        .first_name
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(ProfileError::Validation("first name cannot be blank"));
    }
    state
        .repos
        .profiles
        .update_user(id, patch)
        .await?
        .ok_or(ProfileError::NotFound(id))?;
    info!(user_id = %id, "profile updated");
    publish_transition(state, id, AuthTransition::ProfileUpdated).await;
    get(state, id).await
}

/// Directory of psychiatrists ordered by last then first name.
///
/// # Errors
///
/// Store failures.
pub async fn list_psychiatrists(state: &AppState) -> Result<Vec<PsychiatristListing>, ProfileError> {
    Ok(state.repos.profiles.list_psychiatrists().await?)
}

async fn require_role(state: &AppState, id: Uuid, role: Role) -> Result<(), ProfileError> {
    let roles = state.repos.profiles.roles_for(id).await?;
    if roles.contains(&role) { Ok(()) } else { Err(ProfileError::WrongRole(role.as_str())) }
}

/// Replace practice details. `verified` is preserved from the stored row.
///
/// # Errors
///
/// `WrongRole` unless `id` is a psychiatrist; `Validation` for negative values.
pub async fn update_psychiatrist_details(
    state: &AppState,
    id: Uuid,
    input: PsychiatristDetailsInput,
) -> Result<PsychiatristDetails, ProfileError> {
    require_role(state, id, Role::Psychiatrist).await?;
    if input.experience_years < 0 || input.hourly_rate_cents < 0 {
        return Err(ProfileError::Validation("experience and rate cannot be negative"));
    }
    let verified = state
        .repos
        .profiles
        .psychiatrist_details(id)
        .await?
        .is_some_and(|d| d.verified);
    let details = PsychiatristDetails {
        profile_id: id,
        specialization: input.specialization.trim().to_owned(),
        experience_years: input.experience_years,
        hourly_rate_cents: input.hourly_rate_cents,
        verified,
        availability: input.availability,
    };
    state
        .repos
        .profiles
        .upsert_psychiatrist_details(&details)
        .await?;
    Ok(details)
}

/// Replace client details.
///
/// # Errors
///
/// `WrongRole` unless `id` is a client.
pub async fn update_client_details(
    state: &AppState,
    id: Uuid,
    input: ClientDetailsInput,
) -> Result<ClientDetails, ProfileError> {
    require_role(state, id, Role::Client).await?;
    let details = ClientDetails {
        profile_id: id,
        date_of_birth: input.date_of_birth,
        gender: input.gender,
        emergency_contact: input.emergency_contact,
        insurance_provider: input.insurance_provider,
        insurance_member_id: input.insurance_member_id,
    };
    state.repos.profiles.upsert_client_details(&details).await?;
    Ok(details)
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
