//! In-app notifications.

use axum::http::StatusCode;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::models::Notification;
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for NotificationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_NOTIFICATION_NOT_FOUND",
            Self::Store(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(e) => e.status(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.retryable())
    }
}

/// Newest first.
///
/// # Errors
///
/// Store failures.
pub async fn list_for_user(state: &AppState, user_id: Uuid) -> Result<Vec<Notification>, NotificationError> {
    Ok(state.repos.notifications.notifications_for(user_id).await?)
}

/// Mark one of the user's notifications read. Another user's id is
/// indistinguishable from a missing one.
///
/// # Errors
///
/// `NotFound` when no notification with `id` belongs to `user_id`.
pub async fn mark_read(state: &AppState, id: Uuid, user_id: Uuid) -> Result<Notification, NotificationError> {
    state
        .repos
        .notifications
        .mark_read(id, user_id)
        .await?
        .ok_or(NotificationError::NotFound(id))
}

#[cfg(test)]
#[path = "notification_test.rs"]
mod tests;
