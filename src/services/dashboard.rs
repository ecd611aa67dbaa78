//! Role-specific dashboard loads.
//!
//! Each dashboard issues its three reads concurrently and returns once all
//! of them finish. The first failure fails the whole load.

use axum::http::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use super::appointment::{self, AppointmentError};
use super::assessment::{self, AssessmentError, HistoryEntry};
use super::progress::{self, ProgressError, ProgressView};
use super::session::{self, SessionError};
use crate::error::ErrorCode;
use crate::models::{Assessment, AppointmentWithParties, Role, Session};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Appointments(#[from] AppointmentError),
    #[error(transparent)]
    Assessments(#[from] AssessmentError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Sessions(#[from] SessionError),
}

impl DashboardError {
    fn inner(&self) -> &dyn ErrorCode {
        match self {
            Self::Appointments(e) => e,
            Self::Assessments(e) => e,
            Self::Progress(e) => e,
            Self::Sessions(e) => e,
        }
    }
}

impl ErrorCode for DashboardError {
    fn error_code(&self) -> &'static str {
        self.inner().error_code()
    }

    fn status(&self) -> StatusCode {
        self.inner().status()
    }

    fn retryable(&self) -> bool {
        self.inner().retryable()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Dashboard {
    Client {
        appointments: Vec<AppointmentWithParties>,
        assessments: Vec<HistoryEntry>,
        progress: Option<ProgressView>,
    },
    Psychiatrist {
        appointments: Vec<AppointmentWithParties>,
        assessments: Vec<Assessment>,
        active_sessions: Vec<Session>,
    },
}

/// # Errors
///
/// The first failing read.
pub async fn load(state: &AppState, user_id: Uuid, role: Role) -> Result<Dashboard, DashboardError> {
    match role {
        Role::Client => load_client(state, user_id).await,
        Role::Psychiatrist => load_psychiatrist(state, user_id).await,
    }
}

async fn load_client(state: &AppState, client_id: Uuid) -> Result<Dashboard, DashboardError> {
    let (appointments, assessments, progress) = tokio::try_join!(
        async { Ok::<_, DashboardError>(appointment::list_for_client(state, client_id).await?) },
        async { Ok(assessment::history(state, client_id).await?) },
        async { Ok(progress::view_for_client(state, client_id).await?) },
    )?;
    Ok(Dashboard::Client { appointments, assessments, progress })
}

async fn load_psychiatrist(state: &AppState, psychiatrist_id: Uuid) -> Result<Dashboard, DashboardError> {
    let (appointments, assessments, active_sessions) = tokio::try_join!(
        async { Ok::<_, DashboardError>(appointment::list_for_psychiatrist(state, psychiatrist_id).await?) },
        async { Ok(assessment::list_for_psychiatrist(state, psychiatrist_id).await?) },
        async { Ok(session::active_for_psychiatrist(state, psychiatrist_id).await?) },
    )?;
    Ok(Dashboard::Psychiatrist { appointments, assessments, active_sessions })
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod tests;
