//! Data access layer: one typed repository trait per entity.
//!
//! ARCHITECTURE
//! ============
//! Services never build queries. They call one method per query shape on
//! the traits below, and `Repositories` bundles one trait object per entity.
//! Two backends implement every trait:
//! - `pg::PgStore`: sqlx over Postgres (production).
//! - `memory::MemoryStore`: in-process tables (development and tests).
//!
//! Writes are blind overwrites (last write wins). Nothing here caches.

pub mod memory;
pub mod pg;

use std::sync::Arc;

use axum::http::StatusCode;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::models::{
    Appointment, AppointmentStatus, Assessment, AssessmentPatch, AssessmentResponse, Answer, ClientDetails,
    NewAppointment, NewAssessment, NewNotification, Notification, ProfilePatch, ProgressMetrics,
    PsychiatristDetails, PsychiatristListing, Role, Session, User,
};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unknown reference: {0}")]
    MissingReference(String),
    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "E_CONFLICT",
            Self::MissingReference(_) => "E_UNKNOWN_REFERENCE",
            Self::Corrupt { .. } => "E_CORRUPT_ROW",
            Self::Unavailable(_) => "E_UNAVAILABLE",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::MissingReference(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Corrupt { .. } | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// Stored password credential. `password_hash` is a self-describing
/// `pbkdf2-sha256$iterations$salt$hash` string.
#[derive(Debug, Clone)]
pub struct Credential {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
}

/// Everything written by a sign-up, applied atomically.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub credential: Credential,
    pub user: User,
    pub role: Role,
}

// =============================================================================
// TRAITS
// =============================================================================

/// Credentials, auth sessions and websocket tickets.
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Create credential, profile, role row and the role's detail row.
    /// A duplicate email is `StoreError::Conflict`.
    async fn create_account(&self, account: &NewAccount) -> Result<(), StoreError>;

    async fn credential_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError>;

    async fn insert_auth_session(&self, token: &str, user_id: Uuid, expires_at: OffsetDateTime)
    -> Result<(), StoreError>;

    /// Return the user for an unexpired session token.
    async fn auth_session_user(&self, token: &str, now: OffsetDateTime) -> Result<Option<Uuid>, StoreError>;

    async fn delete_auth_session(&self, token: &str) -> Result<(), StoreError>;

    async fn insert_ws_ticket(&self, ticket: &str, user_id: Uuid, expires_at: OffsetDateTime)
    -> Result<(), StoreError>;

    /// Consume a ticket; a ticket is valid at most once.
    async fn consume_ws_ticket(&self, ticket: &str, now: OffsetDateTime) -> Result<Option<Uuid>, StoreError>;
}

#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError>;

    async fn roles_for(&self, user_id: Uuid) -> Result<Vec<Role>, StoreError>;

    async fn update_user(&self, id: Uuid, patch: &ProfilePatch) -> Result<Option<User>, StoreError>;

    /// Profiles with the psychiatrist role joined with their details,
    /// ordered by last then first name.
    async fn list_psychiatrists(&self) -> Result<Vec<PsychiatristListing>, StoreError>;

    async fn psychiatrist_details(&self, id: Uuid) -> Result<Option<PsychiatristDetails>, StoreError>;

    async fn upsert_psychiatrist_details(&self, details: &PsychiatristDetails) -> Result<(), StoreError>;

    async fn client_details(&self, id: Uuid) -> Result<Option<ClientDetails>, StoreError>;

    async fn upsert_client_details(&self, details: &ClientDetails) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
pub trait AppointmentStore: Send + Sync {
    /// An unknown client or psychiatrist is `StoreError::MissingReference`.
    async fn insert_appointment(&self, new: &NewAppointment) -> Result<Appointment, StoreError>;

    async fn appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Ordered by `scheduled_for` ascending.
    async fn appointments_for_client(&self, client_id: Uuid) -> Result<Vec<Appointment>, StoreError>;

    /// Ordered by `scheduled_for` ascending.
    async fn appointments_for_psychiatrist(&self, psychiatrist_id: Uuid) -> Result<Vec<Appointment>, StoreError>;

    async fn set_status(&self, id: Uuid, status: AppointmentStatus) -> Result<Option<Appointment>, StoreError>;

    async fn set_scheduled_for(&self, id: Uuid, when: OffsetDateTime) -> Result<Option<Appointment>, StoreError>;

    async fn set_checkout_session(&self, id: Uuid, session_id: &str) -> Result<Option<Appointment>, StoreError>;

    /// Mark the appointment holding `session_id` confirmed and paid.
    async fn confirm_payment(&self, session_id: &str) -> Result<Option<Appointment>, StoreError>;
}

#[async_trait::async_trait]
pub trait AssessmentStore: Send + Sync {
    /// An unknown client or psychiatrist is `StoreError::MissingReference`.
    async fn insert_assessment(&self, new: &NewAssessment) -> Result<Assessment, StoreError>;

    async fn assessment(&self, id: Uuid) -> Result<Option<Assessment>, StoreError>;

    /// Ordered by `created_at` descending.
    async fn assessments_for_client(&self, client_id: Uuid) -> Result<Vec<Assessment>, StoreError>;

    /// Ordered by `created_at` descending.
    async fn assessments_for_psychiatrist(&self, psychiatrist_id: Uuid) -> Result<Vec<Assessment>, StoreError>;

    async fn update_assessment(&self, id: Uuid, patch: &AssessmentPatch) -> Result<Option<Assessment>, StoreError>;

    /// Returns false when no row matched.
    async fn delete_assessment(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn insert_response(
        &self,
        assessment_id: Uuid,
        client_id: Uuid,
        answers: &[Answer],
    ) -> Result<AssessmentResponse, StoreError>;

    /// Ordered by `submitted_at` ascending.
    async fn responses_for(&self, assessment_id: Uuid) -> Result<Vec<AssessmentResponse>, StoreError>;
}

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a `live` session.
    async fn insert_live_session(
        &self,
        appointment_id: Uuid,
        room_id: &str,
        started_at: OffsetDateTime,
    ) -> Result<Session, StoreError>;

    async fn session(&self, id: Uuid) -> Result<Option<Session>, StoreError>;

    async fn live_session_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Session>, StoreError>;

    async fn end_session(&self, id: Uuid, ended_at: OffsetDateTime) -> Result<Option<Session>, StoreError>;

    async fn live_sessions_for_psychiatrist(&self, psychiatrist_id: Uuid) -> Result<Vec<Session>, StoreError>;
}

#[async_trait::async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, new: &NewNotification) -> Result<Notification, StoreError>;

    /// Newest first.
    async fn notifications_for(&self, user_id: Uuid) -> Result<Vec<Notification>, StoreError>;

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>, StoreError>;
}

#[async_trait::async_trait]
pub trait ProgressStore: Send + Sync {
    async fn progress_for_client(&self, client_id: Uuid) -> Result<Option<ProgressMetrics>, StoreError>;

    async fn upsert_progress(&self, metrics: &ProgressMetrics) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    async fn setting(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

// =============================================================================
// BUNDLE
// =============================================================================

/// One trait object per entity. Fields are public so tests can swap a single
/// repository for a failing double.
#[derive(Clone)]
pub struct Repositories {
    pub accounts: Arc<dyn AccountStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub assessments: Arc<dyn AssessmentStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub settings: Arc<dyn SettingsStore>,
}

impl Repositories {
    /// Point every repository at the same backend.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: AccountStore
            + ProfileStore
            + AppointmentStore
            + AssessmentStore
            + SessionStore
            + NotificationStore
            + ProgressStore
            + SettingsStore
            + 'static,
    {
        Self {
            accounts: backend.clone(),
            profiles: backend.clone(),
            appointments: backend.clone(),
            assessments: backend.clone(),
            sessions: backend.clone(),
            notifications: backend.clone(),
            progress: backend.clone(),
            settings: backend,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(memory::MemoryStore::new()))
    }
}
