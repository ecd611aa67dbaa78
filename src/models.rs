//! Entity types shared by the repositories, services and routes.
//!
//! DESIGN
//! ======
//! Plain records with no behavior beyond string round-tripping of the
//! enumerated columns. Each struct mirrors one table; the `*WithParties`
//! and listing types are read-side joins assembled by the services.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(pub(crate) iso_date, Date, "[year]-[month]-[day]");
time::serde::format_description!(pub(crate) hour_minute, Time, "[hour]:[minute]");

// =============================================================================
// PROFILES
// =============================================================================

/// Role discriminator stored in `user_roles`. Immutable after sign-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Psychiatrist,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Psychiatrist => "psychiatrist",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "client" => Some(Self::Client),
            "psychiatrist" => Some(Self::Psychiatrist),
            _ => None,
        }
    }
}

/// Identity-level profile row. Mirrors the `profiles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_owned()
    }
}

/// Profile joined with its role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub role: Role,
}

/// Mutable profile fields. The role is deliberately absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsychiatristDetails {
    pub profile_id: Uuid,
    pub specialization: String,
    pub experience_years: i32,
    /// Session price in cents.
    pub hourly_rate_cents: i64,
    pub verified: bool,
    /// Free-form availability as entered by the psychiatrist.
    pub availability: serde_json::Value,
}

impl PsychiatristDetails {
    #[must_use]
    pub fn empty(profile_id: Uuid) -> Self {
        Self {
            profile_id,
            specialization: String::new(),
            experience_years: 0,
            hourly_rate_cents: 0,
            verified: false,
            availability: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientDetails {
    pub profile_id: Uuid,
    #[serde(default, with = "iso_date::option")]
    pub date_of_birth: Option<Date>,
    pub gender: Option<String>,
    pub emergency_contact: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_member_id: Option<String>,
}

/// Directory entry for one psychiatrist: profile plus practice details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsychiatristListing {
    #[serde(flatten)]
    pub user: User,
    pub details: PsychiatristDetails,
}

/// The slice of a profile embedded in joined appointment rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartySummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl From<&User> for PartySummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

// =============================================================================
// APPOINTMENTS
// =============================================================================

/// Appointment status. Transitions are not constrained: any value may be
/// overwritten with any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "scheduled" => Some(Self::Scheduled),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    #[default]
    Video,
    Audio,
    Chat,
}

impl SessionType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Chat => "chat",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "chat" => Some(Self::Chat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

impl PaymentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "unpaid" => Some(Self::Unpaid),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

pub const DEFAULT_APPOINTMENT_MINUTES: i32 = 50;

/// Mirrors the `appointments` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub psychiatrist_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_for: OffsetDateTime,
    pub duration_minutes: i32,
    pub session_type: SessionType,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub payment_status: PaymentStatus,
    pub checkout_session_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Insert shape for appointments. Nothing here is validated locally.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAppointment {
    pub client_id: Uuid,
    pub psychiatrist_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_for: OffsetDateTime,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub session_type: SessionType,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Appointment joined with the profiles of one or both parties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentWithParties {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<PartySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psychiatrist: Option<PartySummary>,
}

// =============================================================================
// LIVE SESSIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Live,
    Ended,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Live => "live",
            Self::Ended => "ended",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "scheduled" => Some(Self::Scheduled),
            "live" => Some(Self::Live),
            "ended" => Some(Self::Ended),
            _ => None,
        }
    }
}

/// A live call tied to one appointment. Mirrors the `sessions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub status: SessionStatus,
    pub room_id: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
}

// =============================================================================
// ASSESSMENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    MultipleChoice,
    Scale,
    Likert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Cancelled,
}

impl AssessmentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Mirrors the `assessments` table. Questions are stored denormalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: Uuid,
    pub psychiatrist_id: Uuid,
    pub client_id: Uuid,
    pub title: String,
    pub description: String,
    pub questions: Vec<Question>,
    pub status: AssessmentStatus,
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub results: Option<serde_json::Value>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewAssessment {
    pub title: String,
    pub description: String,
    pub questions: Vec<Question>,
    pub client_id: Uuid,
    pub psychiatrist_id: Uuid,
    pub status: AssessmentStatus,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssessmentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub questions: Option<Vec<Question>>,
    pub status: Option<AssessmentStatus>,
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub results: Option<serde_json::Value>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,
    pub answer: AnswerValue,
}

/// One submission against an assessment. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResponse {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub client_id: Uuid,
    pub answers: Vec<Answer>,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
}

// =============================================================================
// PROGRESS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl Trend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Declining => "declining",
        }
    }

    /// Unknown trend labels from upstream render as `stable`.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        match raw {
            "improving" => Self::Improving,
            "declining" => Self::Declining,
            _ => Self::Stable,
        }
    }
}

/// Precomputed wellness snapshot. Produced upstream, only read here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMetrics {
    pub client_id: Uuid,
    pub current_score: f64,
    pub previous_score: f64,
    pub trend: Trend,
    pub insights: Vec<String>,
    pub assessment_count: i32,
    pub session_count: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub metadata: serde_json::Value,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub metadata: serde_json::Value,
}

#[cfg(test)]
#[path = "models_test.rs"]
mod tests;
