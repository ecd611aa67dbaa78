//! Assessment forms, responses and the history view.
//!
//! DESIGN
//! ======
//! Questions are validated before any write and stored denormalized with
//! the assessment. Responses are insert-only. The history view adds a score
//! band and a display date; a date that cannot be rendered becomes
//! `NOT_COMPLETED` instead of an error.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::info;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::models::{
    Answer, Assessment, AssessmentPatch, AssessmentResponse, AssessmentStatus, NewAssessment, Question, QuestionType,
    Role,
};
use crate::state::AppState;
use crate::store::StoreError;

pub const NOT_COMPLETED: &str = "Not completed";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("assessment not found: {0}")]
    NotFound(Uuid),
    #[error("{0}")]
    Validation(String),
    #[error("assessment is not assigned to this client")]
    NotAssigned,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for AssessmentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_ASSESSMENT_NOT_FOUND",
            Self::Validation(_) => "E_VALIDATION",
            Self::NotAssigned => "E_NOT_ASSIGNED",
            Self::Store(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotAssigned => StatusCode::FORBIDDEN,
            Self::Store(e) => e.status(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.retryable())
    }
}

/// Builder form submitted by a psychiatrist.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAssessment {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<Question>,
    pub client_id: Uuid,
    #[serde(default)]
    pub status: AssessmentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    High,
    Medium,
    Low,
}

impl ScoreBand {
    /// `High` at 70% and above, `Medium` at 40% and above. `None` without a
    /// positive maximum.
    #[must_use]
    pub fn classify(score: f64, max_score: f64) -> Option<Self> {
        if max_score <= 0.0 || !score.is_finite() || !max_score.is_finite() {
            return None;
        }
        let percentage = score / max_score * 100.0;
        Some(if percentage >= 70.0 {
            Self::High
        } else if percentage >= 40.0 {
            Self::Medium
        } else {
            Self::Low
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub assessment: Assessment,
    pub band: Option<ScoreBand>,
    pub completed_display: String,
}

// =============================================================================
// VALIDATION
// =============================================================================

fn invalid(message: impl Into<String>) -> AssessmentError {
    AssessmentError::Validation(message.into())
}

/// Builder rules for a question list.
///
/// # Errors
///
/// `Validation` naming the first offending question (1-based).
pub fn validate_questions(questions: &[Question]) -> Result<(), AssessmentError> {
    if questions.is_empty() {
        return Err(invalid("at least one question is required"));
    }
    for (n, q) in questions.iter().enumerate().map(|(i, q)| (i + 1, q)) {
        if q.question.trim().is_empty() {
            return Err(invalid(format!("question {n} has no text")));
        }
        if q.kind == QuestionType::MultipleChoice {
            if q.options.is_empty() {
                return Err(invalid(format!("question {n} needs at least one option")));
            }
            if q.options.iter().any(|o| o.trim().is_empty()) {
                return Err(invalid(format!("question {n} has a blank option")));
            }
        }
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), AssessmentError> {
    if title.trim().is_empty() { Err(invalid("title is required")) } else { Ok(()) }
}

fn validate_score(score: Option<f64>, max_score: Option<f64>) -> Result<(), AssessmentError> {
    match (score, max_score) {
        (Some(s), Some(m)) if s > m => Err(invalid(format!("score {s} exceeds max score {m}"))),
        _ => Ok(()),
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

async fn ensure_client(state: &AppState, client_id: Uuid) -> Result<(), AssessmentError> {
    let roles = state.repos.profiles.roles_for(client_id).await?;
    if roles.contains(&Role::Client) {
        Ok(())
    } else {
        Err(invalid(format!("{client_id} is not a client")))
    }
}

/// Validate and persist a new assessment authored by `psychiatrist_id`.
///
/// # Errors
///
/// `Validation` when any builder rule fails or `client_id` is not a
/// client; nothing is written.
pub async fn create(
    state: &AppState,
    psychiatrist_id: Uuid,
    input: CreateAssessment,
) -> Result<Assessment, AssessmentError> {
    validate_title(&input.title)?;
    validate_questions(&input.questions)?;
    ensure_client(state, input.client_id).await?;
    let new = NewAssessment {
        title: input.title.trim().to_owned(),
        description: input.description,
        questions: input.questions,
        client_id: input.client_id,
        psychiatrist_id,
        status: input.status,
    };
    let row = state.repos.assessments.insert_assessment(&new).await?;
    info!(
        assessment_id = %row.id,
        %psychiatrist_id,
        client_id = %row.client_id,
        questions = row.questions.len(),
        "assessment created"
    );
    Ok(row)
}

/// # Errors
///
/// `NotFound` for an unknown id.
pub async fn get(state: &AppState, id: Uuid) -> Result<Assessment, AssessmentError> {
    state
        .repos
        .assessments
        .assessment(id)
        .await?
        .ok_or(AssessmentError::NotFound(id))
}

/// Newest first.
///
/// # Errors
///
/// Store failures.
pub async fn list_for_client(state: &AppState, client_id: Uuid) -> Result<Vec<Assessment>, AssessmentError> {
    Ok(state.repos.assessments.assessments_for_client(client_id).await?)
}

/// Newest first.
///
/// # Errors
///
/// Store failures.
pub async fn list_for_psychiatrist(state: &AppState, psychiatrist_id: Uuid) -> Result<Vec<Assessment>, AssessmentError> {
    Ok(state
        .repos
        .assessments
        .assessments_for_psychiatrist(psychiatrist_id)
        .await?)
}

/// Apply the fields present in `patch`.
///
/// # Errors
///
/// `Validation` for a blank title, invalid questions, or a score above the
/// (patched or stored) maximum; `NotFound` for an unknown id.
pub async fn update(state: &AppState, id: Uuid, patch: &AssessmentPatch) -> Result<Assessment, AssessmentError> {
    if let Some(title) = &patch.title {
        validate_title(title)?;
    }
    if let Some(questions) = &patch.questions {
        validate_questions(questions)?;
    }
    let current = get(state, id).await?;
    validate_score(patch.score.or(current.score), patch.max_score.or(current.max_score))?;

    state
        .repos
        .assessments
        .update_assessment(id, patch)
        .await?
        .ok_or(AssessmentError::NotFound(id))
}

/// # Errors
///
/// `NotFound` when nothing was deleted.
pub async fn delete(state: &AppState, id: Uuid) -> Result<(), AssessmentError> {
    if state.repos.assessments.delete_assessment(id).await? {
        info!(assessment_id = %id, "assessment deleted");
        Ok(())
    } else {
        Err(AssessmentError::NotFound(id))
    }
}

/// Record an immutable response from the assessment's client.
///
/// # Errors
///
/// `NotAssigned` when `client_id` is not the assessment's client;
/// `Validation` for an answer to a question the form does not contain.
pub async fn submit_response(
    state: &AppState,
    assessment_id: Uuid,
    client_id: Uuid,
    answers: &[Answer],
) -> Result<AssessmentResponse, AssessmentError> {
    let assessment = get(state, assessment_id).await?;
    if assessment.client_id != client_id {
        return Err(AssessmentError::NotAssigned);
    }
    if let Some(stray) = answers
        .iter()
        .find(|a| !assessment.questions.iter().any(|q| q.id == a.question_id))
    {
        return Err(invalid(format!("unknown question id {}", stray.question_id)));
    }
    let row = state
        .repos
        .assessments
        .insert_response(assessment_id, client_id, answers)
        .await?;
    info!(%assessment_id, %client_id, answers = answers.len(), "assessment response submitted");
    Ok(row)
}

/// Oldest first.
///
/// # Errors
///
/// Store failures.
pub async fn list_responses(state: &AppState, assessment_id: Uuid) -> Result<Vec<AssessmentResponse>, AssessmentError> {
    Ok(state.repos.assessments.responses_for(assessment_id).await?)
}

// =============================================================================
// HISTORY VIEW
// =============================================================================

/// `YYYY-MM-DD` for a completion time, or `NOT_COMPLETED`.
#[must_use]
pub fn completed_display(completed_at: Option<OffsetDateTime>) -> String {
    completed_at
        .and_then(|at| at.format(format_description!("[year]-[month]-[day]")).ok())
        .unwrap_or_else(|| NOT_COMPLETED.to_owned())
}

#[must_use]
pub fn history_entry(assessment: Assessment) -> HistoryEntry {
    let band = match (assessment.score, assessment.max_score) {
        (Some(score), Some(max)) => ScoreBand::classify(score, max),
        _ => None,
    };
    let completed_display = completed_display(assessment.completed_at);
    HistoryEntry { assessment, band, completed_display }
}

/// A client's assessments, newest first, with display fields.
///
/// # Errors
///
/// Store failures.
pub async fn history(state: &AppState, client_id: Uuid) -> Result<Vec<HistoryEntry>, AssessmentError> {
    Ok(list_for_client(state, client_id)
        .await?
        .into_iter()
        .map(history_entry)
        .collect())
}

#[cfg(test)]
#[path = "assessment_test.rs"]
mod tests;
