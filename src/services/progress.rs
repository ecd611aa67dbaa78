//! Wellness progress snapshots.
//!
//! Snapshots are computed elsewhere and only read here. The view layers a
//! display-only comparison of current against previous score on top; it
//! never re-derives the stored trend.

use axum::http::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::models::ProgressMetrics;
use crate::state::AppState;
use crate::store::StoreError;

/// Scores are reported on a 0 to 10 scale.
pub const SCORE_SCALE_MAX: f64 = 10.0;
const SIGNIFICANT_CHANGE_PERCENT: f64 = 10.0;

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for ProgressError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Store(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Store(e) => e.status(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.retryable())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendAnalysis {
    pub difference: f64,
    /// Absolute change relative to the previous score, one decimal place.
    /// Zero when there is no positive previous score.
    pub percentage: f64,
    pub improving: bool,
    pub significant: bool,
}

impl TrendAnalysis {
    #[must_use]
    pub fn compare(current: f64, previous: f64) -> Self {
        let difference = current - previous;
        let raw = if previous > 0.0 { difference / previous * 100.0 } else { 0.0 };
        Self {
            difference,
            percentage: (raw.abs() * 10.0).round() / 10.0,
            improving: difference > 0.0,
            significant: raw.abs() > SIGNIFICANT_CHANGE_PERCENT,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    #[serde(flatten)]
    pub metrics: ProgressMetrics,
    pub scale_max: f64,
    pub analysis: TrendAnalysis,
}

impl From<ProgressMetrics> for ProgressView {
    fn from(metrics: ProgressMetrics) -> Self {
        let analysis = TrendAnalysis::compare(metrics.current_score, metrics.previous_score);
        Self { metrics, scale_max: SCORE_SCALE_MAX, analysis }
    }
}

/// The stored snapshot, if one exists.
///
/// # Errors
///
/// Store failures.
pub async fn get_for_client(state: &AppState, client_id: Uuid) -> Result<Option<ProgressMetrics>, ProgressError> {
    Ok(state.repos.progress.progress_for_client(client_id).await?)
}

/// Snapshot plus display analysis.
///
/// # Errors
///
/// Store failures.
pub async fn view_for_client(state: &AppState, client_id: Uuid) -> Result<Option<ProgressView>, ProgressError> {
    Ok(get_for_client(state, client_id).await?.map(ProgressView::from))
}

#[cfg(test)]
#[path = "progress_test.rs"]
mod tests;
