//! Checkout for appointments behind a gateway trait.
//!
//! DESIGN
//! ======
//! `PaymentGateway` is the seam a real processor would implement. The only
//! implementation is `MockGateway`, which mints `cs_mock_<hex>` session ids
//! and redirects straight to the success page. Confirmation is keyed by the
//! session id alone: no webhook signature, no idempotency key, and a repeat
//! confirmation simply rewrites the same status.

use axum::http::StatusCode;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::auth::bytes_to_hex;
use crate::error::ErrorCode;
use crate::models::Appointment;
use crate::state::AppState;
use crate::store::StoreError;

pub const MOCK_SESSION_PREFIX: &str = "cs_mock_";

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("appointment not found: {0}")]
    AppointmentNotFound(Uuid),
    #[error("no appointment for checkout session {0}")]
    UnknownSession(String),
    #[error("only the appointment's client may pay for it")]
    NotYourAppointment,
    #[error("amount must be positive")]
    InvalidAmount,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for PaymentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::AppointmentNotFound(_) => "E_APPOINTMENT_NOT_FOUND",
            Self::UnknownSession(_) => "E_CHECKOUT_NOT_FOUND",
            Self::NotYourAppointment => "E_FORBIDDEN",
            Self::InvalidAmount => "E_VALIDATION",
            Self::Store(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::AppointmentNotFound(_) | Self::UnknownSession(_) => StatusCode::NOT_FOUND,
            Self::NotYourAppointment => StatusCode::FORBIDDEN,
            Self::InvalidAmount => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Store(e) => e.status(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.retryable())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub appointment_id: Uuid,
    pub amount_cents: i64,
}

// =============================================================================
// GATEWAY
// =============================================================================

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a checkout for `amount_cents` against one appointment.
    async fn create_checkout(&self, appointment_id: Uuid, amount_cents: i64) -> Result<CheckoutSession, PaymentError>;
}

/// Gateway that accepts every checkout immediately.
pub struct MockGateway {
    base_url: String,
}

impl MockGateway {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_owned() }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout(&self, appointment_id: Uuid, amount_cents: i64) -> Result<CheckoutSession, PaymentError> {
        let bytes: [u8; 12] = rand::rng().random();
        let id = format!("{MOCK_SESSION_PREFIX}{}", bytes_to_hex(&bytes));
        info!(%appointment_id, amount_cents, session_id = %id, "mock checkout created");
        let redirect_url = format!("{}/payment/success?session_id={id}", self.base_url);
        Ok(CheckoutSession { id, redirect_url })
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Open a checkout for the caller's appointment and remember its id.
///
/// # Errors
///
/// `InvalidAmount` for a non-positive amount, `NotYourAppointment` unless
/// `payer` is the client, gateway and store failures.
pub async fn checkout(state: &AppState, request: &CheckoutRequest, payer: Uuid) -> Result<CheckoutSession, PaymentError> {
    if request.amount_cents <= 0 {
        return Err(PaymentError::InvalidAmount);
    }
    let appointment = state
        .repos
        .appointments
        .appointment(request.appointment_id)
        .await?
        .ok_or(PaymentError::AppointmentNotFound(request.appointment_id))?;
    if appointment.client_id != payer {
        return Err(PaymentError::NotYourAppointment);
    }

    let session = state
        .payments
        .create_checkout(appointment.id, request.amount_cents)
        .await?;
    state
        .repos
        .appointments
        .set_checkout_session(appointment.id, &session.id)
        .await?
        .ok_or(PaymentError::AppointmentNotFound(appointment.id))?;
    Ok(session)
}

/// Mark the appointment behind `session_id` confirmed and paid.
///
/// # Errors
///
/// `UnknownSession` when no appointment holds that checkout id.
pub async fn confirm(state: &AppState, session_id: &str) -> Result<Appointment, PaymentError> {
    let appointment = state
        .repos
        .appointments
        .confirm_payment(session_id)
        .await?
        .ok_or_else(|| PaymentError::UnknownSession(session_id.to_owned()))?;
    info!(appointment_id = %appointment.id, %session_id, "payment confirmed");
    Ok(appointment)
}

#[cfg(test)]
#[path = "payment_test.rs"]
mod tests;
