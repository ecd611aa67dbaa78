//! Mock payment routes.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::models::Appointment;
use crate::services::payment::{self, CheckoutRequest, CheckoutSession};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConfirmBody {
    pub session_id: String,
}

/// `POST /api/payments/checkout`
pub async fn checkout(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutSession>, ApiError> {
    Ok(Json(payment::checkout(&state, &request, auth.user_id).await?))
}

/// `POST /api/payments/confirm`
pub async fn confirm(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(body): Json<ConfirmBody>,
) -> Result<Json<Appointment>, ApiError> {
    Ok(Json(payment::confirm(&state, &body.session_id).await?))
}
