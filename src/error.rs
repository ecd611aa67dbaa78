//! Error codes and the HTTP error envelope.
//!
//! DESIGN
//! ======
//! Every service error enum implements `ErrorCode`: a grepable `E_*` code,
//! the HTTP status it maps to, and a retryable flag. Route handlers return
//! `Result<_, ApiError>` and lean on `?`; the conversion logs server-side
//! failures once, here, so call sites stay quiet.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Grepable error code, HTTP status and retryable flag for structured errors.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn status(&self) -> StatusCode;

    fn retryable(&self) -> bool {
        false
    }
}

/// JSON error body: `{"code": "...", "message": "...", "retryable": false}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

/// Error returned from route handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, body: ErrorBody { code, message: message.into(), retryable: false } }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "E_UNAUTHORIZED", "authentication required")
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "E_FORBIDDEN", message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "E_NOT_FOUND", message)
    }
}

impl<E: ErrorCode> From<E> for ApiError {
    fn from(err: E) -> Self {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(code = err.error_code(), error = %err, "request failed");
        }
        Self {
            status,
            body: ErrorBody { code: err.error_code(), message: err.to_string(), retryable: err.retryable() },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
