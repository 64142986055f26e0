//! Error taxonomy shared by services and routes.
//!
//! DESIGN
//! ======
//! Each service owns a `thiserror` enum and implements [`ErrorCode`], which
//! gives every failure a stable grepable code (`E_*`), a retry hint, and an
//! HTTP status. Handlers return `Result<_, ApiError>`; the `?` operator turns
//! any service error into the JSON body
//! `{"error": "...", "code": "E_...", "retryable": false}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Trait for typed errors that carry a stable code and HTTP mapping.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }

    fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

// =============================================================================
// API ERROR
// =============================================================================

/// Error rendered to HTTP clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

#[derive(Serialize)]
struct ApiErrorBody<'a> {
    error: &'a str,
    code: &'a str,
    retryable: bool,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), retryable: false }
    }

    /// A required request field was absent or blank.
    #[must_use]
    pub fn missing_field(field: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "E_MISSING_FIELD", format!("{field} is required"))
    }

    #[must_use]
    pub fn invalid_field(field: &str, reason: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "E_INVALID_FIELD", format!("{field}: {reason}"))
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "E_UNAUTHORIZED", "authentication required")
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "E_FORBIDDEN", message)
    }
}

impl<E: ErrorCode> From<E> for ApiError {
    fn from(err: E) -> Self {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(code = err.error_code(), error = %err, "request failed");
        }
        Self { status, code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody { error: &self.message, code: self.code, retryable: self.retryable };
        (self.status, Json(body)).into_response()
    }
}

/// Reject blank strings; returns the trimmed value.
///
/// # Errors
///
/// Returns `E_MISSING_FIELD` when the value is absent or whitespace-only.
pub fn require<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::missing_field(field)),
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
