// Error handling types for the auth API

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use super::validation::ValidationResult;

/// Failure taxonomy shared by every auth operation.
///
/// Messages are the exact strings surfaced to clients, so store and
/// provider details never leak through them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Transient(String),
}

impl AuthError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AuthError::Validation(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        AuthError::Unauthenticated(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AuthError::Forbidden(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        AuthError::Transient(msg.into())
    }

    /// HTTP status for this error. Missing records fold into an
    /// authentication-shaped response.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::Conflict(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::Unauthenticated(_)
            | AuthError::NotFound(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::Transient(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::Unauthenticated(_) => "UNAUTHORIZED",
            AuthError::Forbidden(_) => "FORBIDDEN",
            AuthError::Conflict(_) => "CONFLICT",
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::Transient(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// JSON error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Auth operation failed");
        }

        let error_response = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: self.code().to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<ValidationResult> for AuthError {
    fn from(result: ValidationResult) -> Self {
        if result.is_valid {
            AuthError::Transient("Validation result was valid but converted to error".to_string())
        } else {
            AuthError::Validation(result.messages().join(", "))
        }
    }
}
