//! Unified error handling with Sentry integration.
//!
//! Provides a unified [`AppError`] type that captures server-class
//! errors to Sentry before responding to the client. All route handlers
//! return `Result<T, AppError>`. Domain errors carry a kind, never
//! preformatted user text; the mapping to status codes and response
//! bodies lives here and only here.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;

/// Stable numeric business codes consumed by API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessErrorCode {
    AccountLocked,
    AccountDisabled,
    BadCredentials,
}

impl BusinessErrorCode {
    /// Numeric code carried in the response body.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::AccountLocked => 302,
            Self::AccountDisabled => 303,
            Self::BadCredentials => 304,
        }
    }

    /// Human-readable description of the code.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::AccountLocked => "User account is locked",
            Self::AccountDisabled => "User account is disabled",
            Self::BadCredentials => "Login and / or password is incorrect",
        }
    }
}

/// Application-level error type for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request payload failed field-level validation.
    #[error("validation failed")]
    Validation(Vec<String>),

    /// Authentication operation failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Database operation failed outside the auth service.
    #[error("database error: {0}")]
    Database(#[from] RepositoryError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    business_error_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    business_error_description: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_errors: Option<Vec<String>>,
}

impl ErrorResponse {
    const fn empty() -> Self {
        Self {
            business_error_code: None,
            business_error_description: None,
            error: None,
            validation_errors: None,
        }
    }

    fn business(code: BusinessErrorCode) -> Self {
        Self {
            business_error_code: Some(code.code()),
            business_error_description: Some(code.description()),
            ..Self::empty()
        }
    }

    fn message(text: impl Into<String>) -> Self {
        Self {
            error: Some(text.into()),
            ..Self::empty()
        }
    }
}

impl AppError {
    /// Whether this error is a server defect rather than a user mistake.
    const fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Internal(_) => true,
            Self::Auth(err) => matches!(
                err,
                AuthError::RoleNotFound(_)
                    | AuthError::PasswordHash
                    | AuthError::Jwt(_)
                    | AuthError::Notification(_)
                    | AuthError::Repository(_)
            ),
            Self::Validation(_) => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let (status, body) = match &self {
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    validation_errors: Some(errors.clone()),
                    ..ErrorResponse::empty()
                },
            ),
            Self::Auth(err) => match err {
                AuthError::TokenNotFound => (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::message("Invalid activation code"),
                ),
                AuthError::TokenAlreadyValidated => (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::message("Account is already activated"),
                ),
                AuthError::TokenExpired => (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::message(
                        "Activation code has expired, a new one has been sent",
                    ),
                ),
                AuthError::BadCredentials => (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::business(BusinessErrorCode::BadCredentials),
                ),
                AuthError::AccountDisabled => (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::business(BusinessErrorCode::AccountDisabled),
                ),
                AuthError::AccountLocked => (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::business(BusinessErrorCode::AccountLocked),
                ),
                AuthError::RoleNotFound(_)
                | AuthError::PasswordHash
                | AuthError::Jwt(_)
                | AuthError::Notification(_)
                | AuthError::Repository(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::message("Internal server error"),
                ),
            },
            Self::Database(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::message("Internal server error"),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
