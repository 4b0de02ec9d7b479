//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::email::NotificationError;
use crate::services::jwt::JwtError;

/// Errors raised by the authentication service.
///
/// These are domain-level kinds; translation to wire responses happens
/// in the boundary error mapper, never here.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required role is missing from the store. This is a deployment
    /// defect, not a user error.
    #[error("role not found: {0}")]
    RoleNotFound(String),

    /// Activation code not present in the store.
    #[error("activation token not found")]
    TokenNotFound,

    /// Replay of an already-consumed activation code.
    #[error("activation token already validated")]
    TokenAlreadyValidated,

    /// Activation code past its validity window. A fresh code has
    /// already been sent when this is returned.
    #[error("activation token expired, a new one has been sent")]
    TokenExpired,

    /// Email/password mismatch.
    #[error("bad credentials")]
    BadCredentials,

    /// The account exists but has not been activated.
    #[error("account disabled")]
    AccountDisabled,

    /// The account exists but is locked.
    #[error("account locked")]
    AccountLocked,

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Session token could not be signed.
    #[error(transparent)]
    Jwt(#[from] JwtError),

    /// The notifier could not schedule the activation email.
    #[error("notification failure: {0}")]
    Notification(#[from] NotificationError),

    /// Store failure.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}
