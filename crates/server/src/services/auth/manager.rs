//! Credential verification.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordVerifier},
};

use gatehouse_core::Email;

use super::AuthError;
use crate::db::CredentialStore;
use crate::models::user::User;

/// Verifies an email/password pair against the credential store.
///
/// Account-state checks run before the password comparison, so a locked
/// or disabled account is reported as such even when the password is
/// wrong.
pub struct AuthenticationManager {
    users: Arc<dyn CredentialStore>,
}

impl AuthenticationManager {
    /// Create a new manager over the given store.
    #[must_use]
    pub fn new(users: Arc<dyn CredentialStore>) -> Self {
        Self { users }
    }

    /// Authenticate an email/password pair and return the account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::BadCredentials` if the email is unknown or
    /// the password does not match, `AuthError::AccountLocked` or
    /// `AuthError::AccountDisabled` for inactive accounts.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        // An unparseable email can't belong to any account; report it the
        // same way as an unknown one.
        let email = Email::parse(email).map_err(|_| AuthError::BadCredentials)?;

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::BadCredentials)?;

        if user.account_locked {
            return Err(AuthError::AccountLocked);
        }

        if !user.enabled {
            return Err(AuthError::AccountDisabled);
        }

        verify_password(password, &user.password_hash)?;

        Ok(user)
    }
}

/// Verify a password against an Argon2 hash.
pub(crate) fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::BadCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::BadCredentials)
}
