//! Session token signing.
//!
//! The signed token is the only session record: nothing is retained
//! server side, and verification on subsequent requests belongs to the
//! request-authorization layer, not to this service.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::user::User;

/// Errors from signing or decoding session tokens.
#[derive(Debug, Error)]
pub enum JwtError {
    /// Token could not be signed.
    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// Token failed signature or expiry validation.
    #[error("token validation failed: {0}")]
    Validation(#[source] jsonwebtoken::errors::Error),
}

/// Identity claims assembled by the caller.
#[derive(Debug, Clone)]
pub struct SessionClaims {
    /// The authenticated email address.
    pub email: String,
    /// Names of the granted roles.
    pub roles: Vec<String>,
    /// Display name.
    pub fullname: String,
}

/// Full payload of the signed session token: the identity claims plus
/// the registered claims stamped on at signing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user ID.
    pub sub: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// The authenticated email address.
    pub email: String,
    /// Names of the granted roles.
    pub roles: Vec<String>,
    /// Display name.
    pub fullname: String,
}

/// Signs session tokens with a server-held HS256 secret.
pub struct JwtService {
    secret: SecretString,
    validity: Duration,
}

impl JwtService {
    /// Create a new signer.
    #[must_use]
    pub fn new(secret: SecretString, validity: Duration) -> Self {
        Self { secret, validity }
    }

    /// Produce a signed session token from identity claims and the
    /// authenticated subject.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::Signing`] if encoding fails.
    pub fn generate_token(
        &self,
        claims: SessionClaims,
        subject: &User,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.validity).timestamp(),
            email: claims.email,
            roles: claims.roles,
            fullname: claims.fullname,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )
        .map_err(JwtError::Signing)
    }

    /// Decode and validate a session token.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::Validation`] on a bad signature or an expired
    /// token.
    pub fn decode_token(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(JwtError::Validation)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use gatehouse_core::{RoleId, UserId};

    use super::*;
    use crate::models::user::{Role, User};

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: UserId::new(7),
            email: gatehouse_core::Email::parse("ada@example.com").unwrap(),
            password_hash: String::new(),
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            enabled: true,
            account_locked: false,
            roles: vec![Role {
                id: RoleId::new(1),
                name: "USER".to_owned(),
            }],
            created_at: now,
            updated_at: now,
        }
    }

    fn service(validity_minutes: i64) -> JwtService {
        JwtService::new(
            SecretString::from("a-test-only-signing-secret-of-decent-length".to_owned()),
            Duration::minutes(validity_minutes),
        )
    }

    fn claims_for(user: &User) -> SessionClaims {
        SessionClaims {
            email: user.email.to_string(),
            roles: user.role_names(),
            fullname: user.full_name(),
        }
    }

    #[test]
    fn test_sign_and_decode_round_trip() {
        let jwt = service(60);
        let user = test_user();
        let token = jwt.generate_token(claims_for(&user), &user).unwrap();
        let claims = jwt.decode_token(&token).unwrap();

        assert_eq!(claims.sub, "7");
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.roles, vec!["USER".to_owned()]);
        assert_eq!(claims.fullname, "Ada Lovelace");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        // validity far enough in the past to defeat default leeway
        let jwt = service(-10);
        let user = test_user();
        let token = jwt.generate_token(claims_for(&user), &user).unwrap();

        assert!(matches!(
            jwt.decode_token(&token),
            Err(JwtError::Validation(_))
        ));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let jwt = service(60);
        let other = JwtService::new(
            SecretString::from("an-entirely-different-signing-secret".to_owned()),
            Duration::minutes(60),
        );

        let user = test_user();
        let token = jwt.generate_token(claims_for(&user), &user).unwrap();
        assert!(matches!(
            other.decode_token(&token),
            Err(JwtError::Validation(_))
        ));
    }
}
