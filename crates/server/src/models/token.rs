//! Activation token domain types.

use chrono::{DateTime, Utc};

use gatehouse_core::{TokenId, UserId};

/// A single-use activation code delivered to a user by email.
///
/// A token is usable only while `validated_at` is `None` and the current
/// time is before `expires_at`. Consumed and expired tokens are kept for
/// audit, never deleted.
#[derive(Debug, Clone)]
pub struct ActivationToken {
    /// Unique token ID.
    pub id: TokenId,
    /// The numeric activation code. No uniqueness is enforced across
    /// outstanding tokens; lookups resolve to the earliest match.
    pub code: String,
    /// When the token was issued.
    pub created_at: DateTime<Utc>,
    /// End of the validity window.
    pub expires_at: DateTime<Utc>,
    /// Set exactly once, when the token is consumed.
    pub validated_at: Option<DateTime<Utc>>,
    /// The account this token activates.
    pub user_id: UserId,
}

impl ActivationToken {
    /// Whether the validity window has closed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Insert payload for a new activation token.
#[derive(Debug, Clone)]
pub struct NewActivationToken {
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_id: UserId,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let token = ActivationToken {
            id: TokenId::new(1),
            code: "123456".to_owned(),
            created_at: now,
            expires_at: now + Duration::minutes(15),
            validated_at: None,
            user_id: UserId::new(1),
        };

        assert!(!token.is_expired(now));
        assert!(!token.is_expired(now + Duration::minutes(14)));
        // the boundary itself counts as expired
        assert!(token.is_expired(now + Duration::minutes(15)));
        assert!(token.is_expired(now + Duration::minutes(16)));
    }
}
