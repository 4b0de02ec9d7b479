//! User and role domain types.

use chrono::{DateTime, Utc};

use gatehouse_core::{Email, RoleId, UserId};

/// A named role granted to users.
///
/// Roles are reference data: created out of band (the initial migration
/// seeds `USER`) and never mutated by this server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    /// Unique role ID.
    pub id: RoleId,
    /// Unique role name, e.g. `USER`.
    pub name: String,
}

/// A registered account (domain type).
///
/// `enabled` stays `false` until the account is activated; a disabled
/// user must never authenticate successfully.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// The user's email address, unique across accounts.
    pub email: Email,
    /// Argon2 hash of the password. The plaintext is never stored.
    pub password_hash: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Whether the account has been activated.
    pub enabled: bool,
    /// Whether the account is administratively locked.
    pub account_locked: bool,
    /// Roles granted to this account (references, not copies).
    pub roles: Vec<Role>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Display name used for email greetings and the `fullname` claim.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Names of the granted roles, for claims assembly.
    #[must_use]
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|role| role.name.clone()).collect()
    }
}

/// Insert payload for a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub enabled: bool,
    pub account_locked: bool,
    pub roles: Vec<Role>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(1),
            email: Email::parse("user@example.com").expect("valid email"),
            password_hash: String::new(),
            first_name: first.to_owned(),
            last_name: last.to_owned(),
            enabled: false,
            account_locked: false,
            roles: vec![Role {
                id: RoleId::new(1),
                name: "USER".to_owned(),
            }],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_full_name() {
        assert_eq!(user("Ada", "Lovelace").full_name(), "Ada Lovelace");
    }

    #[test]
    fn test_role_names() {
        assert_eq!(user("A", "B").role_names(), vec!["USER".to_owned()]);
    }
}
