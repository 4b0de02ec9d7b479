//! In-memory store implementations.
//!
//! Used by the test suite and for local development without a database.
//! Mutations take a write lock; `mark_validated` performs the same
//! conditional check as the `PostgreSQL` implementation, so concurrency
//! behavior matches across backends.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gatehouse_core::{Email, RoleId, TokenId, UserId};

use super::{
    ActivationTokenStore, CredentialStore, RepositoryError, RoleStore,
};
use crate::models::token::{ActivationToken, NewActivationToken};
use crate::models::user::{NewUser, Role, User};

/// In-memory [`CredentialStore`].
#[derive(Default)]
pub struct MemoryCredentialStore {
    state: Mutex<UserState>,
}

#[derive(Default)]
struct UserState {
    users: Vec<User>,
    next_id: i64,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state.users.iter().find(|u| &u.email == email).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn save(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        state.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: UserId::new(state.next_id),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            enabled: user.enabled,
            account_locked: user.account_locked,
            roles: user.roles,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());

        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(stored) = state.users.iter_mut().find(|u| u.id == user.id) {
            stored.enabled = user.enabled;
            stored.account_locked = user.account_locked;
            stored.updated_at = Utc::now();
        }

        Ok(())
    }
}

/// In-memory [`RoleStore`].
#[derive(Default)]
pub struct MemoryRoleStore {
    roles: Vec<Role>,
}

impl MemoryRoleStore {
    /// Create a store with no roles at all. Useful for exercising the
    /// missing-role configuration failure.
    #[must_use]
    pub const fn empty() -> Self {
        Self { roles: Vec::new() }
    }

    /// Create a store seeded with the given role names.
    #[must_use]
    pub fn with_roles(names: &[&str]) -> Self {
        let roles = names
            .iter()
            .enumerate()
            .map(|(i, name)| Role {
                id: RoleId::new(i as i64 + 1),
                name: (*name).to_owned(),
            })
            .collect();
        Self { roles }
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<Role>, RepositoryError> {
        Ok(self.roles.iter().find(|r| r.name == name).cloned())
    }
}

/// In-memory [`ActivationTokenStore`].
#[derive(Default)]
pub struct MemoryActivationTokenStore {
    state: Mutex<TokenState>,
}

#[derive(Default)]
struct TokenState {
    tokens: Vec<ActivationToken>,
    next_id: i64,
}

impl MemoryActivationTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored token, in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<ActivationToken> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.tokens.clone()
    }

    /// Rewind a token's validity window so it reads as expired.
    #[cfg(test)]
    pub(crate) fn force_expire(&self, code: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = state.tokens.iter_mut().find(|t| t.code == code) {
            token.expires_at = Utc::now() - chrono::Duration::minutes(1);
        }
    }
}

#[async_trait]
impl ActivationTokenStore for MemoryActivationTokenStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<ActivationToken>, RepositoryError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state.tokens.iter().find(|t| t.code == code).cloned())
    }

    async fn save(&self, token: NewActivationToken) -> Result<ActivationToken, RepositoryError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        state.next_id += 1;
        let token = ActivationToken {
            id: TokenId::new(state.next_id),
            code: token.code,
            created_at: token.created_at,
            expires_at: token.expires_at,
            validated_at: None,
            user_id: token.user_id,
        };
        state.tokens.push(token.clone());

        Ok(token)
    }

    async fn mark_validated(&self, id: TokenId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let token = state
            .tokens
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| RepositoryError::Conflict("token not found".to_owned()))?;

        if token.validated_at.is_some() {
            return Err(RepositoryError::Conflict(
                "token already validated".to_owned(),
            ));
        }

        token.validated_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn new_token(code: &str, user_id: i64) -> NewActivationToken {
        let now = Utc::now();
        NewActivationToken {
            code: code.to_owned(),
            created_at: now,
            expires_at: now + Duration::minutes(15),
            user_id: UserId::new(user_id),
        }
    }

    #[tokio::test]
    async fn test_mark_validated_is_single_shot() {
        let store = MemoryActivationTokenStore::new();
        let token = store.save(new_token("123456", 1)).await.unwrap();

        store.mark_validated(token.id, Utc::now()).await.unwrap();

        // the second consumption attempt loses the conditional update
        let err = store.mark_validated(token.id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_duplicate_codes_resolve_to_earliest() {
        let store = MemoryActivationTokenStore::new();
        let first = store.save(new_token("999999", 1)).await.unwrap();
        let _second = store.save(new_token("999999", 2)).await.unwrap();

        let found = store.find_by_code("999999").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryCredentialStore::new();
        let user = NewUser {
            email: Email::parse("dup@example.com").unwrap(),
            password_hash: "hash".to_owned(),
            first_name: "A".to_owned(),
            last_name: "B".to_owned(),
            enabled: false,
            account_locked: false,
            roles: Vec::new(),
        };

        store.save(user.clone()).await.unwrap();
        let err = store.save(user).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
