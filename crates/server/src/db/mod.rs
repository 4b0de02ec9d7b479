//! Persistence layer: store contracts and their implementations.
//!
//! The service layer depends only on the store traits below. The
//! `PostgreSQL` implementations live in [`postgres`]; an in-memory
//! implementation used by the test suite and for local development
//! lives in [`memory`].
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via
//! `sqlx migrate run`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use gatehouse_core::{Email, TokenId, UserId};

use crate::models::token::{ActivationToken, NewActivationToken};
use crate::models::user::{NewUser, Role, User};

pub mod memory;
pub mod postgres;

/// Errors from store implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Underlying database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unique or conditional-update constraint violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value could not be mapped back to a domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Store for user identity records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a user by email address.
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Look up a user by ID.
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Persist a new user and return it with its assigned ID.
    async fn save(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Persist changes to the mutable account flags.
    async fn update(&self, user: &User) -> Result<(), RepositoryError>;
}

/// Store for named roles. Roles are read-only reference data here.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Look up a role by its unique name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Role>, RepositoryError>;
}

/// Store for activation tokens.
#[async_trait]
pub trait ActivationTokenStore: Send + Sync {
    /// Look up a token by its activation code. Codes are not unique;
    /// the earliest-created match wins.
    async fn find_by_code(&self, code: &str) -> Result<Option<ActivationToken>, RepositoryError>;

    /// Persist a new token and return it with its assigned ID.
    async fn save(&self, token: NewActivationToken) -> Result<ActivationToken, RepositoryError>;

    /// Mark a token consumed. The update is conditional on the token not
    /// having been consumed yet; losing that race returns
    /// [`RepositoryError::Conflict`].
    async fn mark_validated(&self, id: TokenId, at: DateTime<Utc>) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
