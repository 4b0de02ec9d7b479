//! `PostgreSQL` store implementations.
//!
//! Queries are runtime-checked and map rows to domain types through
//! internal row structs, so schema details stay out of the service
//! layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use gatehouse_core::{Email, RoleId, TokenId, UserId};

use super::{
    ActivationTokenStore, CredentialStore, RepositoryError, RoleStore,
};
use crate::models::token::{ActivationToken, NewActivationToken};
use crate::models::user::{NewUser, Role, User};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    enabled: bool,
    account_locked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self, roles: Vec<Role>) -> Result<User, RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(User {
            id: UserId::new(self.id),
            email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            enabled: self.enabled,
            account_locked: self.account_locked,
            roles,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Internal row type for role queries.
#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    id: i64,
    name: String,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Self {
            id: RoleId::new(row.id),
            name: row.name,
        }
    }
}

/// Internal row type for activation token queries.
#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    id: i64,
    code: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    validated_at: Option<DateTime<Utc>>,
    user_id: i64,
}

impl From<TokenRow> for ActivationToken {
    fn from(row: TokenRow) -> Self {
        Self {
            id: TokenId::new(row.id),
            code: row.code,
            created_at: row.created_at,
            expires_at: row.expires_at,
            validated_at: row.validated_at,
            user_id: UserId::new(row.user_id),
        }
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, \
                            enabled, account_locked, created_at, updated_at";

// =============================================================================
// Credential Store
// =============================================================================

/// `PostgreSQL`-backed [`CredentialStore`].
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Create a new store over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn roles_for(&self, id: UserId) -> Result<Vec<Role>, RepositoryError> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT r.id, r.name FROM roles r \
             JOIN user_roles ur ON ur.role_id = r.id \
             WHERE ur.user_id = $1 ORDER BY r.id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn load(&self, row: Option<UserRow>) -> Result<Option<User>, RepositoryError> {
        match row {
            Some(row) => {
                let roles = self.roles_for(UserId::new(row.id)).await?;
                row.into_user(roles).map(Some)
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        self.load(row).await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.load(row).await
    }

    async fn save(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (email, password_hash, first_name, last_name, \
                                enabled, account_locked) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.enabled)
        .bind(user.account_locked)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("email already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        for role in &user.roles {
            sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
                .bind(row.id)
                .bind(role.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        row.into_user(user.roles)
    }

    async fn update(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE users SET enabled = $2, account_locked = $3, updated_at = now() \
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(user.enabled)
        .bind(user.account_locked)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Role Store
// =============================================================================

/// `PostgreSQL`-backed [`RoleStore`].
#[derive(Clone)]
pub struct PgRoleStore {
    pool: PgPool,
}

impl PgRoleStore {
    /// Create a new store over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleStore for PgRoleStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<Role>, RepositoryError> {
        let row = sqlx::query_as::<_, RoleRow>("SELECT id, name FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Role::from))
    }
}

// =============================================================================
// Activation Token Store
// =============================================================================

/// `PostgreSQL`-backed [`ActivationTokenStore`].
#[derive(Clone)]
pub struct PgActivationTokenStore {
    pool: PgPool,
}

impl PgActivationTokenStore {
    /// Create a new store over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivationTokenStore for PgActivationTokenStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<ActivationToken>, RepositoryError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT id, code, created_at, expires_at, validated_at, user_id \
             FROM activation_tokens WHERE code = $1 ORDER BY id LIMIT 1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ActivationToken::from))
    }

    async fn save(&self, token: NewActivationToken) -> Result<ActivationToken, RepositoryError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "INSERT INTO activation_tokens (code, created_at, expires_at, user_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, code, created_at, expires_at, validated_at, user_id",
        )
        .bind(&token.code)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ActivationToken::from(row))
    }

    async fn mark_validated(&self, id: TokenId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE activation_tokens SET validated_at = $2 \
             WHERE id = $1 AND validated_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(
                "token already validated".to_owned(),
            ));
        }

        Ok(())
    }
}
