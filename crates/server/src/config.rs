//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GATEHOUSE_DATABASE_URL` - `PostgreSQL` connection string
//! - `GATEHOUSE_ACTIVATION_URL` - Frontend URL where activation codes are entered
//! - `GATEHOUSE_JWT_SECRET` - Session token signing secret (min 32 chars, high entropy)
//! - `GATEHOUSE_SMTP_HOST` - SMTP relay host
//! - `GATEHOUSE_SMTP_USERNAME` - SMTP username
//! - `GATEHOUSE_SMTP_PASSWORD` - SMTP password
//! - `GATEHOUSE_EMAIL_FROM` - From address for outbound mail
//!
//! ## Optional
//! - `GATEHOUSE_HOST` - Bind address (default: 127.0.0.1)
//! - `GATEHOUSE_PORT` - Listen port (default: 3000)
//! - `GATEHOUSE_TOKEN_VALIDITY_MINUTES` - Activation code window (default: 15)
//! - `GATEHOUSE_ACTIVATION_CODE_LENGTH` - Activation code digits (default: 6)
//! - `GATEHOUSE_JWT_VALIDITY_MINUTES` - Session token lifetime (default: 60)
//! - `GATEHOUSE_SMTP_PORT` - SMTP port (default: 587)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Blocklist of common placeholder patterns (case-insensitive).
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Frontend URL embedded in activation emails
    pub activation_url: String,
    /// Minutes an activation code stays valid
    pub token_validity_minutes: i64,
    /// Digits in a generated activation code
    pub activation_code_length: usize,
    /// Session token signing secret
    pub jwt_secret: SecretString,
    /// Minutes a session token stays valid
    pub jwt_validity_minutes: i64,
    /// Outbound email configuration
    pub email: EmailConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// SMTP configuration for the notifier.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required variable is missing, a
    /// value fails to parse, or the JWT secret is too weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = require("GATEHOUSE_JWT_SECRET")?;
        validate_signing_secret("GATEHOUSE_JWT_SECRET", &jwt_secret)?;

        Ok(Self {
            database_url: SecretString::from(require("GATEHOUSE_DATABASE_URL")?),
            host: parse_or("GATEHOUSE_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: parse_or("GATEHOUSE_PORT", 3000)?,
            activation_url: require("GATEHOUSE_ACTIVATION_URL")?,
            token_validity_minutes: parse_or("GATEHOUSE_TOKEN_VALIDITY_MINUTES", 15)?,
            activation_code_length: parse_or("GATEHOUSE_ACTIVATION_CODE_LENGTH", 6)?,
            jwt_secret: SecretString::from(jwt_secret),
            jwt_validity_minutes: parse_or("GATEHOUSE_JWT_VALIDITY_MINUTES", 60)?,
            email: EmailConfig {
                smtp_host: require("GATEHOUSE_SMTP_HOST")?,
                smtp_port: parse_or("GATEHOUSE_SMTP_PORT", 587)?,
                smtp_username: require("GATEHOUSE_SMTP_USERNAME")?,
                smtp_password: SecretString::from(require("GATEHOUSE_SMTP_PASSWORD")?),
                from_address: require("GATEHOUSE_EMAIL_FROM")?,
            },
            sentry_dsn: optional("SENTRY_DSN"),
            sentry_environment: optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Socket address to bind the listener to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_owned()))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(name.to_owned(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Reject signing secrets that are too short or look like placeholders.
fn validate_signing_secret(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            name.to_owned(),
            format!("must be at least {MIN_JWT_SECRET_LENGTH} characters"),
        ));
    }

    let lowered = value.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lowered.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                name.to_owned(),
                format!("contains placeholder pattern {pattern:?}"),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_secret_rejected() {
        let err = validate_signing_secret("X", "short").expect_err("too short");
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_placeholder_secret_rejected() {
        let err = validate_signing_secret("X", "changeme-changeme-changeme-changeme")
            .expect_err("placeholder");
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_strong_secret_accepted() {
        assert!(validate_signing_secret("X", "kx9QfWv37Lm5Zr8TnB41pYhJc0dGuEsA").is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = EmailConfig {
            smtp_host: "smtp.example.com".to_owned(),
            smtp_port: 587,
            smtp_username: "mailer".to_owned(),
            smtp_password: SecretString::from("hunter2hunter2".to_owned()),
            from_address: "no-reply@example.com".to_owned(),
        };

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
