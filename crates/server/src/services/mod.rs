//! Business logic services.
//!
//! # Services
//!
//! - `auth` - registration, account activation, credential authentication
//! - `email` - outbound activation email (SMTP notifier)
//! - `jwt` - session token signing

pub mod auth;
pub mod email;
pub mod jwt;
