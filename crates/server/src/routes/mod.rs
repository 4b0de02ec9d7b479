//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (verifies database)
//!
//! # Auth
//! POST /auth/register          - Register a new account (202 Accepted)
//! POST /auth/authenticate      - Exchange credentials for a session token
//! GET  /auth/activate-account  - Consume an activation code (?code=...)
//! ```

pub mod auth;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Build the application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/authenticate", post(auth::authenticate))
        .route("/auth/activate-account", get(auth::activate))
}
