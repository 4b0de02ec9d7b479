//! Authentication route handlers.
//!
//! Handlers validate the request payload, delegate to the
//! authentication service, and let [`AppError`](crate::error::AppError)
//! shape the response.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use gatehouse_core::Email;

use crate::error::{AppError, Result};
use crate::services::auth::Registration;
use crate::state::AppState;

/// Minimum password length accepted at registration.
const MIN_PASSWORD_LENGTH: usize = 8;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub firstname: String,
    pub lastname: String,
}

/// Authentication request body.
#[derive(Debug, Deserialize)]
pub struct AuthenticationRequest {
    pub email: String,
    pub password: String,
}

/// Authentication response body.
#[derive(Debug, Serialize)]
pub struct AuthenticationResponse {
    pub token: String,
}

/// Query parameters for account activation.
#[derive(Debug, Deserialize)]
pub struct ActivateQuery {
    pub code: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new account.
///
/// Returns `202 Accepted` with no body: activation happens out of band,
/// so there is nothing useful to return here.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<StatusCode> {
    let registration = validate_registration(&request)?;
    state.auth().register(registration).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Exchange credentials for a signed session token.
pub async fn authenticate(
    State(state): State<AppState>,
    Json(request): Json<AuthenticationRequest>,
) -> Result<Json<AuthenticationResponse>> {
    validate_authentication(&request)?;
    let token = state
        .auth()
        .authenticate(&request.email, &request.password)
        .await?;
    Ok(Json(AuthenticationResponse { token }))
}

/// Consume an activation code.
pub async fn activate(
    State(state): State<AppState>,
    Query(query): Query<ActivateQuery>,
) -> Result<StatusCode> {
    state.auth().activate(&query.code).await?;
    Ok(StatusCode::OK)
}

// =============================================================================
// Validation
// =============================================================================

fn validate_registration(request: &RegisterRequest) -> Result<Registration> {
    let mut errors = Vec::new();

    let email = match Email::parse(&request.email) {
        Ok(email) => Some(email),
        Err(err) => {
            errors.push(format!("email: {err}"));
            None
        }
    };

    if request.password.len() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "password: must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }

    if request.firstname.trim().is_empty() {
        errors.push("firstname: must not be empty".to_owned());
    }

    if request.lastname.trim().is_empty() {
        errors.push("lastname: must not be empty".to_owned());
    }

    match email {
        Some(email) if errors.is_empty() => Ok(Registration {
            email,
            password: request.password.clone(),
            first_name: request.firstname.trim().to_owned(),
            last_name: request.lastname.trim().to_owned(),
        }),
        _ => Err(AppError::Validation(errors)),
    }
}

fn validate_authentication(request: &AuthenticationRequest) -> Result<()> {
    let mut errors = Vec::new();

    if let Err(err) = Email::parse(&request.email) {
        errors.push(format!("email: {err}"));
    }

    if request.password.is_empty() {
        errors.push("password: must not be empty".to_owned());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}
