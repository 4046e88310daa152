//! services/api/src/web/auth.rs
//!
//! Local-password registration and login. Logged-in users receive a signed
//! bearer token; provider-issued identities never pass through here.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, Json};
use cim_analyzer_core::{AnalysisError, PortError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::extract::ValidatedJson;
use crate::web::rest::MessageResponse;
use crate::web::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// A single `@` with something on both sides, and a dot in the domain.
pub fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /register - Create a local-password account
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered", body = MessageResponse),
        (status = 400, description = "Email already registered or invalid", body = crate::error::ErrorBody),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = req.email.trim();
    info!(email = %email, "Registration attempt");
    if !is_plausible_email(email) {
        return Err(AnalysisError::InvalidInput("Please enter a valid email address.".to_string()).into());
    }
    if req.password.is_empty() {
        return Err(AnalysisError::InvalidInput("Password must not be empty.".to_string()).into());
    }

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))?
        .to_string();

    // 2. Create the user
    let user_id = Uuid::new_v4().to_string();
    state
        .db
        .create_user_with_email(&user_id, email, &password_hash)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => {
                warn!(email = %email, "Email already registered");
                ApiError::from(AnalysisError::Conflict("Email already registered".to_string()))
            }
            other => other.into(),
        })?;

    info!(user_id = %user_id, "User registered");
    Ok(Json(MessageResponse::new("User registered successfully")))
}

/// POST /login - Exchange email and password for a bearer token
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorBody),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let email = req.email.trim();
    info!(email = %email, "Login attempt");

    // 1. Get user by email
    let creds = state.db.get_user_by_email(email).await.map_err(|e| match e {
        PortError::NotFound(_) => {
            warn!(email = %email, "Unknown email");
            ApiError::from(AnalysisError::Unauthenticated(INVALID_CREDENTIALS.to_string()))
        }
        other => other.into(),
    })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&creds.hashed_password)
        .map_err(|e| ApiError::Internal(format!("Failed to parse password hash: {}", e)))?;
    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        warn!(email = %email, "Invalid password");
        return Err(AnalysisError::Unauthenticated(INVALID_CREDENTIALS.to_string()).into());
    }

    // 3. Issue the token
    let access_token = state.tokens.issue(&creds.user_id)?;
    info!(user_id = %creds.user_id, "User logged in");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}
