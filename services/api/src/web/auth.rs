//! services/api/src/web/auth.rs
//!
//! User endpoints: registration, login and lookup by username.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bookstore_core::{PortError, ServiceError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::web::json_body;
use crate::web::state::AppState;

/// Role given to self-registered users.
pub const DEFAULT_ROLE: &str = "user";

const INVALID_CREDENTIALS: &str = "Invalid username or password";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub id: i64,
    pub username: String,
    pub token: String,
}

/// Lookup keys are capitalised; existing clients read `ID` and `Username`.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Username")]
    pub username: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub id: i64,
    pub username: String,
    pub role: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    #[serde(default)]
    pub username: String,
}

//=========================================================================================
// Password Hashing
//=========================================================================================

/// Hashes a password into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

fn verify_password(password: &str, hashed: &str) -> bool {
    match PasswordHash::new(hashed) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            error!("Failed to parse password hash: {:?}", e);
            false
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /user/register - Create a new account with the default role
#[utoipa::path(
    post,
    path = "/user/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "User created", body = RegisterResponse),
        (status = 400, description = "Missing fields or username taken"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = json_body(body)?;
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let user = state
        .users
        .create_user(req.username.trim(), &password_hash, DEFAULT_ROLE, Utc::now())
        .await
        .map_err(|e| ServiceError::from_port("failed to create user", e))?;
    info!(user_id = user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            username: user.username,
            role: user.role,
        }),
    ))
}

/// POST /user/login - Exchange credentials for a session token
#[utoipa::path(
    post,
    path = "/user/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid request body"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Failed to generate token")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let req = json_body(body)?;

    let creds = state
        .users
        .get_credentials(&req.username)
        .await
        .map_err(|e| {
            if !matches!(e, PortError::NotFound(_)) {
                error!("Failed to get user: {:?}", e);
            }
            ApiError::Unauthorized(INVALID_CREDENTIALS.to_string())
        })?;

    if !verify_password(&req.password, &creds.hashed_password) {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let token = state.tokens.issue(creds.id, &creds.username, &creds.role)?;
    info!(user_id = creds.id, "user logged in");

    Ok(Json(LoginResponse {
        id: creds.id,
        username: creds.username,
        token,
    }))
}

/// GET /users?username= - Look a user up by username
#[utoipa::path(
    get,
    path = "/users",
    params(UserQuery),
    responses(
        (status = 200, description = "The user", body = UserResponse),
        (status = 400, description = "Username is required"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<UserResponse>, ApiError> {
    if query.username.is_empty() {
        return Err(ApiError::BadRequest("Username is required".to_string()));
    }
    let user = state
        .users
        .get_user_by_username(&query.username)
        .await
        .map_err(|e| ServiceError::from_port("get user", e))?;
    Ok(Json(UserResponse {
        id: user.id,
        username: user.username,
    }))
}
