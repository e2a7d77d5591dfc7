//! services/api/src/web/middleware.rs
//!
//! Authentication and authorization middleware for protecting routes.
//!
//! `require_auth` runs first and puts the caller's `Identity` into the request
//! extensions. `require_role` and `require_permission` read it back; they are
//! independent and a route may carry either or both.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use bookstore_core::{AccessGate, AuthError, Identity};
use std::sync::Arc;

use crate::error::ApiError;
use crate::web::state::AppState;

/// The request header carrying the session token.
pub const AUTH_HEADER: &str = "auth";
const BEARER_PREFIX: &str = "Bearer ";

/// Validates the `auth: Bearer <token>` header.
///
/// If valid, inserts the caller's `Identity` into request extensions for
/// downstream layers and handlers. If missing or invalid, returns 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;

    let identity = state.tokens.validate(token)?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Allows the request only when the token's role claim equals `role`.
pub async fn require_role(
    State(role): State<&'static str>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = identity_of(&req)?;
    AccessGate::require_role(identity, role)?;
    Ok(next.run(req).await)
}

/// Allows the request only when the persisted mapping grants `permission`
/// to the caller.
pub async fn require_permission(
    State((state, permission)): State<(Arc<AppState>, &'static str)>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = identity_of(&req)?;
    state.gate.require_permission(identity, permission).await?;
    Ok(next.run(req).await)
}

fn identity_of(req: &Request) -> Result<&Identity, AuthError> {
    req.extensions()
        .get::<Identity>()
        .ok_or(AuthError::MissingIdentity)
}
