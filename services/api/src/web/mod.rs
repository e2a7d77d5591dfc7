pub mod auth;
pub mod authors;
pub mod books;
pub mod middleware;
pub mod orders;
pub mod rest;
pub mod router;
pub mod state;

use axum::extract::{
    rejection::{JsonRejection, PathRejection},
    Json, Path,
};
use tracing::debug;

use crate::error::ApiError;

// Re-export the router builder and state so the binary only needs one import path.
pub use router::build_router;
pub use state::{AppState, Repositories};

/// Unwraps a JSON body, turning any decode failure into a 400.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        debug!("Rejected request body: {}", rejection.body_text());
        ApiError::BadRequest("Invalid request body".to_string())
    })
}

/// Unwraps the `{id}` path segment, turning a non-integer into a 400.
pub(crate) fn path_id(id: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|_| ApiError::BadRequest("Invalid or missing 'id' parameter".to_string()))
}
