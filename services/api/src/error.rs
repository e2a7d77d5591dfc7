//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered as an HTTP response.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bookstore_core::{AuthError, ServiceError};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core services.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Authentication or authorization failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The request could not be decoded.
    #[error("{0}")]
    BadRequest(String),

    /// Login failed. The message never says which part was wrong.
    #[error("{0}")]
    Unauthorized(String),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Service(err) => match err {
                ServiceError::Validation(_)
                | ServiceError::InsufficientStock { .. }
                | ServiceError::Conflict(_) => StatusCode::BAD_REQUEST,
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ServiceError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(err) if err.is_unauthenticated() => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::TokenIssue(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the logs; clients get a trace id to quote.
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            let trace_id = Uuid::new_v4();
            error!(%trace_id, "Request failed: {:?}", self);
            let body = json!({ "error": "internal server error", "trace_id": trace_id });
            return (status, Json(body)).into_response();
        }

        let retryable = matches!(&self, Self::Service(err) if err.is_retryable());
        let body = Json(json!({ "error": self.to_string() }));
        if retryable {
            return (status, [(header::RETRY_AFTER, "1")], body).into_response();
        }
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use bookstore_core::PortError;
    use rstest::rstest;

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[rstest]
    #[case(ServiceError::NotFound("no orders found".into()).into(), StatusCode::NOT_FOUND)]
    #[case(ServiceError::Conflict("taken".into()).into(), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::InsufficientStock { book_id: 1, requested: 3, available: 2 }.into(), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::Unavailable("book 1 is busy".into()).into(), StatusCode::SERVICE_UNAVAILABLE)]
    #[case(AuthError::MissingToken.into(), StatusCode::UNAUTHORIZED)]
    #[case(AuthError::InvalidToken.into(), StatusCode::UNAUTHORIZED)]
    #[case(AuthError::Forbidden.into(), StatusCode::FORBIDDEN)]
    #[case(AuthError::PermissionDenied.into(), StatusCode::FORBIDDEN)]
    #[case(ApiError::BadRequest("Invalid request body".into()), StatusCode::BAD_REQUEST)]
    #[case(ApiError::Unauthorized("Invalid username or password".into()), StatusCode::UNAUTHORIZED)]
    fn maps_error_kinds_to_status(#[case] err: ApiError, #[case] expected: StatusCode) {
        assert_eq!(err.status_code(), expected);
    }

    #[tokio::test]
    async fn client_errors_carry_the_message() {
        let (status, body) = body_of(AuthError::InvalidToken.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Token is invalid or expired");
    }

    #[tokio::test]
    async fn storage_errors_do_not_leak_driver_text() {
        let err: ApiError = ServiceError::from_port(
            "list orders",
            PortError::Unexpected("relation \"orders\" does not exist".into()),
        )
        .into();
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal server error");
        assert!(body["trace_id"].is_string());
        assert!(!body.to_string().contains("relation"));
    }
}
