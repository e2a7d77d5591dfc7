//! crates/bookstore_core/src/error.rs
//!
//! Error taxonomy shared by every service in the core.

use crate::ports::PortError;

/// Bad input shape or range. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The error type returned by the core services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(String),

    #[error("not enough stock available")]
    InsufficientStock {
        book_id: i64,
        requested: i32,
        available: i32,
    },

    #[error("{0}")]
    Conflict(String),

    /// A lock could not be acquired in time. Callers may retry.
    #[error("{0}")]
    Unavailable(String),

    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: PortError,
    },
}

impl ServiceError {
    /// Wraps a storage failure with the operation that produced it, keeping
    /// not-found and lock-timeout failures in their own kinds.
    pub fn from_port(context: impl Into<String>, source: PortError) -> Self {
        match source {
            PortError::NotFound(message) => Self::NotFound(message),
            PortError::Duplicate(message) => Self::Conflict(message),
            PortError::LockTimeout(resource) => Self::Unavailable(format!(
                "{} is temporarily unavailable, please retry",
                resource
            )),
            source @ PortError::Unexpected(_) => Self::Storage {
                context: context.into(),
                source,
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Authentication and authorization failures.
///
/// Messages are deliberately generic; token holders never see why a token
/// was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing or invalid token")]
    MissingToken,
    #[error("Token is invalid or expired")]
    InvalidToken,
    #[error("User ID not found")]
    MissingIdentity,
    #[error("Access denied")]
    Forbidden,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Failed to generate token")]
    TokenIssue(String),
}

impl AuthError {
    /// `true` for the 401 family, `false` for 403 and issuing failures.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::MissingToken | Self::InvalidToken | Self::MissingIdentity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_becomes_retryable_unavailable() {
        let err = ServiceError::from_port("lock book 4", PortError::LockTimeout("book 4".into()));
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "book 4 is temporarily unavailable, please retry");
    }

    #[test]
    fn unexpected_port_error_keeps_context() {
        let err = ServiceError::from_port("list orders", PortError::Unexpected("db down".into()));
        assert!(!err.is_retryable());
        assert!(matches!(err, ServiceError::Storage { ref context, .. } if context == "list orders"));
        assert_eq!(err.to_string(), "list orders: An unexpected error occurred: db down");
    }

    #[test]
    fn not_found_port_error_keeps_its_message() {
        let err = ServiceError::from_port("get order", PortError::NotFound("order with ID 9 not found".into()));
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "order with ID 9 not found"));
    }
}
