//! Error taxonomy for login and session lookups.

use crate::domain::foundation::{DomainError, ErrorCode, PrincipalId, ValidationError};
use thiserror::Error;

/// Failure of a login or current-user request, as seen by a client.
///
/// `UpstreamFailure` and `Internal` carry the operation that failed and a
/// server-side message; [`IdentityError::client_message`] hides both.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    #[error("Field '{field}' is invalid: {message}")]
    Validation { field: String, message: String },

    #[error("Login state not found or expired")]
    IdentityNotFound,

    #[error("{operation} failed: {message}")]
    UpstreamFailure {
        operation: &'static str,
        message: String,
    },

    #[error("Principal {0} is blocked")]
    AccountBlocked(PrincipalId),

    #[error("Authentication required")]
    Unauthorized,

    #[error("{operation} failed: {message}")]
    Internal {
        operation: &'static str,
        message: String,
    },
}

impl IdentityError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        IdentityError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn upstream(operation: &'static str, source: impl std::fmt::Display) -> Self {
        IdentityError::UpstreamFailure {
            operation,
            message: source.to_string(),
        }
    }

    pub fn internal(operation: &'static str, source: impl std::fmt::Display) -> Self {
        IdentityError::Internal {
            operation,
            message: source.to_string(),
        }
    }

    /// Wraps a storage error, keeping validation failures client-visible.
    pub fn from_store(operation: &'static str, err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => IdentityError::Validation {
                field: err.details.get("field").cloned().unwrap_or_default(),
                message: err.message,
            },
            _ => IdentityError::internal(operation, err),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            IdentityError::Validation { .. } => ErrorCode::ValidationFailed,
            IdentityError::IdentityNotFound => ErrorCode::IdentityNotFound,
            IdentityError::UpstreamFailure { .. } => ErrorCode::UpstreamFailure,
            IdentityError::AccountBlocked(_) => ErrorCode::AccountBlocked,
            IdentityError::Unauthorized => ErrorCode::Unauthorized,
            IdentityError::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IdentityError::UpstreamFailure { .. } | IdentityError::Internal { .. }
        )
    }

    /// Message safe to return to clients.
    pub fn client_message(&self) -> String {
        match self {
            IdentityError::UpstreamFailure { .. } => {
                "Identity provider is unavailable, please retry".to_string()
            }
            IdentityError::Internal { .. } => "Internal server error".to_string(),
            IdentityError::AccountBlocked(_) => "Account is blocked".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ValidationError> for IdentityError {
    fn from(err: ValidationError) -> Self {
        IdentityError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}
