//! Failures of calls to the identity broker and provider APIs.

use thiserror::Error;

/// Outcome of a failed upstream call.
///
/// Messages never include response bodies; at most the status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The broker does not know the login state (unknown or expired).
    #[error("login state not found")]
    StateNotFound,

    #[error("request timed out")]
    Timeout,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Classifies a reqwest failure.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else if err.is_decode() {
            UpstreamError::Decode(err.without_url().to_string())
        } else {
            UpstreamError::Transport(err.without_url().to_string())
        }
    }
}
