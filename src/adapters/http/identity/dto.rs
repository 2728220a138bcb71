//! Data Transfer Objects for the login and current-user endpoints.

use serde::{Deserialize, Serialize};

use crate::application::LoginOutcome;
use crate::domain::foundation::{PrincipalId, Timestamp, UserId};
use crate::domain::identity::{Principal, PrincipalState, User};

// ════════════════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════════════════

/// Query string of `GET /api/login/:provider`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginParams {
    /// Broker state; absent on the first phase.
    pub state: Option<String>,
    /// Where the broker sends the browser after the OAuth dance.
    pub success_url: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Responses
// ════════════════════════════════════════════════════════════════════════════════

/// Response of either login phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    pub phase: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl From<LoginOutcome> for LoginResponse {
    fn from(outcome: LoginOutcome) -> Self {
        let phase = outcome.phase();
        match outcome {
            LoginOutcome::Redirect { next_url } => Self {
                phase,
                next_url: Some(next_url),
                token: None,
            },
            LoginOutcome::Authenticated { token, .. } => Self {
                phase,
                next_url: None,
                token: Some(token.into_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalResponse {
    pub id: PrincipalId,
    pub admin: bool,
    pub created_on: Timestamp,
    pub last_login: Option<Timestamp>,
    pub state: PrincipalState,
}

impl From<Principal> for PrincipalResponse {
    fn from(principal: Principal) -> Self {
        Self {
            id: principal.id,
            admin: principal.is_admin,
            created_on: principal.created_on,
            last_login: principal.last_login,
            state: principal.state,
        }
    }
}

/// Response of `GET /api/users/current`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: UserId,
    pub principal: PrincipalResponse,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            principal: user.principal.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Standard error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Correlation id of the failed request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}
