//! HTTP handlers for the login and current-user endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Json, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use tracing::Instrument;

use crate::application::{GetCurrentUserHandler, GetCurrentUserQuery, LoginCommand, LoginHandler};
use crate::domain::foundation::{ErrorCode, UserId};
use crate::domain::identity::{IdentityError, ProviderKind, User};
use crate::domain::token::SessionToken;
use crate::ports::AccountReader;

use super::dto::{ErrorResponse, HealthResponse, LoginParams, LoginResponse, UserResponse};

/// Header carrying the session token.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Header carrying the request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state, cloned for each request.
#[derive(Clone)]
pub struct IdentityAppState {
    pub login: Arc<LoginHandler>,
    pub account_reader: Arc<dyn AccountReader>,
}

impl IdentityAppState {
    pub fn new(login: Arc<LoginHandler>, account_reader: Arc<dyn AccountReader>) -> Self {
        Self { login, account_reader }
    }

    pub fn get_current_user_handler(&self) -> GetCurrentUserHandler {
        GetCurrentUserHandler::new(self.account_reader.clone())
    }

    async fn current_user(&self, token: SessionToken) -> Result<User, IdentityError> {
        self.get_current_user_handler()
            .handle(GetCurrentUserQuery { token })
            .await
    }

    /// User a completed login should link to. A stale or unknown token
    /// means a plain login.
    async fn linking_user(&self, token: SessionToken) -> Result<Option<UserId>, IdentityError> {
        match self.current_user(token).await {
            Ok(user) => Ok(Some(user.id)),
            Err(IdentityError::Unauthorized) => {
                tracing::debug!("Ignoring stale session token on login");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Extractors
// ════════════════════════════════════════════════════════════════════════════════

/// Correlation id set by the request-id layer, if any.
#[derive(Debug, Clone, Default)]
pub struct RequestId(pub Option<String>);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_deref().unwrap_or("-"))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(RequestId(id))
    }
}

/// Session token from `X-Auth-Token`, falling back to `Authorization: Bearer`.
pub fn session_token(headers: &HeaderMap) -> Option<SessionToken> {
    let explicit = headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty());

    explicit
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|t| !t.is_empty())
        })
        .map(SessionToken::from_string)
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/login/:provider - start or complete a provider login
///
/// On the second phase, a caller that is already signed in links the new
/// identity to its user. The first phase never looks at the token.
pub async fn login(
    State(state): State<IdentityAppState>,
    Path(provider): Path<String>,
    Query(params): Query<LoginParams>,
    request_id: RequestId,
    headers: HeaderMap,
) -> Result<Json<LoginResponse>, IdentityApiError> {
    let span = tracing::info_span!("login", provider = %provider, request_id = %request_id);

    let result: Result<LoginResponse, IdentityError> = async {
        let provider: ProviderKind = provider.parse()?;
        let login_state = params.state.filter(|s| !s.trim().is_empty());
        let linking_user = match (&login_state, session_token(&headers)) {
            (Some(_), Some(token)) => state.linking_user(token).await?,
            _ => None,
        };

        let outcome = state
            .login
            .handle(LoginCommand {
                provider,
                state: login_state,
                success_url: params.success_url,
                linking_user,
            })
            .await?;
        Ok(LoginResponse::from(outcome))
    }
    .instrument(span)
    .await;

    result
        .map(Json)
        .map_err(|e| IdentityApiError::new(e, request_id))
}

/// GET /api/users/current - the user behind the session token
pub async fn current_user(
    State(state): State<IdentityAppState>,
    request_id: RequestId,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, IdentityApiError> {
    let token = session_token(&headers)
        .ok_or_else(|| IdentityApiError::new(IdentityError::Unauthorized, request_id.clone()))?;

    let user = state
        .current_user(token)
        .await
        .map_err(|e| IdentityApiError::new(e, request_id))?;

    Ok(Json(UserResponse::from(user)))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error wrapper carrying the request's correlation id.
#[derive(Debug)]
pub struct IdentityApiError {
    error: IdentityError,
    request_id: RequestId,
}

impl IdentityApiError {
    pub fn new(error: IdentityError, request_id: RequestId) -> Self {
        Self { error, request_id }
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code() {
            ErrorCode::ValidationFailed | ErrorCode::IdentityNotFound => StatusCode::BAD_REQUEST,
            ErrorCode::UpstreamFailure => StatusCode::BAD_GATEWAY,
            ErrorCode::AccountBlocked => StatusCode::FORBIDDEN,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IdentityApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(request_id = %self.request_id, error = %self.error, "Request failed");
        } else {
            tracing::info!(request_id = %self.request_id, error = %self.error, "Request rejected");
        }

        let body = ErrorResponse {
            error_code: self.error.code().to_string(),
            message: self.error.client_message(),
            request_id: self.request_id.0,
        };
        (status, Json(body)).into_response()
    }
}
