//! LoginHandler - the two-phase login entry point.
//!
//! Phase 1 (no state yet): hand the client the broker URL that starts the
//! provider's OAuth dance. Phase 2 (broker redirected back with a state):
//! complete the login and return a session token.

use std::sync::Arc;

use reqwest::Url;

use super::{AuthenticateCommand, AuthenticateHandler};
use crate::domain::foundation::{PrincipalId, UserId, ValidationError};
use crate::domain::identity::{IdentityError, ProviderKind};
use crate::domain::token::SessionToken;

/// Query parameter the broker redirects back to after the OAuth dance.
pub const REDIRECT_PARAM: &str = "redirect_url";

#[derive(Debug, Clone)]
pub struct LoginCommand {
    pub provider: ProviderKind,
    pub state: Option<String>,
    pub success_url: Option<String>,
    pub linking_user: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Phase 1: redirect the client to the broker.
    Redirect { next_url: String },
    /// Phase 2: login completed.
    Authenticated {
        token: SessionToken,
        user_id: UserId,
        principal_id: PrincipalId,
    },
}

impl LoginOutcome {
    pub fn phase(&self) -> u8 {
        match self {
            LoginOutcome::Redirect { .. } => 1,
            LoginOutcome::Authenticated { .. } => 2,
        }
    }
}

pub struct LoginHandler {
    authenticate: Arc<AuthenticateHandler>,
    broker_external_url: Url,
}

impl LoginHandler {
    pub fn new(
        authenticate: Arc<AuthenticateHandler>,
        broker_external_url: &str,
    ) -> Result<Self, ValidationError> {
        let broker_external_url = Url::parse(broker_external_url)
            .map_err(|e| ValidationError::invalid_format("broker.external_url", e.to_string()))?;
        Ok(Self {
            authenticate,
            broker_external_url,
        })
    }

    pub async fn handle(&self, cmd: LoginCommand) -> Result<LoginOutcome, IdentityError> {
        if !self.authenticate.providers().is_enabled(cmd.provider) {
            return Err(IdentityError::validation(
                "provider",
                format!("Provider '{}' is not enabled", cmd.provider),
            ));
        }

        // A blank state is the same as none: the broker has not redirected yet.
        let Some(state) = cmd.state.filter(|s| !s.trim().is_empty()) else {
            let next_url = self.next_url(cmd.provider, cmd.success_url.as_deref())?;
            return Ok(LoginOutcome::Redirect { next_url });
        };

        let mut auth = AuthenticateCommand::new(cmd.provider, state);
        auth.linking_user = cmd.linking_user;
        let result = self.authenticate.handle(auth).await?;

        Ok(LoginOutcome::Authenticated {
            token: result.token,
            user_id: result.user_id,
            principal_id: result.principal.id,
        })
    }

    /// `{broker}/oauth/{provider}?redirect_url={success_url}`
    fn next_url(
        &self,
        provider: ProviderKind,
        success_url: Option<&str>,
    ) -> Result<String, IdentityError> {
        let mut url = self
            .broker_external_url
            .join(&format!("/oauth/{}", provider))
            .map_err(|e| IdentityError::internal("build_next_url", e))?;
        url.query_pairs_mut()
            .append_pair(REDIRECT_PARAM, success_url.unwrap_or_default());
        Ok(url.to_string())
    }
}
