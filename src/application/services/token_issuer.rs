//! Mints session tokens and stores them against a principal.

use crate::domain::foundation::{PrincipalId, Timestamp};
use crate::domain::identity::IdentityError;
use crate::domain::token::{AccessToken, NewAccessToken, SessionToken};
use crate::ports::TokenStore;

/// Issues opaque session tokens.
///
/// Values come from the OS CSPRNG and are never reused; the store's unique
/// constraint on the token column backs that up.
#[derive(Debug, Clone, Default)]
pub struct TokenIssuer {
    ttl_secs: Option<u64>,
}

impl TokenIssuer {
    /// Issuer whose tokens never expire.
    pub fn new() -> Self {
        Self { ttl_secs: None }
    }

    /// Issuer whose tokens expire `ttl_secs` after minting.
    pub fn with_ttl_secs(ttl_secs: Option<u64>) -> Self {
        Self { ttl_secs }
    }

    /// Mint a token for `principal_id` inside the caller's transaction.
    pub async fn issue<S>(
        &self,
        store: &mut S,
        principal_id: PrincipalId,
    ) -> Result<AccessToken, IdentityError>
    where
        S: TokenStore + ?Sized,
    {
        let created = Timestamp::now();
        let new_token = NewAccessToken {
            principal_id,
            token: SessionToken::generate(),
            created,
            expires: self.ttl_secs.map(|ttl| created.plus_secs(ttl)),
        };

        let token = store
            .insert_access_token(&new_token)
            .await
            .map_err(|e| IdentityError::from_store("issue_token", e))?;

        tracing::debug!(principal_id = %principal_id, token_id = %token.id, "Issued session token");
        Ok(token)
    }
}
