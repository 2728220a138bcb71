//! GetCurrentUserHandler - resolves a session token to its user.

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::identity::{IdentityError, User};
use crate::domain::token::SessionToken;
use crate::ports::AccountReader;

/// Query for the user behind a session token.
#[derive(Debug, Clone)]
pub struct GetCurrentUserQuery {
    pub token: SessionToken,
}

pub struct GetCurrentUserHandler {
    reader: Arc<dyn AccountReader>,
}

impl GetCurrentUserHandler {
    pub fn new(reader: Arc<dyn AccountReader>) -> Self {
        Self { reader }
    }

    /// # Errors
    ///
    /// - `Unauthorized` for an empty, unknown or expired token
    /// - `AccountBlocked` when the principal was blocked after the token was issued
    pub async fn handle(&self, query: GetCurrentUserQuery) -> Result<User, IdentityError> {
        if query.token.is_empty() {
            return Err(IdentityError::Unauthorized);
        }

        let principal_id = self
            .reader
            .find_principal_id_by_token(&query.token, Timestamp::now())
            .await
            .map_err(|e| IdentityError::from_store("find_principal_id_by_token", e))?
            .ok_or(IdentityError::Unauthorized)?;

        let user = self
            .reader
            .find_user_by_principal(principal_id)
            .await
            .map_err(|e| IdentityError::from_store("find_user_by_principal", e))?
            .ok_or(IdentityError::Unauthorized)?;

        if !user.principal.state.can_authenticate() {
            return Err(IdentityError::AccountBlocked(principal_id));
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryAccountStore;
    use crate::application::services::TokenIssuer;
    use crate::domain::foundation::PrincipalId;
    use crate::domain::identity::{NewPrincipal, PrincipalState};
    use crate::ports::{AccountStore, AccountTransaction, UnitOfWork};

    async fn user_with_token(
        store: &InMemoryAccountStore,
        issuer: &TokenIssuer) -> (User, SessionToken,
    ) {
        let mut tx = store.begin().await.unwrap();
        let principal = tx
            .create_principal(&NewPrincipal::pending(Timestamp::now()))
            .await
            .unwrap();
        let user = tx.create_user(principal.id).await.unwrap();
        let token = issuer.issue(tx.as_mut(), principal.id).await.unwrap();
        tx.commit().await.unwrap();
        (user, token.token)
    }

    fn principal_of(user: &User) -> PrincipalId {
        user.principal.id
    }

    #[tokio::test]
    async fn valid_token_returns_user() {
        let store = InMemoryAccountStore::new();
        let (user, token) = user_with_token(&store, &TokenIssuer::new()).await;
        let handler = GetCurrentUserHandler::new(Arc::new(store));

        let found = handler.handle(GetCurrentUserQuery { token }).await.unwrap();

        assert_eq!(found.id, user.id);
        assert_eq!(found.principal.id, principal_of(&user));
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let store = InMemoryAccountStore::new();
        user_with_token(&store, &TokenIssuer::new()).await;
        let handler = GetCurrentUserHandler::new(Arc::new(store));

        let err = handler
            .handle(GetCurrentUserQuery {
                token: SessionToken::from_string("not-a-token"),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::Unauthorized));
    }

    #[tokio::test]
    async fn empty_token_is_unauthorized() {
        let handler = GetCurrentUserHandler::new(Arc::new(InMemoryAccountStore::new()));

        let err = handler
            .handle(GetCurrentUserQuery {
                token: SessionToken::from_string(""),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::Unauthorized));
    }

    #[tokio::test]
    async fn expired_token_is_unauthorized() {
        let store = InMemoryAccountStore::new();
        let (_, token) = user_with_token(&store, &TokenIssuer::with_ttl_secs(Some(1))).await;
        let handler = GetCurrentUserHandler::new(Arc::new(store));

        tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
        let err = handler.handle(GetCurrentUserQuery { token }).await.unwrap_err();

        assert!(matches!(err, IdentityError::Unauthorized));
    }

    #[tokio::test]
    async fn blocked_principal_is_refused() {
        let store = InMemoryAccountStore::new();
        let (user, token) = user_with_token(&store, &TokenIssuer::new()).await;
        store
            .set_principal_state(principal_of(&user), PrincipalState::Blocked)
            .unwrap();
        let handler = GetCurrentUserHandler::new(Arc::new(store));

        let err = handler.handle(GetCurrentUserQuery { token }).await.unwrap_err();

        assert!(matches!(err, IdentityError::AccountBlocked(_)));
    }
}
