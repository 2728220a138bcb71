//! FindUserByPrincipalHandler - user lookup for callers that already hold
//! a principal id (moderation tooling, other services).

use std::sync::Arc;

use crate::domain::foundation::PrincipalId;
use crate::domain::identity::{IdentityError, User};
use crate::ports::AccountReader;

#[derive(Debug, Clone, Copy)]
pub struct FindUserByPrincipalQuery {
    pub principal_id: PrincipalId,
}

pub struct FindUserByPrincipalHandler {
    reader: Arc<dyn AccountReader>,
}

impl FindUserByPrincipalHandler {
    pub fn new(reader: Arc<dyn AccountReader>) -> Self {
        Self { reader }
    }

    /// Returns `None` when no user is anchored to the principal.
    pub async fn handle(
        &self,
        query: FindUserByPrincipalQuery,
    ) -> Result<Option<User>, IdentityError> {
        self.reader
            .find_user_by_principal(query.principal_id)
            .await
            .map_err(|e| IdentityError::from_store("find_user_by_principal", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryAccountStore;
    use crate::domain::foundation::Timestamp;
    use crate::domain::identity::NewPrincipal;
    use crate::ports::{AccountStore, AccountTransaction, UnitOfWork};

    #[tokio::test]
    async fn returns_user_for_known_principal() {
        let store = InMemoryAccountStore::new();
        let mut tx = store.begin().await.unwrap();
        let principal = tx
            .create_principal(&NewPrincipal::pending(Timestamp::now()))
            .await
            .unwrap();
        let user = tx.create_user(principal.id).await.unwrap();
        tx.commit().await.unwrap();

        let handler = FindUserByPrincipalHandler::new(Arc::new(store));
        let found = handler
            .handle(FindUserByPrincipalQuery {
                principal_id: principal.id,
            })
            .await
            .unwrap();

        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn returns_none_for_unknown_principal() {
        let handler = FindUserByPrincipalHandler::new(Arc::new(InMemoryAccountStore::new()));

        let found = handler
            .handle(FindUserByPrincipalQuery {
                principal_id: PrincipalId::from_i64(99),
            })
            .await
            .unwrap();

        assert!(found.is_none());
    }
}
