//! CheckPromotionHandler - whether a principal may be promoted to approved.
//!
//! Read-only: moderation tooling performs the promotion itself.

use std::sync::Arc;

use crate::domain::foundation::{PrincipalId, StateMachine};
use crate::domain::identity::{IdentityError, Principal, PrincipalState};
use crate::ports::AccountReader;

#[derive(Debug, Clone, Copy)]
pub struct CheckPromotionQuery {
    pub principal_id: PrincipalId,
}

pub struct CheckPromotionHandler {
    reader: Arc<dyn AccountReader>,
}

impl CheckPromotionHandler {
    pub fn new(reader: Arc<dyn AccountReader>) -> Self {
        Self { reader }
    }

    /// Returns the principal when it is pending and may be approved.
    ///
    /// # Errors
    ///
    /// - `AccountBlocked` if the principal is blocked
    /// - `Validation` if it is already approved or does not exist
    pub async fn handle(&self, query: CheckPromotionQuery) -> Result<Principal, IdentityError> {
        let principal = self
            .reader
            .find_principal(query.principal_id)
            .await
            .map_err(|e| IdentityError::from_store("find_principal", e))?
            .ok_or_else(|| {
                IdentityError::validation(
                    "principal_id",
                    format!("Principal {} does not exist", query.principal_id),
                )
            })?;

        if principal.state == PrincipalState::Blocked {
            return Err(IdentityError::AccountBlocked(principal.id));
        }
        principal
            .state
            .transition_to(PrincipalState::Approved)
            .map_err(|_| {
                IdentityError::validation(
                    "state",
                    format!("Principal is already {}", principal.state),
                )
            })?;

        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryAccountStore;
    use crate::domain::foundation::Timestamp;
    use crate::domain::identity::NewPrincipal;
    use crate::ports::{AccountStore, AccountTransaction, UnitOfWork};

    async fn principal_in(store: &InMemoryAccountStore, state: PrincipalState) -> PrincipalId {
        let mut tx = store.begin().await.unwrap();
        let principal = tx
            .create_principal(&NewPrincipal::pending(Timestamp::now()))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        if state != PrincipalState::Pending {
            store.set_principal_state(principal.id, state).unwrap();
        }
        principal.id
    }

    async fn check(
        store: &InMemoryAccountStore,
        principal_id: PrincipalId,
    ) -> Result<Principal, IdentityError> {
        CheckPromotionHandler::new(Arc::new(store.clone()))
            .handle(CheckPromotionQuery { principal_id })
            .await
    }

    #[tokio::test]
    async fn pending_principal_is_eligible() {
        let store = InMemoryAccountStore::new();
        let id = principal_in(&store, PrincipalState::Pending).await;

        let principal = check(&store, id).await.unwrap();

        assert_eq!(principal.id, id);
        assert_eq!(store.commits(), 1);
    }

    #[tokio::test]
    async fn blocked_principal_is_refused() {
        let store = InMemoryAccountStore::new();
        let id = principal_in(&store, PrincipalState::Blocked).await;

        let err = check(&store, id).await.unwrap_err();

        assert!(matches!(err, IdentityError::AccountBlocked(p) if p == id));
    }

    #[tokio::test]
    async fn approved_principal_is_not_eligible_again() {
        let store = InMemoryAccountStore::new();
        let id = principal_in(&store, PrincipalState::Approved).await;

        let err = check(&store, id).await.unwrap_err();

        assert!(matches!(err, IdentityError::Validation { ref field, .. } if field == "state"));
    }

    #[tokio::test]
    async fn unknown_principal_is_a_validation_error() {
        let store = InMemoryAccountStore::new();

        let err = check(&store, PrincipalId::from_i64(7)).await.unwrap_err();

        assert!(
            matches!(err, IdentityError::Validation { ref field, .. } if field == "principal_id")
        );
    }
}
