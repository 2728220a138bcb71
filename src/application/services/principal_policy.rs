//! Account-state rules applied on every login.

use crate::domain::foundation::{PrincipalId, Timestamp};
use crate::domain::identity::{IdentityError, Principal};
use crate::ports::AccountStore;

/// Refuses blocked principals and records successful logins.
///
/// Touching last-login is the only write performed here; promotion and
/// blocking belong to moderation.
#[derive(Debug, Clone, Default)]
pub struct PrincipalPolicy;

impl PrincipalPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Check `principal_id` may log in and advance its last-login.
    ///
    /// The principal row stays locked until the caller's transaction ends,
    /// so a concurrent block cannot slip between the check and the write.
    ///
    /// # Errors
    ///
    /// - `AccountBlocked` if the principal is blocked (nothing is written)
    pub async fn authenticate<S>(
        &self,
        store: &mut S,
        principal_id: PrincipalId,
    ) -> Result<Principal, IdentityError>
    where
        S: AccountStore + ?Sized,
    {
        let mut principal = store
            .lock_principal(principal_id)
            .await
            .map_err(|e| IdentityError::from_store("lock_principal", e))?
            .ok_or_else(|| {
                IdentityError::internal(
                    "lock_principal",
                    format!("principal {} missing", principal_id),
                )
            })?;

        if !principal.state.can_authenticate() {
            tracing::warn!(principal_id = %principal_id, "Login refused for blocked principal");
            return Err(IdentityError::AccountBlocked(principal_id));
        }

        let at = principal.record_login(Timestamp::now());
        store
            .touch_last_login(principal_id, at)
            .await
            .map_err(|e| IdentityError::from_store("touch_last_login", e))?;

        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryAccountStore;
    use crate::domain::identity::{NewPrincipal, PrincipalState};
    use crate::ports::UnitOfWork;

    async fn stored_principal(store: &InMemoryAccountStore, state: PrincipalState) -> Principal {
        let mut tx = store.begin().await.unwrap();
        let principal = tx
            .create_principal(&NewPrincipal::pending(Timestamp::now()))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        store.set_principal_state(principal.id, state).unwrap();
        store.principal(principal.id).unwrap()
    }

    #[tokio::test]
    async fn pending_principal_gets_last_login() {
        let store = InMemoryAccountStore::new();
        let principal = stored_principal(&store, PrincipalState::Pending).await;
        assert!(principal.last_login.is_none());

        let mut tx = store.begin().await.unwrap();
        let result = PrincipalPolicy::new().authenticate(tx.as_mut(), principal.id).await.unwrap();
        tx.commit().await.unwrap();

        assert!(result.last_login.is_some());
        assert_eq!(store.principal(principal.id).unwrap().last_login, result.last_login);
    }

    #[tokio::test]
    async fn approved_principal_is_allowed() {
        let store = InMemoryAccountStore::new();
        let principal = stored_principal(&store, PrincipalState::Approved).await;

        let mut tx = store.begin().await.unwrap();
        let result = PrincipalPolicy::new().authenticate(tx.as_mut(), principal.id).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn blocked_principal_is_refused_and_untouched() {
        let store = InMemoryAccountStore::new();
        let principal = stored_principal(&store, PrincipalState::Blocked).await;

        let mut tx = store.begin().await.unwrap();
        let result = PrincipalPolicy::new().authenticate(tx.as_mut(), principal.id).await;
        tx.commit().await.unwrap();

        assert!(matches!(result, Err(IdentityError::AccountBlocked(id)) if id == principal.id));
        assert!(store.principal(principal.id).unwrap().last_login.is_none());
    }

    #[tokio::test]
    async fn last_login_never_decreases() {
        let store = InMemoryAccountStore::new();
        let principal = stored_principal(&store, PrincipalState::Pending).await;
        let policy = PrincipalPolicy::new();

        let mut tx = store.begin().await.unwrap();
        let first = policy.authenticate(tx.as_mut(), principal.id).await.unwrap();
        let second = policy.authenticate(tx.as_mut(), principal.id).await.unwrap();
        tx.commit().await.unwrap();

        assert!(second.last_login >= first.last_login);
    }

    #[tokio::test]
    async fn missing_principal_is_internal() {
        let store = InMemoryAccountStore::new();

        let mut tx = store.begin().await.unwrap();
        let result = PrincipalPolicy::new()
            .authenticate(tx.as_mut(), PrincipalId::from_i64(999))
            .await;

        assert!(matches!(result, Err(IdentityError::Internal { .. })));
    }
}
