//! Account reader port (query side).
//!
//! Read paths used outside any login transaction: session lookup for the
//! current user, lookups by principal id, and state checks.

use crate::domain::foundation::{DomainError, PrincipalId, Timestamp};
use crate::domain::identity::{Principal, User};
use crate::domain::token::SessionToken;
use async_trait::async_trait;

#[async_trait]
pub trait AccountReader: Send + Sync {
    /// Resolve a session token to its principal.
    ///
    /// Tokens whose expiry is at or before `now` are ignored.
    async fn find_principal_id_by_token(
        &self,
        token: &SessionToken,
        now: Timestamp,
    ) -> Result<Option<PrincipalId>, DomainError>;

    /// Find the user owning a principal.
    async fn find_user_by_principal(
        &self,
        principal_id: PrincipalId,
    ) -> Result<Option<User>, DomainError>;

    /// Find a principal by id.
    async fn find_principal(&self, id: PrincipalId) -> Result<Option<Principal>, DomainError>;
}
