//! Account store ports (transactional write side).
//!
//! A login runs inside one [`AccountTransaction`] obtained from a
//! [`UnitOfWork`]. Every store method executes within that transaction;
//! the store never opens its own.
//!
//! # Rollback
//!
//! Dropping an `AccountTransaction` without calling
//! [`AccountTransaction::commit`] rolls it back. Early returns, panics and
//! cancelled futures therefore never leave partial writes behind.
//!
//! # Uniqueness
//!
//! (provider, identity) is unique in storage. A second insert for the same
//! key fails with `ErrorCode::IdentityConflict`. On PostgreSQL the failed
//! statement aborts the surrounding transaction, so callers wrap creation
//! in a savepoint and roll back to it before re-reading.

use crate::domain::foundation::{DomainError, ExternalAccountId, PrincipalId, Timestamp, UserId};
use crate::domain::identity::{
    ExternalAccount, IdentityKey, LinkedUser, NewExternalAccount, NewPrincipal, OAuthCredential,
    Principal, User,
};
use crate::domain::token::{AccessToken, NewAccessToken};
use async_trait::async_trait;

/// Opens transactions against the account store.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` if no connection could be acquired
    async fn begin(&self) -> Result<Box<dyn AccountTransaction>, DomainError>;
}

/// Principal, user and external account persistence.
#[async_trait]
pub trait AccountStore: Send {
    /// Insert a principal and return it with its assigned id.
    async fn create_principal(
        &mut self,
        principal: &NewPrincipal,
    ) -> Result<Principal, DomainError>;

    /// Insert a user owning `principal_id`.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the principal does not exist
    async fn create_user(&mut self, principal_id: PrincipalId) -> Result<User, DomainError>;

    /// Link a provider identity to a user.
    ///
    /// # Errors
    ///
    /// - `IdentityConflict` if (provider, identity) is already stored
    /// - `ValidationFailed` if the user does not exist
    async fn create_external_account(
        &mut self,
        user_id: UserId,
        account: &NewExternalAccount,
    ) -> Result<ExternalAccount, DomainError>;

    /// Find the external account for a (provider, identity) pair.
    async fn find_external_account(
        &mut self,
        key: &IdentityKey,
    ) -> Result<Option<ExternalAccount>, DomainError>;

    /// Find the user linked to a (provider, identity) pair, with the link.
    async fn find_user_by_identity(
        &mut self,
        key: &IdentityKey,
    ) -> Result<Option<LinkedUser>, DomainError>;

    /// Find a user (and its principal) by id.
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, DomainError>;

    /// Read a principal and hold its row lock until the transaction ends.
    async fn lock_principal(&mut self, id: PrincipalId) -> Result<Option<Principal>, DomainError>;

    /// Persist a new last-login value.
    ///
    /// # Errors
    ///
    /// - `PrincipalNotFound` if the principal does not exist
    async fn touch_last_login(&mut self, id: PrincipalId, at: Timestamp) -> Result<(), DomainError>;

    /// Replace the cached credential of an external account.
    ///
    /// The identity string is never modified.
    async fn update_credentials(
        &mut self,
        id: ExternalAccountId,
        credential: &OAuthCredential,
        updated: Timestamp,
    ) -> Result<(), DomainError>;

    /// Mark a point the transaction can roll back to.
    async fn savepoint(&mut self, name: &'static str) -> Result<(), DomainError>;

    /// Undo everything since `savepoint(name)`; the savepoint stays usable.
    async fn rollback_to_savepoint(&mut self, name: &'static str) -> Result<(), DomainError>;

    /// Forget a savepoint, keeping its changes.
    async fn release_savepoint(&mut self, name: &'static str) -> Result<(), DomainError>;
}

/// Session token persistence.
#[async_trait]
pub trait TokenStore: Send {
    /// Insert a minted token.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` if the token value already exists
    async fn insert_access_token(
        &mut self,
        token: &NewAccessToken,
    ) -> Result<AccessToken, DomainError>;
}

/// One open store transaction.
#[async_trait]
pub trait AccountTransaction: AccountStore + TokenStore {
    /// Make every write in this transaction durable.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}

/// Checks a savepoint name is a plain SQL identifier.
pub fn validate_savepoint_name(name: &str) -> Result<(), DomainError> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_lowercase() || c == '_')
        && !name.starts_with('_');
    if valid {
        Ok(())
    } else {
        Err(DomainError::validation(
            "savepoint",
            format!("invalid savepoint name '{}'", name),
        ))
    }
}
