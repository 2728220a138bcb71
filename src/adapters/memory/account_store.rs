//! In-memory account store.
//!
//! Implements the same transactional contract as the PostgreSQL adapter:
//!
//! - writes stay private to their transaction until commit
//! - dropping a transaction without committing discards its writes
//! - a (provider, identity) insert blocks while another open transaction
//!   holds an uncommitted insert for the same key, then fails with
//!   `IdentityConflict` if that transaction committed
//! - ids come from per-table sequences and are never reused
//! - last-login and credential updates touch only their own columns
//!
//! Useful for tests and local runs without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::domain::foundation::{
    AccessTokenId, DomainError, ErrorCode, ExternalAccountId, PrincipalId, Timestamp, UserId,
};
use crate::domain::identity::{
    ExternalAccount, IdentityKey, LinkedUser, NewExternalAccount, NewPrincipal, OAuthCredential,
    Principal, PrincipalState, User,
};
use crate::domain::token::{AccessToken, NewAccessToken, SessionToken};
use crate::ports::{
    validate_savepoint_name, AccountReader, AccountStore, AccountTransaction, TokenStore,
    UnitOfWork,
};

// ════════════════════════════════════════════════════════════════════════════
// Tables
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
struct Tables {
    principals: BTreeMap<PrincipalId, Principal>,
    users: BTreeMap<UserId, PrincipalId>,
    accounts: BTreeMap<ExternalAccountId, ExternalAccount>,
    tokens: BTreeMap<AccessTokenId, AccessToken>,
}

impl Tables {
    fn account_by_key(&self, key: &IdentityKey) -> Option<&ExternalAccount> {
        self.accounts
            .values()
            .find(|a| a.provider == key.provider && a.identity == key.identity)
    }

    fn has_token(&self, token: &SessionToken) -> bool {
        self.tokens.values().any(|t| &t.token == token)
    }

    fn user_by_principal(&self, principal_id: PrincipalId) -> Option<UserId> {
        self.users
            .iter()
            .find(|(_, p)| **p == principal_id)
            .map(|(id, _)| *id)
    }
}

/// Column-level updates made by one transaction.
#[derive(Debug, Clone, Default)]
struct Writes {
    inserted: Tables,
    last_logins: HashMap<PrincipalId, Timestamp>,
    credentials: HashMap<ExternalAccountId, (OAuthCredential, Timestamp)>,
}

#[derive(Debug, Default)]
struct Sequences {
    principal: i64,
    user: i64,
    account: i64,
    token: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Default)]
struct Shared {
    committed: Tables,
    sequences: Sequences,
    identity_locks: HashMap<IdentityKey, u64>,
    next_transaction: u64,
    transactions_started: u64,
    commits: u64,
    rollbacks: u64,
    fail_commits: bool,
}

impl Shared {
    fn apply(&mut self, writes: Writes) {
        let Writes {
            inserted,
            last_logins,
            credentials,
        } = writes;

        self.committed.principals.extend(inserted.principals);
        self.committed.users.extend(inserted.users);
        self.committed.accounts.extend(inserted.accounts);
        self.committed.tokens.extend(inserted.tokens);

        for (id, at) in last_logins {
            if let Some(principal) = self.committed.principals.get_mut(&id) {
                let latest = principal.last_login.map_or(at, |prev| prev.latest(at));
                principal.last_login = Some(latest);
            }
        }
        for (id, (credential, at)) in credentials {
            if let Some(account) = self.committed.accounts.get_mut(&id) {
                account.refresh_credential(credential, at);
            }
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> Result<MutexGuard<'_, Shared>, DomainError> {
    shared
        .lock()
        .map_err(|_| DomainError::new(ErrorCode::InternalError, "in-memory store lock poisoned"))
}

fn identity_conflict(key: &IdentityKey) -> DomainError {
    DomainError::new(
        ErrorCode::IdentityConflict,
        format!("External account {} already exists", key),
    )
    .with_detail("provider", key.provider.as_str())
}

// ════════════════════════════════════════════════════════════════════════════
// Store
// ════════════════════════════════════════════════════════════════════════════

/// Shared in-memory store; clones see the same data.
#[derive(Clone, Default)]
pub struct InMemoryAccountStore {
    shared: Arc<Mutex<Shared>>,
    released: Arc<Notify>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Shared) -> T) -> Result<T, DomainError> {
        let shared = lock(&self.shared)?;
        Ok(f(&shared))
    }

    fn committed_user(shared: &Shared, id: UserId) -> Option<User> {
        let principal_id = shared.committed.users.get(&id)?;
        let principal = shared.committed.principals.get(principal_id)?.clone();
        Some(User { id, principal })
    }

    /// Number of committed principals.
    pub fn principal_count(&self) -> usize {
        self.read(|s| s.committed.principals.len()).unwrap_or_default()
    }

    /// Number of committed users.
    pub fn user_count(&self) -> usize {
        self.read(|s| s.committed.users.len()).unwrap_or_default()
    }

    /// Number of committed external accounts.
    pub fn external_account_count(&self) -> usize {
        self.read(|s| s.committed.accounts.len()).unwrap_or_default()
    }

    /// Number of committed session tokens.
    pub fn access_token_count(&self) -> usize {
        self.read(|s| s.committed.tokens.len()).unwrap_or_default()
    }

    /// Committed principal by id.
    pub fn principal(&self, id: PrincipalId) -> Option<Principal> {
        self.read(|s| s.committed.principals.get(&id).cloned()).ok().flatten()
    }

    /// Committed external account for a key.
    pub fn external_account(&self, key: &IdentityKey) -> Option<ExternalAccount> {
        self.read(|s| s.committed.account_by_key(key).cloned()).ok().flatten()
    }

    /// Transactions begun so far.
    pub fn transactions_started(&self) -> u64 {
        self.read(|s| s.transactions_started).unwrap_or_default()
    }

    /// Transactions committed so far.
    pub fn commits(&self) -> u64 {
        self.read(|s| s.commits).unwrap_or_default()
    }

    /// Transactions dropped without commit so far.
    pub fn rollbacks(&self) -> u64 {
        self.read(|s| s.rollbacks).unwrap_or_default()
    }

    /// Moderation stand-in: overwrite a committed principal's state.
    pub fn set_principal_state(
        &self,
        id: PrincipalId,
        state: PrincipalState,
    ) -> Result<(), DomainError> {
        let mut shared = lock(&self.shared)?;
        let principal = shared.committed.principals.get_mut(&id).ok_or_else(|| {
            DomainError::new(ErrorCode::PrincipalNotFound, format!("Principal {} not found", id))
        })?;
        principal.state = state;
        Ok(())
    }

    /// Make every following commit fail.
    pub fn set_fail_commits(&self, fail: bool) {
        if let Ok(mut shared) = lock(&self.shared) {
            shared.fail_commits = fail;
        }
    }
}

#[async_trait]
impl UnitOfWork for InMemoryAccountStore {
    async fn begin(&self) -> Result<Box<dyn AccountTransaction>, DomainError> {
        let id = {
            let mut shared = lock(&self.shared)?;
            shared.transactions_started += 1;
            shared.next_transaction += 1;
            shared.next_transaction
        };
        Ok(Box::new(InMemoryTransaction {
            id,
            shared: Arc::clone(&self.shared),
            released: Arc::clone(&self.released),
            writes: Writes::default(),
            held_identities: Vec::new(),
            savepoints: Vec::new(),
            finished: false,
        }))
    }
}

#[async_trait]
impl AccountReader for InMemoryAccountStore {
    async fn find_principal_id_by_token(
        &self,
        token: &SessionToken,
        now: Timestamp,
    ) -> Result<Option<PrincipalId>, DomainError> {
        self.read(|s| {
            s.committed
                .tokens
                .values()
                .find(|t| &t.token == token && !t.is_expired_at(&now))
                .map(|t| t.principal_id)
        })
    }

    async fn find_user_by_principal(
        &self,
        principal_id: PrincipalId,
    ) -> Result<Option<User>, DomainError> {
        self.read(|s| {
            s.committed
                .user_by_principal(principal_id)
                .and_then(|id| Self::committed_user(s, id))
        })
    }

    async fn find_principal(&self, id: PrincipalId) -> Result<Option<Principal>, DomainError> {
        self.read(|s| s.committed.principals.get(&id).cloned())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Transaction
// ════════════════════════════════════════════════════════════════════════════

struct Savepoint {
    name: &'static str,
    writes: Writes,
    held_identities: usize,
}

struct InMemoryTransaction {
    id: u64,
    shared: Arc<Mutex<Shared>>,
    released: Arc<Notify>,
    writes: Writes,
    held_identities: Vec<IdentityKey>,
    savepoints: Vec<Savepoint>,
    finished: bool,
}

impl InMemoryTransaction {
    fn principal(&self, shared: &Shared, id: PrincipalId) -> Option<Principal> {
        let mut principal = self
            .writes
            .inserted
            .principals
            .get(&id)
            .or_else(|| shared.committed.principals.get(&id))
            .cloned()?;
        if let Some(at) = self.writes.last_logins.get(&id) {
            principal.last_login = Some(*at);
        }
        Some(principal)
    }

    fn user(&self, shared: &Shared, id: UserId) -> Option<User> {
        let principal_id = self
            .writes
            .inserted
            .users
            .get(&id)
            .or_else(|| shared.committed.users.get(&id))?;
        let principal = self.principal(shared, *principal_id)?;
        Some(User { id, principal })
    }

    fn account(&self, shared: &Shared, key: &IdentityKey) -> Option<ExternalAccount> {
        let mut account = self
            .writes
            .inserted
            .account_by_key(key)
            .or_else(|| shared.committed.account_by_key(key))
            .cloned()?;
        if let Some((credential, at)) = self.writes.credentials.get(&account.id) {
            account.refresh_credential(credential.clone(), *at);
        }
        Some(account)
    }

    fn account_exists(&self, shared: &Shared, id: ExternalAccountId) -> bool {
        self.writes.inserted.accounts.contains_key(&id)
            || shared.committed.accounts.contains_key(&id)
    }

    /// Drop identity reservations past `keep` and wake blocked inserters.
    fn release_identities(&mut self, keep: usize) -> Result<(), DomainError> {
        if self.held_identities.len() <= keep {
            return Ok(());
        }
        let released: Vec<IdentityKey> = self.held_identities.drain(keep..).collect();
        {
            let mut shared = lock(&self.shared)?;
            for key in &released {
                shared.identity_locks.remove(key);
            }
        }
        self.released.notify_waiters();
        Ok(())
    }

    fn savepoint_index(&self, name: &'static str) -> Result<usize, DomainError> {
        self.savepoints
            .iter()
            .rposition(|s| s.name == name)
            .ok_or_else(|| DomainError::database(format!("savepoint '{}' does not exist", name)))
    }
}

#[async_trait]
impl AccountStore for InMemoryTransaction {
    async fn create_principal(
        &mut self,
        principal: &NewPrincipal,
    ) -> Result<Principal, DomainError> {
        let id = {
            let mut shared = lock(&self.shared)?;
            PrincipalId::from_i64(next(&mut shared.sequences.principal))
        };
        let stored = Principal {
            id,
            is_admin: principal.is_admin,
            created_on: principal.created_on,
            last_login: None,
            state: principal.state,
        };
        self.writes.inserted.principals.insert(id, stored.clone());
        Ok(stored)
    }

    async fn create_user(&mut self, principal_id: PrincipalId) -> Result<User, DomainError> {
        let (id, principal) = {
            let mut shared = lock(&self.shared)?;
            let principal = self.principal(&shared, principal_id).ok_or_else(|| {
                DomainError::validation(
                    "principal_id",
                    format!("Principal {} does not exist", principal_id),
                )
            })?;
            (UserId::from_i64(next(&mut shared.sequences.user)), principal)
        };
        self.writes.inserted.users.insert(id, principal_id);
        Ok(User { id, principal })
    }

    async fn create_external_account(
        &mut self,
        user_id: UserId,
        account: &NewExternalAccount,
    ) -> Result<ExternalAccount, DomainError> {
        let key = account.identity_key();
        loop {
            // Registered before inspecting the locks so a release between
            // the check and the await still wakes us.
            let released = Arc::clone(&self.released);
            let notified = released.notified();
            {
                let mut shared = lock(&self.shared)?;
                if self.account(&shared, &key).is_some() {
                    return Err(identity_conflict(&key));
                }

                let holder = shared.identity_locks.get(&key).copied();
                if holder.map_or(true, |owner| owner == self.id) {
                    if self.user(&shared, user_id).is_none() {
                        return Err(DomainError::validation(
                            "user_id",
                            format!("User {} does not exist", user_id),
                        ));
                    }

                    shared.identity_locks.insert(key.clone(), self.id);
                    let id = ExternalAccountId::from_i64(next(&mut shared.sequences.account));
                    drop(shared);

                    if !self.held_identities.contains(&key) {
                        self.held_identities.push(key.clone());
                    }
                    let stored = ExternalAccount {
                        id,
                        user_id,
                        provider: account.provider,
                        identity: account.identity.clone(),
                        profile: account.profile.clone(),
                        created: account.created,
                        updated: account.created,
                        credential: account.credential.clone(),
                    };
                    self.writes.inserted.accounts.insert(id, stored.clone());
                    return Ok(stored);
                }
            }
            tracing::debug!(identity = %key, "Waiting on concurrent insert of the same identity");
            notified.await;
        }
    }

    async fn find_external_account(
        &mut self,
        key: &IdentityKey,
    ) -> Result<Option<ExternalAccount>, DomainError> {
        let shared = lock(&self.shared)?;
        Ok(self.account(&shared, key))
    }

    async fn find_user_by_identity(
        &mut self,
        key: &IdentityKey,
    ) -> Result<Option<LinkedUser>, DomainError> {
        let shared = lock(&self.shared)?;
        let Some(account) = self.account(&shared, key) else {
            return Ok(None);
        };
        let user = self.user(&shared, account.user_id).ok_or_else(|| {
            DomainError::database(format!("External account {} has no user", account.id))
        })?;
        Ok(Some(LinkedUser { user, account }))
    }

    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, DomainError> {
        let shared = lock(&self.shared)?;
        Ok(self.user(&shared, id))
    }

    async fn lock_principal(&mut self, id: PrincipalId) -> Result<Option<Principal>, DomainError> {
        let shared = lock(&self.shared)?;
        Ok(self.principal(&shared, id))
    }

    async fn touch_last_login(
        &mut self,
        id: PrincipalId,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        let exists = {
            let shared = lock(&self.shared)?;
            self.principal(&shared, id).is_some()
        };
        if !exists {
            return Err(DomainError::new(
                ErrorCode::PrincipalNotFound,
                format!("Principal {} not found", id),
            ));
        }
        self.writes.last_logins.insert(id, at);
        Ok(())
    }

    async fn update_credentials(
        &mut self,
        id: ExternalAccountId,
        credential: &OAuthCredential,
        updated: Timestamp,
    ) -> Result<(), DomainError> {
        let exists = {
            let shared = lock(&self.shared)?;
            self.account_exists(&shared, id)
        };
        if !exists {
            return Err(DomainError::database(format!("External account {} not found", id)));
        }
        self.writes.credentials.insert(id, (credential.clone(), updated));
        Ok(())
    }

    async fn savepoint(&mut self, name: &'static str) -> Result<(), DomainError> {
        validate_savepoint_name(name)?;
        self.savepoints.push(Savepoint {
            name,
            writes: self.writes.clone(),
            held_identities: self.held_identities.len(),
        });
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &'static str) -> Result<(), DomainError> {
        let index = self.savepoint_index(name)?;
        self.savepoints.truncate(index + 1);
        let (writes, keep) = {
            let savepoint = &self.savepoints[index];
            (savepoint.writes.clone(), savepoint.held_identities)
        };
        self.writes = writes;
        self.release_identities(keep)
    }

    async fn release_savepoint(&mut self, name: &'static str) -> Result<(), DomainError> {
        let index = self.savepoint_index(name)?;
        self.savepoints.truncate(index);
        Ok(())
    }
}

#[async_trait]
impl TokenStore for InMemoryTransaction {
    async fn insert_access_token(
        &mut self,
        token: &NewAccessToken,
    ) -> Result<AccessToken, DomainError> {
        let id = {
            let mut shared = lock(&self.shared)?;
            if self.principal(&shared, token.principal_id).is_none() {
                return Err(DomainError::validation(
                    "principal_id",
                    format!("Principal {} does not exist", token.principal_id),
                ));
            }
            if shared.committed.has_token(&token.token)
                || self.writes.inserted.has_token(&token.token)
            {
                return Err(DomainError::database("Access token value already exists"));
            }
            AccessTokenId::from_i64(next(&mut shared.sequences.token))
        };
        let stored = AccessToken {
            id,
            principal_id: token.principal_id,
            token: token.token.clone(),
            created: token.created,
            expires: token.expires,
        };
        self.writes.inserted.tokens.insert(id, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl AccountTransaction for InMemoryTransaction {
    async fn commit(mut self: Box<Self>) -> Result<(), DomainError> {
        let handle = Arc::clone(&self.shared);
        {
            let mut shared = lock(&handle)?;
            if shared.fail_commits {
                return Err(DomainError::database("commit failed"));
            }
            shared.apply(std::mem::take(&mut self.writes));
            for key in &self.held_identities {
                shared.identity_locks.remove(key);
            }
            shared.commits += 1;
        }
        self.held_identities.clear();
        self.finished = true;
        self.released.notify_waiters();
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Ok(mut shared) = self.shared.lock() {
            for key in &self.held_identities {
                shared.identity_locks.remove(key);
            }
            shared.rollbacks += 1;
        }
        self.released.notify_waiters();
    }
}
