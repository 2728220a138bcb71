//! AuthenticateHandler - turns a broker login state into a session token.
//!
//! Flow:
//!
//! 1. exchange the state for an OAuth credential (broker)
//! 2. fetch the provider profile with that credential
//! 3. open a transaction
//! 4. find the user linked to (provider, identity), or create principal,
//!    user and external account; a concurrent login that created the same
//!    identity first is reused, not reported
//! 5. refresh cached credentials on an existing link
//! 6. refuse blocked principals, touch last-login
//! 7. mint a session token
//! 8. commit
//!
//! Both network calls happen before step 3 so a slow upstream never holds
//! a transaction open. Any failure drops the transaction, rolling back.

use std::sync::Arc;
use std::time::Duration;

use crate::application::services::{PrincipalPolicy, ProviderRegistry, TokenIssuer};
use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::identity::{
    IdentityError, IdentityKey, LinkedUser, NewExternalAccount, NewPrincipal, OAuthCredential,
    Principal, ProviderKind, ProviderProfile, User,
};
use crate::domain::token::SessionToken;
use crate::ports::{AccountTransaction, IdentityExchange, UnitOfWork, UpstreamError};

const ACCOUNT_CREATION: &str = "account_creation";

/// Command to complete a provider login.
#[derive(Debug, Clone)]
pub struct AuthenticateCommand {
    pub provider: ProviderKind,
    pub state: String,
    /// Already-authenticated user the identity should be attached to.
    pub linking_user: Option<UserId>,
}

impl AuthenticateCommand {
    pub fn new(provider: ProviderKind, state: impl Into<String>) -> Self {
        Self {
            provider,
            state: state.into(),
            linking_user: None,
        }
    }

    pub fn linking(mut self, user_id: UserId) -> Self {
        self.linking_user = Some(user_id);
        self
    }
}

/// Result of a completed login.
#[derive(Debug, Clone)]
pub struct AuthenticateResult {
    pub token: SessionToken,
    pub user_id: UserId,
    pub principal: Principal,
    /// True when this login created the external account.
    pub created_account: bool,
}

/// Session orchestrator.
pub struct AuthenticateHandler {
    store: Arc<dyn UnitOfWork>,
    exchange: Arc<dyn IdentityExchange>,
    providers: ProviderRegistry,
    policy: PrincipalPolicy,
    issuer: TokenIssuer,
    deadline: Option<Duration>,
}

impl AuthenticateHandler {
    pub fn new(
        store: Arc<dyn UnitOfWork>,
        exchange: Arc<dyn IdentityExchange>,
        providers: ProviderRegistry,
        policy: PrincipalPolicy,
        issuer: TokenIssuer,
    ) -> Self {
        Self {
            store,
            exchange,
            providers,
            policy,
            issuer,
            deadline: None,
        }
    }

    /// Bounds every `handle` call; on expiry the in-flight work is dropped
    /// and its transaction rolled back.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub async fn handle(
        &self,
        cmd: AuthenticateCommand,
    ) -> Result<AuthenticateResult, IdentityError> {
        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.authenticate(cmd))
                .await
                .map_err(|_| IdentityError::internal("authenticate", "deadline exceeded"))?,
            None => self.authenticate(cmd).await,
        }
    }

    async fn authenticate(
        &self,
        cmd: AuthenticateCommand,
    ) -> Result<AuthenticateResult, IdentityError> {
        if cmd.state.trim().is_empty() {
            return Err(IdentityError::validation("state", "Login state is required"));
        }
        let resolver = self.providers.resolver(cmd.provider)?;

        let credential = self
            .exchange
            .exchange(cmd.provider, &cmd.state)
            .await
            .map_err(|e| match e {
                UpstreamError::StateNotFound => IdentityError::IdentityNotFound,
                other => {
                    tracing::warn!(
                        provider = %cmd.provider,
                        error = %other,
                        "Identity exchange failed"
                    );
                    IdentityError::upstream("identity_exchange", other)
                }
            })?;

        let profile = resolver.fetch_profile(&credential).await.map_err(|e| {
            tracing::warn!(provider = %cmd.provider, error = %e, "Provider profile fetch failed");
            IdentityError::upstream("fetch_profile", e)
        })?;

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| IdentityError::internal("begin_transaction", e))?;

        let (user, created_account) = self
            .resolve_user(tx.as_mut(), &profile, credential, cmd.linking_user)
            .await?;
        let principal = self.policy.authenticate(tx.as_mut(), user.principal.id).await?;
        let token = self.issuer.issue(tx.as_mut(), principal.id).await?;

        tx.commit()
            .await
            .map_err(|e| IdentityError::internal("commit", e))?;

        tracing::info!(
            provider = %cmd.provider,
            user_id = %user.id,
            principal_id = %principal.id,
            created_account,
            "Login completed"
        );

        Ok(AuthenticateResult {
            token: token.token,
            user_id: user.id,
            principal,
            created_account,
        })
    }

    /// Finds or creates the user for the profile's identity.
    async fn resolve_user(
        &self,
        tx: &mut dyn AccountTransaction,
        profile: &ProviderProfile,
        credential: OAuthCredential,
        linking_user: Option<UserId>,
    ) -> Result<(User, bool), IdentityError> {
        let key = profile.identity_key();
        if let Some(linked) = find_linked(tx, &key).await? {
            let user = refresh_link(tx, linked, &credential, linking_user).await?;
            return Ok((user, false));
        }

        let account =
            NewExternalAccount::from_profile(profile, credential.clone(), Timestamp::now());

        // A failed insert aborts a PostgreSQL transaction; the savepoint
        // keeps it usable for the re-read below.
        tx.savepoint(ACCOUNT_CREATION)
            .await
            .map_err(|e| IdentityError::internal("savepoint", e))?;

        match create_account(tx, &account, linking_user).await {
            Ok(user) => {
                tx.release_savepoint(ACCOUNT_CREATION)
                    .await
                    .map_err(|e| IdentityError::internal("release_savepoint", e))?;
                tracing::info!(identity = %key, user_id = %user.id, "Linked new external identity");
                Ok((user, true))
            }
            Err(err) if err.is_identity_conflict() => {
                tracing::info!(
                    identity = %key,
                    "Identity created by a concurrent login; reusing it"
                );
                tx.rollback_to_savepoint(ACCOUNT_CREATION)
                    .await
                    .map_err(|e| IdentityError::internal("rollback_to_savepoint", e))?;

                let linked = find_linked(tx, &key).await?.ok_or_else(|| {
                    IdentityError::internal(
                        "find_user_by_identity",
                        format!("{} missing after uniqueness conflict", key),
                    )
                })?;
                let user = refresh_link(tx, linked, &credential, linking_user).await?;
                Ok((user, false))
            }
            Err(err) => Err(IdentityError::from_store("create_account", err)),
        }
    }
}

async fn find_linked(
    tx: &mut dyn AccountTransaction,
    key: &IdentityKey,
) -> Result<Option<LinkedUser>, IdentityError> {
    tx.find_user_by_identity(key)
        .await
        .map_err(|e| IdentityError::from_store("find_user_by_identity", e))
}

/// Stores fresh credentials on an existing link.
async fn refresh_link(
    tx: &mut dyn AccountTransaction,
    linked: LinkedUser,
    credential: &OAuthCredential,
    linking_user: Option<UserId>,
) -> Result<User, IdentityError> {
    if let Some(expected) = linking_user {
        if linked.user.id != expected {
            return Err(IdentityError::validation(
                "identity",
                "This identity is already linked to another account",
            ));
        }
    }

    tx.update_credentials(linked.account.id, credential, Timestamp::now())
        .await
        .map_err(|e| IdentityError::from_store("update_credentials", e))?;
    Ok(linked.user)
}

/// Creates the external account, and the principal and user behind it
/// unless an existing user is being linked.
async fn create_account(
    tx: &mut dyn AccountTransaction,
    account: &NewExternalAccount,
    linking_user: Option<UserId>,
) -> Result<User, DomainError> {
    let user = match linking_user {
        Some(user_id) => tx.find_user(user_id).await?.ok_or_else(|| {
            DomainError::validation("linking_user", format!("User {} does not exist", user_id))
        })?,
        None => {
            let principal = tx.create_principal(&NewPrincipal::pending(account.created)).await?;
            tx.create_user(principal.id).await?
        }
    };
    tx.create_external_account(user.id, account).await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::broker::MockIdentityExchange;
    use crate::adapters::memory::InMemoryAccountStore;
    use crate::adapters::providers::MockProviderResolver;
    use crate::domain::identity::PrincipalState;
    use crate::ports::{AccountReader, AccountStore};

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        store: InMemoryAccountStore,
        exchange: Arc<MockIdentityExchange>,
        resolver: Arc<MockProviderResolver>,
        handler: AuthenticateHandler,
    }

    fn fixture_with(exchange: MockIdentityExchange, resolver: MockProviderResolver) -> Fixture {
        let store = InMemoryAccountStore::new();
        let exchange = Arc::new(exchange);
        let resolver = Arc::new(resolver);
        let handler = AuthenticateHandler::new(
            Arc::new(store.clone()),
            exchange.clone(),
            ProviderRegistry::new().with_resolver(resolver.clone()),
            PrincipalPolicy::new(),
            TokenIssuer::new(),
        );
        Fixture {
            store,
            exchange,
            resolver,
            handler,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            MockIdentityExchange::new()
                .with_access_token("state-alice", "access-alice")
                .with_access_token("state-alice-2", "access-alice")
                .with_access_token("state-bob", "access-bob"),
            MockProviderResolver::new(ProviderKind::Discord)
                .with_identity("access-alice", "alice#0001")
                .with_identity("access-bob", "bob#0002"),
        )
    }

    fn login(state: &str) -> AuthenticateCommand {
        AuthenticateCommand::new(ProviderKind::Discord, state)
    }

    fn assert_no_rows(store: &InMemoryAccountStore) {
        assert_eq!(store.principal_count(), 0);
        assert_eq!(store.user_count(), 0);
        assert_eq!(store.external_account_count(), 0);
        assert_eq!(store.access_token_count(), 0);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // First login and repeat logins
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn first_login_creates_principal_user_account_and_token() {
        let f = fixture();

        let result = f.handler.handle(login("state-alice")).await.unwrap();

        assert!(result.created_account);
        assert_eq!(f.store.principal_count(), 1);
        assert_eq!(f.store.user_count(), 1);
        assert_eq!(f.store.external_account_count(), 1);
        assert_eq!(f.store.access_token_count(), 1);

        let principal = f.store.principal(result.principal.id).unwrap();
        assert_eq!(principal.state, PrincipalState::Pending);
        assert!(!principal.is_admin);
        assert!(principal.last_login.is_some());
    }

    #[tokio::test]
    async fn issued_token_resolves_to_principal() {
        let f = fixture();

        let result = f.handler.handle(login("state-alice")).await.unwrap();

        let principal_id = f
            .store
            .find_principal_id_by_token(&result.token, Timestamp::now())
            .await
            .unwrap();
        assert_eq!(principal_id, Some(result.principal.id));
    }

    #[tokio::test]
    async fn repeat_login_reuses_account_and_mints_new_token() {
        let f = fixture();

        let first = f.handler.handle(login("state-alice")).await.unwrap();
        let second = f.handler.handle(login("state-alice-2")).await.unwrap();

        assert!(!second.created_account);
        assert_eq!(first.user_id, second.user_id);
        assert_eq!(first.principal.id, second.principal.id);
        assert_ne!(first.token, second.token);
        assert_eq!(f.store.principal_count(), 1);
        assert_eq!(f.store.external_account_count(), 1);
        assert_eq!(f.store.access_token_count(), 2);
        assert!(second.principal.last_login >= first.principal.last_login);
    }

    #[tokio::test]
    async fn different_identities_get_different_principals() {
        let f = fixture();

        let alice = f.handler.handle(login("state-alice")).await.unwrap();
        let bob = f.handler.handle(login("state-bob")).await.unwrap();

        assert_ne!(alice.principal.id, bob.principal.id);
        assert_eq!(f.store.principal_count(), 2);
    }

    #[tokio::test]
    async fn repeat_login_refreshes_cached_credentials() {
        let exchange = MockIdentityExchange::new()
            .with_access_token("first", "access-alice")
            .with_state(
                "second",
                OAuthCredential::new("access-alice", "Bearer", None, Some("new-refresh".into()))
                    .unwrap(),
            );
        let resolver = MockProviderResolver::new(ProviderKind::Discord)
            .with_identity("access-alice", "alice#0001");
        let f = fixture_with(exchange, resolver);

        f.handler.handle(login("first")).await.unwrap();
        f.handler.handle(login("second")).await.unwrap();

        let account = f
            .store
            .external_account(&IdentityKey::new(ProviderKind::Discord, "alice#0001"))
            .unwrap();
        assert_eq!(account.credential.refresh_token_value(), Some("new-refresh"));
        assert_eq!(account.identity, "alice#0001");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failures
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_state_is_identity_not_found_and_writes_nothing() {
        let f = fixture();

        let err = f.handler.handle(login("abc")).await.unwrap_err();

        assert!(matches!(err, IdentityError::IdentityNotFound));
        assert_no_rows(&f.store);
        assert_eq!(f.store.transactions_started(), 0);
        assert_eq!(f.resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_state_is_rejected_before_any_call() {
        let f = fixture();

        let err = f.handler.handle(login("  ")).await.unwrap_err();

        assert!(matches!(err, IdentityError::Validation { ref field, .. } if field == "state"));
        assert_eq!(f.exchange.call_count(), 0);
    }

    #[tokio::test]
    async fn disabled_provider_is_rejected() {
        let f = fixture();

        let err = f
            .handler
            .handle(AuthenticateCommand::new(ProviderKind::Frontier, "state-alice"))
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::Validation { ref field, .. } if field == "provider"));
        assert_eq!(f.exchange.call_count(), 0);
    }

    #[tokio::test]
    async fn broker_failure_is_upstream_failure() {
        let f = fixture_with(
            MockIdentityExchange::new().with_error(UpstreamError::Status(502)),
            MockProviderResolver::new(ProviderKind::Discord),
        );

        let err = f.handler.handle(login("state-alice")).await.unwrap_err();

        assert!(matches!(
            err,
            IdentityError::UpstreamFailure { operation: "identity_exchange", .. }
        ));
        assert!(err.is_retryable());
        assert_eq!(f.store.transactions_started(), 0);
    }

    #[tokio::test]
    async fn profile_failure_is_upstream_failure_without_transaction() {
        let f = fixture_with(
            MockIdentityExchange::new().with_access_token("state-alice", "access-alice"),
            MockProviderResolver::new(ProviderKind::Discord).with_error(UpstreamError::Timeout),
        );

        let err = f.handler.handle(login("state-alice")).await.unwrap_err();

        assert!(matches!(err, IdentityError::UpstreamFailure { operation: "fetch_profile", .. }));
        assert_eq!(f.store.transactions_started(), 0);
        assert_no_rows(&f.store);
    }

    #[tokio::test]
    async fn failed_commit_is_internal_and_leaves_nothing_behind() {
        let f = fixture();
        f.store.set_fail_commits(true);

        let err = f.handler.handle(login("state-alice")).await.unwrap_err();

        assert!(matches!(err, IdentityError::Internal { operation: "commit", .. }));
        assert_no_rows(&f.store);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Blocked principals
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn blocked_principal_is_refused_without_side_effects() {
        let f = fixture();
        let first = f.handler.handle(login("state-alice")).await.unwrap();
        let before = f.store.principal(first.principal.id).unwrap();
        f.store
            .set_principal_state(first.principal.id, PrincipalState::Blocked)
            .unwrap();

        let err = f.handler.handle(login("state-alice-2")).await.unwrap_err();

        assert!(matches!(err, IdentityError::AccountBlocked(id) if id == first.principal.id));
        let after = f.store.principal(first.principal.id).unwrap();
        assert_eq!(after.last_login, before.last_login);
        assert_eq!(f.store.access_token_count(), 1);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Linking
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn linking_user_attaches_new_identity_to_existing_user() {
        let f = fixture();
        let alice = f.handler.handle(login("state-alice")).await.unwrap();

        let linked = f
            .handler
            .handle(login("state-bob").linking(alice.user_id))
            .await
            .unwrap();

        assert!(linked.created_account);
        assert_eq!(linked.user_id, alice.user_id);
        assert_eq!(f.store.principal_count(), 1);
        assert_eq!(f.store.external_account_count(), 2);
    }

    #[tokio::test]
    async fn identity_linked_elsewhere_is_rejected() {
        let f = fixture();
        f.handler.handle(login("state-alice")).await.unwrap();
        let bob = f.handler.handle(login("state-bob")).await.unwrap();

        let err = f
            .handler
            .handle(login("state-alice-2").linking(bob.user_id))
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::Validation { ref field, .. } if field == "identity"));
    }

    #[tokio::test]
    async fn linking_unknown_user_is_rejected() {
        let f = fixture();

        let err = f
            .handler
            .handle(login("state-alice").linking(UserId::from_i64(404)))
            .await
            .unwrap_err();

        assert!(
            matches!(err, IdentityError::Validation { ref field, .. } if field == "linking_user")
        );
        assert_no_rows(&f.store);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Concurrency and cancellation
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn login_losing_the_creation_race_reuses_the_winner() {
        let f = fixture();

        // Another login holds an uncommitted insert of the same identity.
        let mut rival = f.store.begin().await.unwrap();
        let principal = rival
            .create_principal(&NewPrincipal::pending(Timestamp::now()))
            .await
            .unwrap();
        let user = rival.create_user(principal.id).await.unwrap();
        let profile =
            ProviderProfile::new(ProviderKind::Discord, "alice#0001", serde_json::json!({}))
                .unwrap();
        let credential = OAuthCredential::new("access-rival", "Bearer", None, None).unwrap();
        let account = NewExternalAccount::from_profile(&profile, credential, Timestamp::now());
        rival.create_external_account(user.id, &account).await.unwrap();

        let handler = Arc::new(f.handler);
        let pending = {
            let handler = handler.clone();
            tokio::spawn(async move { handler.handle(login("state-alice")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        rival.commit().await.unwrap();
        let result = pending.await.unwrap().unwrap();

        assert!(!result.created_account);
        assert_eq!(result.user_id, user.id);
        assert_eq!(f.store.principal_count(), 1);
        assert_eq!(f.store.external_account_count(), 1);
    }

    #[tokio::test]
    async fn deadline_expiry_rolls_back() {
        let f = fixture();
        let mut rival = f.store.begin().await.unwrap();
        let principal = rival
            .create_principal(&NewPrincipal::pending(Timestamp::now()))
            .await
            .unwrap();
        let user = rival.create_user(principal.id).await.unwrap();
        let profile =
            ProviderProfile::new(ProviderKind::Discord, "alice#0001", serde_json::json!({}))
                .unwrap();
        let credential = OAuthCredential::new("access-rival", "Bearer", None, None).unwrap();
        let account = NewExternalAccount::from_profile(&profile, credential, Timestamp::now());
        rival.create_external_account(user.id, &account).await.unwrap();

        let handler = f.handler.with_deadline(Duration::from_millis(50));
        let err = handler.handle(login("state-alice")).await.unwrap_err();

        assert!(matches!(err, IdentityError::Internal { operation: "authenticate", .. }));
        assert_eq!(f.store.rollbacks(), 1);

        drop(rival);
        assert_no_rows(&f.store);
    }
}
