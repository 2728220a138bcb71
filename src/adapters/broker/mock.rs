//! Mock identity exchange for testing.
//!
//! ```ignore
//! let exchange = MockIdentityExchange::new()
//!     .with_state("state-1", OAuthCredential::new("access-1", "Bearer", None, None)?);
//!
//! let credential = exchange.exchange(ProviderKind::Discord, "state-1").await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::identity::{OAuthCredential, ProviderKind};
use crate::ports::{IdentityExchange, UpstreamError};

/// Exchange backed by a fixed state → credential table.
///
/// Unknown states yield `StateNotFound`.
#[derive(Debug, Default)]
pub struct MockIdentityExchange {
    states: RwLock<HashMap<String, OAuthCredential>>,
    force_error: RwLock<Option<UpstreamError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockIdentityExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a state the broker knows.
    pub fn with_state(self, state: impl Into<String>, credential: OAuthCredential) -> Self {
        self.states.write().unwrap().insert(state.into(), credential);
        self
    }

    /// Shorthand for a bearer credential with the given access token.
    pub fn with_access_token(self, state: impl Into<String>, access_token: &str) -> Self {
        let credential = OAuthCredential::new(access_token, "Bearer", None, None)
            .expect("mock access token must not be empty");
        self.with_state(state, credential)
    }

    /// Forces every exchange to fail with `error`.
    pub fn with_error(self, error: UpstreamError) -> Self {
        *self.force_error.write().unwrap() = Some(error);
        self
    }

    /// Sleeps before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Clears the forced error.
    pub fn clear_error(&self) {
        *self.force_error.write().unwrap() = None;
    }

    /// Number of exchange calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityExchange for MockIdentityExchange {
    async fn exchange(
        &self,
        _provider: ProviderKind,
        state: &str,
    ) -> Result<OAuthCredential, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.force_error.read().unwrap().clone() {
            return Err(error);
        }

        self.states
            .read()
            .unwrap()
            .get(state)
            .cloned()
            .ok_or(UpstreamError::StateNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn known_state_returns_credential() {
        let exchange = MockIdentityExchange::new().with_access_token("s1", "tok");
        let credential = exchange.exchange(ProviderKind::Discord, "s1").await.unwrap();
        assert_eq!(credential.access_token.expose_secret(), "tok");
        assert_eq!(exchange.call_count(), 1);
    }

    #[tokio::test]
    async fn unknown_state_is_not_found() {
        let exchange = MockIdentityExchange::new();
        let result = exchange.exchange(ProviderKind::Discord, "abc").await;
        assert_eq!(result.unwrap_err(), UpstreamError::StateNotFound);
    }

    #[tokio::test]
    async fn forced_error_wins_until_cleared() {
        let exchange = MockIdentityExchange::new()
            .with_access_token("s1", "tok")
            .with_error(UpstreamError::Status(503));

        assert!(exchange.exchange(ProviderKind::Discord, "s1").await.is_err());
        exchange.clear_error();
        assert!(exchange.exchange(ProviderKind::Discord, "s1").await.is_ok());
    }
}
