//! Mock provider resolver for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;

use crate::domain::identity::{OAuthCredential, ProviderKind, ProviderProfile};
use crate::ports::{ProviderAccountResolver, UpstreamError};

/// Resolver mapping access tokens to identities.
///
/// Unknown access tokens answer like a provider rejecting the token (401).
#[derive(Debug)]
pub struct MockProviderResolver {
    kind: ProviderKind,
    identities: RwLock<HashMap<String, String>>,
    force_error: RwLock<Option<UpstreamError>>,
    calls: AtomicUsize,
}

impl MockProviderResolver {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            identities: RwLock::new(HashMap::new()),
            force_error: RwLock::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Access token `access_token` belongs to `identity`.
    pub fn with_identity(
        self,
        access_token: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        self.identities
            .write()
            .unwrap()
            .insert(access_token.into(), identity.into());
        self
    }

    /// Forces every profile fetch to fail with `error`.
    pub fn with_error(self, error: UpstreamError) -> Self {
        *self.force_error.write().unwrap() = Some(error);
        self
    }

    /// Number of profile fetches received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAccountResolver for MockProviderResolver {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch_profile(
        &self,
        credential: &OAuthCredential,
    ) -> Result<ProviderProfile, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.force_error.read().unwrap().clone() {
            return Err(error);
        }

        let identity = self
            .identities
            .read()
            .unwrap()
            .get(credential.access_token.expose_secret())
            .cloned()
            .ok_or(UpstreamError::Status(401))?;

        ProviderProfile::new(self.kind, identity.clone(), json!({ "username": identity }))
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_token_resolves_identity() {
        let resolver =
            MockProviderResolver::new(ProviderKind::Discord).with_identity("tok", "alice#0001");
        let credential = OAuthCredential::new("tok", "Bearer", None, None).unwrap();

        let profile = resolver.fetch_profile(&credential).await.unwrap();

        assert_eq!(profile.identity, "alice#0001");
        assert_eq!(profile.provider, ProviderKind::Discord);
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let resolver = MockProviderResolver::new(ProviderKind::Discord);
        let credential = OAuthCredential::new("nope", "Bearer", None, None).unwrap();

        let err = resolver.fetch_profile(&credential).await.unwrap_err();
        assert_eq!(err, UpstreamError::Status(401));
    }
}
