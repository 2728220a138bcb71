//! Identity exchange port.
//!
//! Converts the one-time login state issued by the identity broker into the
//! provider OAuth credential it obtained.

use crate::domain::identity::{OAuthCredential, ProviderKind};
use async_trait::async_trait;

use super::UpstreamError;

#[async_trait]
pub trait IdentityExchange: Send + Sync {
    /// Exchange `state` for the credential of a `provider` login.
    ///
    /// # Errors
    ///
    /// - `UpstreamError::StateNotFound` if the broker does not know `state`
    /// - any other `UpstreamError` if the broker call failed
    async fn exchange(
        &self,
        provider: ProviderKind,
        state: &str,
    ) -> Result<OAuthCredential, UpstreamError>;
}
