//! Provider account resolver port.
//!
//! One implementation per provider kind; each knows its provider's
//! "current profile" endpoint and where the stable identity lives in it.

use crate::domain::identity::{OAuthCredential, ProviderKind, ProviderProfile};
use async_trait::async_trait;

use super::UpstreamError;

#[async_trait]
pub trait ProviderAccountResolver: Send + Sync {
    /// The provider this resolver talks to.
    fn kind(&self) -> ProviderKind;

    /// Fetch the profile of the credential's holder.
    async fn fetch_profile(
        &self,
        credential: &OAuthCredential,
    ) -> Result<ProviderProfile, UpstreamError>;
}
