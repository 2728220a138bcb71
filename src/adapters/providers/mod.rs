//! Provider profile resolvers, one per login provider.

mod discord;
mod frontier;
mod mock;

pub use discord::{DiscordResolver, DISCORD_API_BASE};
pub use frontier::{FrontierResolver, FRONTIER_API_BASE};
pub use mock::MockProviderResolver;

use std::sync::Arc;

use crate::application::services::ProviderRegistry;
use crate::config::ProvidersConfig;
use crate::domain::identity::ProviderKind;
use crate::ports::UpstreamError;

/// Builds a registry holding a resolver for every enabled provider.
pub fn registry_from_config(config: &ProvidersConfig) -> Result<ProviderRegistry, UpstreamError> {
    let timeout = config.profile_timeout();
    let mut registry = ProviderRegistry::new();
    for kind in config.enabled_kinds().map_err(|e| UpstreamError::Transport(e.to_string()))? {
        registry = match kind {
            ProviderKind::Discord => {
                let resolver = DiscordResolver::new(&config.discord_api_base, timeout)?;
                registry.with_resolver(Arc::new(resolver))
            }
            ProviderKind::Frontier => {
                let resolver = FrontierResolver::new(&config.frontier_api_base, timeout)?;
                registry.with_resolver(Arc::new(resolver))
            }
        };
    }
    Ok(registry)
}
