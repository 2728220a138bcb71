//! Login provider configuration

use serde::Deserialize;
use std::time::Duration;

use super::broker::is_http_url;
use super::error::ValidationError;
use crate::domain::identity::ProviderKind;

/// Login provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Enabled providers (comma-separated, e.g. `discord,frontier`)
    #[serde(default = "default_enabled")]
    pub enabled: String,

    /// Discord API base URL
    #[serde(default = "default_discord_api_base")]
    pub discord_api_base: String,

    /// Frontier companion API base URL
    #[serde(default = "default_frontier_api_base")]
    pub frontier_api_base: String,

    /// Profile request timeout in seconds
    #[serde(default = "default_profile_timeout")]
    pub profile_timeout_secs: u64,
}

impl ProvidersConfig {
    /// Get profile timeout as Duration
    pub fn profile_timeout(&self) -> Duration {
        Duration::from_secs(self.profile_timeout_secs)
    }

    /// Enabled providers, deduplicated, in configuration order
    pub fn enabled_kinds(&self) -> Result<Vec<ProviderKind>, ValidationError> {
        let mut kinds = Vec::new();
        for name in self.enabled.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let kind = name
                .parse::<ProviderKind>()
                .map_err(|_| ValidationError::UnknownProvider(name.to_string()))?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }

    /// Validate provider configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let kinds = self.enabled_kinds()?;
        if kinds.is_empty() {
            return Err(ValidationError::NoProvidersEnabled);
        }
        if kinds.contains(&ProviderKind::Discord) && !is_http_url(&self.discord_api_base) {
            return Err(ValidationError::InvalidUrl("providers.discord_api_base"));
        }
        if kinds.contains(&ProviderKind::Frontier) && !is_http_url(&self.frontier_api_base) {
            return Err(ValidationError::InvalidUrl("providers.frontier_api_base"));
        }
        if self.profile_timeout_secs == 0 || self.profile_timeout_secs > 60 {
            return Err(ValidationError::InvalidTimeout("providers.profile_timeout_secs"));
        }
        Ok(())
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            discord_api_base: default_discord_api_base(),
            frontier_api_base: default_frontier_api_base(),
            profile_timeout_secs: default_profile_timeout(),
        }
    }
}

fn default_enabled() -> String {
    "discord".to_string()
}

fn default_discord_api_base() -> String {
    "https://discord.com/api".to_string()
}

fn default_frontier_api_base() -> String {
    "https://companion.orerve.net".to_string()
}

fn default_profile_timeout() -> u64 {
    10
}
