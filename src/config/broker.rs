//! Identity broker configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

/// Identity broker configuration
///
/// The broker is reached on two addresses: `internal_url` for the
/// server-to-server exchange call and `external_url` for the browser
/// redirect that starts a login.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Base URL for server-to-server calls
    pub internal_url: String,

    /// Public base URL clients are redirected to
    pub external_url: String,

    /// Shared secret sent with exchange calls (never sent to clients)
    pub secret: SecretString,

    /// Exchange call timeout in seconds
    #[serde(default = "default_exchange_timeout")]
    pub exchange_timeout_secs: u64,
}

impl BrokerConfig {
    /// Get exchange timeout as Duration
    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_secs)
    }

    /// Validate broker configuration
    ///
    /// In production both URLs must use HTTPS.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.internal_url.is_empty() {
            return Err(ValidationError::MissingRequired("broker.internal_url"));
        }
        if self.external_url.is_empty() {
            return Err(ValidationError::MissingRequired("broker.external_url"));
        }
        if self.secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("broker.secret"));
        }
        if !is_http_url(&self.internal_url) {
            return Err(ValidationError::InvalidUrl("broker.internal_url"));
        }
        if !is_http_url(&self.external_url) {
            return Err(ValidationError::InvalidUrl("broker.external_url"));
        }
        if self.exchange_timeout_secs == 0 || self.exchange_timeout_secs > 60 {
            return Err(ValidationError::InvalidTimeout("broker.exchange_timeout_secs"));
        }

        if *environment == Environment::Production && !self.external_url.starts_with("https://") {
            return Err(ValidationError::BrokerMustBeHttps);
        }

        Ok(())
    }
}

pub(super) fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn default_exchange_timeout() -> u64 {
    2
}
