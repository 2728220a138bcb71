//! Login providers and the identities they report.

use crate::domain::foundation::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Third-party identity provider a user can log in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Discord,
    Frontier,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Discord, ProviderKind::Frontier];

    /// Name used in URLs, broker requests and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Discord => "discord",
            ProviderKind::Frontier => "frontier",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discord" => Ok(ProviderKind::Discord),
            "frontier" => Ok(ProviderKind::Frontier),
            other => Err(ValidationError::invalid_format(
                "provider",
                format!("unknown provider '{}'", other),
            )),
        }
    }
}

/// The (provider, identity) pair that uniquely names an external account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub provider: ProviderKind,
    pub identity: String,
}

impl IdentityKey {
    pub fn new(provider: ProviderKind, identity: impl Into<String>) -> Self {
        Self {
            provider,
            identity: identity.into(),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.identity)
    }
}

/// Profile reported by a provider for the holder of a credential.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    pub provider: ProviderKind,
    /// Stable username or id; never changes for a stored account.
    pub identity: String,
    /// Provider response body as received.
    pub raw: serde_json::Value,
}

impl ProviderProfile {
    pub fn new(
        provider: ProviderKind,
        identity: impl Into<String>,
        raw: serde_json::Value,
    ) -> Result<Self, ValidationError> {
        let identity = identity.into();
        if identity.trim().is_empty() {
            return Err(ValidationError::empty_field("identity"));
        }
        Ok(Self {
            provider,
            identity,
            raw,
        })
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(self.provider, self.identity.clone())
    }
}
