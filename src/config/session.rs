//! Session token configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Session token configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Token lifetime in seconds; unset means tokens do not expire
    pub token_ttl_secs: Option<u64>,
}

impl SessionConfig {
    /// Validate session configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.token_ttl_secs == Some(0) {
            return Err(ValidationError::InvalidTokenTtl);
        }
        Ok(())
    }
}
