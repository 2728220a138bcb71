//! OAuth credential material obtained from the identity broker.

use crate::domain::foundation::{Timestamp, ValidationError};
use secrecy::{ExposeSecret, SecretString};

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Provider OAuth credential cached on an external account.
///
/// Token values are wrapped in `SecretString` so they never show up in
/// `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct OAuthCredential {
    pub access_token: SecretString,
    pub token_type: String,
    pub expiry: Option<Timestamp>,
    pub refresh_token: Option<SecretString>,
}

impl OAuthCredential {
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        expiry: Option<Timestamp>,
        refresh_token: Option<String>,
    ) -> Result<Self, ValidationError> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(ValidationError::empty_field("access_token"));
        }
        let token_type = token_type.into();
        Ok(Self {
            access_token: SecretString::new(access_token),
            token_type: if token_type.trim().is_empty() {
                DEFAULT_TOKEN_TYPE.to_string()
            } else {
                token_type
            },
            expiry,
            refresh_token: refresh_token
                .filter(|t| !t.is_empty())
                .map(SecretString::new),
        })
    }

    /// Value for the `Authorization` header of a provider API call.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token.expose_secret())
    }

    pub fn refresh_token_value(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|t| t.expose_secret().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_header_joins_type_and_token() {
        let cred = OAuthCredential::new("abc123", "Bearer", None, None).unwrap();
        assert_eq!(cred.authorization_header(), "Bearer abc123");
    }

    #[test]
    fn missing_token_type_defaults_to_bearer() {
        let cred = OAuthCredential::new("abc123", "", None, None).unwrap();
        assert_eq!(cred.token_type, "Bearer");
    }

    #[test]
    fn empty_access_token_is_rejected() {
        assert!(OAuthCredential::new("", "Bearer", None, None).is_err());
    }

    #[test]
    fn empty_refresh_token_is_treated_as_absent() {
        let cred = OAuthCredential::new("abc", "Bearer", None, Some(String::new())).unwrap();
        assert!(cred.refresh_token_value().is_none());
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let refresh = Some("also-secret".to_string());
        let cred = OAuthCredential::new("very-secret", "Bearer", None, refresh).unwrap();
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("also-secret"));
    }
}
