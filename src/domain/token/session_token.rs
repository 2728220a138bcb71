//! Opaque bearer value handed to clients after a login.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// Random bytes per token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Opaque session token.
///
/// Carries no structure; validity is decided by a storage lookup.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Draws a fresh token from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wraps a token received from a client or read from storage.
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn generated_token_encodes_32_bytes() {
        let token = SessionToken::generate();
        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(token.as_str().len(), 43);
        let decoded = URL_SAFE_NO_PAD.decode(token.as_str()).unwrap();
        assert_eq!(decoded.len(), TOKEN_BYTES);
    }

    #[test]
    fn generated_tokens_are_url_safe() {
        let token = SessionToken::generate();
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn generated_tokens_do_not_repeat() {
        let tokens: HashSet<String> = (0..1_000)
            .map(|_| SessionToken::generate().into_string())
            .collect();
        assert_eq!(tokens.len(), 1_000);
    }

    #[test]
    fn debug_output_is_redacted() {
        let token = SessionToken::from_string("s3cr3t");
        assert!(!format!("{:?}", token).contains("s3cr3t"));
    }

    #[test]
    fn whitespace_token_is_empty() {
        assert!(SessionToken::from_string("  ").is_empty());
        assert!(!SessionToken::from_string("abc").is_empty());
    }

    proptest! {
        #[test]
        fn from_string_preserves_value(value in "[A-Za-z0-9_-]{1,64}") {
            let token = SessionToken::from_string(value.clone());
            prop_assert_eq!(token.as_str(), value.as_str());
        }
    }
}
