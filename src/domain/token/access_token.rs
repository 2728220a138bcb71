//! Stored session token bound to a principal.

use crate::domain::foundation::{AccessTokenId, PrincipalId, Timestamp};

use super::SessionToken;

/// Minted session token row. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub id: AccessTokenId,
    pub principal_id: PrincipalId,
    pub token: SessionToken,
    pub created: Timestamp,
    pub expires: Option<Timestamp>,
}

impl AccessToken {
    /// True when the token has an expiry at or before `now`.
    pub fn is_expired_at(&self, now: &Timestamp) -> bool {
        self.expires.is_some_and(|expires| !expires.is_after(now))
    }
}

/// Values for a token that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewAccessToken {
    pub principal_id: PrincipalId,
    pub token: SessionToken,
    pub created: Timestamp,
    pub expires: Option<Timestamp>,
}
