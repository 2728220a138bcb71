//! Strongly-typed identifier value objects.
//!
//! Every row id in the store is a database-assigned `BIGSERIAL`, so the
//! identifiers wrap an `i64` rather than generating values client-side.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a database-assigned id.
            pub fn from_i64(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw id.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|e| ValidationError::invalid_format($field, e.to_string()))
            }
        }
    };
}

define_id!(
    /// Identifier of an authorization-bearing principal.
    PrincipalId,
    "principal_id"
);

define_id!(
    /// Identifier of the account record anchoring a principal.
    UserId,
    "user_id"
);

define_id!(
    /// Identifier of a stored link to a third-party identity.
    ExternalAccountId,
    "external_account_id"
);

define_id!(
    /// Identifier of a minted session token row.
    AccessTokenId,
    "access_token_id"
);
