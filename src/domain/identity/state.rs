//! Principal state machine.
//!
//! Moderation outside this crate moves principals between states; login
//! only reads the state and refuses blocked principals.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account standing of a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalState {
    /// Freshly created; awaiting moderation.
    #[default]
    Pending,

    /// Promoted by a moderator.
    Approved,

    /// Denied. Cannot complete a login.
    Blocked,
}

impl PrincipalState {
    /// Returns true if a principal in this state may log in.
    pub fn can_authenticate(&self) -> bool {
        !matches!(self, PrincipalState::Blocked)
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalState::Pending => "pending",
            PrincipalState::Approved => "approved",
            PrincipalState::Blocked => "blocked",
        }
    }
}

impl fmt::Display for PrincipalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrincipalState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PrincipalState::Pending),
            "approved" => Ok(PrincipalState::Approved),
            "blocked" => Ok(PrincipalState::Blocked),
            other => Err(ValidationError::invalid_format(
                "principal_state",
                format!("unknown principal state '{}'", other),
            )),
        }
    }
}

impl StateMachine for PrincipalState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PrincipalState::*;
        matches!(
            (self, target),
            (Pending, Approved) | (Pending, Blocked) | (Approved, Blocked)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PrincipalState::*;
        match self {
            Pending => vec![Approved, Blocked],
            Approved => vec![Blocked],
            Blocked => vec![],
        }
    }
}
