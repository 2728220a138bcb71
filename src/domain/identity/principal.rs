//! Principal entity.

use crate::domain::foundation::{PrincipalId, Timestamp};
use serde::Serialize;

use super::PrincipalState;

/// Authorization-bearing identity, independent of any login provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub is_admin: bool,
    pub created_on: Timestamp,
    pub last_login: Option<Timestamp>,
    pub state: PrincipalState,
}

impl Principal {
    /// Advances last-login to `now`, never moving it backwards.
    ///
    /// Returns the stored value.
    pub fn record_login(&mut self, now: Timestamp) -> Timestamp {
        let at = match self.last_login {
            Some(previous) => previous.latest(now),
            None => now,
        };
        self.last_login = Some(at);
        at
    }
}

/// Values for a principal that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrincipal {
    pub is_admin: bool,
    pub created_on: Timestamp,
    pub state: PrincipalState,
}

impl NewPrincipal {
    /// A first-time principal: pending, not an admin.
    pub fn pending(created_on: Timestamp) -> Self {
        Self {
            is_admin: false,
            created_on,
            state: PrincipalState::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_datetime(Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn principal(last_login: Option<Timestamp>) -> Principal {
        Principal {
            id: PrincipalId::from_i64(1),
            is_admin: false,
            created_on: at(0),
            last_login,
            state: PrincipalState::Pending,
        }
    }

    #[test]
    fn first_login_sets_timestamp() {
        let mut p = principal(None);
        assert_eq!(p.record_login(at(100)), at(100));
        assert_eq!(p.last_login, Some(at(100)));
    }

    #[test]
    fn later_login_advances_timestamp() {
        let mut p = principal(Some(at(100)));
        p.record_login(at(200));
        assert_eq!(p.last_login, Some(at(200)));
    }

    #[test]
    fn skewed_clock_never_moves_last_login_backwards() {
        let mut p = principal(Some(at(300)));
        assert_eq!(p.record_login(at(200)), at(300));
    }

    #[test]
    fn new_principals_start_pending() {
        let p = NewPrincipal::pending(at(5));
        assert_eq!(p.state, PrincipalState::Pending);
        assert!(!p.is_admin);
    }
}
