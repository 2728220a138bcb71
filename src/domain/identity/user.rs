//! User entity.

use crate::domain::foundation::UserId;
use serde::Serialize;

use super::{ExternalAccount, Principal};

/// Account record anchoring exactly one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub principal: Principal,
}

/// A user together with the external account that matched a lookup.
#[derive(Debug, Clone)]
pub struct LinkedUser {
    pub user: User,
    pub account: ExternalAccount,
}
