//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (ids, timestamps, errors)
//! - `identity` - Principals, users, provider accounts and the login error taxonomy
//! - `token` - Opaque session tokens

pub mod foundation;
pub mod identity;
pub mod token;
