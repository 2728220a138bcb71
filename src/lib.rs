//! Linkgate - identity linking and session issuance.
//!
//! A client logs in through a third-party provider via an identity broker.
//! Linkgate exchanges the broker's state for an OAuth credential, resolves
//! the provider identity, finds or creates the principal/user/external
//! account triple for it, and mints an opaque session token.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
