//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - PostgreSQL storage (transactional writes, reads)
//! - `memory` - in-process storage with the same semantics
//! - `broker` - identity broker exchange client
//! - `providers` - provider profile resolvers
//! - `http` - axum REST surface

pub mod broker;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod providers;
