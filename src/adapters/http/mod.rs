//! HTTP adapters - REST API implementations.

pub mod identity;
mod server;

pub use identity::{identity_router, IdentityAppState};
pub use server::build_router;
