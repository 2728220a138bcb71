//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the application and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `UnitOfWork` / `AccountTransaction` - Transactional account and token writes
//! - `AccountReader` - Session and account lookups
//!
//! ## Upstream Ports
//!
//! - `IdentityExchange` - Login state to OAuth credential via the broker
//! - `ProviderAccountResolver` - OAuth credential to provider profile

mod account_reader;
mod account_store;
mod identity_exchange;
mod provider_resolver;
mod upstream_error;

pub use account_reader::AccountReader;
pub use account_store::{
    validate_savepoint_name, AccountStore, AccountTransaction, TokenStore, UnitOfWork,
};
pub use identity_exchange::IdentityExchange;
pub use provider_resolver::ProviderAccountResolver;
pub use upstream_error::UpstreamError;
