//! PostgreSQL adapters - Database implementations for the storage ports.
//!
//! - `PostgresUnitOfWork` / `PostgresTransaction` - transactional login writes
//! - `PostgresAccountReader` - session and account lookups

mod account_reader;
mod account_store;
mod pool;
mod rows;

pub use account_reader::PostgresAccountReader;
pub use account_store::{PostgresTransaction, PostgresUnitOfWork, IDENTITY_CONSTRAINT};
pub use pool::{connect, migrate, MIGRATOR};
