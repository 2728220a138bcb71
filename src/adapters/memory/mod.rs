//! In-memory adapters.

mod account_store;

pub use account_store::InMemoryAccountStore;
