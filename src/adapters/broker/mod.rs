//! Identity broker adapters.

mod exchange_client;
mod mock;

pub use exchange_client::{BrokerClientConfig, BrokerExchangeClient};
pub use mock::MockIdentityExchange;
