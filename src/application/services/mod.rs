//! Services composed by the login handlers.

mod principal_policy;
mod provider_registry;
mod token_issuer;

pub use principal_policy::PrincipalPolicy;
pub use provider_registry::ProviderRegistry;
pub use token_issuer::TokenIssuer;
