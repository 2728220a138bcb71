//! Identity module - principals, users and their linked provider accounts.

mod credential;
mod errors;
mod external_account;
mod principal;
mod provider;
mod state;
mod user;

pub use credential::OAuthCredential;
pub use errors::IdentityError;
pub use external_account::{ExternalAccount, NewExternalAccount};
pub use principal::{NewPrincipal, Principal};
pub use provider::{IdentityKey, ProviderKind, ProviderProfile};
pub use state::PrincipalState;
pub use user::{LinkedUser, User};
