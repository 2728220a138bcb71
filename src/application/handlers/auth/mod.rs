//! Login command handlers.

mod authenticate;
mod login;

pub use authenticate::{AuthenticateCommand, AuthenticateHandler, AuthenticateResult};
pub use login::{LoginCommand, LoginHandler, LoginOutcome, REDIRECT_PARAM};
