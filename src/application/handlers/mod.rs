//! Application handlers.
//!
//! Command handlers drive the login flow; query handlers serve reads
//! against committed state.

pub mod auth;
pub mod user;

pub use auth::{
    AuthenticateCommand, AuthenticateHandler, AuthenticateResult, LoginCommand, LoginHandler,
    LoginOutcome, REDIRECT_PARAM,
};
pub use user::{
    CheckPromotionHandler, CheckPromotionQuery, FindUserByPrincipalHandler,
    FindUserByPrincipalQuery, GetCurrentUserHandler, GetCurrentUserQuery,
};
