//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Login is a command touching several tables in one transaction; the
//! user lookups are queries against committed state.

pub mod handlers;
pub mod services;

pub use handlers::{
    AuthenticateCommand, AuthenticateHandler, AuthenticateResult, CheckPromotionHandler,
    CheckPromotionQuery, FindUserByPrincipalHandler, FindUserByPrincipalQuery,
    GetCurrentUserHandler, GetCurrentUserQuery, LoginCommand, LoginHandler, LoginOutcome,
};
pub use services::{PrincipalPolicy, ProviderRegistry, TokenIssuer};
