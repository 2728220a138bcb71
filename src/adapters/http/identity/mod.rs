//! HTTP adapter for login and session lookup.
//!
//! - `GET /api/login/:provider` - start (phase 1) or complete (phase 2) a login
//! - `GET /api/users/current` - resolve `X-Auth-Token` to its user
//! - `GET /health` - liveness

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{
    session_token, IdentityApiError, IdentityAppState, RequestId, AUTH_TOKEN_HEADER,
    REQUEST_ID_HEADER,
};
pub use routes::{identity_router, identity_routes};
