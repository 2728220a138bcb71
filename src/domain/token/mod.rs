//! Token module - session tokens issued after a successful login.

mod access_token;
mod session_token;

pub use access_token::{AccessToken, NewAccessToken};
pub use session_token::{SessionToken, TOKEN_BYTES};
