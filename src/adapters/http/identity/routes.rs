//! Axum router configuration for the identity endpoints.

use axum::routing::get;
use axum::Router;

use super::handlers::{current_user, health, login, IdentityAppState};

/// Routes nested under `/api`.
///
/// - `GET /login/:provider` - two-phase provider login
/// - `GET /users/current` - user behind the session token
pub fn identity_routes() -> Router<IdentityAppState> {
    Router::new()
        .route("/login/:provider", get(login))
        .route("/users/current", get(current_user))
}

/// Complete identity router with state applied.
pub fn identity_router(state: IdentityAppState) -> Router {
    Router::new()
        .nest("/api", identity_routes())
        .route("/health", get(health))
        .with_state(state)
}
