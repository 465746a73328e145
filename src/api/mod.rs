//! Application endpoints.
//!
//! # Data Flow
//! ```text
//! public chain:  POST /login, GET /health
//! private chain: GET|POST /users, GET|PUT|DELETE /users/{id}
//!     → handler: check scope liveness → parse/validate → stores → JSON
//! ```

pub mod auth;
pub mod dto;
pub mod health;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;

use crate::security::{PasswordHasher, TokenIssuer};
use crate::storage::{CacheStore, UserStore};

/// Grant keys for every private route, as checked by the access stage.
pub const PRIVATE_GRANTS: [&str; 5] = [
    "GET /users",
    "POST /users",
    "GET /users/:id",
    "PUT /users/:id",
    "DELETE /users/:id",
];

/// Collaborators injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub cache: Arc<dyn CacheStore>,
    pub passwords: Arc<dyn PasswordHasher>,
    pub tokens: Arc<TokenIssuer>,
    pub user_cache_ttl: Duration,
}

/// Routes open to anonymous callers.
pub fn public_routes(state: AppState) -> Router {
    Router::new()
        .route("/login", post(auth::login))
        .route("/health", get(health::health))
        .with_state(state)
}

/// Routes that require an authorized principal.
pub fn private_routes(state: AppState) -> Router {
    Router::new()
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/{id}",
            get(users::get_by_id).put(users::update).delete(users::delete),
        )
        .with_state(state)
}
