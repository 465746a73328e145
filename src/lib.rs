//! Request admission and idempotency pipeline for an auth + user CRUD service.

pub mod api;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod storage;

pub use config::schema::ServiceConfig;
pub use http::{AppServer, Collaborators};
pub use lifecycle::Shutdown;
