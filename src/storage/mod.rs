//! Storage collaborators.
//!
//! # Data Flow
//! ```text
//! idempotency gate ──▶ cache.rs  (raw bytes, TTL, set-if-absent)
//! user handlers    ──▶ cache.rs  (read-through `users.<id>`)
//!                  ──▶ users.rs  (accounts, soft delete)
//! identity stage   ──▶ users.rs  (resolve verified subject)
//! access stage     ──▶ grants.rs (principal × route template)
//! ```
//!
//! # Design Decisions
//! - Every store is a trait; the in-memory implementations back the binary and tests
//! - Cached values are pre-serialized bytes, decoded explicitly by the reader

pub mod cache;
pub mod grants;
pub mod users;

pub use cache::{CacheStore, InMemoryCache};
pub use grants::{GrantStore, InMemoryGrantStore};
pub use users::{InMemoryUserStore, NewUser, User, UserStore};

/// Failure reported by a storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
