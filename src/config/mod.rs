//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: CONCURRENCY_LIMIT, RATE_LIMIT_*, ...)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → consumed once at startup to build shared state
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the limiter is built from it exactly once
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdmissionConfig, AuthConfig, BootstrapConfig, CacheConfig, CorsConfig, IdempotencyConfig,
    ListenerConfig, ObservabilityConfig, RateLimitConfig, ServiceConfig, TimeoutConfig,
};
