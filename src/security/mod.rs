//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → admission.rs  (limits.rs slot, then rate_limit.rs token)
//!     → credentials.rs (bearer credential → subject)
//!     → grant check   (storage::grants)
//!
//! Login:
//!     → password.rs (verify stored hash)
//!     → credentials.rs (issue bearer credential)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a failed or errored check rejects the request
//! - One rate bucket for the whole process, built at startup

pub mod admission;
pub mod credentials;
pub mod limits;
pub mod password;
pub mod rate_limit;

pub use admission::{AdmissionGate, AdmissionPermit};
pub use credentials::{AuthError, CredentialVerifier, TokenIssuer};
pub use limits::ConcurrencyLimit;
pub use password::{PasswordHasher, SaltedSha256};
pub use rate_limit::RateLimiter;
