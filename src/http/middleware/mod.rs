//! Pipeline stages, one per file, outermost first:
//!
//! ```text
//! observe.rs        scope, span, request metrics
//! cors.rs           cross-origin policy
//! panic.rs          panic → 500
//! admission.rs      concurrency slot + rate token
//! idempotency.rs    Idempotency-Key claim, record, replay
//! authentication.rs bearer credential → principal   (private routes)
//! access_control.rs principal × route grant          (private routes)
//! ```

pub mod access_control;
pub mod admission;
pub mod authentication;
pub mod cors;
pub mod idempotency;
pub mod observe;
pub mod panic;

pub use access_control::{access_control_middleware, AccessControlState};
pub use admission::admission_middleware;
pub use authentication::{authentication_middleware, AuthState};
pub use cors::cors_layer;
pub use idempotency::{idempotency_middleware, IdempotencyState, IDEMPOTENCY_KEY, IDEMPOTENT_REPLAYED};
pub use observe::{observe_middleware, ObserveState};
pub use panic::{install_panic_hook, panic_containment_middleware};
