//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! observe stage:
//!     → tracing.rs (one `http_request` span per request, correlation ID)
//!     → metrics.rs (count, latency, 5xx)
//! admission, idempotency, containment, handlers:
//!     → metrics.rs (in-flight, rate limited, cancelled, panics, replays, cache)
//! main:
//!     → logging.rs (subscriber), metrics.rs (Prometheus listener)
//! ```

pub mod logging;
pub mod metrics;
pub mod tracing;
