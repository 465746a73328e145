//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, body limit, graceful shutdown)
//!     → pipeline.rs (public or private chain of middleware/ stages)
//!     → request.rs (RequestScope carried through the chain)
//!     → api handlers
//!     → response.rs (ApiError → status + JSON body)
//! ```

pub mod middleware;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use pipeline::{compose, Interceptor, Interceptors, Pipeline, PipelineError, Stage};
pub use request::{CancelReason, Principal, RequestScope, RouteTemplate, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{AppServer, Collaborators};
