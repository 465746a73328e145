//! Outermost stage: request scope, span, metrics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

use crate::http::request::RequestScope;
use crate::observability::metrics;
use crate::observability::tracing::request_span;

#[derive(Clone)]
pub struct ObserveState {
    pub service_name: Arc<str>,
    pub request_timeout: Duration,
}

impl ObserveState {
    pub fn new(service_name: &str, request_timeout: Duration) -> Self {
        Self {
            service_name: Arc::from(service_name),
            request_timeout,
        }
    }
}

/// Creates the request scope (or keeps one a caller attached), runs the rest
/// of the chain inside the request span and records the outcome.
///
/// The scope's cancellation token fires when this future is dropped, so a
/// client disconnect reaches every stage below.
pub async fn observe_middleware(
    State(state): State<ObserveState>,
    mut req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let scope = match RequestScope::of(&req) {
        Some(existing) => existing.clone(),
        None => RequestScope::for_request(&req, state.request_timeout),
    };

    let method = req.method().clone();
    let route = scope.route().to_string();
    let span = request_span(&state.service_name, &method, &scope);
    let _cancel_on_drop = scope.cancellation().clone().drop_guard();
    scope.attach(&mut req);

    let response = next.run(req).instrument(span.clone()).await;

    let status = response.status();
    let latency_ms = start.elapsed().as_millis() as u64;
    span.record("http.status_code", status.as_u16());
    span.record("latency_ms", latency_ms);
    metrics::record_request(method.as_str(), &route, status.as_u16(), start);

    span.in_scope(|| {
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), latency_ms, "Request failed");
        } else {
            tracing::info!(status = status.as_u16(), latency_ms, "Request completed");
        }
    });

    response
}
