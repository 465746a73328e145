//! Request spans.

use axum::http::Method;
use tracing::{field, Span};

use crate::http::request::RequestScope;

/// Root span for one request. `http.status_code`, `latency_ms` and
/// `user_id` are filled in as the request progresses.
pub fn request_span(service: &str, method: &Method, scope: &RequestScope) -> Span {
    tracing::info_span!(
        "http_request",
        service = %service,
        http.method = %method,
        http.route = %scope.route(),
        request_id = %scope.correlation_id(),
        http.status_code = field::Empty,
        latency_ms = field::Empty,
        user_id = field::Empty,
    )
}

/// Attach the authenticated principal to the current request span.
pub fn record_principal(user_id: i64) {
    Span::current().record("user_id", user_id);
}
