//! Admission stage.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::request::{CancelReason, RequestScope};
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::security::AdmissionGate;

/// Runs the rest of the chain while holding an admission permit.
pub async fn admission_middleware(
    State(gate): State<Arc<AdmissionGate>>,
    mut req: Request,
    next: Next,
) -> Response {
    let scope = RequestScope::take(&mut req);

    let permit = match gate.admit(&scope).await {
        Ok(permit) => permit,
        Err(err) => {
            match &err {
                ApiError::RateExceeded => {
                    tracing::warn!(request_id = %scope.correlation_id(), "Rate limit exceeded");
                    metrics::record_rate_limited();
                }
                ApiError::Cancelled(reason) => {
                    tracing::info!(
                        request_id = %scope.correlation_id(),
                        reason = %reason,
                        "Request abandoned before admission"
                    );
                    metrics::record_cancelled("admission", reason_label(*reason));
                }
                _ => {}
            }
            return err.into_response();
        }
    };

    scope.attach(&mut req);
    let response = next.run(req).await;
    drop(permit);
    response
}

pub(crate) fn reason_label(reason: CancelReason) -> &'static str {
    match reason {
        CancelReason::Canceled => "canceled",
        CancelReason::DeadlineExceeded => "deadline_exceeded",
    }
}
