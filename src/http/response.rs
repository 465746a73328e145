//! Error responses.
//!
//! # Responsibilities
//! - Define the error taxonomy every stage and handler reports through
//! - Map each error to its status code and a stable JSON body
//!
//! # Design Decisions
//! - Errors are translated where they are detected; no stage re-interprets
//!   another stage's response
//! - Server-side details (store errors, misconfiguration) go to the log only
//! - Body shape: `{"error": "<code>", "message": "<text>"}`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::http::request::CancelReason;
use crate::storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed body, missing header, invalid identifier.
    #[error("{0}")]
    ClientInput(String),

    /// Missing, malformed, invalid or expired credential.
    #[error("{0}")]
    Authentication(&'static str),

    /// Authenticated, but the route is not granted.
    #[error("access to this route is not granted")]
    Authorization,

    #[error("resource not found")]
    NotFound,

    /// A request with the same Idempotency-Key is still executing.
    #[error("a request with this Idempotency-Key is already in progress")]
    IdempotencyInFlight,

    #[error("too many requests")]
    RateExceeded,

    #[error("admission misconfigured: {0}")]
    AdmissionConfig(String),

    #[error("{0}")]
    Cancelled(CancelReason),

    /// A panic caught by the containment stage.
    #[error("unexpected failure")]
    Unexpected,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ClientInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::IdempotencyInFlight => StatusCode::CONFLICT,
            ApiError::RateExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Cancelled(_) => StatusCode::EXPECTATION_FAILED,
            ApiError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::AdmissionConfig(_)
            | ApiError::Unexpected
            | ApiError::Store(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ClientInput(_) => "invalid_request",
            ApiError::Authentication(_) => "unauthenticated",
            ApiError::Authorization => "forbidden",
            ApiError::NotFound => "not_found",
            ApiError::IdempotencyInFlight => "idempotency_in_flight",
            ApiError::RateExceeded => "rate_limited",
            ApiError::Cancelled(CancelReason::Canceled) => "request_canceled",
            ApiError::Cancelled(CancelReason::DeadlineExceeded) => "deadline_exceeded",
            ApiError::Store(StoreError::Conflict(_)) => "conflict",
            ApiError::AdmissionConfig(_)
            | ApiError::Unexpected
            | ApiError::Store(_)
            | ApiError::Internal(_) => "internal_error",
        }
    }

    fn public_message(&self) -> String {
        if self.status().is_server_error() {
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        json_error(status, self.code(), self.public_message())
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
