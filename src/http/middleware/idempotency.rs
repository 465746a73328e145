//! Idempotency gate for state-changing requests.
//!
//! # Responsibilities
//! - Require an `Idempotency-Key` on POST, PUT and DELETE
//! - Claim the key before executing so concurrent duplicates are refused
//! - Record the complete response (status, content type, body) and replay it
//!   for later requests carrying the same key
//!
//! # Design Decisions
//! - Cache key is `idempotency.<METHOD /template>.<token>`; a token only
//!   deduplicates requests to the same route
//! - The claim is a set-if-absent marker with a short lease. A request that
//!   panics or is dropped before recording releases its claim immediately;
//!   the lease only matters when the process dies mid-request
//! - Error responses are recorded and replayed like successes, including the
//!   500 returned when a response is too large to record

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bytes::{Buf, BufMut, BytesMut};
use futures_util::FutureExt;

use crate::config::IdempotencyConfig;
use crate::http::request::{RequestScope, RouteTemplate};
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::storage::CacheStore;

pub const IDEMPOTENCY_KEY: &str = "idempotency-key";
pub const IDEMPOTENT_REPLAYED: &str = "idempotent-replayed";

const KEY_PREFIX: &str = "idempotency.";
const RECORD_VERSION: u8 = 1;
/// Stored while the first request with a key is still executing. Never a
/// valid record because records start with `RECORD_VERSION`.
const IN_FLIGHT: &[u8] = b"\x00in-flight";

pub fn record_key(method: &Method, route: &RouteTemplate, token: &str) -> String {
    format!("{KEY_PREFIX}{}.{token}", route.grant_key(method))
}

pub fn requires_key(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is truncated")]
    Truncated,

    #[error("unknown record version {0}")]
    UnknownVersion(u8),

    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error("invalid content type")]
    InvalidContentType,
}

/// A completed response as stored in the cache.
///
/// Layout: version `u8`, status `u16`, content-type length `u16`,
/// content-type bytes, body bytes. Integers are big-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyRecord {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl IdempotencyRecord {
    pub fn encode(&self) -> Bytes {
        let content_type = self
            .content_type
            .as_ref()
            .map(HeaderValue::as_bytes)
            .unwrap_or_default();
        let content_type = &content_type[..content_type.len().min(u16::MAX as usize)];

        let mut buf = BytesMut::with_capacity(5 + content_type.len() + self.body.len());
        buf.put_u8(RECORD_VERSION);
        buf.put_u16(self.status.as_u16());
        buf.put_u16(content_type.len() as u16);
        buf.put_slice(content_type);
        buf.put_slice(&self.body);
        buf.freeze()
    }

    pub fn decode(mut raw: Bytes) -> Result<Self, RecordError> {
        if raw.remaining() < 5 {
            return Err(RecordError::Truncated);
        }
        let version = raw.get_u8();
        if version != RECORD_VERSION {
            return Err(RecordError::UnknownVersion(version));
        }
        let status = raw.get_u16();
        let status = StatusCode::from_u16(status).map_err(|_| RecordError::InvalidStatus(status))?;

        let type_len = raw.get_u16() as usize;
        if raw.remaining() < type_len {
            return Err(RecordError::Truncated);
        }
        let content_type = raw.split_to(type_len);
        let content_type = if content_type.is_empty() {
            None
        } else {
            Some(
                HeaderValue::from_maybe_shared(content_type)
                    .map_err(|_| RecordError::InvalidContentType)?,
            )
        };

        Ok(Self {
            status,
            content_type,
            body: raw,
        })
    }

    fn into_replay(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        if let Some(content_type) = self.content_type {
            headers.insert(CONTENT_TYPE, content_type);
        }
        headers.insert(IDEMPOTENT_REPLAYED, HeaderValue::from_static("true"));
        response
    }
}

#[derive(Clone)]
pub struct IdempotencyState {
    pub cache: Arc<dyn CacheStore>,
    pub ttl: Duration,
    pub lease: Duration,
    pub max_recorded_bytes: usize,
}

impl IdempotencyState {
    pub fn new(cache: Arc<dyn CacheStore>, config: &IdempotencyConfig) -> Self {
        Self {
            cache,
            ttl: Duration::from_secs(config.ttl_secs),
            lease: Duration::from_secs(config.lease_secs),
            max_recorded_bytes: config.max_recorded_bytes,
        }
    }
}

/// Holds an in-flight marker. Dropping an armed claim deletes the marker, so
/// a request that unwinds or is cancelled before recording does not block
/// its retries until the lease expires.
struct Claim {
    cache: Arc<dyn CacheStore>,
    key: String,
    armed: bool,
}

impl Claim {
    fn new(cache: Arc<dyn CacheStore>, key: &str) -> Self {
        Self {
            cache,
            key: key.to_string(),
            armed: true,
        }
    }

    /// The marker has been replaced by a record; keep it.
    fn settle(mut self) {
        self.armed = false;
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let cache = Arc::clone(&self.cache);
        let key = std::mem::take(&mut self.key);
        let mut release = Box::pin(async move {
            match cache.delete(&key).await {
                Ok(()) => tracing::debug!(key = %key, "Released idempotency claim"),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to release idempotency claim")
                }
            }
        });
        // Local stores finish immediately; anything slower runs detached.
        if (&mut release).now_or_never().is_none() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(release);
                }
                Err(_) => tracing::warn!("No runtime to release idempotency claim"),
            }
        }
    }
}

pub async fn idempotency_middleware(
    State(state): State<IdempotencyState>,
    req: Request,
    next: Next,
) -> Response {
    if !requires_key(req.method()) {
        return next.run(req).await;
    }

    let token = req
        .headers()
        .get(IDEMPOTENCY_KEY)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let Some(token) = token else {
        return ApiError::ClientInput("Idempotency-Key header is required".to_string())
            .into_response();
    };

    let route = match RequestScope::of(&req) {
        Some(scope) => scope.route().clone(),
        None => RouteTemplate::of(&req),
    };
    let key = record_key(req.method(), &route, &token);

    match execute_once(&state, &key, req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn execute_once(
    state: &IdempotencyState,
    key: &str,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(stored) = state.cache.get(key).await? {
        return replay(key, stored);
    }

    if !state
        .cache
        .add(key, Bytes::from_static(IN_FLIGHT), state.lease)
        .await?
    {
        // Another request claimed the key between our read and our claim.
        return match state.cache.get(key).await? {
            Some(stored) => replay(key, stored),
            None => Err(ApiError::IdempotencyInFlight),
        };
    }

    let claim = Claim::new(Arc::clone(&state.cache), key);
    let request_id = RequestScope::of(&req)
        .map(|scope| scope.correlation_id().to_string())
        .unwrap_or_default();

    let response = next.run(req).await;
    let (parts, body) = response.into_parts();
    let (parts, body) = match axum::body::to_bytes(body, state.max_recorded_bytes).await {
        Ok(body) => (parts, body),
        Err(e) => {
            // The handler already ran; record the failure so a retry cannot
            // repeat the side effect.
            tracing::error!(
                request_id = %request_id,
                key,
                status = parts.status.as_u16(),
                error = %e,
                "Response could not be recorded"
            );
            let (parts, body) = ApiError::Unexpected.into_response().into_parts();
            let body = axum::body::to_bytes(body, usize::MAX)
                .await
                .unwrap_or_default();
            (parts, body)
        }
    };

    let record = IdempotencyRecord {
        status: parts.status,
        content_type: parts.headers.get(CONTENT_TYPE).cloned(),
        body: body.clone(),
    };
    match state.cache.set(key, record.encode(), state.ttl).await {
        Ok(()) => {
            claim.settle();
            tracing::debug!(
                request_id = %request_id,
                key,
                status = parts.status.as_u16(),
                "Recorded idempotent response"
            );
        }
        Err(e) => tracing::warn!(
            request_id = %request_id,
            key,
            error = %e,
            "Failed to record idempotent response"
        ),
    }

    Ok(Response::from_parts(parts, Body::from(body)))
}

fn replay(key: &str, stored: Bytes) -> Result<Response, ApiError> {
    if stored.as_ref() == IN_FLIGHT {
        return Err(ApiError::IdempotencyInFlight);
    }
    let record = IdempotencyRecord::decode(stored)
        .map_err(|e| ApiError::Internal(format!("corrupt idempotency record {key}: {e}")))?;

    tracing::debug!(key, status = record.status.as_u16(), "Replaying recorded response");
    metrics::record_idempotent_replay();
    Ok(record.into_replay())
}
