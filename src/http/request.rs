//! Per-request processing scope.
//!
//! # Responsibilities
//! - Carry the correlation ID, normalized route template, principal, deadline
//!   and cancellation token for one request
//! - Normalize concrete paths into route templates (`/users/42` → `/users/:id`)
//!
//! # Design Decisions
//! - One typed value in the request extensions, created at pipeline entry
//! - Stages replace the scope wholesale instead of mutating it in place
//! - Dropped with the request; nothing outside the chain keeps a handle

use std::fmt;
use std::time::Duration;

use axum::extract::{MatchedPath, Request};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::http::response::ApiError;

/// Header carrying the correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Deadline applied when a scope is created outside the observe stage.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a request stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Canceled,
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Canceled => f.write_str("request is canceled"),
            CancelReason::DeadlineExceeded => f.write_str("deadline is exceeded"),
        }
    }
}

/// The authenticated identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
    pub user_id: i64,
}

/// A request path with variable segments replaced by `:name` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteTemplate(String);

impl RouteTemplate {
    /// Convert a router pattern (`/users/{id}`, `/files/{*rest}`) to the
    /// placeholder form (`/users/:id`, `/files/*rest`).
    pub fn from_pattern(pattern: &str) -> Self {
        let segments: Vec<String> = pattern
            .split('/')
            .map(|segment| {
                match segment
                    .strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                {
                    Some(name) if name.starts_with('*') => name.to_string(),
                    Some(name) => format!(":{name}"),
                    None => segment.to_string(),
                }
            })
            .collect();
        Self(segments.join("/"))
    }

    /// Replace concrete parameter values in `path` with their names.
    ///
    /// Each parameter replaces the first whole segment equal to its value
    /// that has not already been replaced.
    pub fn from_params<K, V>(path: &str, params: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut segments: Vec<(String, bool)> = path
            .split('/')
            .map(|segment| (segment.to_string(), false))
            .collect();

        for (key, value) in params {
            let slot = segments
                .iter_mut()
                .skip(1)
                .find(|(segment, replaced)| !replaced && segment == value.as_ref());
            if let Some((segment, replaced)) = slot {
                *segment = format!(":{}", key.as_ref());
                *replaced = true;
            }
        }

        Self(
            segments
                .into_iter()
                .map(|(segment, _)| segment)
                .collect::<Vec<_>>()
                .join("/"),
        )
    }

    /// Template for a request: the matched router pattern when available,
    /// otherwise the literal path.
    pub fn of(request: &Request) -> Self {
        match request.extensions().get::<MatchedPath>() {
            Some(matched) => Self::from_pattern(matched.as_str()),
            None => Self(request.uri().path().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key used by the grant store, e.g. `PUT /users/:id`.
    pub fn grant_key(&self, method: &axum::http::Method) -> String {
        format!("{} {}", method, self.0)
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the pipeline knows about one in-flight request.
#[derive(Debug, Clone)]
pub struct RequestScope {
    correlation_id: String,
    route: RouteTemplate,
    principal: Option<Principal>,
    deadline: Instant,
    cancel: CancellationToken,
}

impl RequestScope {
    pub fn new(correlation_id: impl Into<String>, route: RouteTemplate, timeout: Duration) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            route,
            principal: None,
            deadline: Instant::now() + timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Build a scope from the request's `x-request-id` header (or a fresh
    /// UUID) and its route template.
    pub fn for_request(request: &Request, timeout: Duration) -> Self {
        let correlation_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self::new(correlation_id, RouteTemplate::of(request), timeout)
    }

    /// Detach the scope from `request`, creating one if no stage has yet.
    pub fn take(request: &mut Request) -> Self {
        match request.extensions_mut().remove::<RequestScope>() {
            Some(scope) => scope,
            None => Self::for_request(request, DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Borrow the scope attached to `request`, if any.
    pub fn of(request: &Request) -> Option<&RequestScope> {
        request.extensions().get::<RequestScope>()
    }

    pub fn attach(self, request: &mut Request) {
        request.extensions_mut().insert(self);
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn route(&self) -> &RouteTemplate {
        &self.route
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Why the request should stop now, if it should.
    pub fn interruption(&self) -> Option<CancelReason> {
        if self.cancel.is_cancelled() {
            Some(CancelReason::Canceled)
        } else if Instant::now() >= self.deadline {
            Some(CancelReason::DeadlineExceeded)
        } else {
            None
        }
    }

    pub fn ensure_live(&self) -> Result<(), ApiError> {
        match self.interruption() {
            Some(reason) => Err(ApiError::Cancelled(reason)),
            None => Ok(()),
        }
    }

    /// Resolves once the request is cancelled or its deadline passes.
    pub async fn interrupted(&self) -> CancelReason {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => CancelReason::Canceled,
            _ = tokio::time::sleep_until(self.deadline) => CancelReason::DeadlineExceeded,
        }
    }
}
