//! Access Control Middleware.
//! Enforces per-route grants for the authenticated principal.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::http::request::RequestScope;
use crate::http::response::ApiError;
use crate::storage::GrantStore;

/// State required for access control.
#[derive(Clone)]
pub struct AccessControlState {
    pub grants: Arc<dyn GrantStore>,
}

pub async fn access_control_middleware(
    State(state): State<AccessControlState>,
    req: Request,
    next: Next,
) -> Response {
    // 1. The identity stage must have run.
    let (user_id, grant_key, request_id) = match RequestScope::of(&req) {
        Some(scope) => match scope.principal() {
            Some(principal) => (
                principal.user_id,
                scope.route().grant_key(req.method()),
                scope.correlation_id().to_string(),
            ),
            None => return ApiError::Authentication("Authorization header missing").into_response(),
        },
        None => return ApiError::Authentication("Authorization header missing").into_response(),
    };

    // 2. Look up the grant; any failure denies.
    match state.grants.has_grant(user_id, &grant_key).await {
        Ok(true) => next.run(req).await,
        Ok(false) => {
            warn!(request_id = %request_id, user_id, route = %grant_key, "Access denied");
            ApiError::Authorization.into_response()
        }
        Err(e) => {
            error!(request_id = %request_id, user_id, route = %grant_key, error = %e, "Grant lookup failed");
            ApiError::Authorization.into_response()
        }
    }
}
