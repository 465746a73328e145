//! Identity stage: bearer credential → principal.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::request::{Principal, RequestScope};
use crate::http::response::ApiError;
use crate::observability::tracing::record_principal;
use crate::security::CredentialVerifier;
use crate::storage::UserStore;

#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn CredentialVerifier>,
    pub users: Arc<dyn UserStore>,
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(ApiError::Authentication("Authorization header missing"))?
        .to_str()
        .map_err(|_| ApiError::Authentication("Authorization header malformed"))?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(ApiError::Authentication("Authorization header malformed")),
    }
}

/// Verify the credential and load the account it names.
pub async fn resolve_principal(state: &AuthState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let token = extract_bearer(headers)?;
    let email = state
        .verifier
        .verify(token)
        .map_err(|_| ApiError::Authentication("Invalid token"))?;

    match state.users.find_by_email(&email).await? {
        Some(user) => Ok(Principal {
            email: user.email,
            user_id: user.id,
        }),
        None => Err(ApiError::Authentication("Unknown account")),
    }
}

pub async fn authentication_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let principal = match resolve_principal(&state, req.headers()).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    record_principal(principal.user_id);
    let scope = RequestScope::take(&mut req).with_principal(principal);
    scope.attach(&mut req);
    next.run(req).await
}
