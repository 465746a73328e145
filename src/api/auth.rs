use axum::{body::Bytes, extract::State, Extension, Json};

use crate::api::dto::{parse_json, LoginRequest, LoginResponse};
use crate::api::AppState;
use crate::http::request::RequestScope;
use crate::http::response::ApiError;

const LOGIN_FAILED: &str = "Login failed";

/// `POST /login`: exchange email and password for a bearer credential.
pub async fn login(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    body: Bytes,
) -> Result<Json<LoginResponse>, ApiError> {
    scope.ensure_live()?;

    let request: LoginRequest = parse_json(&body)?;
    request.validate()?;

    let user = state
        .users
        .find_by_email(&request.email)
        .await?
        .ok_or(ApiError::Authentication(LOGIN_FAILED))?;

    if !state.passwords.verify(&request.password, &user.password_hash) {
        tracing::info!(request_id = %scope.correlation_id(), user_id = user.id, "Password mismatch");
        return Err(ApiError::Authentication(LOGIN_FAILED));
    }

    let token = state
        .tokens
        .issue(&user.email)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(LoginResponse { token }))
}
