//! User CRUD handlers.
//!
//! Single-user reads go through the cache under `users.<id>`; updates and
//! deletes invalidate that entry. Cache failures degrade to store reads.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::api::dto::{parse_json, ListQuery, UserCreateRequest, UserResponse, UserUpdateRequest};
use crate::api::AppState;
use crate::http::request::RequestScope;
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::storage::NewUser;

pub fn user_cache_key(id: i64) -> String {
    format!("users.{id}")
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::ClientInput("please supply a valid id".to_string()))
}

fn actor(scope: &RequestScope) -> Result<i64, ApiError> {
    scope
        .principal()
        .map(|principal| principal.user_id)
        .ok_or(ApiError::Authentication("Authorization header missing"))
}

async fn invalidate(state: &AppState, id: i64) {
    if let Err(e) = state.cache.delete(&user_cache_key(id)).await {
        tracing::warn!(user_id = id, error = %e, "Failed to invalidate cached user");
    }
}

/// `GET /users?search=`
pub async fn list(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    scope.ensure_live()?;

    let search = query.search.as_deref().filter(|s| !s.is_empty());
    let users = state.users.list(search).await?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

/// `GET /users/{id}`
pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    scope.ensure_live()?;
    let id = parse_id(&id)?;
    let key = user_cache_key(id);

    match state.cache.get(&key).await {
        Ok(Some(cached)) => {
            metrics::record_user_cache(true);
            return Ok(([(CONTENT_TYPE, "application/json")], cached).into_response());
        }
        Ok(None) => metrics::record_user_cache(false),
        Err(e) => tracing::warn!(user_id = id, error = %e, "User cache read failed"),
    }

    let user = state.users.find(id).await?.ok_or(ApiError::NotFound)?;
    let body = serde_json::to_vec(&UserResponse::from(&user))
        .map_err(|e| ApiError::Internal(format!("failed to encode user: {e}")))?;
    let body = Bytes::from(body);

    if let Err(e) = state.cache.set(&key, body.clone(), state.user_cache_ttl).await {
        tracing::warn!(user_id = id, error = %e, "User cache write failed");
    }

    Ok(([(CONTENT_TYPE, "application/json")], body).into_response())
}

/// `POST /users`
pub async fn create(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    body: Bytes,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    scope.ensure_live()?;
    let actor = actor(&scope)?;

    let request: UserCreateRequest = parse_json(&body)?;
    request.validate()?;

    let user = state
        .users
        .create(
            NewUser {
                name: request.name,
                password_hash: state.passwords.hash(&request.password),
                email: request.email,
            },
            Some(actor),
        )
        .await?;

    tracing::info!(request_id = %scope.correlation_id(), user_id = user.id, created_by = actor, "User created");
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// `PUT /users/{id}`
pub async fn update(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<UserResponse>, ApiError> {
    scope.ensure_live()?;
    let actor = actor(&scope)?;
    let id = parse_id(&id)?;

    let request: UserUpdateRequest = parse_json(&body)?;
    request.validate(id)?;

    let user = state
        .users
        .rename(id, &request.name, actor)
        .await?
        .ok_or(ApiError::NotFound)?;
    invalidate(&state, id).await;

    Ok(Json(UserResponse::from(&user)))
}

/// `DELETE /users/{id}`: soft delete.
pub async fn delete(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    scope.ensure_live()?;
    let actor = actor(&scope)?;
    let id = parse_id(&id)?;

    if !state.users.delete(id, actor).await? {
        return Err(ApiError::NotFound);
    }
    invalidate(&state, id).await;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(parse_id("42").unwrap(), 42);
        for raw in ["abc", "0", "-3", "", "4.2"] {
            assert!(matches!(parse_id(raw), Err(ApiError::ClientInput(_))), "{raw:?}");
        }
    }

    #[test]
    fn cache_key_uses_users_prefix() {
        assert_eq!(user_cache_key(7), "users.7");
    }
}
