//! Request and response bodies.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::http::response::ApiError;
use crate::storage::User;

const MIN_PASSWORD_LEN: usize = 10;

fn is_email(candidate: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(candidate))
}

fn invalid(message: &str) -> ApiError {
    ApiError::ClientInput(message.to_string())
}

/// Parse a JSON body, mapping every failure to the same client error.
pub fn parse_json<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected request body");
        invalid("Invalid JSON format")
    })
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.email.is_empty() {
            return Err(invalid("email is required"));
        }
        if self.password.is_empty() {
            return Err(invalid("password is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct UserCreateRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub re_password: String,
}

impl UserCreateRequest {
    /// Rules are checked in order; the first failure is reported.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.is_empty() {
            return Err(invalid("name is required"));
        }
        if self.email.is_empty() {
            return Err(invalid("email is required"));
        }
        if !is_email(&self.email) {
            return Err(invalid("email must be valid"));
        }
        if self.password.is_empty() {
            return Err(invalid("password is required"));
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(invalid("password must be at least 10 characters"));
        }
        let p = &self.password;
        if !p.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(invalid("password must contain a lowercase letter"));
        }
        if !p.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(invalid("password must contain an uppercase letter"));
        }
        if !p.chars().any(|c| c.is_ascii_digit()) {
            return Err(invalid("password must contain a digit"));
        }
        if p.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid("password must contain a special character"));
        }
        if self.re_password.is_empty() {
            return Err(invalid("re_password is required"));
        }
        if self.password != self.re_password {
            return Err(invalid("password and re_password do not match"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UserUpdateRequest {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

impl UserUpdateRequest {
    pub fn validate(&self, path_id: i64) -> Result<(), ApiError> {
        if self.id != path_id {
            return Err(invalid("id does not match the user id"));
        }
        if self.name.is_empty() {
            return Err(invalid("name is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
}
