use axum::{Extension, Json};
use serde::Serialize;

use crate::http::request::RequestScope;
use crate::http::response::ApiError;

#[derive(Serialize)]
pub struct HealthStatus {
    pub version: &'static str,
    pub status: &'static str,
}

pub async fn health(Extension(scope): Extension<RequestScope>) -> Result<Json<HealthStatus>, ApiError> {
    scope.ensure_live()?;
    Ok(Json(HealthStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    }))
}
