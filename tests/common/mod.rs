//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use rest_skeleton::config::{BootstrapConfig, ServiceConfig};
use rest_skeleton::http::middleware::{IDEMPOTENCY_KEY, IDEMPOTENT_REPLAYED};
use rest_skeleton::http::Interceptors;
use rest_skeleton::lifecycle::seed_bootstrap;
use rest_skeleton::security::AdmissionGate;
use rest_skeleton::storage::InMemoryGrantStore;
use rest_skeleton::{AppServer, Collaborators};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "Adm1n!Passw0rd";

/// Defaults with metrics and rate limiting off and a bootstrap admin.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.observability.metrics_enabled = false;
    config.admission.rate_limit.enabled = false;
    config.auth.token_secret = "integration-secret".to_string();
    config.bootstrap = Some(BootstrapConfig {
        name: "Admin".to_string(),
        email: ADMIN_EMAIL.to_string(),
        password: ADMIN_PASSWORD.to_string(),
    });
    config
}

/// The full service router over in-memory collaborators.
pub struct TestApp {
    pub router: Router,
    pub server: AppServer,
    pub collaborators: Collaborators,
    pub grants: Arc<InMemoryGrantStore>,
    pub admin_id: i64,
}

impl TestApp {
    pub async fn new(config: ServiceConfig) -> Self {
        let (collaborators, grants) = Collaborators::in_memory(&config);
        Self::with_collaborators(config, collaborators, grants).await
    }

    pub async fn with_collaborators(
        config: ServiceConfig,
        collaborators: Collaborators,
        grants: Arc<InMemoryGrantStore>,
    ) -> Self {
        let admin_id = match &config.bootstrap {
            Some(bootstrap) => seed_bootstrap(
                bootstrap,
                &collaborators.users,
                &grants,
                collaborators.passwords.as_ref(),
            )
            .await
            .unwrap(),
            None => 0,
        };
        let server = AppServer::new(config, collaborators.clone());
        Self {
            router: server.router(),
            server,
            collaborators,
            grants,
            admin_id,
        }
    }

    pub fn token_for(&self, email: &str) -> String {
        self.collaborators.tokens.issue(email).unwrap()
    }

    pub fn admin_token(&self) -> String {
        self.token_for(ADMIN_EMAIL)
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        send(&self.router, request).await
    }
}

/// Stage dependencies for wrapping test-only handlers.
pub fn interceptors(config: &ServiceConfig) -> (Interceptors, Arc<AdmissionGate>) {
    let (collaborators, _) = Collaborators::in_memory(config);
    let gate = Arc::new(AdmissionGate::from_config(&config.admission));
    let interceptors = Interceptors::from_config(
        config,
        gate.clone(),
        collaborators.cache,
        collaborators.tokens,
        collaborators.users,
        collaborators.grants,
    );
    (interceptors, gate)
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn error_code(&self) -> String {
        self.json()["error"].as_str().unwrap_or_default().to_string()
    }

    pub fn replayed(&self) -> bool {
        self.headers
            .get(IDEMPOTENT_REPLAYED)
            .is_some_and(|v| v == "true")
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn empty(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn with_key(method: Method, uri: &str, key: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(IDEMPOTENCY_KEY, key)
        .body(Body::empty())
        .unwrap()
}

/// JSON request with optional bearer token and idempotency key.
pub fn json(
    method: Method,
    uri: &str,
    token: Option<&str>,
    key: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    if let Some(key) = key {
        builder = builder.header(IDEMPOTENCY_KEY, key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Authenticated request without a body.
pub fn authed(method: Method, uri: &str, token: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"));
    if let Some(key) = key {
        builder = builder.header(IDEMPOTENCY_KEY, key);
    }
    builder.body(Body::empty()).unwrap()
}
