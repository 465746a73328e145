//! Identity and access stages, and the user endpoints behind them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::json;

use rest_skeleton::storage::{GrantStore, InMemoryGrantStore, NewUser, StoreError};
use rest_skeleton::Collaborators;

mod common;

/// Counts lookups, then answers from an inner store or fails.
struct ProbeGrants {
    lookups: AtomicUsize,
    inner: Option<InMemoryGrantStore>,
}

#[async_trait]
impl GrantStore for ProbeGrants {
    async fn has_grant(&self, principal_id: i64, route: &str) -> Result<bool, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match &self.inner {
            Some(store) => store.has_grant(principal_id, route).await,
            None => Err(StoreError::Unavailable("grant backend down".to_string())),
        }
    }
}

async fn app_with_grants(grants: Arc<ProbeGrants>) -> common::TestApp {
    let config = common::test_config();
    let (mut collaborators, seeded): (Collaborators, _) = Collaborators::in_memory(&config);
    let grants: Arc<dyn GrantStore> = grants;
    collaborators.grants = grants;
    common::TestApp::with_collaborators(config, collaborators, seeded).await
}

#[tokio::test]
async fn bad_credentials_never_reach_the_grant_check() {
    let grants = Arc::new(ProbeGrants {
        lookups: AtomicUsize::new(0),
        inner: Some(InMemoryGrantStore::new()),
    });
    let app = app_with_grants(grants.clone()).await;

    let missing = app.send(common::empty(Method::GET, "/users")).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.error_code(), "unauthenticated");

    let garbage = app.send(common::authed(Method::GET, "/users", "not-a-token", None)).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);

    let unknown = app.token_for("ghost@example.com");
    let ghost = app.send(common::authed(Method::GET, "/users", &unknown, None)).await;
    assert_eq!(ghost.status, StatusCode::UNAUTHORIZED);

    assert_eq!(grants.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn authenticated_without_grant_is_forbidden() {
    let app = common::TestApp::new(common::test_config()).await;
    let user = app
        .collaborators
        .users
        .create(
            NewUser {
                name: "Reader".into(),
                email: "reader@example.com".into(),
                password_hash: "unused".into(),
            },
            Some(app.admin_id),
        )
        .await
        .unwrap();
    let token = app.token_for(&user.email);

    let response = app.send(common::authed(Method::GET, "/users", &token, None)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.error_code(), "forbidden");

    app.grants.grant(user.id, "GET /users");
    let response = app.send(common::authed(Method::GET, "/users", &token, None)).await;
    assert_eq!(response.status, StatusCode::OK);

    let path = format!("/users/{}", user.id);
    let response = app.send(common::authed(Method::GET, &path, &token, None)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN, "grants are per route template");
}

#[tokio::test]
async fn failing_grant_lookup_denies_access() {
    let grants = Arc::new(ProbeGrants {
        lookups: AtomicUsize::new(0),
        inner: None,
    });
    let app = app_with_grants(grants.clone()).await;

    let response = app
        .send(common::authed(Method::GET, "/users", &app.admin_token(), None))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(grants.lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn login_issues_a_usable_credential() {
    let app = common::TestApp::new(common::test_config()).await;

    let wrong = app
        .send(common::json(
            Method::POST,
            "/login",
            None,
            Some("login-wrong"),
            json!({ "email": common::ADMIN_EMAIL, "password": "nope" }),
        ))
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let login = app
        .send(common::json(
            Method::POST,
            "/login",
            None,
            Some("login-ok"),
            json!({ "email": common::ADMIN_EMAIL, "password": common::ADMIN_PASSWORD }),
        ))
        .await;
    assert_eq!(login.status, StatusCode::OK);
    let token = login.json()["token"].as_str().unwrap().to_string();

    let users = app.send(common::authed(Method::GET, "/users", &token, None)).await;
    assert_eq!(users.status, StatusCode::OK);
    assert_eq!(users.json()[0]["email"], common::ADMIN_EMAIL);
}

#[tokio::test]
async fn malformed_login_body_is_a_client_error() {
    let app = common::TestApp::new(common::test_config()).await;
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/login")
        .header("idempotency-key", "broken")
        .body(axum::body::Body::from("{email"))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["message"], "Invalid JSON format");
}

#[tokio::test]
async fn user_lifecycle_through_the_private_chain() {
    let app = common::TestApp::new(common::test_config()).await;
    let token = app.admin_token();

    let created = app
        .send(common::json(
            Method::POST,
            "/users",
            Some(&token),
            Some("create-grace"),
            json!({
                "name": "Grace",
                "email": "grace@example.com",
                "password": "C0bol!Rules",
                "re_password": "C0bol!Rules",
            }),
        ))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.json()["id"].as_i64().unwrap();
    let path = format!("/users/{id}");

    let stored = app.collaborators.users.find(id).await.unwrap().unwrap();
    assert_eq!(stored.created_by, Some(app.admin_id));
    assert_ne!(stored.password_hash, "C0bol!Rules");

    let fetched = app.send(common::authed(Method::GET, &path, &token, None)).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json()["name"], "Grace");
    let cached = app.send(common::authed(Method::GET, &path, &token, None)).await;
    assert_eq!(cached.body, fetched.body);

    let renamed = app
        .send(common::json(
            Method::PUT,
            &path,
            Some(&token),
            Some("rename-grace"),
            json!({ "id": id, "name": "Grace Hopper" }),
        ))
        .await;
    assert_eq!(renamed.status, StatusCode::OK);

    let fetched = app.send(common::authed(Method::GET, &path, &token, None)).await;
    assert_eq!(fetched.json()["name"], "Grace Hopper");

    let mismatched = app
        .send(common::json(
            Method::PUT,
            &path,
            Some(&token),
            Some("rename-mismatch"),
            json!({ "id": id + 1, "name": "Nobody" }),
        ))
        .await;
    assert_eq!(mismatched.status, StatusCode::BAD_REQUEST);

    let deleted = app
        .send(common::authed(Method::DELETE, &path, &token, Some("delete-grace")))
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = app.send(common::authed(Method::GET, &path, &token, None)).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let invalid = app.send(common::authed(Method::GET, "/users/abc", &token, None)).await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let app = common::TestApp::new(common::test_config()).await;
    let token = app.admin_token();
    let body = json!({
        "name": "Twin",
        "email": "twin@example.com",
        "password": "Tw1n!Passwd",
        "re_password": "Tw1n!Passwd",
    });

    let first = app
        .send(common::json(Method::POST, "/users", Some(&token), Some("twin-1"), body.clone()))
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app
        .send(common::json(Method::POST, "/users", Some(&token), Some("twin-2"), body))
        .await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.error_code(), "conflict");
}

#[tokio::test]
async fn correlation_id_is_echoed_or_generated() {
    let app = common::TestApp::new(common::test_config()).await;

    let request = axum::http::Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-me-123")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.headers["x-request-id"], "trace-me-123");

    let response = app.send(common::empty(Method::GET, "/health")).await;
    let generated = response.headers["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());
}
