//! Admission: concurrency bound, rate limit, cancellation, panics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use axum::routing::get;
use axum::Router;

use rest_skeleton::http::request::{RequestScope, RouteTemplate};
use rest_skeleton::http::Pipeline;

mod common;

#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

/// `/work` sleeps while counting overlap; `/boom` panics.
fn probe_routes(gauge: Arc<Gauge>, hold: Duration) -> Router {
    Router::new()
        .route(
            "/work",
            get(move || {
                let gauge = Arc::clone(&gauge);
                async move {
                    gauge.calls.fetch_add(1, Ordering::SeqCst);
                    let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
                    gauge.peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(hold).await;
                    gauge.current.fetch_sub(1, Ordering::SeqCst);
                    "done"
                }
            }),
        )
        .route(
            "/boom",
            get(|| async {
                if true {
                    panic!("handler exploded");
                }
                "unreachable"
            }),
        )
}

#[tokio::test]
async fn concurrency_never_exceeds_the_limit() {
    let mut config = common::test_config();
    config.admission.concurrency_limit = 2;
    let (interceptors, gate) = common::interceptors(&config);
    let gauge = Arc::new(Gauge::default());
    let app = Pipeline::public().wrap(probe_routes(gauge.clone(), Duration::from_millis(50)), &interceptors);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            common::send(&app, common::empty(Method::GET, "/work")).await.status
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    assert_eq!(gauge.calls.load(Ordering::SeqCst), 8);
    let peak = gauge.peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "observed {peak} concurrent executions");
    assert_eq!(gate.available_slots(), 2);
}

#[tokio::test]
async fn panicking_handler_returns_500_and_releases_its_slot() {
    let mut config = common::test_config();
    config.admission.concurrency_limit = 1;
    let (interceptors, gate) = common::interceptors(&config);
    let gauge = Arc::new(Gauge::default());
    let app = Pipeline::public().wrap(probe_routes(gauge.clone(), Duration::ZERO), &interceptors);

    for _ in 0..3 {
        let response = common::send(&app, common::empty(Method::GET, "/boom")).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.error_code(), "internal_error");
        assert_eq!(response.json()["message"], "Internal Server Error");
    }

    let response = common::send(&app, common::empty(Method::GET, "/work")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(gate.available_slots(), 1);
}

#[tokio::test]
async fn rate_limit_rejects_requests_past_the_burst() {
    let mut config = common::test_config();
    config.admission.rate_limit.enabled = true;
    config.admission.rate_limit.requests_per_second = 5;
    config.admission.rate_limit.burst_size = 5;
    let app = common::TestApp::new(config).await;

    for i in 0..5 {
        let response = app.send(common::empty(Method::GET, "/health")).await;
        assert_eq!(response.status, StatusCode::OK, "request {i}");
    }

    let response = app.send(common::empty(Method::GET, "/health")).await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.error_code(), "rate_limited");
    assert_eq!(app.server.admission().available_slots(), app.server.admission().capacity());
}

#[tokio::test]
async fn zero_concurrency_limit_fails_every_request() {
    let mut config = common::test_config();
    config.admission.concurrency_limit = 0;
    let app = common::TestApp::new(config).await;

    let response = app.send(common::empty(Method::GET, "/health")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.error_code(), "internal_error");
}

#[tokio::test]
async fn cancelled_request_never_reaches_the_handler() {
    let config = common::test_config();
    let (interceptors, gate) = common::interceptors(&config);
    let gauge = Arc::new(Gauge::default());
    let app = Pipeline::public().wrap(probe_routes(gauge.clone(), Duration::ZERO), &interceptors);

    let scope = RequestScope::new("cancel-me", RouteTemplate::from_pattern("/work"), Duration::from_secs(5));
    scope.cancellation().cancel();
    let mut request = common::empty(Method::GET, "/work");
    request.extensions_mut().insert(scope);

    let response = common::send(&app, request).await;
    assert_eq!(response.status, StatusCode::EXPECTATION_FAILED);
    assert_eq!(response.error_code(), "request_canceled");
    assert_eq!(gauge.calls.load(Ordering::SeqCst), 0);
    assert_eq!(gate.available_slots(), gate.capacity());
}

#[tokio::test]
async fn deadline_expires_while_waiting_for_a_slot() {
    let mut config = common::test_config();
    config.admission.concurrency_limit = 1;
    let (interceptors, _gate) = common::interceptors(&config);
    let gauge = Arc::new(Gauge::default());
    let app = Pipeline::public().wrap(probe_routes(gauge.clone(), Duration::from_millis(300)), &interceptors);

    let holder = {
        let app = app.clone();
        tokio::spawn(async move { common::send(&app, common::empty(Method::GET, "/work")).await.status })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let scope = RequestScope::new("late", RouteTemplate::from_pattern("/work"), Duration::from_millis(50));
    let mut request = common::empty(Method::GET, "/work");
    request.extensions_mut().insert(scope);
    let response = common::send(&app, request).await;

    assert_eq!(response.status, StatusCode::EXPECTATION_FAILED);
    assert_eq!(response.error_code(), "deadline_exceeded");
    assert_eq!(holder.await.unwrap(), StatusCode::OK);
    assert_eq!(gauge.calls.load(Ordering::SeqCst), 1);
}
