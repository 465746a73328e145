//! Panic containment.
//!
//! A panic anywhere below this stage becomes a logged 500 instead of tearing
//! down the connection task. Permits and other guards held by inner stages
//! are released by unwinding before the response is written.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Once;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;

use crate::http::request::{RequestScope, RouteTemplate};
use crate::http::response::ApiError;
use crate::observability::metrics;

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Capture a backtrace for every panic on the panicking thread, then defer to
/// the previously installed hook. Safe to call more than once.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn clear_backtrace() {
    LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = None);
}

/// Clear the slot before every poll, so a backtrace found after an unwind
/// belongs to a panic raised while polling `fut` and not to one caught
/// earlier on the same worker thread.
fn with_fresh_backtrace<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    let mut fut = Box::pin(fut);
    std::future::poll_fn(move |cx| {
        clear_backtrace();
        fut.as_mut().poll(cx)
    })
}

fn take_backtrace() -> String {
    LAST_BACKTRACE
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| "<backtrace unavailable>".to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub async fn panic_containment_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let (route, correlation_id) = match RequestScope::of(&req) {
        Some(scope) => (scope.route().to_string(), scope.correlation_id().to_string()),
        None => (RouteTemplate::of(&req).to_string(), String::new()),
    };

    match AssertUnwindSafe(with_fresh_backtrace(next.run(req)))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let backtrace = take_backtrace();
            tracing::error!(
                request_id = %correlation_id,
                method = %method,
                route = %route,
                panic = %message,
                backtrace = %backtrace,
                "Recovered from panic"
            );
            metrics::record_panic(&route);
            ApiError::Unexpected.into_response()
        }
    }
}
