//! Request pipeline composition.
//!
//! # Responsibilities
//! - Wrap a handler router in an ordered list of interceptors
//! - Declare the public and private stage orders
//! - Refuse orders that would run a stage before one it depends on
//!
//! # Design Decisions
//! - The first interceptor in a list is the outermost: it sees the request
//!   first and the response last
//! - Stage order is fixed by rank; a pipeline may omit stages but never
//!   reorder them
//! - Stages receive their collaborators through [`Interceptors`], never
//!   through globals

use std::sync::Arc;
use std::time::Duration;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::config::ServiceConfig;
use crate::http::middleware::{
    access_control_middleware, admission_middleware, authentication_middleware, cors_layer,
    idempotency_middleware, install_panic_hook, observe_middleware, panic_containment_middleware,
    AccessControlState, AuthState, IdempotencyState, ObserveState,
};
use crate::security::{AdmissionGate, CredentialVerifier};
use crate::storage::{CacheStore, GrantStore, UserStore};

/// A transformation from a router to a router wrapped in one more layer.
pub type Interceptor = Box<dyn FnOnce(Router) -> Router + Send>;

/// Wrap `handler` so that `interceptors[0]` runs first.
pub fn compose(handler: Router, interceptors: Vec<Interceptor>) -> Router {
    interceptors
        .into_iter()
        .rev()
        .fold(handler, |inner, interceptor| interceptor(inner))
}

/// The pipeline stages, declared in their only valid order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Observe,
    Cors,
    ContainPanics,
    Admission,
    Idempotency,
    Authenticate,
    Authorize,
}

impl Stage {
    pub const PUBLIC: [Stage; 5] = [
        Stage::Observe,
        Stage::Cors,
        Stage::ContainPanics,
        Stage::Admission,
        Stage::Idempotency,
    ];

    pub const PRIVATE: [Stage; 7] = [
        Stage::Observe,
        Stage::Cors,
        Stage::ContainPanics,
        Stage::Admission,
        Stage::Idempotency,
        Stage::Authenticate,
        Stage::Authorize,
    ];

    fn interceptor(self, deps: &Interceptors) -> Interceptor {
        match self {
            Stage::Observe => {
                let state = deps.observe.clone();
                Box::new(move |router: Router| {
                    // Last layer added runs first: the ID is set, then echoed
                    // on the response, around the observe middleware.
                    router
                        .layer(from_fn_with_state(state, observe_middleware))
                        .layer(PropagateRequestIdLayer::x_request_id())
                        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                })
            }
            Stage::Cors => {
                let layer = deps.cors.clone();
                Box::new(move |router: Router| router.layer(layer))
            }
            Stage::ContainPanics => {
                install_panic_hook();
                Box::new(|router: Router| router.layer(from_fn(panic_containment_middleware)))
            }
            Stage::Admission => {
                let gate = Arc::clone(&deps.admission);
                Box::new(move |router: Router| {
                    router.layer(from_fn_with_state(gate, admission_middleware))
                })
            }
            Stage::Idempotency => {
                let state = deps.idempotency.clone();
                Box::new(move |router: Router| {
                    router.layer(from_fn_with_state(state, idempotency_middleware))
                })
            }
            Stage::Authenticate => {
                let state = deps.auth.clone();
                Box::new(move |router: Router| {
                    router.layer(from_fn_with_state(state, authentication_middleware))
                })
            }
            Stage::Authorize => {
                let state = deps.access.clone();
                Box::new(move |router: Router| {
                    router.layer(from_fn_with_state(state, access_control_middleware))
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("stage {later:?} is declared before {earlier:?}")]
    OutOfOrder { earlier: Stage, later: Stage },

    #[error("stage {0:?} is declared more than once")]
    Duplicate(Stage),

    #[error("authorization requires the authentication stage")]
    AuthorizeWithoutAuthenticate,
}

/// An ordered, validated list of stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: impl IntoIterator<Item = Stage>) -> Result<Self, PipelineError> {
        let stages: Vec<Stage> = stages.into_iter().collect();

        for pair in stages.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            if prev == next {
                return Err(PipelineError::Duplicate(next));
            }
            if next < prev {
                return Err(PipelineError::OutOfOrder {
                    earlier: next,
                    later: prev,
                });
            }
        }

        if stages.contains(&Stage::Authorize) && !stages.contains(&Stage::Authenticate) {
            return Err(PipelineError::AuthorizeWithoutAuthenticate);
        }

        Ok(Self { stages })
    }

    /// Chain for routes open to anonymous callers.
    pub fn public() -> Self {
        Self {
            stages: Stage::PUBLIC.to_vec(),
        }
    }

    /// Chain for routes that need an authenticated, authorized principal.
    pub fn private() -> Self {
        Self {
            stages: Stage::PRIVATE.to_vec(),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn wrap(&self, handler: Router, deps: &Interceptors) -> Router {
        let interceptors = self
            .stages
            .iter()
            .map(|stage| stage.interceptor(deps))
            .collect();
        compose(handler, interceptors)
    }
}

/// Everything the stages need, shared by every route.
#[derive(Clone)]
pub struct Interceptors {
    pub observe: ObserveState,
    pub cors: CorsLayer,
    pub admission: Arc<AdmissionGate>,
    pub idempotency: IdempotencyState,
    pub auth: AuthState,
    pub access: AccessControlState,
}

impl Interceptors {
    pub fn from_config(
        config: &ServiceConfig,
        admission: Arc<AdmissionGate>,
        cache: Arc<dyn CacheStore>,
        verifier: Arc<dyn CredentialVerifier>,
        users: Arc<dyn UserStore>,
        grants: Arc<dyn GrantStore>,
    ) -> Self {
        Self {
            observe: ObserveState::new(
                &config.observability.service_name,
                Duration::from_secs(config.timeouts.request_secs),
            ),
            cors: cors_layer(&config.cors),
            admission,
            idempotency: IdempotencyState::new(cache, &config.idempotency),
            auth: AuthState { verifier, users },
            access: AccessControlState { grants },
        }
    }
}
