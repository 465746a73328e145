//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: public routes behind the public chain, private
//!   routes behind the private chain
//! - Build the shared admission gate once, from configuration
//! - Serve on a listener until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;

use crate::api::{self, AppState};
use crate::config::ServiceConfig;
use crate::http::pipeline::{Interceptors, Pipeline};
use crate::security::{AdmissionGate, PasswordHasher, SaltedSha256, TokenIssuer};
use crate::storage::{
    CacheStore, GrantStore, InMemoryCache, InMemoryGrantStore, InMemoryUserStore, UserStore,
};

/// Stores and services the server depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub users: Arc<dyn UserStore>,
    pub grants: Arc<dyn GrantStore>,
    pub cache: Arc<dyn CacheStore>,
    pub passwords: Arc<dyn PasswordHasher>,
    pub tokens: Arc<TokenIssuer>,
}

impl Collaborators {
    /// In-memory stores plus the grant store handle, so callers can seed grants.
    pub fn in_memory(config: &ServiceConfig) -> (Self, Arc<InMemoryGrantStore>) {
        Self::in_memory_with_cache(config, InMemoryCache::new())
    }

    /// Like [`Collaborators::in_memory`], sharing a cache the caller keeps a
    /// handle to.
    pub fn in_memory_with_cache(
        config: &ServiceConfig,
        cache: InMemoryCache,
    ) -> (Self, Arc<InMemoryGrantStore>) {
        let grants = Arc::new(InMemoryGrantStore::new());
        let collaborators = Self {
            users: Arc::new(InMemoryUserStore::new()),
            grants: grants.clone(),
            cache: Arc::new(cache),
            passwords: Arc::new(SaltedSha256::default()),
            tokens: Arc::new(TokenIssuer::new(
                &config.auth.token_secret,
                Duration::from_secs(config.auth.token_ttl_secs),
            )),
        };
        (collaborators, grants)
    }
}

/// HTTP server for the service.
pub struct AppServer {
    router: Router,
    config: ServiceConfig,
    admission: Arc<AdmissionGate>,
}

impl AppServer {
    pub fn new(config: ServiceConfig, collaborators: Collaborators) -> Self {
        let admission = Arc::new(AdmissionGate::from_config(&config.admission));
        if admission.is_misconfigured() {
            tracing::error!(
                concurrency_limit = config.admission.concurrency_limit,
                "Admission gate misconfigured; every request will fail"
            );
        }

        let router = Self::build_router(&config, &collaborators, admission.clone());
        Self {
            router,
            config,
            admission,
        }
    }

    /// Build the Axum router with both chains and the body limit.
    fn build_router(
        config: &ServiceConfig,
        collaborators: &Collaborators,
        admission: Arc<AdmissionGate>,
    ) -> Router {
        let interceptors = Interceptors::from_config(
            config,
            admission,
            collaborators.cache.clone(),
            collaborators.tokens.clone(),
            collaborators.users.clone(),
            collaborators.grants.clone(),
        );

        let state = AppState {
            users: collaborators.users.clone(),
            cache: collaborators.cache.clone(),
            passwords: collaborators.passwords.clone(),
            tokens: collaborators.tokens.clone(),
            user_cache_ttl: Duration::from_secs(config.cache.user_ttl_secs),
        };

        let public = Pipeline::public().wrap(api::public_routes(state.clone()), &interceptors);
        let private = Pipeline::private().wrap(api::private_routes(state), &interceptors);

        public
            .merge(private)
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
    }

    /// A handle to the router, for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn admission(&self) -> &Arc<AdmissionGate> {
        &self.admission
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.config.observability.service_name,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
