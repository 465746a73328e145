//! rest-skeleton
//!
//! An auth + user CRUD web service whose requests pass through a fixed
//! pipeline before reaching a handler.
//!
//! # Architecture Overview
//!
//! ```text
//!   request ─▶ observe ─▶ cors ─▶ contain panics ─▶ admission ─▶ idempotency ─┬─▶ public handler
//!                                                                            │
//!                                                                            └─▶ authenticate ─▶ authorize ─▶ private handler
//!
//!   cross-cutting: config (TOML + env), observability (tracing, Prometheus), lifecycle (signals)
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use rest_skeleton::config::load_config;
use rest_skeleton::lifecycle::{seed_bootstrap, Shutdown, StartupError};
use rest_skeleton::observability::{logging, metrics};
use rest_skeleton::storage::InMemoryCache;
use rest_skeleton::{AppServer, Collaborators};

#[derive(Parser, Debug)]
#[command(name = "rest-skeleton", version, about = "Auth + user CRUD service")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("logging already initialized: {e}");
    }

    tracing::info!(
        service = %config.observability.service_name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        concurrency_limit = config.admission.concurrency_limit,
        rate_limit_enabled = config.admission.rate_limit.enabled,
        requests_per_second = config.admission.rate_limit.requests_per_second,
        burst_size = config.admission.rate_limit.burst_size,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let cache = InMemoryCache::new();
    let (collaborators, grants) = Collaborators::in_memory_with_cache(&config, cache.clone());
    if let Some(bootstrap) = &config.bootstrap {
        seed_bootstrap(
            bootstrap,
            &collaborators.users,
            &grants,
            collaborators.passwords.as_ref(),
        )
        .await?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let purge_every = Duration::from_secs(config.cache.purge_interval_secs);
    tokio::spawn(cache.run_purge(purge_every, shutdown.subscribe()));

    let server = AppServer::new(config, collaborators);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
