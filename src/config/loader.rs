//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for environment variable {var}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServiceConfig::default(),
    };

    apply_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables on top of `config`.
///
/// `lookup` abstracts the environment so callers can supply a fixed map.
pub fn apply_overrides<F>(config: &mut ServiceConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup("APP_HOST");
    let port = lookup("APP_PORT");
    if host.is_some() || port.is_some() {
        let (default_host, default_port) = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(h, p)| (h.to_string(), p.to_string()))
            .unwrap_or_else(|| ("0.0.0.0".to_string(), "8080".to_string()));
        let host = host.unwrap_or(default_host);
        let port = match port {
            Some(port) => parse_var("APP_PORT", port).map(|p: u16| p.to_string())?,
            None => default_port,
        };
        config.listener.bind_address = format!("{host}:{port}");
    }

    if let Some(name) = lookup("APP_NAME") {
        config.observability.service_name = name;
    }
    if let Some(limit) = lookup("CONCURRENCY_LIMIT") {
        config.admission.concurrency_limit = parse_var("CONCURRENCY_LIMIT", limit)?;
    }
    if let Some(rps) = lookup("RATE_LIMIT_RPS") {
        config.admission.rate_limit.requests_per_second = parse_var("RATE_LIMIT_RPS", rps)?;
    }
    if let Some(burst) = lookup("RATE_LIMIT_BURST") {
        config.admission.rate_limit.burst_size = parse_var("RATE_LIMIT_BURST", burst)?;
    }
    if let Some(secret) = lookup("TOKEN_SALT") {
        config.auth.token_secret = secret;
    }

    Ok(())
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}
