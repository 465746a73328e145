//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not a socket address", config.listener.bind_address),
        ));
    }
    if config.admission.concurrency_limit == 0 {
        errors.push(ValidationError::new(
            "admission.concurrency_limit",
            "must be greater than zero",
        ));
    }

    let rate = &config.admission.rate_limit;
    if rate.enabled {
        if rate.requests_per_second == 0 {
            errors.push(ValidationError::new(
                "admission.rate_limit.requests_per_second",
                "must be greater than zero when rate limiting is enabled",
            ));
        }
        if rate.burst_size == 0 {
            errors.push(ValidationError::new(
                "admission.rate_limit.burst_size",
                "must be greater than zero when rate limiting is enabled",
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }
    if config.idempotency.ttl_secs == 0 {
        errors.push(ValidationError::new("idempotency.ttl_secs", "must be greater than zero"));
    }
    if config.idempotency.lease_secs == 0 {
        errors.push(ValidationError::new("idempotency.lease_secs", "must be greater than zero"));
    }
    if config.cache.purge_interval_secs == 0 {
        errors.push(ValidationError::new("cache.purge_interval_secs", "must be greater than zero"));
    }
    if config.auth.token_secret.is_empty() {
        errors.push(ValidationError::new("auth.token_secret", "must not be empty"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
