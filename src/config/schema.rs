//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Concurrency and rate admission.
    pub admission: AdmissionConfig,

    /// Idempotency-Key handling for unsafe methods.
    pub idempotency: IdempotencyConfig,

    /// Read-through response cache.
    pub cache: CacheConfig,

    /// Token issuance and verification.
    pub auth: AuthConfig,

    /// Cross-origin resource sharing.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Optional account created at startup.
    pub bootstrap: Option<BootstrapConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a whole request, measured from pipeline entry.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Admission gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Maximum number of requests in flight at once.
    pub concurrency_limit: usize,

    /// Token bucket settings.
    pub rate_limit: RateLimitConfig,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 1_000,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sustained refill rate, in tokens per second.
    pub requests_per_second: u32,

    /// Bucket capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 100,
            burst_size: 50,
        }
    }
}

/// Idempotency gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    /// How long a recorded response is replayed.
    pub ttl_secs: u64,

    /// How long an in-flight marker blocks concurrent duplicates.
    pub lease_secs: u64,

    /// Largest response body that will be recorded.
    pub max_recorded_bytes: usize,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            lease_secs: 30,
            max_recorded_bytes: 1024 * 1024,
        }
    }
}

/// Read-through cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for cached `users.<id>` lookups.
    pub user_ttl_secs: u64,

    /// How often expired entries are swept from the in-memory cache.
    pub purge_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            user_ttl_secs: 300,
            purge_interval_secs: 60,
        }
    }
}

/// Token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify bearer tokens.
    pub token_secret: String,

    /// Lifetime of an issued token.
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            token_secret: "CHANGE_ME_IN_PRODUCTION".to_string(),
            token_ttl_secs: 3600,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Name reported in logs and spans.
    pub service_name: String,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "rest-skeleton".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Account seeded at startup with grants on every private route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BootstrapConfig {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [admission]
            concurrency_limit = 8

            [admission.rate_limit]
            requests_per_second = 5
            burst_size = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.admission.concurrency_limit, 8);
        assert_eq!(config.admission.rate_limit.requests_per_second, 5);
        assert!(config.admission.rate_limit.enabled);
        assert_eq!(config.idempotency.ttl_secs, 600);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.bootstrap.is_none());
    }

    #[test]
    fn bootstrap_section_is_parsed() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [bootstrap]
            name = "Admin"
            email = "admin@example.com"
            password = "Sup3r-Secret!"
            "#,
        )
        .unwrap();

        let bootstrap = config.bootstrap.unwrap();
        assert_eq!(bootstrap.email, "admin@example.com");
    }
}
