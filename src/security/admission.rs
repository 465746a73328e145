//! Admission control: concurrency bound plus rate limit.

use tokio::sync::OwnedSemaphorePermit;

use crate::config::AdmissionConfig;
use crate::http::request::RequestScope;
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::security::limits::ConcurrencyLimit;
use crate::security::rate_limit::RateLimiter;

/// Held for the lifetime of an admitted request.
#[derive(Debug)]
pub struct AdmissionPermit {
    _slot: OwnedSemaphorePermit,
}

impl AdmissionPermit {
    fn new(slot: OwnedSemaphorePermit) -> Self {
        metrics::in_flight_started();
        Self { _slot: slot }
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        metrics::in_flight_finished();
    }
}

/// Shared by every request; built once from configuration.
#[derive(Debug)]
pub struct AdmissionGate {
    slots: Result<ConcurrencyLimit, String>,
    limiter: Option<RateLimiter>,
}

impl AdmissionGate {
    /// A zero `concurrency_limit` yields a gate that refuses every request
    /// with a configuration error.
    pub fn new(concurrency_limit: usize, limiter: Option<RateLimiter>) -> Self {
        let slots = if concurrency_limit == 0 {
            Err("concurrency limit must be greater than zero".to_string())
        } else {
            Ok(ConcurrencyLimit::new(concurrency_limit))
        };
        Self { slots, limiter }
    }

    pub fn from_config(config: &AdmissionConfig) -> Self {
        Self::new(
            config.concurrency_limit,
            RateLimiter::from_config(&config.rate_limit),
        )
    }

    /// Wait for a concurrency slot, then take a rate token.
    ///
    /// Gives up as soon as the request is cancelled or its deadline passes.
    /// A request refused by the rate limiter returns its slot immediately.
    pub async fn admit(&self, scope: &RequestScope) -> Result<AdmissionPermit, ApiError> {
        scope.ensure_live()?;

        let slots = self
            .slots
            .as_ref()
            .map_err(|reason| ApiError::AdmissionConfig(reason.clone()))?;

        let slot = tokio::select! {
            biased;
            reason = scope.interrupted() => return Err(ApiError::Cancelled(reason)),
            slot = slots.acquire() => slot
                .map_err(|_| ApiError::Internal("admission semaphore closed".to_string()))?,
        };

        if let Some(limiter) = &self.limiter {
            if !limiter.check() {
                return Err(ApiError::RateExceeded);
            }
        }

        Ok(AdmissionPermit::new(slot))
    }

    /// Free concurrency slots; zero when misconfigured.
    pub fn available_slots(&self) -> usize {
        self.slots.as_ref().map(ConcurrencyLimit::available).unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.slots.as_ref().map(ConcurrencyLimit::capacity).unwrap_or(0)
    }

    pub fn is_misconfigured(&self) -> bool {
        self.slots.is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::{CancelReason, RouteTemplate};
    use std::time::Duration;

    fn scope() -> RequestScope {
        RequestScope::new("test", RouteTemplate::from_pattern("/work"), Duration::from_secs(30))
    }

    #[tokio::test]
    async fn zero_capacity_is_a_configuration_error() {
        let gate = AdmissionGate::new(0, None);
        assert!(gate.is_misconfigured());
        let err = gate.admit(&scope()).await.unwrap_err();
        assert!(matches!(err, ApiError::AdmissionConfig(_)));
    }

    #[tokio::test]
    async fn permits_return_when_dropped() {
        let gate = AdmissionGate::new(2, None);
        let first = gate.admit(&scope()).await.unwrap();
        let _second = gate.admit(&scope()).await.unwrap();
        assert_eq!(gate.available_slots(), 0);

        drop(first);
        assert_eq!(gate.available_slots(), 1);
    }

    #[tokio::test]
    async fn rate_rejection_releases_the_slot() {
        let gate = AdmissionGate::new(4, Some(RateLimiter::new(1, 1)));
        let _held = gate.admit(&scope()).await.unwrap();

        let err = gate.admit(&scope()).await.unwrap_err();
        assert!(matches!(err, ApiError::RateExceeded));
        assert_eq!(gate.available_slots(), 3);
    }

    #[tokio::test]
    async fn cancelled_scope_is_refused_up_front() {
        let gate = AdmissionGate::new(1, None);
        let scope = scope();
        scope.cancellation().cancel();

        let err = gate.admit(&scope).await.unwrap_err();
        assert!(matches!(err, ApiError::Cancelled(CancelReason::Canceled)));
        assert_eq!(gate.available_slots(), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_waiting_request() {
        let gate = AdmissionGate::new(1, None);
        let _held = gate.admit(&scope()).await.unwrap();

        let waiting = scope();
        let token = waiting.cancellation().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let err = gate.admit(&waiting).await.unwrap_err();
        assert!(matches!(err, ApiError::Cancelled(CancelReason::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_a_waiting_request() {
        let gate = AdmissionGate::new(1, None);
        let _held = gate.admit(&scope()).await.unwrap();

        let short = RequestScope::new("t", RouteTemplate::from_pattern("/work"), Duration::from_millis(50));
        let err = gate.admit(&short).await.unwrap_err();
        assert!(matches!(err, ApiError::Cancelled(CancelReason::DeadlineExceeded)));
    }
}
