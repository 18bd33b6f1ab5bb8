//! Per-backend circuit breakers.
//!
//! ```text
//! Closed → Open:      failure_count reaches the threshold
//! Open → half-open:   a dispatch check after resume_at clears the open flag
//! half-open → Closed: success resets the breaker
//! half-open → Open:   failure reopens with a fresh resume_at
//! ```
//!
//! Only backends registered at construction have a breaker. Checks against
//! any other name are logged and leave the registry untouched.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::{
    application::services::clock::{Clock, after},
    domain::models::{BackendStatus, BreakerState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_interval: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_interval: Duration::from_secs(60),
        }
    }
}

pub struct CircuitBreakerRegistry {
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    order: Vec<String>,
    breakers: Mutex<HashMap<String, BreakerState>>,
}

impl CircuitBreakerRegistry {
    /// Registers a closed breaker for each backend, in priority order.
    pub fn new(config: BreakerConfig, clock: Arc<dyn Clock>, backends: Vec<String>) -> Self {
        let breakers = backends
            .iter()
            .map(|name| (name.clone(), BreakerState::default()))
            .collect();
        Self {
            config,
            clock,
            order: backends,
            breakers: Mutex::new(breakers),
        }
    }

    /// Whether a dispatch may use `backend` now. An open breaker whose
    /// resume time has passed is flipped to half-open.
    pub async fn allow(&self, backend: &str) -> bool {
        let now = self.clock.now();
        let mut breakers = self.breakers.lock().await;
        let Some(state) = breakers.get_mut(backend) else {
            tracing::warn!(backend, "no circuit breaker registered for backend");
            return true;
        };

        if !state.is_open {
            return true;
        }
        match state.resume_at {
            Some(resume_at) if now >= resume_at => {
                state.is_open = false;
                state.resume_at = None;
                tracing::info!(backend, failures = state.failure_count, "circuit half-open");
                true
            }
            _ => false,
        }
    }

    pub async fn record_success(&self, backend: &str) {
        let mut breakers = self.breakers.lock().await;
        let Some(state) = breakers.get_mut(backend) else {
            tracing::warn!(backend, "success reported for unregistered backend");
            return;
        };
        if state.is_open || state.failure_count > 0 {
            tracing::info!(backend, "circuit closed");
        }
        *state = BreakerState::default();
    }

    /// Returns the breaker state after the failure is applied.
    pub async fn record_failure(&self, backend: &str) -> BreakerState {
        let now = self.clock.now();
        let mut breakers = self.breakers.lock().await;
        let Some(state) = breakers.get_mut(backend) else {
            tracing::warn!(backend, "failure reported for unregistered backend");
            return BreakerState::default();
        };

        state.failure_count = state.failure_count.saturating_add(1);
        if state.failure_count >= self.config.failure_threshold {
            state.is_open = true;
            state.resume_at = Some(after(now, self.config.reset_interval));
            tracing::warn!(
                backend,
                failures = state.failure_count,
                resume_at = ?state.resume_at,
                "circuit open"
            );
        }
        state.clone()
    }

    pub async fn state(&self, backend: &str) -> BreakerState {
        self.breakers
            .lock()
            .await
            .get(backend)
            .cloned()
            .unwrap_or_default()
    }

    /// Status of every registered backend, in priority order.
    pub async fn statuses(&self) -> Vec<BackendStatus> {
        let breakers = self.breakers.lock().await;
        self.order
            .iter()
            .map(|name| {
                let state = breakers.get(name).cloned().unwrap_or_default();
                BackendStatus::new(name.clone(), state)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{application::services::clock::ManualClock, domain::models::BackendHealth};

    fn registry(threshold: u32) -> (CircuitBreakerRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let config = BreakerConfig {
            failure_threshold: threshold,
            reset_interval: Duration::from_secs(30),
        };
        let registry = CircuitBreakerRegistry::new(
            config,
            clock.clone(),
            vec!["primary".to_string(), "secondary".to_string()],
        );
        (registry, clock)
    }

    #[tokio::test]
    async fn opens_at_threshold() {
        let (registry, clock) = registry(3);

        assert!(!registry.record_failure("primary").await.is_open);
        assert!(!registry.record_failure("primary").await.is_open);
        let state = registry.record_failure("primary").await;

        assert!(state.is_open);
        assert_eq!(state.failure_count, 3);
        assert_eq!(state.resume_at, Some(after(clock.now(), Duration::from_secs(30))));
        assert!(!registry.allow("primary").await);
        assert!(registry.allow("secondary").await);
    }

    #[tokio::test]
    async fn success_resets_failure_streak() {
        let (registry, _) = registry(3);
        registry.record_failure("primary").await;
        registry.record_failure("primary").await;

        registry.record_success("primary").await;

        assert_eq!(registry.state("primary").await, BreakerState::default());
    }

    #[tokio::test]
    async fn half_open_after_reset_interval() {
        let (registry, clock) = registry(1);
        registry.record_failure("primary").await;
        assert!(!registry.allow("primary").await);

        clock.advance(Duration::from_secs(31));
        assert!(registry.allow("primary").await);
        assert!(!registry.state("primary").await.is_open);

        registry.record_success("primary").await;
        assert_eq!(registry.state("primary").await.failure_count, 0);
    }

    #[tokio::test]
    async fn failed_half_open_call_reopens_with_new_resume_time() {
        let (registry, clock) = registry(2);
        registry.record_failure("primary").await;
        registry.record_failure("primary").await;

        clock.advance(Duration::from_secs(31));
        assert!(registry.allow("primary").await);
        let state = registry.record_failure("primary").await;

        assert!(state.is_open);
        assert_eq!(state.resume_at, Some(after(clock.now(), Duration::from_secs(30))));
        assert!(!registry.allow("primary").await);
    }

    #[tokio::test]
    async fn statuses_derive_health_in_priority_order() {
        let (registry, _) = registry(2);
        registry.record_failure("primary").await;
        registry.record_failure("primary").await;
        registry.record_failure("secondary").await;

        let statuses = registry.statuses().await;
        assert_eq!(statuses[0].name, "primary");
        assert_eq!(statuses[0].health, BackendHealth::Failed);
        assert_eq!(statuses[1].name, "secondary");
        assert_eq!(statuses[1].health, BackendHealth::Degraded);
    }

    #[tokio::test]
    async fn unregistered_backends_get_no_breaker() {
        let (registry, _) = registry(1);

        assert!(registry.allow("ghost").await);
        let state = registry.record_failure("ghost").await;
        registry.record_success("ghost").await;

        assert!(!state.is_open);
        assert_eq!(state.failure_count, 0);
        let names: Vec<_> = registry.statuses().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["primary".to_string(), "secondary".to_string()]);
        assert!(!registry.breakers.lock().await.contains_key("ghost"));
    }
}
