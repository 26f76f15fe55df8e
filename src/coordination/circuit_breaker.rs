//! Provider circuit breaker
//!
//! Implements the circuit breaker pattern for outbound sports-API calls so
//! a failing provider is skipped for a cooldown period instead of being
//! hammered on every fetch.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{Result, TallyError};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - calls pass through
    Closed,
    /// Failure threshold exceeded - calls rejected until cooldown elapses
    Open,
    /// Cooldown elapsed - exactly one trial call probes the provider
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for one breaker
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Time to wait before an open circuit admits a half-open trial
    pub open_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&crate::config::BreakerConfig> for BreakerSettings {
    fn from(cfg: &crate::config::BreakerConfig) -> Self {
        Self {
            failure_threshold: cfg.failure_threshold,
            open_timeout: Duration::from_secs(cfg.open_timeout_secs),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<DateTime<Utc>>,
    last_success_time: Option<DateTime<Utc>>,
    /// A half-open trial call is outstanding; concurrent callers are
    /// rejected until its outcome is recorded.
    trial_in_flight: bool,
}

/// Circuit breaker guarding one (provider, operation) pair.
///
/// The caller brackets each provider call with `check()` and one of
/// `record_success()` / `record_failure()`. All state transitions happen
/// under an internal mutex, so the half-open state admits a single trial
/// even with concurrent callers racing into it. The open-to-half-open
/// transition is lazy: it happens on the first `check()` after the
/// cooldown, not on a background timer.
pub struct ApiCircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl ApiCircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
                last_success_time: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gate one provider call. `Ok` admits the call; `CircuitOpen` carries
    /// the remaining cooldown seconds. Admission from half-open reserves
    /// the single trial slot, so the caller must follow up with
    /// `record_success` or `record_failure`.
    pub async fn check(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let remaining = self.remaining_cooldown(&inner);
                if remaining == 0 {
                    info!(
                        "Circuit breaker '{}': cooldown elapsed, attempting half-open trial",
                        self.name
                    );
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    Ok(())
                } else {
                    warn!(
                        "Circuit breaker '{}': OPEN - rejecting call, retry in {}s",
                        self.name, remaining
                    );
                    Err(TallyError::CircuitOpen {
                        breaker: self.name.clone(),
                        retry_in_secs: remaining,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    Err(TallyError::CircuitOpen {
                        breaker: self.name.clone(),
                        retry_in_secs: self.remaining_cooldown(&inner),
                    })
                } else {
                    inner.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful call
    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.failure_count = 0;
        inner.last_success_time = Some(Utc::now());
        inner.trial_in_flight = false;

        if inner.state == CircuitState::HalfOpen {
            info!(
                "Circuit breaker '{}': trial succeeded - CLOSING circuit",
                self.name
            );
            inner.state = CircuitState::Closed;
        }
    }

    /// Record a failed call
    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.failure_count += 1;
        inner.last_failure_time = Some(Utc::now());
        inner.trial_in_flight = false;

        warn!(
            "Circuit breaker '{}': failure {}/{}",
            self.name, inner.failure_count, self.settings.failure_threshold
        );

        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                warn!(
                    "Circuit breaker '{}': trial failed - reopening for {}s",
                    self.name,
                    self.settings.open_timeout.as_secs()
                );
            }
            CircuitState::Closed if inner.failure_count >= self.settings.failure_threshold => {
                inner.state = CircuitState::Open;
                error!(
                    "Circuit breaker '{}': TRIPPED after {} failures, open for {}s",
                    self.name,
                    inner.failure_count,
                    self.settings.open_timeout.as_secs()
                );
            }
            _ => {}
        }
    }

    /// Manually reset to closed (operator action)
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        info!("Circuit breaker '{}': manual reset", self.name);
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.trial_in_flight = false;
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Read-only snapshot for health reporting
    pub async fn status(&self) -> BreakerStatus {
        let inner = self.inner.lock().await;
        BreakerStatus {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.settings.failure_threshold,
            last_failure_time: inner.last_failure_time,
            last_success_time: inner.last_success_time,
            time_until_reset_secs: if inner.state == CircuitState::Open {
                self.remaining_cooldown(&inner)
            } else {
                0
            },
        }
    }

    /// Seconds left of the open cooldown:
    /// `max(0, open_timeout - (now - last_failure_time))`.
    fn remaining_cooldown(&self, inner: &BreakerInner) -> u64 {
        match inner.last_failure_time {
            Some(failed_at) => {
                let elapsed = Utc::now().signed_duration_since(failed_at).num_seconds();
                self.settings
                    .open_timeout
                    .as_secs()
                    .saturating_sub(elapsed.max(0) as u64)
            }
            None => 0,
        }
    }
}

/// Read-only breaker snapshot
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub time_until_reset_secs: u64,
}

/// Owns one breaker per (provider, operation) pair for the process lifetime
pub struct BreakerRegistry {
    settings: BreakerSettings,
    breakers: DashMap<String, Arc<ApiCircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            breakers: DashMap::new(),
        }
    }

    /// Get or create the breaker keyed `"{provider}_{operation}"`.
    pub fn get_or_create(&self, provider: &str, operation: &str) -> Arc<ApiCircuitBreaker> {
        let key = format!("{}_{}", provider, operation);
        self.breakers
            .entry(key.clone())
            .or_insert_with(|| Arc::new(ApiCircuitBreaker::new(key, self.settings.clone())))
            .value()
            .clone()
    }

    /// Reset every breaker (operator action)
    pub async fn reset_all(&self) {
        let breakers: Vec<Arc<ApiCircuitBreaker>> =
            self.breakers.iter().map(|e| e.value().clone()).collect();
        for breaker in breakers {
            breaker.reset().await;
        }
    }

    /// Snapshot of every breaker for health reporting
    pub async fn statuses(&self) -> Vec<BreakerStatus> {
        let breakers: Vec<Arc<ApiCircuitBreaker>> =
            self.breakers.iter().map(|e| e.value().clone()).collect();

        let mut statuses = Vec::with_capacity(breakers.len());
        for breaker in breakers {
            statuses.push(breaker.status().await);
        }
        statuses
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(threshold: u32, timeout_secs: u64) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: threshold,
            open_timeout: Duration::from_secs(timeout_secs),
        }
    }

    #[tokio::test]
    async fn test_initial_state_is_closed() {
        let cb = ApiCircuitBreaker::new("espn_live", BreakerSettings::default());
        assert_eq!(cb.state().await, CircuitState::Closed);
        assert!(cb.check().await.is_ok());
    }

    #[tokio::test]
    async fn test_trips_at_failure_threshold() {
        let cb = ApiCircuitBreaker::new("espn_live", settings(3, 60));

        cb.record_failure().await;
        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Closed);

        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);

        match cb.check().await {
            Err(TallyError::CircuitOpen { retry_in_secs, .. }) => {
                assert!(retry_in_secs > 0 && retry_in_secs <= 60);
            }
            other => panic!("expected CircuitOpen, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = ApiCircuitBreaker::new("espn_live", settings(3, 60));

        cb.record_failure().await;
        cb.record_failure().await;
        cb.record_success().await;

        cb.record_failure().await;
        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_admits_single_trial() {
        // Zero cooldown so the open circuit immediately admits a trial.
        let cb = ApiCircuitBreaker::new("espn_live", settings(1, 0));

        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);

        // First caller gets the trial slot.
        assert!(cb.check().await.is_ok());
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        // Concurrent caller is rejected while the trial is outstanding.
        assert!(matches!(
            cb.check().await,
            Err(TallyError::CircuitOpen { .. })
        ));

        cb.record_success().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
        assert!(cb.check().await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_trial_reopens_circuit() {
        let cb = ApiCircuitBreaker::new("espn_live", settings(1, 0));

        cb.record_failure().await;
        assert!(cb.check().await.is_ok());
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_manual_reset_closes_circuit() {
        let cb = ApiCircuitBreaker::new("espn_live", settings(1, 60));

        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);

        cb.reset().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
        assert!(cb.check().await.is_ok());
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let cb = ApiCircuitBreaker::new("theodds_schedule", settings(2, 60));
        cb.record_failure().await;

        let status = cb.status().await;
        assert_eq!(status.name, "theodds_schedule");
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.failure_count, 1);
        assert_eq!(status.failure_threshold, 2);
        assert!(status.last_failure_time.is_some());
        assert_eq!(status.time_until_reset_secs, 0);

        cb.record_failure().await;
        let status = cb.status().await;
        assert_eq!(status.state, CircuitState::Open);
        assert!(status.time_until_reset_secs > 0);
    }

    #[tokio::test]
    async fn test_registry_reuses_breaker_per_key() {
        let registry = BreakerRegistry::new(BreakerSettings::default());

        let a = registry.get_or_create("espn", "live_results");
        let b = registry.get_or_create("espn", "live_results");
        let c = registry.get_or_create("espn", "schedule");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
        assert_eq!(a.name(), "espn_live_results");
    }

    #[tokio::test]
    async fn test_registry_reset_all() {
        let registry = BreakerRegistry::new(settings(1, 60));

        let a = registry.get_or_create("espn", "live_results");
        let b = registry.get_or_create("rapidapi", "schedule");
        a.record_failure().await;
        b.record_failure().await;
        assert_eq!(a.state().await, CircuitState::Open);
        assert_eq!(b.state().await, CircuitState::Open);

        registry.reset_all().await;
        assert_eq!(a.state().await, CircuitState::Closed);
        assert_eq!(b.state().await, CircuitState::Closed);
    }
}
