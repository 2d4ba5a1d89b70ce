//! Per-adapter health state: circuit breaker plus rolling call counters.
//!
//! One `AdapterHealth` is owned by one adapter and may be hit by concurrent
//! callers; every transition happens under a single mutex so a race can never
//! leave the breaker half open and half closed.

use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Minimum sample size before the success-rate floor is meaningful.
const MIN_HEALTH_SAMPLES: u64 = 10;
/// Success-rate floor below which an adapter is considered unhealthy.
const SUCCESS_RATE_FLOOR: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct AdapterHealthConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// How long the breaker stays open before the next check closes it.
    pub cooldown: Duration,
}

impl Default for AdapterHealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(300),
        }
    }
}

impl AdapterHealthConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

#[derive(Debug)]
struct State {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    enabled: bool,
    total_calls: u64,
    successful_calls: u64,
    total_cost_usd: f64,
    total_latency_ms: f64,
}

/// Point-in-time view of adapter health, suitable for `get_metadata`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub enabled: bool,
    pub circuit_open: bool,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub total_cost_usd: f64,
}

/// Circuit breaker and rolling success/failure counters for one adapter.
///
/// Breaker semantics:
/// - a failure increments the consecutive-failure counter; reaching the
///   threshold opens the breaker and stamps the open time
/// - a success resets the counter to zero but does not close an already-open
///   breaker; only a check after the cooldown elapses closes it
pub struct AdapterHealth {
    cfg: AdapterHealthConfig,
    state: Mutex<State>,
}

impl Default for AdapterHealth {
    fn default() -> Self {
        Self::new(AdapterHealthConfig::default())
    }
}

impl AdapterHealth {
    pub fn new(cfg: AdapterHealthConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(State {
                consecutive_failures: 0,
                opened_at: None,
                enabled: true,
                total_calls: 0,
                successful_calls: 0,
                total_cost_usd: 0.0,
                total_latency_ms: 0.0,
            }),
        }
    }

    // A poisoned lock still holds valid counters; recover rather than unwind.
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record one successful call. Resets the consecutive-failure counter but
    /// leaves an open breaker open until its cooldown check.
    pub fn record_success(&self, latency_ms: f64, cost_usd: f64) {
        let mut st = self.lock();
        st.consecutive_failures = 0;
        st.total_calls += 1;
        st.successful_calls += 1;
        st.total_latency_ms += latency_ms;
        st.total_cost_usd += cost_usd;
    }

    /// Record one failed call, opening the breaker at the threshold.
    pub fn record_failure(&self) {
        let mut st = self.lock();
        st.consecutive_failures = st.consecutive_failures.saturating_add(1);
        st.total_calls += 1;
        if st.consecutive_failures >= self.cfg.failure_threshold {
            if st.opened_at.is_none() {
                tracing::warn!(
                    consecutive_failures = st.consecutive_failures,
                    threshold = self.cfg.failure_threshold,
                    "circuit breaker opened"
                );
            }
            st.opened_at = Some(Instant::now());
        }
    }

    /// Check the breaker, closing it (and resetting the failure counter) once
    /// the cooldown has elapsed.
    pub fn is_circuit_open(&self) -> bool {
        let mut st = self.lock();
        match st.opened_at {
            Some(opened) => {
                if opened.elapsed() >= self.cfg.cooldown {
                    st.opened_at = None;
                    st.consecutive_failures = 0;
                    tracing::info!("circuit breaker closed after cooldown");
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    /// Fraction of calls that succeeded; 1.0 before any call.
    pub fn success_rate(&self) -> f64 {
        let st = self.lock();
        if st.total_calls == 0 {
            1.0
        } else {
            st.successful_calls as f64 / st.total_calls as f64
        }
    }

    /// Enabled, breaker closed, and success rate acceptable (or sample size
    /// too small for the rate to mean anything).
    pub fn is_healthy(&self) -> bool {
        if !self.is_enabled() || self.is_circuit_open() {
            return false;
        }
        let st = self.lock();
        st.total_calls < MIN_HEALTH_SAMPLES
            || st.successful_calls as f64 / st.total_calls as f64 >= SUCCESS_RATE_FLOOR
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let st = self.lock();
        let now = Instant::now();
        let open_remaining_ms = st.opened_at.and_then(|opened| {
            let deadline = opened + self.cfg.cooldown;
            if deadline > now {
                Some((deadline - now).as_millis() as u64)
            } else {
                None
            }
        });
        HealthSnapshot {
            enabled: st.enabled,
            circuit_open: st.opened_at.is_some(),
            consecutive_failures: st.consecutive_failures,
            failure_threshold: self.cfg.failure_threshold,
            cooldown_secs: self.cfg.cooldown.as_secs(),
            open_remaining_ms,
            total_calls: st.total_calls,
            successful_calls: st.successful_calls,
            success_rate: if st.total_calls == 0 {
                1.0
            } else {
                st.successful_calls as f64 / st.total_calls as f64
            },
            avg_latency_ms: if st.successful_calls == 0 {
                0.0
            } else {
                st.total_latency_ms / st.successful_calls as f64
            },
            total_cost_usd: st.total_cost_usd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_config_defaults() {
        let cfg = AdapterHealthConfig::default();
        assert_eq!(cfg.failure_threshold, 5);
        assert_eq!(cfg.cooldown, Duration::from_secs(300));
    }

    #[test]
    fn test_config_builder() {
        let cfg = AdapterHealthConfig::new()
            .with_failure_threshold(3)
            .with_cooldown(Duration::from_secs(10));
        assert_eq!(cfg.failure_threshold, 3);
        assert_eq!(cfg.cooldown, Duration::from_secs(10));
    }

    #[test]
    fn test_initial_state_healthy() {
        let health = AdapterHealth::default();
        assert!(health.is_healthy());
        assert!(!health.is_circuit_open());
        assert_eq!(health.success_rate(), 1.0);
    }

    #[test]
    fn test_breaker_opens_at_threshold() {
        let health = AdapterHealth::new(AdapterHealthConfig::new().with_failure_threshold(3));

        health.record_failure();
        health.record_failure();
        assert!(!health.is_circuit_open());

        health.record_failure();
        assert!(health.is_circuit_open());
        assert!(!health.is_healthy());
        assert!(health.snapshot().open_remaining_ms.is_some());
    }

    #[test]
    fn test_success_resets_failure_counter() {
        let health = AdapterHealth::new(AdapterHealthConfig::new().with_failure_threshold(3));

        health.record_failure();
        health.record_failure();
        health.record_success(100.0, 0.01);
        assert_eq!(health.snapshot().consecutive_failures, 0);

        // Needs a fresh run of three failures to open.
        health.record_failure();
        health.record_failure();
        assert!(!health.is_circuit_open());
        health.record_failure();
        assert!(health.is_circuit_open());
    }

    #[test]
    fn test_success_does_not_close_open_breaker() {
        let health = AdapterHealth::new(
            AdapterHealthConfig::new()
                .with_failure_threshold(2)
                .with_cooldown(Duration::from_secs(60)),
        );
        health.record_failure();
        health.record_failure();
        assert!(health.is_circuit_open());

        health.record_success(100.0, 0.0);
        assert!(health.is_circuit_open());
    }

    #[test]
    fn test_breaker_closes_after_cooldown() {
        let health = AdapterHealth::new(
            AdapterHealthConfig::new()
                .with_failure_threshold(2)
                .with_cooldown(Duration::from_millis(50)),
        );
        health.record_failure();
        health.record_failure();
        assert!(health.is_circuit_open());

        thread::sleep(Duration::from_millis(60));
        assert!(!health.is_circuit_open());
        assert_eq!(health.snapshot().consecutive_failures, 0);
    }

    #[test]
    fn test_low_success_rate_unhealthy_only_with_samples() {
        let health = AdapterHealth::new(AdapterHealthConfig::new().with_failure_threshold(100));

        // 4 failures out of 5: rate 0.2, but below the sample minimum.
        health.record_success(100.0, 0.0);
        for _ in 0..4 {
            health.record_failure();
        }
        assert!(health.is_healthy());

        // Push past the minimum sample size with more failures.
        for _ in 0..6 {
            health.record_failure();
        }
        assert!(!health.is_healthy());
    }

    #[test]
    fn test_disabled_adapter_unhealthy() {
        let health = AdapterHealth::default();
        health.set_enabled(false);
        assert!(!health.is_healthy());
        health.set_enabled(true);
        assert!(health.is_healthy());
    }

    #[test]
    fn test_snapshot_aggregates() {
        let health = AdapterHealth::default();
        health.record_success(100.0, 0.01);
        health.record_success(300.0, 0.02);
        health.record_failure();

        let snap = health.snapshot();
        assert_eq!(snap.total_calls, 3);
        assert_eq!(snap.successful_calls, 2);
        assert!((snap.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((snap.avg_latency_ms - 200.0).abs() < 1e-9);
        assert!((snap.total_cost_usd - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_recording() {
        let health = Arc::new(AdapterHealth::new(
            AdapterHealthConfig::new().with_failure_threshold(1000),
        ));

        let mut handles = vec![];
        for _ in 0..10 {
            let h = Arc::clone(&health);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    h.record_failure();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(health.snapshot().total_calls, 500);
        assert_eq!(health.snapshot().consecutive_failures, 500);
    }
}
