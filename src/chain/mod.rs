//! Fallback chain: ordered adapter sequencing with outcome aggregation.
//!
//! A chain tries its adapters strictly in order for one logical request,
//! skipping unhealthy ones, and returns the first successful response. Two
//! adapters are never raced in parallel for the same request, so a single
//! logical request can never produce duplicate billable provider calls.
//! Independent requests may run concurrently against the same chain; the
//! shared [`ChainMetricsSnapshot`] counters live under one mutex.

mod metrics;

pub use metrics::ChainMetricsSnapshot;

use crate::adapter::{AdapterResponse, ProviderAdapter};
use crate::{Error, Result};
use metrics::ChainMetrics;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error as ThisError;

/// One failed or skipped attempt within a chain execution.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptFailure {
    pub adapter: String,
    pub reason: String,
}

/// Raised only when every adapter has been tried (or was unavailable) and
/// none succeeded. Carries the ordered per-adapter failure reasons.
#[derive(Debug, ThisError)]
pub enum ChainError {
    #[error("all adapters failed ({}): {}", .attempts.len(), summarize(.attempts))]
    AllAdaptersFailed { attempts: Vec<AttemptFailure> },
}

impl ChainError {
    /// Names of the adapters that were tried or skipped, in order.
    pub fn failed_adapters(&self) -> Vec<&str> {
        match self {
            ChainError::AllAdaptersFailed { attempts } => {
                attempts.iter().map(|a| a.adapter.as_str()).collect()
            }
        }
    }
}

fn summarize(attempts: &[AttemptFailure]) -> String {
    if attempts.is_empty() {
        return "no adapters registered".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.adapter, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Ordered sequence of adapters tried for one logical request until one
/// succeeds or all are exhausted.
pub struct FallbackChain {
    name: String,
    adapters: RwLock<Vec<Arc<dyn ProviderAdapter>>>,
    metrics: Mutex<ChainMetrics>,
}

impl FallbackChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            adapters: RwLock::new(Vec::new()),
            metrics: Mutex::new(ChainMetrics::default()),
        }
    }

    pub fn with_adapters(
        name: impl Into<String>,
        adapters: Vec<Arc<dyn ProviderAdapter>>,
    ) -> Self {
        Self {
            name: name.into(),
            adapters: RwLock::new(adapters),
            metrics: Mutex::new(ChainMetrics::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append an adapter at the end of the chain.
    pub fn add_adapter(&self, adapter: Arc<dyn ProviderAdapter>) {
        self.write_adapters().push(adapter);
    }

    /// Insert an adapter at `position` (clamped to the current length).
    pub fn add_adapter_at(&self, adapter: Arc<dyn ProviderAdapter>, position: usize) {
        let mut adapters = self.write_adapters();
        let position = position.min(adapters.len());
        adapters.insert(position, adapter);
    }

    /// Remove the first adapter with this name, returning it if present.
    pub fn remove_adapter(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        let mut adapters = self.write_adapters();
        let idx = adapters.iter().position(|a| a.name() == name)?;
        Some(adapters.remove(idx))
    }

    /// Names of the registered adapters, in fallback order.
    pub fn adapter_names(&self) -> Vec<String> {
        self.read_adapters()
            .iter()
            .map(|a| a.name().to_string())
            .collect()
    }

    /// Adapters currently considered healthy (enabled, breaker closed,
    /// acceptable success rate), in fallback order. Diagnostics only; `execute`
    /// re-checks health per attempt.
    pub fn healthy_adapters(&self) -> Vec<Arc<dyn ProviderAdapter>> {
        self.read_adapters()
            .iter()
            .filter(|a| a.health().is_healthy())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_adapters().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_adapters().is_empty()
    }

    /// Execute a request against the chain.
    ///
    /// Adapters are consulted strictly in order. Unhealthy or unavailable
    /// adapters are skipped without charging their failure counters; an `Err`
    /// from an adapter is captured as a failed attempt rather than propagated.
    /// The first successful response is tagged with
    /// `metadata["fallback_attempts"]` (count of prior failed/skipped
    /// attempts) and returned. Exhaustion raises
    /// [`ChainError::AllAdaptersFailed`].
    pub async fn execute(&self, prompt: &str, context: Option<&Value>) -> Result<AdapterResponse> {
        // Snapshot so concurrent add/remove can't shift the order mid-request.
        let adapters: Vec<Arc<dyn ProviderAdapter>> = self.read_adapters().clone();
        let mut attempts: Vec<AttemptFailure> = Vec::new();

        for adapter in adapters {
            if !adapter.health().is_healthy() {
                tracing::debug!(chain = %self.name, adapter = adapter.name(), "skipping unhealthy adapter");
                attempts.push(AttemptFailure {
                    adapter: adapter.name().to_string(),
                    reason: "unhealthy (disabled or circuit open)".to_string(),
                });
                continue;
            }
            if !adapter.check_availability().await {
                tracing::debug!(chain = %self.name, adapter = adapter.name(), "skipping unavailable adapter");
                attempts.push(AttemptFailure {
                    adapter: adapter.name().to_string(),
                    reason: "unavailable".to_string(),
                });
                continue;
            }

            match adapter.execute(prompt, context).await {
                Ok(response) if response.is_success() => {
                    let fallback_attempts = attempts.len();
                    let mut response = response;
                    response.metadata.insert(
                        "fallback_attempts".to_string(),
                        Value::from(fallback_attempts as u64),
                    );
                    if fallback_attempts > 0 {
                        tracing::info!(
                            chain = %self.name,
                            adapter = adapter.name(),
                            fallback_attempts,
                            "request served after fallback"
                        );
                    }
                    self.lock_metrics().record_success(
                        adapter.name(),
                        response.cost_usd,
                        response.latency_ms,
                        fallback_attempts > 0,
                    );
                    return Ok(response);
                }
                Ok(response) => {
                    attempts.push(AttemptFailure {
                        adapter: adapter.name().to_string(),
                        reason: response.failure_reason(),
                    });
                }
                Err(err) => {
                    // The adapter blew up before it could record the outcome
                    // itself; charge its breaker here.
                    adapter.health().record_failure();
                    attempts.push(AttemptFailure {
                        adapter: adapter.name().to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        self.lock_metrics().record_failure();
        tracing::warn!(chain = %self.name, attempts = attempts.len(), "all adapters failed");
        Err(ChainError::AllAdaptersFailed { attempts }.into())
    }

    /// Estimate the cost of a prospective request.
    ///
    /// Delegates to the first (primary) adapter only; estimation does not
    /// simulate the fallback sequence. Empty chain estimates 0.
    pub fn estimate_cost(&self, prompt: &str, context: Option<&Value>) -> f64 {
        self.read_adapters()
            .first()
            .map(|a| a.estimate_cost(prompt, context))
            .unwrap_or(0.0)
    }

    /// Current chain metrics with derived rates.
    pub fn metrics(&self) -> ChainMetricsSnapshot {
        self.lock_metrics().snapshot()
    }

    /// Reset the running counters. Only ever done by explicit caller action.
    pub fn reset_metrics(&self) {
        *self.lock_metrics() = ChainMetrics::default();
    }

    fn read_adapters(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<dyn ProviderAdapter>>> {
        match self.adapters.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_adapters(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<dyn ProviderAdapter>>> {
        match self.adapters.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_metrics(&self) -> std::sync::MutexGuard<'_, ChainMetrics> {
        match self.metrics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("name", &self.name)
            .field("adapters", &self.adapter_names())
            .finish()
    }
}
