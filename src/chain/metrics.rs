//! Running counters owned by one fallback chain.

use serde::Serialize;
use std::collections::HashMap;

/// Mutable counters, kept under the chain's metrics mutex.
#[derive(Debug, Default)]
pub(crate) struct ChainMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub adapter_usage: HashMap<String, u64>,
    pub total_cost_usd: f64,
    pub fallback_triggers: u64,
    pub total_success_latency_ms: f64,
}

impl ChainMetrics {
    pub fn record_success(
        &mut self,
        adapter_name: &str,
        cost_usd: f64,
        latency_ms: f64,
        fell_back: bool,
    ) {
        self.total_requests += 1;
        self.successful_requests += 1;
        *self.adapter_usage.entry(adapter_name.to_string()).or_insert(0) += 1;
        self.total_cost_usd += cost_usd;
        self.total_success_latency_ms += latency_ms;
        if fell_back {
            self.fallback_triggers += 1;
        }
    }

    pub fn record_failure(&mut self) {
        self.total_requests += 1;
        self.failed_requests += 1;
    }

    pub fn snapshot(&self) -> ChainMetricsSnapshot {
        ChainMetricsSnapshot {
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            adapter_usage: self.adapter_usage.clone(),
            total_cost_usd: self.total_cost_usd,
            fallback_triggers: self.fallback_triggers,
            // 100% with no traffic, to avoid division-by-zero alarms.
            success_rate: if self.total_requests == 0 {
                100.0
            } else {
                self.successful_requests as f64 / self.total_requests as f64 * 100.0
            },
            avg_latency_ms: if self.successful_requests == 0 {
                0.0
            } else {
                self.total_success_latency_ms / self.successful_requests as f64
            },
            fallback_rate: if self.total_requests == 0 {
                0.0
            } else {
                self.fallback_triggers as f64 / self.total_requests as f64
            },
        }
    }
}

/// Point-in-time view of chain metrics with derived rates.
#[derive(Debug, Clone, Serialize)]
pub struct ChainMetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub adapter_usage: HashMap<String, u64>,
    pub total_cost_usd: f64,
    pub fallback_triggers: u64,
    /// Percentage of requests that succeeded; 100.0 with no traffic.
    pub success_rate: f64,
    /// Average latency over successful requests only.
    pub avg_latency_ms: f64,
    /// Fraction of requests that needed at least one fallback hop.
    pub fallback_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metrics_rates() {
        let metrics = ChainMetrics::default();
        let snap = metrics.snapshot();
        assert_eq!(snap.success_rate, 100.0);
        assert_eq!(snap.avg_latency_ms, 0.0);
        assert_eq!(snap.fallback_rate, 0.0);
    }

    #[test]
    fn test_rates_after_traffic() {
        let mut metrics = ChainMetrics::default();
        metrics.record_success("primary", 0.001, 100.0, false);
        metrics.record_success("secondary", 0.002, 300.0, true);
        metrics.record_failure();

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.successful_requests, 2);
        assert_eq!(snap.failed_requests, 1);
        assert_eq!(snap.adapter_usage["primary"], 1);
        assert_eq!(snap.adapter_usage["secondary"], 1);
        assert!((snap.total_cost_usd - 0.003).abs() < 1e-9);
        assert_eq!(snap.fallback_triggers, 1);
        assert!((snap.success_rate - 200.0 / 3.0).abs() < 1e-9);
        assert!((snap.avg_latency_ms - 200.0).abs() < 1e-9);
        assert!((snap.fallback_rate - 1.0 / 3.0).abs() < 1e-9);
    }
}
