//! Request telemetry: cost, latency, and usage tracking.
//!
//! Thread-safe collection of per-request metrics with bounded in-memory
//! retention and time-windowed aggregation (latency percentiles, cost and
//! error breakdowns, per-tenant isolation).
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RequestMetrics`] | Record for one completed request |
//! | [`AggregatedMetrics`] | Time-windowed aggregate with percentiles |
//! | [`TelemetryCollector`] | Bounded history + aggregation engine |
//! | [`RequestTracker`] | Scoped tracker that measures and records |
//! | [`MetricsExporter`] | Trait for external metric destinations |
//! | [`NoopExporter`] | Default no-op sink |
//! | [`InMemoryExporter`] | In-memory sink for testing |
//! | [`CompositeExporter`] | Multi-destination composite sink |
//!
//! ## Example
//!
//! ```no_run
//! use llm_relay::telemetry::TelemetryCollector;
//!
//! let collector = TelemetryCollector::default();
//! let mut tracker = collector.start_request("openai", "gpt-4o", "tenant-123");
//! // ... call the provider ...
//! tracker.set_tokens(1500, 500);
//! tracker.succeed();
//!
//! let stats = collector.get_stats("1h", Some("tenant-123")).unwrap();
//! println!("p95 latency: {:.1}ms, cost: ${:.4}", stats.latency_p95, stats.total_cost_usd);
//! ```

mod exporter;
mod metrics;
mod tracker;

pub use exporter::{CompositeExporter, InMemoryExporter, MetricsExporter, NoopExporter};
pub use metrics::{AggregatedMetrics, RequestMetrics, UsageBreakdown};
pub use tracker::RequestTracker;

use crate::error::{Error, ErrorContext};
use crate::policy::PricingTable;
use crate::Result;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

/// Default number of request records retained in memory.
pub const DEFAULT_MAX_HISTORY: usize = 10_000;

#[derive(Default)]
struct History {
    /// Primary rolling history, oldest first.
    records: VecDeque<Arc<RequestMetrics>>,
    /// Secondary per-tenant index, kept consistent with the primary list.
    by_tenant: HashMap<String, VecDeque<Arc<RequestMetrics>>>,
}

/// Collects and aggregates request metrics.
///
/// Safe for concurrent producers: all history mutations happen under one
/// mutex, the exporter runs outside it, and aggregation reads a filtered
/// snapshot so long computations never hold the lock.
pub struct TelemetryCollector {
    max_history: usize,
    pricing: PricingTable,
    exporter: Option<Arc<dyn MetricsExporter>>,
    history: Mutex<History>,
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl TelemetryCollector {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            pricing: PricingTable::default(),
            exporter: None,
            history: Mutex::new(History::default()),
        }
    }

    /// Attach an export sink invoked for every recorded request.
    pub fn with_exporter(mut self, exporter: Arc<dyn MetricsExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Replace the pricing table used for cost backfill.
    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    /// Start tracking a request. Latency measurement begins immediately.
    pub fn start_request(
        &self,
        provider: impl Into<String>,
        model: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> RequestTracker<'_> {
        RequestTracker::new(self, RequestMetrics::new(provider, model, tenant_id))
    }

    /// Record completed request metrics.
    ///
    /// Backfills cost from the pricing table when the caller left it at zero
    /// but reported tokens. Evicts the oldest record once `max_history` is
    /// exceeded, keeping the per-tenant index consistent with the primary
    /// history.
    pub fn record(&self, mut metrics: RequestMetrics) {
        if metrics.cost_usd == 0.0 && metrics.effective_total_tokens() > 0 {
            metrics.cost_usd =
                self.pricing
                    .cost(&metrics.model, metrics.input_tokens, metrics.output_tokens);
        }

        let metrics = Arc::new(metrics);
        {
            let mut history = self.lock();
            history.records.push_back(metrics.clone());
            history
                .by_tenant
                .entry(metrics.tenant_id.clone())
                .or_default()
                .push_back(metrics.clone());

            if history.records.len() > self.max_history {
                if let Some(removed) = history.records.pop_front() {
                    if let Some(tenant_list) = history.by_tenant.get_mut(&removed.tenant_id) {
                        if tenant_list
                            .front()
                            .is_some_and(|m| m.request_id == removed.request_id)
                        {
                            tenant_list.pop_front();
                        }
                        if tenant_list.is_empty() {
                            history.by_tenant.remove(&removed.tenant_id);
                        }
                    }
                }
            }
        }

        // Export outside the lock; a failing sink must never break telemetry.
        if let Some(exporter) = &self.exporter {
            if let Err(error) = exporter.export(&metrics) {
                tracing::error!(%error, request_id = %metrics.request_id, "metrics export failed");
            }
        }

        tracing::info!(
            request_id = %metrics.request_id,
            tenant = %metrics.tenant_id,
            provider = %metrics.provider,
            model = %metrics.model,
            tokens = metrics.effective_total_tokens(),
            latency_ms = metrics.latency_ms,
            cost_usd = metrics.cost_usd,
            success = metrics.success,
            cached = metrics.cached,
            "request completed"
        );
    }

    /// Aggregated statistics over a trailing period.
    ///
    /// `period` is `"{N}{unit}"` with unit `m` (minutes), `h` (hours) or `d`
    /// (days), e.g. `"30m"`, `"1h"`, `"7d"`.
    pub fn get_stats(&self, period: &str, tenant_id: Option<&str>) -> Result<AggregatedMetrics> {
        let duration = parse_period(period)?;
        let now = Utc::now();
        let cutoff = now - duration;

        let snapshot = self.snapshot(cutoff, tenant_id);
        if snapshot.is_empty() {
            return Ok(AggregatedMetrics::empty(
                cutoff,
                now,
                tenant_id.map(String::from),
            ));
        }

        let mut latencies: Vec<f64> = snapshot.iter().map(|m| m.latency_ms).collect();
        latencies.sort_by(|a, b| a.total_cmp(b));

        let mut by_provider: HashMap<String, UsageBreakdown> = HashMap::new();
        let mut by_model: HashMap<String, UsageBreakdown> = HashMap::new();
        let mut errors_by_type: HashMap<String, u64> = HashMap::new();

        for m in &snapshot {
            let provider = by_provider.entry(m.provider.clone()).or_default();
            provider.requests += 1;
            provider.cost_usd += m.cost_usd;
            provider.tokens += m.effective_total_tokens();

            let model = by_model.entry(m.model.clone()).or_default();
            model.requests += 1;
            model.cost_usd += m.cost_usd;
            model.tokens += m.effective_total_tokens();

            if !m.success {
                if let Some(error_type) = &m.error_type {
                    *errors_by_type.entry(error_type.clone()).or_insert(0) += 1;
                }
            }
        }

        Ok(AggregatedMetrics {
            period_start: cutoff,
            period_end: now,
            tenant_id: tenant_id.map(String::from),
            total_requests: snapshot.len() as u64,
            successful_requests: snapshot.iter().filter(|m| m.success).count() as u64,
            failed_requests: snapshot.iter().filter(|m| !m.success).count() as u64,
            cached_requests: snapshot.iter().filter(|m| m.cached).count() as u64,
            total_input_tokens: snapshot.iter().map(|m| m.input_tokens).sum(),
            total_output_tokens: snapshot.iter().map(|m| m.output_tokens).sum(),
            total_cost_usd: snapshot.iter().map(|m| m.cost_usd).sum(),
            latency_p50: percentile(&latencies, 50.0),
            latency_p95: percentile(&latencies, 95.0),
            latency_p99: percentile(&latencies, 99.0),
            latency_avg: latencies.iter().sum::<f64>() / latencies.len() as f64,
            by_provider,
            by_model,
            errors_by_type,
        })
    }

    /// Cost breakdown by provider and model, derived from [`get_stats`](Self::get_stats).
    pub fn get_cost_breakdown(
        &self,
        period: &str,
        tenant_id: Option<&str>,
    ) -> Result<CostBreakdown> {
        let stats = self.get_stats(period, tenant_id)?;
        let total = stats.total_cost_usd;

        Ok(CostBreakdown {
            total_cost_usd: total,
            by_provider: stats
                .by_provider
                .into_iter()
                .map(|(provider, usage)| {
                    let percentage = if total > 0.0 {
                        usage.cost_usd / total * 100.0
                    } else {
                        0.0
                    };
                    (
                        provider,
                        ProviderCost {
                            cost_usd: usage.cost_usd,
                            percentage,
                        },
                    )
                })
                .collect(),
            by_model: stats
                .by_model
                .into_iter()
                .map(|(model, usage)| {
                    let avg_cost_usd = if usage.requests > 0 {
                        usage.cost_usd / usage.requests as f64
                    } else {
                        0.0
                    };
                    (
                        model,
                        ModelCost {
                            cost_usd: usage.cost_usd,
                            requests: usage.requests,
                            avg_cost_usd,
                        },
                    )
                })
                .collect(),
        })
    }

    /// Comprehensive per-tenant view, derived from [`get_stats`](Self::get_stats).
    pub fn get_tenant_stats(&self, tenant_id: &str, period: &str) -> Result<TenantStats> {
        let stats = self.get_stats(period, Some(tenant_id))?;
        let cost = self.get_cost_breakdown(period, Some(tenant_id))?;

        let success_rate = if stats.total_requests > 0 {
            stats.successful_requests as f64 / stats.total_requests as f64 * 100.0
        } else {
            0.0
        };

        Ok(TenantStats {
            tenant_id: tenant_id.to_string(),
            period: period.to_string(),
            requests: RequestCounts {
                total: stats.total_requests,
                successful: stats.successful_requests,
                failed: stats.failed_requests,
                success_rate,
            },
            tokens: TokenCounts {
                input: stats.total_input_tokens,
                output: stats.total_output_tokens,
                total: stats.total_input_tokens + stats.total_output_tokens,
            },
            cost,
            latency: LatencySummary {
                p50: stats.latency_p50,
                p95: stats.latency_p95,
                p99: stats.latency_p99,
                avg: stats.latency_avg,
            },
            errors_by_type: stats.errors_by_type,
        })
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self, cutoff: DateTime<Utc>, tenant_id: Option<&str>) -> Vec<Arc<RequestMetrics>> {
        let history = self.lock();
        match tenant_id {
            Some(tenant) => history
                .by_tenant
                .get(tenant)
                .map(|records| {
                    records
                        .iter()
                        .filter(|m| m.timestamp >= cutoff)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
            None => history
                .records
                .iter()
                .filter(|m| m.timestamp >= cutoff)
                .cloned()
                .collect(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, History> {
        match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Cost breakdown view returned by [`TelemetryCollector::get_cost_breakdown`].
#[derive(Debug, Clone, Serialize)]
pub struct CostBreakdown {
    pub total_cost_usd: f64,
    pub by_provider: HashMap<String, ProviderCost>,
    pub by_model: HashMap<String, ModelCost>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderCost {
    pub cost_usd: f64,
    /// Share of the period's total cost.
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelCost {
    pub cost_usd: f64,
    pub requests: u64,
    pub avg_cost_usd: f64,
}

/// Tenant view returned by [`TelemetryCollector::get_tenant_stats`].
#[derive(Debug, Clone, Serialize)]
pub struct TenantStats {
    pub tenant_id: String,
    pub period: String,
    pub requests: RequestCounts,
    pub tokens: TokenCounts,
    pub cost: CostBreakdown,
    pub latency: LatencySummary,
    pub errors_by_type: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestCounts {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenCounts {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub avg: f64,
}

/// Percentile over a sorted slice by linear interpolation: index is
/// `(n - 1) * p / 100`, interpolating between neighbors when fractional.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (sorted.len() - 1) as f64 * p / 100.0;
    let lower = idx.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = idx - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Parse `"{N}{m|h|d}"` into a duration.
fn parse_period(period: &str) -> Result<chrono::Duration> {
    let invalid = |details: &str| {
        Error::validation_with_context(
            format!("invalid period: '{period}'"),
            ErrorContext::new()
                .with_field_path("period")
                .with_details(details),
        )
    };

    if period.len() < 2 {
        return Err(invalid("expected format {N}{unit}, e.g. 30m, 1h, 7d"));
    }
    let (value, unit) = period.split_at(period.len() - 1);
    let value: i64 = value
        .parse()
        .map_err(|_| invalid("count must be an integer"))?;

    match unit {
        "m" => Ok(chrono::Duration::minutes(value)),
        "h" => Ok(chrono::Duration::hours(value)),
        "d" => Ok(chrono::Duration::days(value)),
        _ => Err(invalid("unit must be 'm' (minutes), 'h' (hours) or 'd' (days)")),
    }
}

static GLOBAL_COLLECTOR: Lazy<RwLock<Arc<TelemetryCollector>>> =
    Lazy::new(|| RwLock::new(Arc::new(TelemetryCollector::default())));

/// Returns the globally configured collector.
pub fn global_collector() -> Arc<TelemetryCollector> {
    GLOBAL_COLLECTOR.read().unwrap().clone()
}

/// Replaces the global collector.
pub fn set_global_collector(collector: Arc<TelemetryCollector>) {
    *GLOBAL_COLLECTOR.write().unwrap() = collector;
}
