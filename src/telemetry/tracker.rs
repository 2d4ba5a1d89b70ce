//! Scoped request tracking.

use super::metrics::RequestMetrics;
use super::TelemetryCollector;
use std::time::Instant;

/// Tracks one in-flight request and records it on completion.
///
/// Latency is measured from construction. Consuming the tracker via
/// [`succeed`](Self::succeed) or [`fail`](Self::fail) finalizes the record
/// and hands it to the collector; a dropped tracker records nothing.
///
/// ```no_run
/// # use llm_relay::telemetry::TelemetryCollector;
/// let collector = TelemetryCollector::default();
/// let mut tracker = collector.start_request("openai", "gpt-4o", "tenant-123");
/// // ... perform the call ...
/// tracker.set_tokens(1500, 500);
/// tracker.succeed();
/// ```
pub struct RequestTracker<'a> {
    collector: &'a TelemetryCollector,
    metrics: RequestMetrics,
    started: Instant,
}

impl<'a> RequestTracker<'a> {
    pub(super) fn new(collector: &'a TelemetryCollector, metrics: RequestMetrics) -> Self {
        Self {
            collector,
            metrics,
            started: Instant::now(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.metrics.request_id
    }

    /// Token counts from the provider response.
    pub fn set_tokens(&mut self, input_tokens: u64, output_tokens: u64) {
        self.metrics.input_tokens = input_tokens;
        self.metrics.output_tokens = output_tokens;
    }

    /// Override the cost computed from the pricing table.
    pub fn set_cost(&mut self, cost_usd: f64) {
        self.metrics.cost_usd = cost_usd;
    }

    pub fn set_cached(&mut self, cached: bool) {
        self.metrics.cached = cached;
    }

    /// Mark as streaming, with optional time-to-first-token.
    pub fn set_streaming(&mut self, ttft_ms: Option<f64>) {
        self.metrics.streaming = true;
        self.metrics.time_to_first_token_ms = ttft_ms;
    }

    pub fn set_user(&mut self, user_id: impl Into<String>) {
        self.metrics.user_id = Some(user_id.into());
    }

    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.metrics.endpoint = Some(endpoint.into());
    }

    /// Finalize as a success and record.
    pub fn succeed(self) {
        self.finish(true, None, None);
    }

    /// Finalize as a failure and record.
    pub fn fail(self, error_type: impl Into<String>, error_message: impl Into<String>) {
        self.finish(false, Some(error_type.into()), Some(error_message.into()));
    }

    fn finish(mut self, success: bool, error_type: Option<String>, error_message: Option<String>) {
        self.metrics.success = success;
        self.metrics.error_type = error_type;
        self.metrics.error_message = error_message;
        self.metrics.latency_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.total_tokens = self.metrics.input_tokens + self.metrics.output_tokens;
        self.collector.record(self.metrics);
    }
}
