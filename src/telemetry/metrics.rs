//! Per-request and aggregated metric records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

/// Metrics for a single completed request.
///
/// Built by [`RequestTracker`](crate::telemetry::RequestTracker) during
/// execution, or constructed directly by callers that manage their own timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetrics {
    pub request_id: String,
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub provider: String,
    pub model: String,

    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,

    #[serde(default)]
    pub latency_ms: f64,
    /// Time to first token for streaming responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_first_token_ms: Option<f64>,

    #[serde(default)]
    pub cost_usd: f64,

    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Logical endpoint, e.g. "/chat" or "/complete".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub cached: bool,
}

impl RequestMetrics {
    /// New successful-by-default record with a generated 8-character request
    /// id and the current timestamp.
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            request_id: short_request_id(),
            tenant_id: tenant_id.into(),
            user_id: None,
            provider: provider.into(),
            model: model.into(),
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            latency_ms: 0.0,
            time_to_first_token_ms: None,
            cost_usd: 0.0,
            timestamp: Utc::now(),
            success: true,
            error_type: None,
            error_message: None,
            endpoint: None,
            streaming: false,
            cached: false,
        }
    }

    /// Total token count, falling back to input + output when the total was
    /// never set explicitly.
    pub fn effective_total_tokens(&self) -> u64 {
        if self.total_tokens > 0 {
            self.total_tokens
        } else {
            self.input_tokens + self.output_tokens
        }
    }

    /// Flat key-value shape for structured logging and metric export.
    pub fn to_log_fields(&self) -> serde_json::Value {
        json!({
            "request_id": self.request_id,
            "tenant_id": self.tenant_id,
            "provider": self.provider,
            "model": self.model,
            "tokens": self.effective_total_tokens(),
            "latency_ms": self.latency_ms,
            "cost_usd": self.cost_usd,
            "success": self.success,
            "streaming": self.streaming,
            "cached": self.cached,
        })
    }
}

/// Per-provider or per-model slice of an aggregate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageBreakdown {
    pub requests: u64,
    pub cost_usd: f64,
    pub tokens: u64,
}

/// Statistics aggregated over a time window, optionally filtered by tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// None = all tenants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cached_requests: u64,

    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost_usd: f64,

    pub latency_p50: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
    pub latency_avg: f64,

    pub by_provider: HashMap<String, UsageBreakdown>,
    pub by_model: HashMap<String, UsageBreakdown>,
    pub errors_by_type: HashMap<String, u64>,
}

impl AggregatedMetrics {
    /// Zeroed aggregate for an empty window.
    pub fn empty(
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        tenant_id: Option<String>,
    ) -> Self {
        Self {
            period_start,
            period_end,
            tenant_id,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            cached_requests: 0,
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_cost_usd: 0.0,
            latency_p50: 0.0,
            latency_p95: 0.0,
            latency_p99: 0.0,
            latency_avg: 0.0,
            by_provider: HashMap::new(),
            by_model: HashMap::new(),
            errors_by_type: HashMap::new(),
        }
    }
}

fn short_request_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}
