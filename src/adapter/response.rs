//! Provider response representation.
//!
//! Ordinary provider failures (timeouts, rate limits, upstream errors) are
//! values of this type, not errors: the chain treats every non-success status
//! uniformly as "try the next adapter".

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Outcome class of a single provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
    RateLimited,
    Timeout,
}

/// Response from one adapter call. Immutable once constructed, except for the
/// chain tagging `fallback_attempts` into `metadata` on the way out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterResponse {
    pub status: ResponseStatus,
    /// Generated content (success only).
    pub content: Option<String>,
    /// Error message for non-success statuses.
    pub error: Option<String>,
    pub cost_usd: f64,
    pub latency_ms: f64,
    pub tokens_input: u64,
    pub tokens_output: u64,
    /// Name of the adapter that produced this response.
    pub adapter_name: String,
    /// Provider-native model identifier that served the request.
    pub model_used: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl AdapterResponse {
    /// Create a successful response carrying generated content.
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            content: Some(content.into()),
            error: None,
            cost_usd: 0.0,
            latency_ms: 0.0,
            tokens_input: 0,
            tokens_output: 0,
            adapter_name: String::new(),
            model_used: String::new(),
            metadata: HashMap::new(),
        }
    }

    /// Create a failure response. `status` must be one of the non-success
    /// statuses; the chain relies on `is_success` to decide whether to stop.
    pub fn failure(status: ResponseStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            content: None,
            error: Some(error.into()),
            cost_usd: 0.0,
            latency_ms: 0.0,
            tokens_input: 0,
            tokens_output: 0,
            adapter_name: String::new(),
            model_used: String::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_adapter(mut self, name: impl Into<String>) -> Self {
        self.adapter_name = name.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_used = model.into();
        self
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd;
        self
    }

    pub fn with_latency(mut self, latency_ms: f64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens_input = input;
        self.tokens_output = output;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    pub fn total_tokens(&self) -> u64 {
        self.tokens_input + self.tokens_output
    }

    /// Failure reason for diagnostics, falling back to the status name when no
    /// message was provided.
    pub fn failure_reason(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| format!("{:?} response with no error message", self.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response() {
        let response = AdapterResponse::success("Test content")
            .with_adapter("TestAdapter")
            .with_model("test-model")
            .with_cost(0.01)
            .with_latency(100.0)
            .with_tokens(50, 100);

        assert!(response.is_success());
        assert_eq!(response.content.as_deref(), Some("Test content"));
        assert_eq!(response.cost_usd, 0.01);
        assert_eq!(response.total_tokens(), 150);
    }

    #[test]
    fn test_error_response() {
        let response =
            AdapterResponse::failure(ResponseStatus::Error, "Test error").with_adapter("TestAdapter");

        assert!(!response.is_success());
        assert_eq!(response.error.as_deref(), Some("Test error"));
        assert!(response.content.is_none());
        assert_eq!(response.failure_reason(), "Test error");
    }

    #[test]
    fn test_rate_limited_response() {
        let response = AdapterResponse::failure(ResponseStatus::RateLimited, "Rate limit exceeded");
        assert!(!response.is_success());
        assert_eq!(response.status, ResponseStatus::RateLimited);
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&ResponseStatus::RateLimited).unwrap();
        assert_eq!(json, "\"rate_limited\"");
    }
}
