//! Usage policy model and enforcement.
//!
//! Policies allow fine-grained control over which models can be used, token
//! and cost ceilings per request, provider rate limits, and daily/monthly
//! tenant budgets. [`PolicyEnforcer`] validates a prospective call against
//! these rules before any network activity and tracks completed spend.

mod enforcer;
mod error;
mod pricing;

pub use enforcer::{ModelUsage, PolicyEnforcer, ProviderUsage, UsageReport};
pub use error::{BudgetScope, PolicyError};
pub use pricing::{PricingTable, DEFAULT_INPUT_RATIO};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coarse cost ranking used to cap which models a policy permits regardless
/// of per-request cost. Ordered: free < low < medium < high < premium.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    /// Local models, no API cost.
    Free,
    /// Budget models (gpt-4o-mini, claude-haiku).
    Low,
    /// Standard models (gpt-4o, claude-sonnet).
    Medium,
    /// Premium models (gpt-4, claude-opus).
    High,
    /// Specialized reasoning models (o1 family).
    Premium,
}

fn default_max_tokens() -> u64 {
    4096
}
fn default_max_cost() -> f64 {
    1.0
}
fn default_rpm() -> u32 {
    60
}
fn default_tpm() -> u64 {
    100_000
}
fn default_true() -> bool {
    true
}
fn default_monthly_budget() -> f64 {
    100.0
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_alert_threshold() -> f64 {
    80.0
}

/// Policy configuration for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPolicy {
    /// Provider name (openai, anthropic, azure_openai, ollama, bedrock).
    pub provider: String,
    /// Models allowed for this provider. Empty = all allowed.
    #[serde(default)]
    pub allowed_models: Vec<String>,
    /// Models explicitly denied. Takes precedence over allowed.
    #[serde(default)]
    pub denied_models: Vec<String>,
    /// Maximum tokens (input + output) per request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens_per_request: u64,
    /// Maximum USD cost per request. 0 = unlimited.
    #[serde(default = "default_max_cost")]
    pub max_cost_per_request: f64,
    /// Requests per minute. 0 = unlimited.
    #[serde(default = "default_rpm")]
    pub rate_limit_rpm: u32,
    /// Tokens per minute. 0 = unlimited.
    #[serde(default = "default_tpm")]
    pub rate_limit_tpm: u64,
    /// Maximum cost tier allowed. None = all tiers.
    #[serde(default)]
    pub cost_tier_limit: Option<CostTier>,
    /// Require a reason/justification for each request.
    #[serde(default)]
    pub require_reason: bool,
    /// Whether this provider is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProviderPolicy {
    /// Default policy for a provider with no explicit override.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            allowed_models: Vec::new(),
            denied_models: Vec::new(),
            max_tokens_per_request: default_max_tokens(),
            max_cost_per_request: default_max_cost(),
            rate_limit_rpm: default_rpm(),
            rate_limit_tpm: default_tpm(),
            cost_tier_limit: None,
            require_reason: false,
            enabled: true,
        }
    }
}

/// Tenant-level usage policy: budgets, provider overrides, and defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantPolicy {
    pub tenant_id: String,
    /// Monthly spending limit in USD.
    #[serde(default = "default_monthly_budget")]
    pub monthly_budget_usd: f64,
    /// Daily spending limit. None = use monthly only.
    #[serde(default)]
    pub daily_budget_usd: Option<f64>,
    /// Per-provider policy overrides.
    #[serde(default)]
    pub provider_policies: HashMap<String, ProviderPolicy>,
    /// Default provider when not specified.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Fall back to a free/local model when a budget would be exceeded.
    #[serde(default = "default_true")]
    pub fallback_to_local: bool,
    /// Enable usage tracking and reporting.
    #[serde(default = "default_true")]
    pub track_usage: bool,
    /// Alert when monthly spend reaches this percentage of the budget.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold_pct: f64,
}

impl TenantPolicy {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            monthly_budget_usd: default_monthly_budget(),
            daily_budget_usd: None,
            provider_policies: HashMap::new(),
            default_provider: default_provider(),
            fallback_to_local: true,
            track_usage: true,
            alert_threshold_pct: default_alert_threshold(),
        }
    }

    pub fn with_monthly_budget(mut self, budget_usd: f64) -> Self {
        self.monthly_budget_usd = budget_usd;
        self
    }

    pub fn with_daily_budget(mut self, budget_usd: f64) -> Self {
        self.daily_budget_usd = Some(budget_usd);
        self
    }

    pub fn with_provider_policy(mut self, policy: ProviderPolicy) -> Self {
        self.provider_policies.insert(policy.provider.clone(), policy);
        self
    }

    pub fn with_fallback_to_local(mut self, fallback: bool) -> Self {
        self.fallback_to_local = fallback;
        self
    }

    pub fn with_track_usage(mut self, track: bool) -> Self {
        self.track_usage = track;
        self
    }
}

/// Immutable snapshot of one completed, policy-tracked call. Appended-only;
/// never edited after recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub tenant_id: String,
    pub provider: String,
    pub model: String,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub tokens_total: u64,
    pub cost_usd: f64,
    pub latency_ms: f64,
    pub success: bool,
    pub reason: Option<String>,
}
