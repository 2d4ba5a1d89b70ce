//! Policy enforcement engine.
//!
//! Validation is an ordered sequence of pure rule checks, short-circuiting at
//! the first failing rule. Budget counters and per-provider sliding rate
//! windows are shared mutable state across concurrent validations; the
//! rate-limit read-then-append happens atomically under one lock so two
//! concurrent requests can never both pass a check only one could satisfy.

use super::error::{BudgetScope, PolicyError};
use super::pricing::{PricingTable, DEFAULT_INPUT_RATIO};
use super::{CostTier, ProviderPolicy, TenantPolicy, UsageRecord};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding rate-limit windows cover exactly the trailing 60 seconds.
const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct RateWindow {
    requests: Vec<Instant>,
    tokens: Vec<(Instant, u64)>,
}

impl RateWindow {
    fn prune(&mut self, now: Instant) {
        self.requests
            .retain(|t| now.duration_since(*t) < RATE_WINDOW);
        self.tokens
            .retain(|(t, _)| now.duration_since(*t) < RATE_WINDOW);
    }

    fn token_sum(&self) -> u64 {
        self.tokens.iter().map(|(_, count)| count).sum()
    }
}

#[derive(Debug)]
struct EnforcerState {
    records: Vec<UsageRecord>,
    monthly_spend: f64,
    daily_spend: f64,
    last_daily_reset: NaiveDate,
    rate_windows: HashMap<String, RateWindow>,
    budget_alerted: bool,
}

/// Per-provider slice of a usage report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderUsage {
    pub requests: u64,
    pub cost_usd: f64,
    pub tokens: u64,
    pub avg_latency_ms: f64,
    /// Percentage of this provider's requests that succeeded.
    pub success_rate: f64,
}

/// Per-model slice of a usage report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelUsage {
    pub requests: u64,
    pub cost_usd: f64,
    pub tokens: u64,
    pub avg_latency_ms: f64,
}

/// Aggregate usage over a trailing window of days.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub tenant_id: String,
    pub period_days: i64,
    pub total_requests: u64,
    pub total_cost_usd: f64,
    pub total_tokens: u64,
    pub by_provider: HashMap<String, ProviderUsage>,
    pub by_model: HashMap<String, ModelUsage>,
    pub budget_remaining_usd: f64,
    pub budget_used_pct: f64,
}

/// Enforces tenant usage policy before requests are sent and tracks spend
/// afterwards. All operations are in-memory and non-blocking; validation
/// performs no network activity.
pub struct PolicyEnforcer {
    policy: TenantPolicy,
    pricing: PricingTable,
    state: Mutex<EnforcerState>,
}

impl PolicyEnforcer {
    pub fn new(policy: TenantPolicy) -> Self {
        Self::with_pricing(policy, PricingTable::default())
    }

    pub fn with_pricing(policy: TenantPolicy, pricing: PricingTable) -> Self {
        Self {
            policy,
            pricing,
            state: Mutex::new(EnforcerState {
                records: Vec::new(),
                monthly_spend: 0.0,
                daily_spend: 0.0,
                last_daily_reset: Utc::now().date_naive(),
                rate_windows: HashMap::new(),
                budget_alerted: false,
            }),
        }
    }

    pub fn policy(&self) -> &TenantPolicy {
        &self.policy
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Validate a prospective request against policy.
    ///
    /// Checks run in a fixed order and short-circuit at the first failing
    /// rule: provider enabled, model denial/allowance, cost tier, token
    /// ceiling, per-request cost ceiling, daily budget, monthly budget, rate
    /// limits, reason requirement. A passing validation records the request
    /// into the provider's sliding rate window.
    pub fn validate_request(
        &self,
        provider: &str,
        model: &str,
        estimated_tokens: u64,
        reason: Option<&str>,
    ) -> Result<(), PolicyError> {
        let provider_policy = self
            .policy
            .provider_policies
            .get(provider)
            .cloned()
            .unwrap_or_else(|| ProviderPolicy::new(provider));

        check_provider_enabled(&provider_policy)?;
        check_model_access(&provider_policy, model)?;
        check_cost_tier(&provider_policy, model, self.pricing.tier_for(model))?;
        check_token_ceiling(&provider_policy, estimated_tokens)?;

        let estimated_cost = self.estimate_cost(model, estimated_tokens);
        check_request_cost(&provider_policy, estimated_cost)?;

        let mut st = self.lock();
        Self::roll_daily_budget(&mut st);
        check_budget(
            BudgetScope::Daily,
            self.policy.daily_budget_usd,
            st.daily_spend,
            estimated_cost,
            self.policy.fallback_to_local,
        )?;
        check_budget(
            BudgetScope::Monthly,
            Some(self.policy.monthly_budget_usd),
            st.monthly_spend,
            estimated_cost,
            self.policy.fallback_to_local,
        )?;
        Self::check_and_record_rate(&mut st, provider, &provider_policy, estimated_tokens)?;
        drop(st);

        check_reason(&provider_policy, reason)?;
        Ok(())
    }

    /// Estimate request cost in USD using the fixed 70/30 input/output split.
    pub fn estimate_cost(&self, model: &str, estimated_tokens: u64) -> f64 {
        self.pricing
            .estimate(model, estimated_tokens, DEFAULT_INPUT_RATIO)
    }

    /// Record actual usage after a request completes. No-op when the tenant
    /// has usage tracking disabled.
    #[allow(clippy::too_many_arguments)]
    pub fn record_usage(
        &self,
        provider: &str,
        model: &str,
        tokens_input: u64,
        tokens_output: u64,
        cost_usd: f64,
        latency_ms: f64,
        success: bool,
        reason: Option<String>,
    ) {
        if !self.policy.track_usage {
            return;
        }

        let record = UsageRecord {
            timestamp: Utc::now(),
            tenant_id: self.policy.tenant_id.clone(),
            provider: provider.to_string(),
            model: model.to_string(),
            tokens_input,
            tokens_output,
            tokens_total: tokens_input + tokens_output,
            cost_usd,
            latency_ms,
            success,
            reason,
        };

        let mut st = self.lock();
        st.records.push(record);
        st.monthly_spend += cost_usd;
        st.daily_spend += cost_usd;

        // Alert threshold is a signal only; no hard action here.
        if self.policy.monthly_budget_usd > 0.0 && !st.budget_alerted {
            let spend_pct = st.monthly_spend / self.policy.monthly_budget_usd * 100.0;
            if spend_pct >= self.policy.alert_threshold_pct {
                st.budget_alerted = true;
                tracing::warn!(
                    tenant = %self.policy.tenant_id,
                    spend_pct = format!("{spend_pct:.1}"),
                    threshold_pct = self.policy.alert_threshold_pct,
                    monthly_spend_usd = st.monthly_spend,
                    "tenant budget alert threshold crossed"
                );
            }
        }
    }

    /// Usage report over the trailing `days`.
    pub fn get_usage_report(&self, days: i64) -> UsageReport {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let st = self.lock();

        let recent: Vec<&UsageRecord> = st
            .records
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .collect();

        let mut by_provider: HashMap<String, ProviderUsage> = HashMap::new();
        let mut by_model: HashMap<String, ModelUsage> = HashMap::new();
        let mut provider_latency: HashMap<String, (f64, u64)> = HashMap::new();
        let mut provider_success: HashMap<String, u64> = HashMap::new();
        let mut model_latency: HashMap<String, (f64, u64)> = HashMap::new();

        for record in &recent {
            let provider = by_provider.entry(record.provider.clone()).or_default();
            provider.requests += 1;
            provider.cost_usd += record.cost_usd;
            provider.tokens += record.tokens_total;
            let (latency_sum, count) = provider_latency
                .entry(record.provider.clone())
                .or_insert((0.0, 0));
            *latency_sum += record.latency_ms;
            *count += 1;
            if record.success {
                *provider_success.entry(record.provider.clone()).or_insert(0) += 1;
            }

            let model = by_model.entry(record.model.clone()).or_default();
            model.requests += 1;
            model.cost_usd += record.cost_usd;
            model.tokens += record.tokens_total;
            let (latency_sum, count) = model_latency
                .entry(record.model.clone())
                .or_insert((0.0, 0));
            *latency_sum += record.latency_ms;
            *count += 1;
        }

        for (name, usage) in by_provider.iter_mut() {
            if let Some((latency_sum, count)) = provider_latency.get(name) {
                usage.avg_latency_ms = latency_sum / *count as f64;
                let successes = provider_success.get(name).copied().unwrap_or(0);
                usage.success_rate = successes as f64 / *count as f64 * 100.0;
            }
        }
        for (name, usage) in by_model.iter_mut() {
            if let Some((latency_sum, count)) = model_latency.get(name) {
                usage.avg_latency_ms = latency_sum / *count as f64;
            }
        }

        UsageReport {
            tenant_id: self.policy.tenant_id.clone(),
            period_days: days,
            total_requests: recent.len() as u64,
            total_cost_usd: recent.iter().map(|r| r.cost_usd).sum(),
            total_tokens: recent.iter().map(|r| r.tokens_total).sum(),
            by_provider,
            by_model,
            budget_remaining_usd: (self.policy.monthly_budget_usd - st.monthly_spend).max(0.0),
            budget_used_pct: if self.policy.monthly_budget_usd > 0.0 {
                st.monthly_spend / self.policy.monthly_budget_usd * 100.0
            } else {
                0.0
            },
        }
    }

    /// Reset the monthly spend counter (call at the start of a billing
    /// period). Daily spend resets automatically when the UTC date advances.
    pub fn reset_monthly_budget(&self) {
        let mut st = self.lock();
        st.monthly_spend = 0.0;
        st.budget_alerted = false;
    }

    pub fn monthly_spend(&self) -> f64 {
        self.lock().monthly_spend
    }

    pub fn daily_spend(&self) -> f64 {
        self.lock().daily_spend
    }

    /// Copy of the appended usage records.
    pub fn usage_records(&self) -> Vec<UsageRecord> {
        self.lock().records.clone()
    }

    fn roll_daily_budget(st: &mut EnforcerState) {
        let today = Utc::now().date_naive();
        if today > st.last_daily_reset {
            st.daily_spend = 0.0;
            st.last_daily_reset = today;
        }
    }

    fn check_and_record_rate(
        st: &mut EnforcerState,
        provider: &str,
        policy: &ProviderPolicy,
        tokens: u64,
    ) -> Result<(), PolicyError> {
        let now = Instant::now();
        let window = st.rate_windows.entry(provider.to_string()).or_default();
        window.prune(now);

        if policy.rate_limit_rpm > 0 && window.requests.len() as u32 >= policy.rate_limit_rpm {
            return Err(PolicyError::RateLimitExceeded {
                provider: provider.to_string(),
                message: format!(
                    "{} requests in last minute (limit: {} RPM)",
                    window.requests.len(),
                    policy.rate_limit_rpm
                ),
            });
        }

        let tokens_in_window = window.token_sum();
        if policy.rate_limit_tpm > 0 && tokens_in_window + tokens > policy.rate_limit_tpm {
            return Err(PolicyError::RateLimitExceeded {
                provider: provider.to_string(),
                message: format!(
                    "{} tokens would exceed limit ({} TPM)",
                    tokens_in_window + tokens,
                    policy.rate_limit_tpm
                ),
            });
        }

        window.requests.push(now);
        window.tokens.push((now, tokens));
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EnforcerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// Pure rule checks, composed in order by `validate_request`.

fn check_provider_enabled(policy: &ProviderPolicy) -> Result<(), PolicyError> {
    if !policy.enabled {
        return Err(PolicyError::ProviderDisabled {
            provider: policy.provider.clone(),
        });
    }
    Ok(())
}

fn check_model_access(policy: &ProviderPolicy, model: &str) -> Result<(), PolicyError> {
    // Denial always wins over allowance.
    if policy.denied_models.iter().any(|m| m == model) {
        return Err(PolicyError::violation(format!(
            "model '{}' is explicitly denied for provider '{}'",
            model, policy.provider
        )));
    }
    if !policy.allowed_models.is_empty() && !policy.allowed_models.iter().any(|m| m == model) {
        return Err(PolicyError::violation(format!(
            "model '{}' not in allowed list for provider '{}': {:?}",
            model, policy.provider, policy.allowed_models
        )));
    }
    Ok(())
}

fn check_cost_tier(
    policy: &ProviderPolicy,
    model: &str,
    model_tier: Option<CostTier>,
) -> Result<(), PolicyError> {
    if let (Some(limit), Some(tier)) = (policy.cost_tier_limit, model_tier) {
        if tier > limit {
            return Err(PolicyError::violation(format!(
                "model '{}' tier ({:?}) exceeds limit ({:?})",
                model, tier, limit
            )));
        }
    }
    Ok(())
}

fn check_token_ceiling(policy: &ProviderPolicy, estimated_tokens: u64) -> Result<(), PolicyError> {
    if estimated_tokens > policy.max_tokens_per_request {
        return Err(PolicyError::violation(format!(
            "estimated tokens ({}) exceeds limit ({}) for provider '{}'",
            estimated_tokens, policy.max_tokens_per_request, policy.provider
        )));
    }
    Ok(())
}

fn check_request_cost(policy: &ProviderPolicy, estimated_cost: f64) -> Result<(), PolicyError> {
    if policy.max_cost_per_request > 0.0 && estimated_cost > policy.max_cost_per_request {
        return Err(PolicyError::violation(format!(
            "estimated cost (${:.4}) exceeds per-request limit (${:.4})",
            estimated_cost, policy.max_cost_per_request
        )));
    }
    Ok(())
}

fn check_budget(
    scope: BudgetScope,
    limit: Option<f64>,
    current_spend: f64,
    estimated_cost: f64,
    fallback_to_local: bool,
) -> Result<(), PolicyError> {
    let Some(limit) = limit else {
        return Ok(());
    };
    if current_spend + estimated_cost > limit {
        if fallback_to_local {
            return Err(PolicyError::FallbackToLocal {
                scope,
                limit,
                current_spend,
                estimated_cost,
            });
        }
        return Err(PolicyError::BudgetExceeded {
            scope,
            limit,
            current_spend,
            estimated_cost,
        });
    }
    Ok(())
}

fn check_reason(policy: &ProviderPolicy, reason: Option<&str>) -> Result<(), PolicyError> {
    if policy.require_reason && reason.map_or(true, str::is_empty) {
        return Err(PolicyError::violation(format!(
            "reason required for requests to provider '{}'",
            policy.provider
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_priced_enforcer(policy: TenantPolicy) -> PolicyEnforcer {
        // $1 per 1k tokens on both sides: 66 tokens estimate to $0.066.
        let pricing =
            PricingTable::empty().with_model("test-model", 1.0, 1.0, CostTier::Free);
        PolicyEnforcer::with_pricing(policy, pricing)
    }

    #[test]
    fn test_disabled_provider_rejected() {
        let mut provider_policy = ProviderPolicy::new("openai");
        provider_policy.enabled = false;
        let enforcer =
            PolicyEnforcer::new(TenantPolicy::new("t1").with_provider_policy(provider_policy));

        let err = enforcer
            .validate_request("openai", "gpt-4o", 100, None)
            .unwrap_err();
        assert!(matches!(err, PolicyError::ProviderDisabled { .. }));
    }

    #[test]
    fn test_denied_model_wins_over_allowed() {
        let mut provider_policy = ProviderPolicy::new("openai");
        provider_policy.allowed_models = vec!["gpt-4o".into()];
        provider_policy.denied_models = vec!["gpt-4o".into()];
        let enforcer =
            PolicyEnforcer::new(TenantPolicy::new("t1").with_provider_policy(provider_policy));

        let err = enforcer
            .validate_request("openai", "gpt-4o", 100, None)
            .unwrap_err();
        assert!(matches!(err, PolicyError::Violation { .. }));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_model_not_in_allowed_list() {
        let mut provider_policy = ProviderPolicy::new("openai");
        provider_policy.allowed_models = vec!["gpt-4o-mini".into()];
        let enforcer =
            PolicyEnforcer::new(TenantPolicy::new("t1").with_provider_policy(provider_policy));

        assert!(enforcer
            .validate_request("openai", "gpt-4o-mini", 100, None)
            .is_ok());
        let err = enforcer
            .validate_request("openai", "gpt-4o", 100, None)
            .unwrap_err();
        assert!(err.to_string().contains("allowed list"));
    }

    #[test]
    fn test_cost_tier_limit() {
        let mut provider_policy = ProviderPolicy::new("openai");
        provider_policy.cost_tier_limit = Some(CostTier::Low);
        let enforcer = PolicyEnforcer::new(
            TenantPolicy::new("t1").with_provider_policy(provider_policy),
        );

        // gpt-4o-mini is Low: allowed. gpt-4o is Medium: rejected.
        assert!(enforcer
            .validate_request("openai", "gpt-4o-mini", 100, None)
            .is_ok());
        let err = enforcer
            .validate_request("openai", "gpt-4o", 100, None)
            .unwrap_err();
        assert!(err.to_string().contains("tier"));

        // Unknown models have no tier and pass the tier check.
        assert!(enforcer
            .validate_request("openai", "mystery-model", 100, None)
            .is_ok());
    }

    #[test]
    fn test_token_ceiling() {
        let enforcer = PolicyEnforcer::new(TenantPolicy::new("t1"));
        // Default ceiling is 4096 tokens.
        let err = enforcer
            .validate_request("openai", "gpt-4o-mini", 5000, None)
            .unwrap_err();
        assert!(err.to_string().contains("tokens"));
    }

    #[test]
    fn test_per_request_cost_ceiling() {
        let mut provider_policy = ProviderPolicy::new("openai");
        provider_policy.max_cost_per_request = 0.01;
        let enforcer = PolicyEnforcer::new(
            TenantPolicy::new("t1")
                .with_monthly_budget(1000.0)
                .with_provider_policy(provider_policy),
        );

        // 4000 tokens of gpt-4o estimate to 0.019 > 0.01.
        let err = enforcer
            .validate_request("openai", "gpt-4o", 4000, None)
            .unwrap_err();
        assert!(err.to_string().contains("per-request limit"));

        // Zero ceiling means unlimited.
        let mut unlimited = ProviderPolicy::new("openai");
        unlimited.max_cost_per_request = 0.0;
        let enforcer = PolicyEnforcer::new(
            TenantPolicy::new("t1")
                .with_monthly_budget(1000.0)
                .with_provider_policy(unlimited),
        );
        assert!(enforcer
            .validate_request("openai", "gpt-4o", 4000, None)
            .is_ok());
    }

    #[test]
    fn test_monthly_budget_exceeded() {
        let enforcer = flat_priced_enforcer(
            TenantPolicy::new("t1")
                .with_monthly_budget(1.0)
                .with_fallback_to_local(false),
        );
        enforcer.record_usage("openai", "test-model", 700, 300, 0.95, 100.0, true, None);

        // 0.95 + 0.066 > 1.00
        let err = enforcer
            .validate_request("openai", "test-model", 66, None)
            .unwrap_err();
        match err {
            PolicyError::BudgetExceeded {
                scope,
                limit,
                current_spend,
                estimated_cost,
            } => {
                assert_eq!(scope, BudgetScope::Monthly);
                assert_eq!(limit, 1.0);
                assert!((current_spend - 0.95).abs() < 1e-9);
                assert!((estimated_cost - 0.066).abs() < 1e-9);
            }
            other => panic!("expected budget error, got {other}"),
        }
    }

    #[test]
    fn test_budget_fallback_signal_when_opted_in() {
        let enforcer = flat_priced_enforcer(
            TenantPolicy::new("t1")
                .with_monthly_budget(1.0)
                .with_fallback_to_local(true),
        );
        enforcer.record_usage("openai", "test-model", 700, 300, 0.95, 100.0, true, None);

        let err = enforcer
            .validate_request("openai", "test-model", 66, None)
            .unwrap_err();
        assert!(err.is_fallback_signal());
    }

    #[test]
    fn test_daily_budget_checked_before_monthly() {
        let enforcer = flat_priced_enforcer(
            TenantPolicy::new("t1")
                .with_monthly_budget(100.0)
                .with_daily_budget(0.5)
                .with_fallback_to_local(false),
        );
        enforcer.record_usage("openai", "test-model", 300, 150, 0.45, 100.0, true, None);

        let err = enforcer
            .validate_request("openai", "test-model", 66, None)
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::BudgetExceeded {
                scope: BudgetScope::Daily,
                ..
            }
        ));
    }

    #[test]
    fn test_rpm_limit() {
        let mut provider_policy = ProviderPolicy::new("ollama");
        provider_policy.rate_limit_rpm = 2;
        let enforcer =
            PolicyEnforcer::new(TenantPolicy::new("t1").with_provider_policy(provider_policy));

        assert!(enforcer.validate_request("ollama", "llama3", 100, None).is_ok());
        assert!(enforcer.validate_request("ollama", "llama3", 100, None).is_ok());
        let err = enforcer
            .validate_request("ollama", "llama3", 100, None)
            .unwrap_err();
        assert!(matches!(err, PolicyError::RateLimitExceeded { .. }));
        assert!(err.to_string().contains("RPM"));
    }

    #[test]
    fn test_tpm_limit() {
        let mut provider_policy = ProviderPolicy::new("ollama");
        provider_policy.rate_limit_tpm = 100;
        let enforcer =
            PolicyEnforcer::new(TenantPolicy::new("t1").with_provider_policy(provider_policy));

        assert!(enforcer.validate_request("ollama", "llama3", 60, None).is_ok());
        // 60 + 60 would exceed 100 TPM.
        let err = enforcer
            .validate_request("ollama", "llama3", 60, None)
            .unwrap_err();
        assert!(err.to_string().contains("TPM"));
    }

    #[test]
    fn test_rate_windows_isolated_per_provider() {
        let mut provider_policy = ProviderPolicy::new("ollama");
        provider_policy.rate_limit_rpm = 1;
        let enforcer =
            PolicyEnforcer::new(TenantPolicy::new("t1").with_provider_policy(provider_policy));

        assert!(enforcer.validate_request("ollama", "llama3", 10, None).is_ok());
        assert!(enforcer
            .validate_request("ollama", "llama3", 10, None)
            .is_err());
        // A different provider has its own window.
        assert!(enforcer
            .validate_request("anthropic", "mystery-model", 10, None)
            .is_ok());
    }

    #[test]
    fn test_reason_required() {
        let mut provider_policy = ProviderPolicy::new("openai");
        provider_policy.require_reason = true;
        let enforcer =
            PolicyEnforcer::new(TenantPolicy::new("t1").with_provider_policy(provider_policy));

        let err = enforcer
            .validate_request("openai", "gpt-4o-mini", 100, None)
            .unwrap_err();
        assert!(err.to_string().contains("reason required"));
        assert!(enforcer
            .validate_request("openai", "gpt-4o-mini", 100, Some("support bot"))
            .is_ok());
    }

    #[test]
    fn test_unknown_provider_gets_default_policy() {
        let enforcer = PolicyEnforcer::new(TenantPolicy::new("t1"));
        assert!(enforcer
            .validate_request("bedrock", "mystery-model", 100, None)
            .is_ok());
    }

    #[test]
    fn test_record_then_report_roundtrip() {
        let enforcer = PolicyEnforcer::new(TenantPolicy::new("acme").with_monthly_budget(100.0));
        enforcer.record_usage(
            "openai",
            "gpt-4o",
            1500,
            500,
            0.0045,
            1200.0,
            true,
            Some("support bot".into()),
        );

        let report = enforcer.get_usage_report(30);
        assert_eq!(report.tenant_id, "acme");
        assert_eq!(report.total_requests, 1);
        assert_eq!(report.total_tokens, 2000);
        assert!((report.total_cost_usd - 0.0045).abs() < 1e-9);

        let by_provider = &report.by_provider["openai"];
        assert_eq!(by_provider.requests, 1);
        assert!((by_provider.cost_usd - 0.0045).abs() < 1e-9);
        assert_eq!(by_provider.tokens, 2000);
        assert!((by_provider.avg_latency_ms - 1200.0).abs() < 1e-9);
        assert_eq!(by_provider.success_rate, 100.0);

        let by_model = &report.by_model["gpt-4o"];
        assert_eq!(by_model.requests, 1);
        assert!((by_model.cost_usd - 0.0045).abs() < 1e-9);

        assert!((report.budget_remaining_usd - 99.9955).abs() < 1e-9);
        assert!((report.budget_used_pct - 0.0045).abs() < 1e-9);
    }

    #[test]
    fn test_report_success_rate_per_provider() {
        let enforcer = PolicyEnforcer::new(TenantPolicy::new("t1"));
        enforcer.record_usage("openai", "gpt-4o", 100, 100, 0.001, 100.0, true, None);
        enforcer.record_usage("openai", "gpt-4o", 100, 100, 0.001, 300.0, false, None);
        enforcer.record_usage("ollama", "llama3", 100, 100, 0.0, 50.0, true, None);

        let report = enforcer.get_usage_report(30);
        assert_eq!(report.by_provider["openai"].success_rate, 50.0);
        assert_eq!(report.by_provider["ollama"].success_rate, 100.0);
        assert!((report.by_provider["openai"].avg_latency_ms - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_tracking_disabled_is_noop() {
        let enforcer = PolicyEnforcer::new(TenantPolicy::new("t1").with_track_usage(false));
        enforcer.record_usage("openai", "gpt-4o", 100, 100, 0.5, 100.0, true, None);

        assert_eq!(enforcer.monthly_spend(), 0.0);
        assert!(enforcer.usage_records().is_empty());
        assert_eq!(enforcer.get_usage_report(30).total_requests, 0);
    }

    #[test]
    fn test_reset_monthly_budget() {
        let enforcer = PolicyEnforcer::new(TenantPolicy::new("t1").with_monthly_budget(1.0));
        enforcer.record_usage("openai", "gpt-4o", 100, 100, 0.9, 100.0, true, None);
        assert!((enforcer.monthly_spend() - 0.9).abs() < 1e-9);

        enforcer.reset_monthly_budget();
        assert_eq!(enforcer.monthly_spend(), 0.0);
        // Records survive a budget reset; only the counter resets.
        assert_eq!(enforcer.usage_records().len(), 1);
    }

    #[test]
    fn test_spend_is_monotonic_until_reset() {
        let enforcer = PolicyEnforcer::new(TenantPolicy::new("t1"));
        enforcer.record_usage("openai", "gpt-4o", 100, 100, 0.1, 100.0, true, None);
        enforcer.record_usage("openai", "gpt-4o", 100, 100, 0.2, 100.0, false, None);
        assert!((enforcer.monthly_spend() - 0.3).abs() < 1e-9);
        assert!((enforcer.daily_spend() - 0.3).abs() < 1e-9);
    }
}
