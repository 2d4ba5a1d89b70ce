//! Model pricing table and cost estimation.
//!
//! Maps model identifiers to (input, output) USD rates per 1000 tokens and to
//! a coarse cost tier. Unknown models estimate to zero cost, on the assumption
//! they are local.

use super::CostTier;
use std::collections::HashMap;

/// Fixed input/output split assumed for pre-call estimation: 70% of the token
/// budget is input, 30% output. The real split recorded after the call will
/// differ; budget enforcement deliberately keeps this approximation.
pub const DEFAULT_INPUT_RATIO: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct PricingTable {
    /// model -> (input_rate, output_rate), USD per 1000 tokens.
    rates: HashMap<String, (f64, f64)>,
    tiers: HashMap<String, CostTier>,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut table = Self {
            rates: HashMap::new(),
            tiers: HashMap::new(),
        };

        // OpenAI
        table.insert("gpt-4o-mini", 0.00015, 0.0006, CostTier::Low);
        table.insert("gpt-4o", 0.0025, 0.01, CostTier::Medium);
        table.insert("gpt-4-turbo", 0.01, 0.03, CostTier::High);
        table.insert("gpt-4", 0.03, 0.06, CostTier::High);
        table.insert("o1-preview", 0.015, 0.06, CostTier::Premium);
        table.insert("o1-mini", 0.003, 0.012, CostTier::Premium);
        table.insert("gpt-3.5-turbo", 0.0005, 0.0015, CostTier::Low);

        // Anthropic
        table.insert("claude-3-haiku", 0.00025, 0.00125, CostTier::Low);
        table.insert("claude-3-5-haiku", 0.0008, 0.004, CostTier::Low);
        table.insert("claude-3-5-sonnet", 0.003, 0.015, CostTier::Medium);
        table.insert("claude-3-sonnet", 0.003, 0.015, CostTier::Medium);
        table.insert("claude-3-opus", 0.015, 0.075, CostTier::High);
        // Dated release aliases.
        table.insert("claude-sonnet-4-5-20250929", 0.003, 0.015, CostTier::Medium);
        table.insert("claude-opus-4-5-20251101", 0.015, 0.075, CostTier::High);

        // Azure OpenAI
        table.insert("azure-gpt-4o-mini", 0.00015, 0.0006, CostTier::Low);
        table.insert("azure-gpt-4o", 0.0025, 0.01, CostTier::Medium);
        table.insert("azure-gpt-4", 0.03, 0.06, CostTier::High);

        // Local models (free)
        for model in ["llama3.2", "llama3", "mistral", "codellama", "phi3", "gemma"] {
            table.insert(model, 0.0, 0.0, CostTier::Free);
        }

        table
    }
}

impl PricingTable {
    /// Empty table; every model estimates to zero until entries are added.
    pub fn empty() -> Self {
        Self {
            rates: HashMap::new(),
            tiers: HashMap::new(),
        }
    }

    fn insert(&mut self, model: &str, input: f64, output: f64, tier: CostTier) {
        self.rates.insert(model.to_string(), (input, output));
        self.tiers.insert(model.to_string(), tier);
    }

    /// Builder-style entry registration for custom deployments.
    pub fn with_model(
        mut self,
        model: impl Into<String>,
        input_rate: f64,
        output_rate: f64,
        tier: CostTier,
    ) -> Self {
        let model = model.into();
        self.rates.insert(model.clone(), (input_rate, output_rate));
        self.tiers.insert(model, tier);
        self
    }

    /// Per-1k-token (input, output) rates, trying provider-style prefixes
    /// before giving up.
    pub fn rates_for(&self, model: &str) -> Option<(f64, f64)> {
        if let Some(&rates) = self.rates.get(model) {
            return Some(rates);
        }
        for prefix in ["azure-", "claude-", "gpt-"] {
            if let Some(&rates) = self.rates.get(&format!("{prefix}{model}")) {
                return Some(rates);
            }
        }
        None
    }

    /// Cost tier classification, if the model is known.
    pub fn tier_for(&self, model: &str) -> Option<CostTier> {
        if let Some(&tier) = self.tiers.get(model) {
            return Some(tier);
        }
        for prefix in ["azure-", "claude-", "gpt-"] {
            if let Some(&tier) = self.tiers.get(&format!("{prefix}{model}")) {
                return Some(tier);
            }
        }
        None
    }

    /// Exact cost for known token counts. Unknown models are free.
    pub fn cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        match self.rates_for(model) {
            Some((input_rate, output_rate)) => {
                (input_tokens as f64 * input_rate + output_tokens as f64 * output_rate) / 1000.0
            }
            None => 0.0,
        }
    }

    /// Pre-call estimate: split `total_tokens` by `input_ratio` and price each
    /// side. A ratio above 1.0 attributes everything to input.
    pub fn estimate(&self, model: &str, total_tokens: u64, input_ratio: f64) -> f64 {
        let input_tokens = ((total_tokens as f64 * input_ratio) as u64).min(total_tokens);
        let output_tokens = total_tokens - input_tokens;
        self.cost(model, input_tokens, output_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_model_cost() {
        let table = PricingTable::default();
        // gpt-4o: 0.0025 in, 0.01 out per 1k
        let cost = table.cost("gpt-4o", 1000, 1000);
        assert!((cost - 0.0125).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_is_free() {
        let table = PricingTable::default();
        assert_eq!(table.cost("my-local-model", 5000, 5000), 0.0);
        assert_eq!(table.estimate("my-local-model", 10000, DEFAULT_INPUT_RATIO), 0.0);
        assert!(table.tier_for("my-local-model").is_none());
    }

    #[test]
    fn test_prefix_fallback() {
        let table = PricingTable::default();
        // "4o" resolves nothing, but "3-5-sonnet" resolves via "claude-".
        assert_eq!(table.rates_for("3-5-sonnet"), Some((0.003, 0.015)));
        assert_eq!(table.tier_for("3-5-sonnet"), Some(CostTier::Medium));
    }

    #[test]
    fn test_estimate_split() {
        let table = PricingTable::default();
        // 10_000 tokens of gpt-4o at 70/30: 7000 * 0.0025 + 3000 * 0.01 = 47.5 / 1000
        let estimate = table.estimate("gpt-4o", 10_000, DEFAULT_INPUT_RATIO);
        assert!((estimate - 0.0475).abs() < 1e-9);
    }

    #[test]
    fn test_dated_release_aliases_seeded() {
        let table = PricingTable::default();
        assert_eq!(
            table.rates_for("claude-sonnet-4-5-20250929"),
            Some((0.003, 0.015))
        );
        assert_eq!(
            table.tier_for("claude-sonnet-4-5-20250929"),
            Some(CostTier::Medium)
        );
        assert_eq!(
            table.rates_for("claude-opus-4-5-20251101"),
            Some((0.015, 0.075))
        );
        assert_eq!(
            table.tier_for("claude-opus-4-5-20251101"),
            Some(CostTier::High)
        );
    }

    #[test]
    fn test_estimate_with_out_of_range_ratio() {
        let table = PricingTable::empty().with_model("test-model", 1.0, 2.0, CostTier::Medium);
        // Ratios above 1.0 price everything as input instead of panicking.
        let estimate = table.estimate("test-model", 100, 1.5);
        assert!((estimate - 0.1).abs() < 1e-9);
        // Ratio 0 prices everything as output.
        let estimate = table.estimate("test-model", 100, 0.0);
        assert!((estimate - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_local_models_free_tier() {
        let table = PricingTable::default();
        assert_eq!(table.tier_for("llama3"), Some(CostTier::Free));
        assert_eq!(table.cost("llama3", 100_000, 100_000), 0.0);
    }

    #[test]
    fn test_custom_entry() {
        let table = PricingTable::empty().with_model("test-model", 1.0, 1.0, CostTier::Medium);
        // 66 tokens at $1/1k each side = 0.066 regardless of split.
        let estimate = table.estimate("test-model", 66, DEFAULT_INPUT_RATIO);
        assert!((estimate - 0.066).abs() < 1e-9);
    }
}
