//! Policy rejection taxonomy.
//!
//! Every variant is raised before any provider call is made. The
//! budget-fallback signal is a sibling variant rather than a sub-case of
//! `Violation`: callers must match it separately and retry against a
//! free/local provider instead of treating it as a hard failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which budget window a rejection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetScope {
    Daily,
    Monthly,
}

impl std::fmt::Display for BudgetScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetScope::Daily => write!(f, "daily"),
            BudgetScope::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    /// Generic policy rule violation (model denied, token or cost ceiling,
    /// tier cap, missing justification).
    #[error("policy violation: {message}")]
    Violation { message: String },

    #[error("provider '{provider}' is disabled in policy")]
    ProviderDisabled { provider: String },

    #[error(
        "{scope} budget (${limit:.2}) would be exceeded: current spend ${current_spend:.2}, estimated cost ${estimated_cost:.4}"
    )]
    BudgetExceeded {
        scope: BudgetScope,
        limit: f64,
        current_spend: f64,
        estimated_cost: f64,
    },

    #[error("rate limit exceeded for provider '{provider}': {message}")]
    RateLimitExceeded { provider: String, message: String },

    /// Budget would be exceeded, but the tenant has opted into falling back
    /// to a free/local provider. Non-fatal: retry with a different provider.
    #[error(
        "{scope} budget (${limit:.2}) would be exceeded; fallback to local model recommended (current spend ${current_spend:.2}, estimated cost ${estimated_cost:.4})"
    )]
    FallbackToLocal {
        scope: BudgetScope,
        limit: f64,
        current_spend: f64,
        estimated_cost: f64,
    },
}

impl PolicyError {
    pub fn violation(message: impl Into<String>) -> Self {
        PolicyError::Violation {
            message: message.into(),
        }
    }

    /// True for the non-fatal budget-fallback signal.
    pub fn is_fallback_signal(&self) -> bool {
        matches!(self, PolicyError::FallbackToLocal { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_not_a_hard_violation() {
        let fallback = PolicyError::FallbackToLocal {
            scope: BudgetScope::Daily,
            limit: 10.0,
            current_spend: 9.99,
            estimated_cost: 0.05,
        };
        assert!(fallback.is_fallback_signal());

        let budget = PolicyError::BudgetExceeded {
            scope: BudgetScope::Monthly,
            limit: 100.0,
            current_spend: 99.99,
            estimated_cost: 0.05,
        };
        assert!(!budget.is_fallback_signal());
    }

    #[test]
    fn test_display_carries_figures() {
        let err = PolicyError::BudgetExceeded {
            scope: BudgetScope::Monthly,
            limit: 1.0,
            current_spend: 0.95,
            estimated_cost: 0.066,
        };
        let msg = err.to_string();
        assert!(msg.contains("monthly"));
        assert!(msg.contains("$1.00"));
        assert!(msg.contains("$0.95"));
        assert!(msg.contains("$0.0660"));
    }
}
