//! Provider adapter abstraction.
//!
//! Each adapter wraps one model provider behind an object-safe trait, owning
//! its own circuit-breaker state and rolling success/failure counters. The
//! wire-level call to the provider (HTTP, SDK, local runtime) lives entirely
//! inside the concrete implementation; this crate only decides whether an
//! adapter should be tried, in what order, and whether it is allowed.

pub mod health;
pub mod response;

pub use health::{AdapterHealth, AdapterHealthConfig, HealthSnapshot};
pub use response::{AdapterResponse, ResponseStatus};

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reliability class of an adapter. Lower rank = more reliable; a hosted API
/// beats a local runtime, which beats CLI or GUI automation wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterTier {
    Api = 1,
    Local = 2,
    Cli = 3,
    Gui = 4,
}

impl AdapterTier {
    pub fn rank(self) -> u8 {
        self as u8
    }
}

/// Capability contract every provider integration implements to participate
/// in a fallback chain.
///
/// Failure semantics: ordinary provider failures (timeouts, rate limits, auth
/// errors from the upstream) are returned as [`AdapterResponse`] values with a
/// non-success status. `Err` is reserved for programming or environment errors
/// (missing dependency, misconfiguration); the chain captures those as failed
/// attempts rather than propagating them mid-sequence.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Adapter identity, unique within a chain.
    fn name(&self) -> &str;

    /// Reliability class of this integration.
    fn tier(&self) -> AdapterTier;

    /// Static reliability score in `[0.0, 1.0]`.
    fn reliability_score(&self) -> f64 {
        1.0
    }

    /// Circuit-breaker state and rolling counters owned by this adapter.
    /// Implementations record their own outcomes here via
    /// `record_success` / `record_failure`.
    fn health(&self) -> &AdapterHealth;

    /// Execute one request against the provider.
    async fn execute(&self, prompt: &str, context: Option<&Value>) -> Result<AdapterResponse>;

    /// Estimate the cost of a prospective request in USD.
    fn estimate_cost(&self, prompt: &str, context: Option<&Value>) -> f64;

    /// Cheap availability probe (dependency present, endpoint configured).
    /// The chain skips unavailable adapters without charging their failure
    /// metrics.
    async fn check_availability(&self) -> bool;

    /// Structured status for diagnostics and monitoring.
    fn get_metadata(&self) -> Value {
        serde_json::json!({
            "name": self.name(),
            "tier": self.tier(),
            "reliability_score": self.reliability_score(),
            "health": self.health().snapshot(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubAdapter {
        health: AdapterHealth,
    }

    #[async_trait]
    impl ProviderAdapter for StubAdapter {
        fn name(&self) -> &str {
            "stub"
        }

        fn tier(&self) -> AdapterTier {
            AdapterTier::Api
        }

        fn health(&self) -> &AdapterHealth {
            &self.health
        }

        async fn execute(&self, _prompt: &str, _context: Option<&Value>) -> Result<AdapterResponse> {
            Ok(AdapterResponse::success("ok").with_adapter(self.name()))
        }

        fn estimate_cost(&self, _prompt: &str, _context: Option<&Value>) -> f64 {
            0.01
        }

        async fn check_availability(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_tier_ordering() {
        assert!(AdapterTier::Api < AdapterTier::Local);
        assert!(AdapterTier::Local < AdapterTier::Cli);
        assert!(AdapterTier::Cli < AdapterTier::Gui);
        assert_eq!(AdapterTier::Api.rank(), 1);
        assert_eq!(AdapterTier::Gui.rank(), 4);
    }

    #[tokio::test]
    async fn test_default_metadata_shape() {
        let adapter = StubAdapter {
            health: AdapterHealth::default(),
        };
        let meta = adapter.get_metadata();
        assert_eq!(meta["name"], "stub");
        assert_eq!(meta["tier"], "api");
        assert_eq!(meta["health"]["enabled"], true);
        assert_eq!(meta["health"]["circuit_open"], false);
    }
}
