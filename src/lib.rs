//! # llm-relay
//!
//! Multi-provider LLM routing core: resilient provider fallback, per-tenant
//! usage policy, and request telemetry.
//!
//! ## Overview
//!
//! Production systems that call several interchangeable model providers need
//! three things this crate provides as a library core, independent of any
//! transport: resilience (a failing provider must not cascade), cost control
//! (runaway spend is stopped before a call is made, not after), and
//! observability (percentile latency and cost queryable per tenant, provider
//! and model).
//!
//! ## Core Philosophy
//!
//! - **Provider-Agnostic**: concrete integrations implement one adapter trait
//! - **Fail-Forward**: per-adapter failures are absorbed and routed around;
//!   only total exhaustion surfaces as an error
//! - **Pre-Call Enforcement**: policy rejections happen before any network
//!   activity, never after money was spent
//! - **Type-Safe**: rejection kinds are enum variants, not string matching
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_relay::chain::FallbackChain;
//! use llm_relay::policy::{PolicyEnforcer, TenantPolicy};
//! use std::sync::Arc;
//!
//! # async fn demo(primary: Arc<dyn llm_relay::adapter::ProviderAdapter>) -> llm_relay::Result<()> {
//! let enforcer = PolicyEnforcer::new(TenantPolicy::new("tenant-123").with_monthly_budget(50.0));
//! enforcer.validate_request("openai", "gpt-4o", 2000, None)?;
//!
//! let chain = FallbackChain::with_adapters("production", vec![primary]);
//! let response = chain.execute("Summarize this document", None).await?;
//! println!("{:?} via {}", response.content, response.adapter_name);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapter`] | Provider adapter contract and per-adapter health/circuit breaker |
//! | [`chain`] | Ordered fallback chain with aggregate metrics |
//! | [`policy`] | Tenant usage policy, budgets, rate limits, pricing |
//! | [`telemetry`] | Request metrics collection and aggregation |
//! | [`error`] | Unified error taxonomy |

pub mod adapter;
pub mod chain;
pub mod error;
pub mod policy;
pub mod telemetry;

// Re-export main types for convenience
pub use adapter::{AdapterHealth, AdapterResponse, AdapterTier, ProviderAdapter, ResponseStatus};
pub use chain::{ChainError, FallbackChain};
pub use error::{Error, ErrorContext};
pub use policy::{PolicyEnforcer, PolicyError, PricingTable, TenantPolicy};
pub use telemetry::{RequestMetrics, TelemetryCollector};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
