//! Resilience patterns for lumiere-runtime.
//!
//! This module provides:
//! - Tiered fallback chains that always resolve
//! - Per-tier timeouts
//! - Circuit breaker to skip remotes that keep failing

mod circuit_breaker;
mod resolver;
mod tier;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use resolver::{
    Attempt, ChainError, FallbackChain, Resolution, Resolver, SourceTag, StrictModeError,
    DEFAULT_TIER_TIMEOUT,
};
pub use tier::{RemoteTier, StaticTier, Tier, TierError, TierFuture};
