//! Circuit breaker for remote tiers.
//!
//! When a remote tier fails repeatedly its circuit opens, and the resolver
//! skips it without I/O until the recovery timeout has passed.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Circuit breaker configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures before opening circuit
    pub failure_threshold: u32,

    /// Time before attempting recovery
    #[serde(with = "crate::config::duration_human")]
    pub recovery_timeout: Duration,

    /// Successes needed to close circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of a circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Calls are rejected without I/O
    Open { opened_at: Instant },

    /// Trial calls allowed
    HalfOpen { successes: u32 },
}

/// Per-tier circuit breaker. Each tier name has its own circuit.
pub struct CircuitBreaker {
    states: RwLock<HashMap<String, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("circuits", &self.states.read().len())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Whether calls to `tier` should be skipped.
    pub fn is_open(&self, tier: &str) -> bool {
        let states = self.states.read();
        match states.get(tier) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    drop(states);
                    self.transition_to_half_open(tier);
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    pub fn record_success(&self, tier: &str) {
        let mut states = self.states.write();
        match states.get(tier).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(tier.to_string(), CircuitState::Closed { failures: 0 });
                    tracing::info!(tier = %tier, "Circuit closed after successful recovery");
                } else {
                    states.insert(
                        tier.to_string(),
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { failures }) if failures > 0 => {
                states.insert(tier.to_string(), CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    pub fn record_failure(&self, tier: &str) {
        let mut states = self.states.write();
        let failures = match states.get(tier).cloned() {
            None => 1,
            Some(CircuitState::Closed { failures }) => failures + 1,
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(
                    tier.to_string(),
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(tier = %tier, "Circuit reopened after failed recovery attempt");
                return;
            }
            Some(CircuitState::Open { .. }) => return,
        };

        if failures >= self.config.failure_threshold {
            states.insert(
                tier.to_string(),
                CircuitState::Open {
                    opened_at: Instant::now(),
                },
            );
            tracing::warn!(tier = %tier, failures, "Circuit opened after repeated failures");
        } else {
            states.insert(tier.to_string(), CircuitState::Closed { failures });
        }
    }

    fn transition_to_half_open(&self, tier: &str) {
        let mut states = self.states.write();
        if matches!(states.get(tier), Some(CircuitState::Open { .. })) {
            states.insert(tier.to_string(), CircuitState::HalfOpen { successes: 0 });
            tracing::info!(tier = %tier, "Circuit half-open, allowing a trial call");
        }
    }

    pub fn state(&self, tier: &str) -> CircuitState {
        self.states
            .read()
            .get(tier)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    /// Close every circuit.
    pub fn reset(&self) {
        self.states.write().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
