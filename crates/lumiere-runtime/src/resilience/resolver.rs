//! Resilient remote call resolution.
//!
//! A [`Resolver`] walks an ordered chain of tiers: remote calls first, a
//! static value last. Each remote tier runs under a timeout; any rejection
//! moves on to the next tier and the first success is returned at once.
//! Tiers are never raced.
//!
//! The builder refuses chains that do not end in a static tier, so
//! [`Resolver::resolve`] cannot fail:
//!
//! ```rust,ignore
//! let resolution = FallbackChain::new()
//!     .remote("perfect_corp_vision", async { Ok(vision.analyze(&data).await?) })
//!     .fallback(ANALYSIS_FALLBACK_SOURCE, FALLBACK_SCORES)
//!     .build()?
//!     .resolve()
//!     .await;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::circuit_breaker::CircuitBreaker;
use super::tier::{RemoteTier, StaticTier, Tier, TierError};

/// Remote tier timeout when neither the tier nor the resolver sets one.
pub const DEFAULT_TIER_TIMEOUT: Duration = Duration::from_secs(8);

/// A chain that cannot guarantee a result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("fallback chain has no tiers")]
    Empty,

    #[error("fallback chain must end in a static tier, last tier is remote `{last}`")]
    MissingStaticFallback { last: String },

    #[error("tier `{unreachable}` follows static tier `{fallback}` and can never run")]
    UnreachableTier { fallback: String, unreachable: String },
}

/// A fallback-sourced result while strict mode is on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("all remote tiers rejected, refusing fallback `{source_tag}`")]
pub struct StrictModeError {
    pub source_tag: String,
    pub rejections: Vec<String>,
}

/// Which tier produced a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTag {
    Remote(String),
    Fallback(String),
}

impl SourceTag {
    pub fn name(&self) -> &str {
        match self {
            SourceTag::Remote(name) | SourceTag::Fallback(name) => name,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SourceTag::Fallback(_))
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceTag::Remote(name) => write!(f, "remote:{}", name),
            SourceTag::Fallback(name) => write!(f, "fallback:{}", name),
        }
    }
}

/// Outcome of one tier.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub tier: String,
    pub elapsed: Duration,
    /// `None` when the tier satisfied the request
    pub rejection: Option<TierError>,
}

impl Attempt {
    pub fn succeeded(&self) -> bool {
        self.rejection.is_none()
    }
}

/// A resolved value tagged with the tier that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<T> {
    pub value: T,
    pub source: SourceTag,
    pub attempts: Vec<Attempt>,
}

impl<T> Resolution<T> {
    pub fn is_fallback(&self) -> bool {
        self.source.is_fallback()
    }

    /// Public source tag for responses. Remote results carry none.
    pub fn source_label(&self) -> Option<&str> {
        match &self.source {
            SourceTag::Fallback(name) => Some(name),
            SourceTag::Remote(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolution<U> {
        Resolution {
            value: f(self.value),
            source: self.source,
            attempts: self.attempts,
        }
    }

    /// Refuse fallback-sourced values.
    pub fn into_strict(self) -> Result<T, StrictModeError> {
        match self.source {
            SourceTag::Remote(_) => Ok(self.value),
            SourceTag::Fallback(name) => Err(StrictModeError {
                source_tag: name,
                rejections: self
                    .attempts
                    .iter()
                    .filter_map(|a| a.rejection.as_ref().map(|r| format!("{}: {}", a.tier, r)))
                    .collect(),
            }),
        }
    }
}

/// Builder for a fallback chain.
pub struct FallbackChain<'a, T> {
    tiers: Vec<Tier<'a, T>>,
}

impl<'a, T> Default for FallbackChain<'a, T> {
    fn default() -> Self {
        Self { tiers: Vec::new() }
    }
}

impl<'a, T> FallbackChain<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, tier: Tier<'a, T>) -> Self {
        self.tiers.push(tier);
        self
    }

    pub fn remote<F>(self, name: impl Into<String>, call: F) -> Self
    where
        F: std::future::Future<Output = Result<T, TierError>> + Send + 'a,
    {
        self.add(Tier::remote(name, call))
    }

    pub fn fallback(self, name: impl Into<String>, value: T) -> Self {
        self.add(Tier::fallback(name, value))
    }

    pub fn tiers(&self) -> &[Tier<'a, T>] {
        &self.tiers
    }

    /// Validate the chain. The last tier must be static and no tier may
    /// follow a static one.
    pub fn build(mut self) -> Result<Resolver<'a, T>, ChainError> {
        let terminal = match self.tiers.pop() {
            None => return Err(ChainError::Empty),
            Some(Tier::Remote(remote)) => {
                return Err(ChainError::MissingStaticFallback { last: remote.name })
            }
            Some(Tier::Static(terminal)) => terminal,
        };

        let mut remotes = Vec::with_capacity(self.tiers.len());
        let mut tiers = self.tiers.into_iter().peekable();
        while let Some(tier) = tiers.next() {
            match tier {
                Tier::Remote(remote) => remotes.push(remote),
                Tier::Static(fallback) => {
                    let unreachable = tiers
                        .peek()
                        .map(|t| t.name().to_string())
                        .unwrap_or_else(|| terminal.name.clone());
                    return Err(ChainError::UnreachableTier {
                        fallback: fallback.name,
                        unreachable,
                    });
                }
            }
        }

        Ok(Resolver::new(remotes, terminal))
    }
}

/// A validated chain, ready to resolve.
pub struct Resolver<'a, T> {
    remotes: Vec<RemoteTier<'a, T>>,
    terminal: StaticTier<T>,
    default_timeout: Duration,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl<'a, T> Resolver<'a, T> {
    /// A resolver over `remotes` in order, ending in `terminal`.
    ///
    /// The static terminal tier is required by the signature, so this needs
    /// no validation. Use [`FallbackChain`] to assemble tiers dynamically.
    pub fn new(remotes: Vec<RemoteTier<'a, T>>, terminal: StaticTier<T>) -> Self {
        Self {
            remotes,
            terminal,
            default_timeout: DEFAULT_TIER_TIMEOUT,
            breaker: None,
        }
    }

    /// Timeout for remote tiers that do not set their own.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Skip remote tiers whose circuit is open, and record their outcomes.
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Run the chain. Always returns a value.
    pub async fn resolve(self) -> Resolution<T> {
        let Resolver {
            remotes,
            terminal,
            default_timeout,
            breaker,
        } = self;
        let mut attempts = Vec::with_capacity(remotes.len() + 1);

        for remote in remotes {
            let started = Instant::now();
            let name = remote.name;
            let timeout = remote.timeout.unwrap_or(default_timeout);

            let outcome = if breaker.as_ref().is_some_and(|b| b.is_open(&name)) {
                Err(TierError::CircuitOpen)
            } else {
                let outcome = match tokio::time::timeout(timeout, remote.call).await {
                    Ok(result) => result,
                    Err(_) => Err(TierError::Timeout(timeout)),
                };
                if let Some(breaker) = &breaker {
                    match &outcome {
                        Ok(_) => breaker.record_success(&name),
                        Err(e) if e.is_failure() => breaker.record_failure(&name),
                        Err(_) => {}
                    }
                }
                outcome
            };
            let elapsed = started.elapsed();

            match outcome {
                Ok(value) => {
                    tracing::debug!(tier = %name, elapsed_ms = elapsed.as_millis() as u64, "Tier satisfied request");
                    attempts.push(Attempt {
                        tier: name.clone(),
                        elapsed,
                        rejection: None,
                    });
                    return Resolution {
                        value,
                        source: SourceTag::Remote(name),
                        attempts,
                    };
                }
                Err(rejection) => {
                    if rejection.is_failure() {
                        tracing::warn!(
                            tier = %name,
                            elapsed_ms = elapsed.as_millis() as u64,
                            error = %rejection,
                            "Tier rejected, moving to next tier"
                        );
                    } else {
                        tracing::debug!(tier = %name, reason = %rejection, "Tier skipped");
                    }
                    attempts.push(Attempt {
                        tier: name,
                        elapsed,
                        rejection: Some(rejection),
                    });
                }
            }
        }

        tracing::info!(source = %terminal.name, "Serving static fallback");
        attempts.push(Attempt {
            tier: terminal.name.clone(),
            elapsed: Duration::ZERO,
            rejection: None,
        });
        Resolution {
            value: terminal.value,
            source: SourceTag::Fallback(terminal.name),
            attempts,
        }
    }
}

impl<T> fmt::Debug for Resolver<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("remotes", &self.remotes.iter().map(|r| &r.name).collect::<Vec<_>>())
            .field("terminal", &self.terminal.name)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}
