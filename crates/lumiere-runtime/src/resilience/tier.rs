//! Tiers of a fallback chain.

use futures::future::BoxFuture;
use std::time::Duration;
use thiserror::Error;

use lumiere_core::ShapeError;

use crate::providers::ProviderError;

/// Why a remote tier was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TierError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Shape(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("circuit open")]
    CircuitOpen,
}

impl TierError {
    /// Whether this rejection counts against the tier's circuit.
    ///
    /// Missing credentials and open circuits say nothing about the
    /// remote's health.
    pub fn is_failure(&self) -> bool {
        !matches!(self, TierError::Unavailable(_) | TierError::CircuitOpen)
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        TierError::Unavailable(reason.into())
    }
}

impl From<ProviderError> for TierError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Timeout(after) => TierError::Timeout(after),
            ProviderError::NotConfigured(reason) => TierError::Unavailable(reason),
            ProviderError::Parse(message) => TierError::Shape(message),
            ProviderError::Shape(shape) => TierError::Shape(shape.to_string()),
            other @ (ProviderError::Http(_)
            | ProviderError::RateLimited { .. }
            | ProviderError::Api { .. }
            | ProviderError::TooLarge { .. }) => TierError::Transport(other.to_string()),
        }
    }
}

impl From<ShapeError> for TierError {
    fn from(error: ShapeError) -> Self {
        TierError::Shape(error.to_string())
    }
}

/// Deferred remote call. Nothing runs until the resolver polls it.
pub type TierFuture<'a, T> = BoxFuture<'a, Result<T, TierError>>;

/// A remote tier: a named call with an optional timeout override.
pub struct RemoteTier<'a, T> {
    pub(crate) name: String,
    pub(crate) timeout: Option<Duration>,
    pub(crate) call: TierFuture<'a, T>,
}

impl<'a, T> RemoteTier<'a, T> {
    pub fn new<F>(name: impl Into<String>, call: F) -> Self
    where
        F: std::future::Future<Output = Result<T, TierError>> + Send + 'a,
    {
        Self {
            name: name.into(),
            timeout: None,
            call: Box::pin(call),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The terminal tier: a value that is always available.
pub struct StaticTier<T> {
    pub(crate) name: String,
    pub(crate) value: T,
}

impl<T> StaticTier<T> {
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One alternative in a fallback chain.
pub enum Tier<'a, T> {
    Remote(RemoteTier<'a, T>),
    Static(StaticTier<T>),
}

impl<'a, T> Tier<'a, T> {
    /// A remote tier bounded by the resolver's default timeout.
    pub fn remote<F>(name: impl Into<String>, call: F) -> Self
    where
        F: std::future::Future<Output = Result<T, TierError>> + Send + 'a,
    {
        Tier::Remote(RemoteTier::new(name, call))
    }

    /// A static fallback value. `name` becomes the public source tag.
    pub fn fallback(name: impl Into<String>, value: T) -> Self {
        Tier::Static(StaticTier::new(name, value))
    }

    /// Override the timeout of a remote tier. No effect on static tiers.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match self {
            Tier::Remote(remote) => Tier::Remote(remote.with_timeout(timeout)),
            other => other,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Tier::Remote(remote) => &remote.name,
            Tier::Static(fallback) => &fallback.name,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Tier::Static(_))
    }
}

impl<T> std::fmt::Debug for Tier<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Remote(remote) => f
                .debug_struct("Remote")
                .field("name", &remote.name)
                .field("timeout", &remote.timeout)
                .finish(),
            Tier::Static(fallback) => f.debug_struct("Static").field("name", &fallback.name).finish(),
        }
    }
}
