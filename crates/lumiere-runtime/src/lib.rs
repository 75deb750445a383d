//! # lumiere-runtime
//!
//! Network side of the Lumiere clinic demo.
//!
//! Every integration endpoint resolves through a fallback chain: remote
//! tiers are tried in order under a timeout and the chain ends in a static
//! value from `lumiere_core::fallbacks`, so an endpoint always has an
//! answer. The [`resolution source`](Resolution::source_label) says which
//! tier produced it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lumiere_runtime::{ClinicService, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_yaml_file("lumiere.yaml")?;
//! let service = ClinicService::from_config(&config);
//!
//! let analysis = service.analyze("data:image/jpeg;base64,...").await;
//! println!("{:?} via {:?}", analysis.value, analysis.source_label());
//! ```
//!
//! ## Strict mode
//!
//! Outside a demo, a fallback-sourced answer can be refused with
//! [`Resolution::into_strict`]; the HTTP layer does this when
//! `strict_mode` is set.

pub mod archive;
pub mod cache;
pub mod config;
pub mod providers;
pub mod resilience;
pub mod service;
pub mod voice;

pub use archive::ScanArchive;
pub use cache::InsightCache;
pub use config::{ConfigError, RuntimeConfig};
pub use providers::{ApiCredential, ProviderError};
pub use resilience::{
    Attempt, ChainError, CircuitBreaker, CircuitBreakerConfig, FallbackChain, Resolution, Resolver,
    SourceTag, StrictModeError, Tier, TierError,
};
pub use service::{ClinicService, ClinicServiceBuilder, VoiceSessionGrant};
pub use voice::{
    AudioSource, ChannelAudioSource, ReaderAudioSource, SessionOptions, VoiceController, VoiceError,
    VoiceSession, VoiceState,
};
