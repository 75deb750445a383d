//! External collaborators.
//!
//! One async trait per collaborator, each with a reqwest implementation:
//!
//! | Trait | Implementation |
//! |---|---|
//! | [`VisionProvider`] | [`PerfectCorpVision`] |
//! | [`SearchProvider`] | [`YouSearch`] |
//! | [`ContentStore`] | [`SanityStore`] |
//! | [`DocumentGenerator`] | [`FoxitDocGen`] |
//! | [`SpeechKeyIssuer`] | [`DeepgramKeys`] |
//! | [`ImageFetcher`] | [`HttpImageFetcher`] |
//!
//! Providers only talk to the network and adapt payloads. Deciding what to
//! do when they fail is the resolver's job.
//!
//! ## Security
//!
//! All credentials are held as [`ApiCredential`]; see [`secrets`].

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use lumiere_core::report::DocGenPayload;
use lumiere_core::{AnalysisScores, Product, ResearchInsight, ScanRecord, ShapeError};

mod deepgram;
mod foxit;
pub(crate) mod http;
mod image;
mod perfect_corp;
mod sanity;
pub mod secrets;
mod you_search;

pub use deepgram::DeepgramKeys;
pub use foxit::FoxitDocGen;
pub use image::{image_payload, HttpImageFetcher, DEFAULT_MAX_IMAGE_BYTES};
pub use perfect_corp::PerfectCorpVision;
pub use sanity::SanityStore;
pub use secrets::{ApiCredential, CredentialSource};
pub use you_search::{research_query, YouSearch};

/// Errors from external providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Response larger than {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unexpected response shape: {0}")]
    Shape(#[from] ShapeError),
}

/// Skin analysis from an image.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Analyze base64-encoded image data.
    async fn analyze(&self, image_data: &str) -> Result<AnalysisScores, ProviderError>;

    fn name(&self) -> &str;
}

/// Web search backing research insights.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Top search result for `query`.
    async fn search(&self, query: &str) -> Result<ResearchInsight, ProviderError>;

    fn name(&self) -> &str;
}

/// Product catalog and scan log.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Up to five products tagged with `target_issue`.
    async fn products_by_issue(&self, target_issue: &str) -> Result<Vec<Product>, ProviderError>;

    /// Append a scan record.
    async fn append_scan(&self, record: &ScanRecord) -> Result<(), ProviderError>;

    /// Most recent scan records, newest first.
    async fn recent_scans(&self, limit: usize) -> Result<Vec<ScanRecord>, ProviderError>;

    fn name(&self) -> &str;
}

/// Remote PDF generation from a template payload.
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn generate(&self, payload: &DocGenPayload) -> Result<Vec<u8>, ProviderError>;

    fn name(&self) -> &str;
}

/// Keys for the speech agent.
#[async_trait]
pub trait SpeechKeyIssuer: Send + Sync {
    /// Issue a short-lived project key.
    async fn temporary_key(&self) -> Result<String, ProviderError>;

    /// The long-lived key the issuer authenticates with.
    fn master_key(&self) -> &ApiCredential;

    fn name(&self) -> &str;
}

/// Downloads images referenced by URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ProviderError>;
}
