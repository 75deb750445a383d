//! Endpoint services.
//!
//! Each endpoint is a tier configuration: one or more remote tiers backed
//! by a provider, ending in a static fallback from
//! [`lumiere_core::fallbacks`]. Providers that are not configured make
//! their tier `Unavailable`, so an empty configuration serves fallbacks
//! everywhere.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use lumiere_core::fallbacks::{
    curated_regimen, knowledge_base_insight, ANALYSIS_FALLBACK_SOURCE, CURATED_REGIMEN_SOURCE,
    FALLBACK_SCORES, KNOWLEDGE_BASE_SOURCE, LOCAL_ARCHIVE_SOURCE, REPORT_FALLBACK_SOURCE,
    VOICE_DEMO_SOURCE,
};
use lumiere_core::report::{docgen_payload, minimal_pdf, scan_id};
use lumiere_core::{AnalysisScores, Product, ResearchInsight, ScanRecord, ShapeError, VoiceAgentConfig};

use crate::archive::{ScanArchive, DEFAULT_ARCHIVE_CAPACITY};
use crate::cache::InsightCache;
use crate::config::RuntimeConfig;
use crate::providers::{
    image_payload, research_query, ContentStore, DeepgramKeys, DocumentGenerator, FoxitDocGen,
    HttpImageFetcher, ImageFetcher, PerfectCorpVision, ProviderError, SanityStore, SearchProvider,
    SpeechKeyIssuer, VisionProvider, YouSearch,
};
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, RemoteTier, Resolution, Resolver, StaticTier, TierError,
    DEFAULT_TIER_TIMEOUT,
};

pub const VISION_TIER: &str = "perfect_corp_vision";
pub const INSIGHT_CACHE_TIER: &str = "insight_cache";
pub const SEARCH_TIER: &str = "you_search";
pub const PRODUCTS_TIER: &str = "sanity_products";
pub const DOCGEN_TIER: &str = "foxit_docgen";
pub const TEMPORARY_KEY_TIER: &str = "deepgram_temporary_key";
pub const MASTER_KEY_TIER: &str = "deepgram_master_key";
pub const SCAN_WRITE_TIER: &str = "sanity_scan_write";
pub const SCAN_HISTORY_TIER: &str = "sanity_scan_history";

/// Scan records returned by history lookups.
pub const RECENT_SCANS: usize = 5;

pub const MASTER_KEY_WARNING: &str = "Using master key (Project ID missing)";
pub const DEMO_VOICE_WARNING: &str = "Voice agent credentials unavailable, running in demo mode";

/// Credentials and manifest for one voice session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSessionGrant {
    pub api_key: String,
    pub config: VoiceAgentConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// The clinic's integration endpoints.
pub struct ClinicService {
    vision: Option<Arc<dyn VisionProvider>>,
    search: Option<Arc<dyn SearchProvider>>,
    store: Option<Arc<dyn ContentStore>>,
    docgen: Option<Arc<dyn DocumentGenerator>>,
    speech: Option<Arc<dyn SpeechKeyIssuer>>,
    images: Arc<dyn ImageFetcher>,
    cache: InsightCache,
    archive: ScanArchive,
    breaker: Arc<CircuitBreaker>,
    timeout: Duration,
    voice: VoiceAgentConfig,
    strict_mode: bool,
}

impl std::fmt::Debug for ClinicService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClinicService")
            .field("vision", &self.vision.as_ref().map(|p| p.name().to_string()))
            .field("search", &self.search.as_ref().map(|p| p.name().to_string()))
            .field("store", &self.store.as_ref().map(|p| p.name().to_string()))
            .field("docgen", &self.docgen.as_ref().map(|p| p.name().to_string()))
            .field("speech", &self.speech.as_ref().map(|p| p.name().to_string()))
            .field("timeout", &self.timeout)
            .field("strict_mode", &self.strict_mode)
            .finish()
    }
}

/// Builder for [`ClinicService`].
pub struct ClinicServiceBuilder {
    vision: Option<Arc<dyn VisionProvider>>,
    search: Option<Arc<dyn SearchProvider>>,
    store: Option<Arc<dyn ContentStore>>,
    docgen: Option<Arc<dyn DocumentGenerator>>,
    speech: Option<Arc<dyn SpeechKeyIssuer>>,
    images: Arc<dyn ImageFetcher>,
    cache: InsightCache,
    archive_capacity: usize,
    breaker: CircuitBreakerConfig,
    timeout: Duration,
    voice: VoiceAgentConfig,
    strict_mode: bool,
}

impl Default for ClinicServiceBuilder {
    fn default() -> Self {
        Self {
            vision: None,
            search: None,
            store: None,
            docgen: None,
            speech: None,
            images: Arc::new(HttpImageFetcher::default()),
            cache: InsightCache::default(),
            archive_capacity: DEFAULT_ARCHIVE_CAPACITY,
            breaker: CircuitBreakerConfig::default(),
            timeout: DEFAULT_TIER_TIMEOUT,
            voice: VoiceAgentConfig::default(),
            strict_mode: false,
        }
    }
}

impl ClinicServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vision(mut self, provider: Arc<dyn VisionProvider>) -> Self {
        self.vision = Some(provider);
        self
    }

    pub fn search(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(provider);
        self
    }

    pub fn content_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn document_generator(mut self, generator: Arc<dyn DocumentGenerator>) -> Self {
        self.docgen = Some(generator);
        self
    }

    pub fn speech(mut self, issuer: Arc<dyn SpeechKeyIssuer>) -> Self {
        self.speech = Some(issuer);
        self
    }

    pub fn image_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.images = fetcher;
        self
    }

    pub fn cache(mut self, cache: InsightCache) -> Self {
        self.cache = cache;
        self
    }

    /// Bound on locally archived scans.
    pub fn archive_capacity(mut self, capacity: usize) -> Self {
        self.archive_capacity = capacity;
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = config;
        self
    }

    /// Timeout for each remote tier.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn voice_agent(mut self, config: VoiceAgentConfig) -> Self {
        self.voice = config;
        self
    }

    pub fn strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn build(self) -> ClinicService {
        ClinicService {
            vision: self.vision,
            search: self.search,
            store: self.store,
            docgen: self.docgen,
            speech: self.speech,
            images: self.images,
            cache: self.cache,
            archive: ScanArchive::new(self.archive_capacity),
            breaker: Arc::new(CircuitBreaker::new(self.breaker)),
            timeout: self.timeout,
            voice: self.voice,
            strict_mode: self.strict_mode,
        }
    }
}

/// Keep a configured provider, log a missing one.
fn configured<P>(kind: &str, provider: Result<P, ProviderError>) -> Option<P> {
    match provider {
        Ok(provider) => {
            tracing::info!(provider = kind, "Provider configured");
            Some(provider)
        }
        Err(e) => {
            tracing::info!(provider = kind, reason = %e, "Provider not configured, fallbacks will serve");
            None
        }
    }
}

impl ClinicService {
    pub fn builder() -> ClinicServiceBuilder {
        ClinicServiceBuilder::new()
    }

    /// Build real providers for every integration with credentials in
    /// `config` or the environment.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let timeout = config.timeouts.remote;
        let providers = &config.providers;
        let mut builder = ClinicServiceBuilder::new()
            .image_fetcher(Arc::new(
                HttpImageFetcher::new(timeout).with_max_bytes(config.images.max_bytes),
            ))
            .cache(InsightCache::new(config.cache.max_entries, config.cache.ttl))
            .archive_capacity(config.archive.max_records)
            .circuit_breaker(config.circuit_breaker.clone())
            .timeout(timeout)
            .voice_agent(VoiceAgentConfig::with_model(config.voice.model.clone()))
            .strict_mode(config.strict_mode);

        if let Some(p) = configured("vision", PerfectCorpVision::from_config(&providers.vision)) {
            builder = builder.vision(Arc::new(p.with_timeout(timeout)));
        }
        if let Some(p) = configured("search", YouSearch::from_config(&providers.search)) {
            builder = builder.search(Arc::new(p.with_timeout(timeout)));
        }
        if let Some(p) = configured("content_store", SanityStore::from_config(&providers.content_store)) {
            builder = builder.content_store(Arc::new(p.with_timeout(timeout)));
        }
        if let Some(p) = configured(
            "document_generator",
            FoxitDocGen::from_config(&providers.document_generator),
        ) {
            builder = builder.document_generator(Arc::new(p.with_timeout(timeout)));
        }
        if let Some(p) = configured("speech", DeepgramKeys::from_config(&providers.speech)) {
            builder = builder.speech(Arc::new(p.with_timeout(timeout)));
        }

        builder.build()
    }

    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    pub fn voice_agent(&self) -> &VoiceAgentConfig {
        &self.voice
    }

    pub fn archive(&self) -> &ScanArchive {
        &self.archive
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn resolver<'a, T>(&self, remotes: Vec<RemoteTier<'a, T>>, fallback: StaticTier<T>) -> Resolver<'a, T> {
        Resolver::new(remotes, fallback)
            .with_timeout(self.timeout)
            .with_circuit_breaker(self.breaker.clone())
    }

    /// Skin analysis scores for an image (data URI, bare base64 or URL).
    pub async fn analyze(&self, image: &str) -> Resolution<AnalysisScores> {
        self.resolver(
            vec![RemoteTier::new(VISION_TIER, self.vision_tier(image))],
            StaticTier::new(ANALYSIS_FALLBACK_SOURCE, FALLBACK_SCORES),
        )
        .resolve()
        .await
    }

    async fn vision_tier(&self, image: &str) -> Result<AnalysisScores, TierError> {
        let vision = self
            .vision
            .as_ref()
            .ok_or_else(|| TierError::unavailable("vision provider not configured"))?;
        let data = image_payload(image, self.images.as_ref())
            .await
            .ok_or_else(|| TierError::unavailable("no usable image data"))?;
        Ok(vision.analyze(&data).await?)
    }

    /// Research insight for a skin concern.
    pub async fn research_insight(&self, concern: &str) -> Resolution<ResearchInsight> {
        self.resolver(
            vec![
                RemoteTier::new(INSIGHT_CACHE_TIER, self.cached_insight(concern)),
                RemoteTier::new(SEARCH_TIER, self.search_tier(concern)),
            ],
            StaticTier::new(KNOWLEDGE_BASE_SOURCE, knowledge_base_insight(concern)),
        )
        .resolve()
        .await
    }

    async fn cached_insight(&self, concern: &str) -> Result<ResearchInsight, TierError> {
        self.cache
            .get(concern)
            .await
            .ok_or_else(|| TierError::unavailable("cache miss"))
    }

    async fn search_tier(&self, concern: &str) -> Result<ResearchInsight, TierError> {
        let search = self
            .search
            .as_ref()
            .ok_or_else(|| TierError::unavailable("search provider not configured"))?;
        let insight = search.search(&research_query(concern)).await?;
        self.cache.insert(concern, insight.clone()).await;
        Ok(insight)
    }

    /// Up to five products for a category.
    pub async fn products_by_issue(&self, target_issue: &str) -> Resolution<Vec<Product>> {
        self.resolver(
            vec![RemoteTier::new(PRODUCTS_TIER, self.products_tier(target_issue))],
            StaticTier::new(CURATED_REGIMEN_SOURCE, curated_regimen()),
        )
        .resolve()
        .await
    }

    async fn products_tier(&self, target_issue: &str) -> Result<Vec<Product>, TierError> {
        let store = self.store()?;
        let products = store.products_by_issue(target_issue).await?;
        if products.is_empty() {
            return Err(ShapeError::Empty("result").into());
        }
        Ok(products)
    }

    /// Clinical report PDF for scores and recommended products.
    pub async fn clinical_report(&self, scores: &AnalysisScores, products: &[Product]) -> Resolution<Vec<u8>> {
        let now = Utc::now();
        let date = now.date_naive();
        let scan = scan_id(now.timestamp_millis().unsigned_abs());

        self.resolver(
            vec![RemoteTier::new(DOCGEN_TIER, self.docgen_tier(scores, products, scan, date))],
            StaticTier::new(REPORT_FALLBACK_SOURCE, minimal_pdf(scores, products, date)),
        )
        .resolve()
        .await
    }

    async fn docgen_tier(
        &self,
        scores: &AnalysisScores,
        products: &[Product],
        scan: String,
        date: chrono::NaiveDate,
    ) -> Result<Vec<u8>, TierError> {
        let docgen = self
            .docgen
            .as_ref()
            .ok_or_else(|| TierError::unavailable("document generator not configured"))?;
        let payload = docgen_payload(scores, products, &scan, date);
        Ok(docgen.generate(&payload).await?)
    }

    /// Credentials and manifest for a voice session.
    pub async fn voice_session_config(&self) -> Resolution<VoiceSessionGrant> {
        let demo = VoiceSessionGrant {
            api_key: String::new(),
            config: self.voice.clone(),
            warning: Some(DEMO_VOICE_WARNING.to_string()),
        };

        self.resolver(
            vec![
                RemoteTier::new(TEMPORARY_KEY_TIER, self.temporary_key_tier()),
                RemoteTier::new(MASTER_KEY_TIER, self.master_key_tier()),
            ],
            StaticTier::new(VOICE_DEMO_SOURCE, demo),
        )
        .resolve()
        .await
    }

    fn speech(&self) -> Result<&Arc<dyn SpeechKeyIssuer>, TierError> {
        self.speech
            .as_ref()
            .ok_or_else(|| TierError::unavailable("speech provider not configured"))
    }

    async fn temporary_key_tier(&self) -> Result<VoiceSessionGrant, TierError> {
        let key = self.speech()?.temporary_key().await?;
        Ok(VoiceSessionGrant {
            api_key: key,
            config: self.voice.clone(),
            warning: None,
        })
    }

    async fn master_key_tier(&self) -> Result<VoiceSessionGrant, TierError> {
        let master = self.speech()?.master_key();
        if master.is_empty() {
            return Err(TierError::unavailable("master key empty"));
        }
        Ok(VoiceSessionGrant {
            api_key: master.expose().to_string(),
            config: self.voice.clone(),
            warning: Some(MASTER_KEY_WARNING.to_string()),
        })
    }

    fn store(&self) -> Result<&Arc<dyn ContentStore>, TierError> {
        self.store
            .as_ref()
            .ok_or_else(|| TierError::unavailable("content store not configured"))
    }

    /// Record a scan. The local archive always keeps a copy.
    pub async fn record_scan(&self, record: ScanRecord) -> Resolution<()> {
        self.archive.append(record.clone());

        self.resolver(
            vec![RemoteTier::new(SCAN_WRITE_TIER, self.scan_write_tier(&record))],
            StaticTier::new(LOCAL_ARCHIVE_SOURCE, ()),
        )
        .resolve()
        .await
    }

    async fn scan_write_tier(&self, record: &ScanRecord) -> Result<(), TierError> {
        Ok(self.store()?.append_scan(record).await?)
    }

    /// The most recent scans, newest first.
    pub async fn recent_scans(&self) -> Resolution<Vec<ScanRecord>> {
        self.resolver(
            vec![RemoteTier::new(SCAN_HISTORY_TIER, self.scan_history_tier())],
            StaticTier::new(LOCAL_ARCHIVE_SOURCE, self.archive.recent(RECENT_SCANS)),
        )
        .resolve()
        .await
    }

    async fn scan_history_tier(&self) -> Result<Vec<ScanRecord>, TierError> {
        Ok(self.store()?.recent_scans(RECENT_SCANS).await?)
    }
}
