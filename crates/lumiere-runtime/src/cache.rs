//! Caching layer for lumiere-runtime.
//!
//! Research insights change slowly, so successful searches are kept in
//! memory and served before the search provider is called again.

use moka::future::Cache;
use std::time::Duration;

use lumiere_core::ResearchInsight;

/// Research insight cache using moka, keyed by normalized concern.
#[derive(Clone)]
pub struct InsightCache {
    cache: Cache<String, ResearchInsight>,
}

impl InsightCache {
    /// Create a new cache with the given configuration.
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub async fn get(&self, concern: &str) -> Option<ResearchInsight> {
        self.cache.get(&cache_key(concern)).await
    }

    pub async fn insert(&self, concern: &str, insight: ResearchInsight) {
        self.cache.insert(cache_key(concern), insight).await;
    }

    /// Clear the cache.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate entry count. Pending writes may not be reflected yet.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for InsightCache {
    fn default() -> Self {
        Self::new(256, Duration::from_secs(3600))
    }
}

impl std::fmt::Debug for InsightCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

fn cache_key(concern: &str) -> String {
    concern.trim().to_lowercase()
}
