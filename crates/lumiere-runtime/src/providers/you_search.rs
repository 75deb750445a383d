//! You.com web search.

use async_trait::async_trait;
use std::time::Duration;

use lumiere_core::adapters::adapt_search;
use lumiere_core::ResearchInsight;

use super::http::{check_status, client, json_body, transport_error, trim_base, DEFAULT_TIMEOUT};
use super::secrets::{ApiCredential, CredentialSource};
use super::{ProviderError, SearchProvider};
use crate::config::ApiKeyConfig;

pub const YOU_API_KEY_ENV: &str = "YOU_API_KEY";
const DEFAULT_BASE_URL: &str = "https://api.ydc-index.io";
const CREDENTIAL_NAME: &str = "You.com API key";

/// Search query for research on a skin concern.
pub fn research_query(concern: &str) -> String {
    format!(
        "Latest dermatological research and epidermal restoration treatments for {} 2025 2026",
        concern.trim()
    )
}

#[derive(Debug)]
pub struct YouSearch {
    credential: ApiCredential,
    base_url: String,
    timeout: Duration,
}

impl YouSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(api_key, CredentialSource::Programmatic, CREDENTIAL_NAME),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build from config, falling back to `YOU_API_KEY`.
    pub fn from_config(config: &ApiKeyConfig) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config.api_key.as_deref(),
            YOU_API_KEY_ENV,
            CREDENTIAL_NAME,
        )?;
        Ok(Self {
            credential,
            base_url: config
                .base_url
                .as_deref()
                .map(trim_base)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = trim_base(&url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SearchProvider for YouSearch {
    async fn search(&self, query: &str) -> Result<ResearchInsight, ProviderError> {
        let response = client()
            .get(format!("{}/search", self.base_url))
            .query(&[("query", query)])
            .header("X-API-Key", self.credential.expose())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let body = json_body(check_status(response).await?).await?;
        Ok(adapt_search(&body)?)
    }

    fn name(&self) -> &str {
        "you_search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::http::testing;
    use axum::{extract::Query, http::HeaderMap, routing::get, Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    #[test]
    fn test_research_query() {
        assert_eq!(
            research_query(" texture "),
            "Latest dermatological research and epidermal restoration treatments for texture 2025 2026"
        );
    }

    #[tokio::test]
    async fn test_search_returns_top_result() {
        let app = Router::new().route(
            "/search",
            get(
                |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                    let key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
                    let query = params.get("query").cloned().unwrap_or_default();
                    Json(json!({
                        "results": [{
                            "title": format!("key={}", key.unwrap_or("")),
                            "url": "https://research.example/1",
                            "description": query
                        }]
                    }))
                },
            ),
        );
        let server = testing::spawn(app).await;

        let search = YouSearch::new("you-key").with_base_url(server.url());
        let insight = search.search("ceramides & barrier").await.unwrap();
        assert_eq!(insight.source_title, "key=you-key");
        assert_eq!(insight.insight, "ceramides & barrier");
        assert_eq!(insight.source_url, "https://research.example/1");
    }

    #[tokio::test]
    async fn test_search_without_results_is_shape_error() {
        let app = Router::new().route(
            "/search",
            get(|| async { Json::<Value>(json!({ "results": [] })) }),
        );
        let server = testing::spawn(app).await;

        let search = YouSearch::new("you-key").with_base_url(server.url());
        let err = search.search("anything").await.unwrap_err();
        assert!(matches!(err, ProviderError::Shape(_)));
    }
}
