//! Sanity content store over the HTTP query and mutation APIs.
//!
//! Products are read with a GROQ filter on `targetIssue`; scan records are
//! appended as `scanHistory` documents with product references.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

use lumiere_core::adapters::{adapt_products, adapt_scan_records, MAX_PRODUCTS};
use lumiere_core::{Product, ScanRecord};

use super::http::{check_status, client, json_body, transport_error, trim_base, DEFAULT_TIMEOUT};
use super::secrets::ApiCredential;
use super::{ContentStore, ProviderError};
use crate::config::ContentStoreConfig;

pub const SANITY_PROJECT_ID_ENV: &str = "SANITY_PROJECT_ID";
pub const SANITY_DATASET_ENV: &str = "SANITY_DATASET";
pub const SANITY_API_TOKEN_ENV: &str = "SANITY_API_TOKEN";
const DEFAULT_DATASET: &str = "production";
const SCAN_DOCUMENT_TYPE: &str = "scanHistory";

const PRODUCTS_QUERY: &str = r#"*[_type == "product" && targetIssue == $targetIssue]{
  _id,
  name,
  price,
  targetIssue,
  inStock,
  "imageUrl": image.asset->url
}"#;

fn env_or(configured: Option<&str>, env_var: &str) -> Option<String> {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok())
        .filter(|v| !v.trim().is_empty())
}

#[derive(Debug)]
pub struct SanityStore {
    base_url: String,
    api_version: String,
    dataset: String,
    token: Option<ApiCredential>,
    timeout: Duration,
}

impl SanityStore {
    pub fn new(project_id: &str, dataset: &str) -> Self {
        Self {
            base_url: format!("https://{}.api.sanity.io", project_id),
            api_version: ContentStoreConfig::default().api_version,
            dataset: dataset.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build from config, falling back to `SANITY_*` environment variables.
    ///
    /// A project id is required. The token is only needed for writes.
    pub fn from_config(config: &ContentStoreConfig) -> Result<Self, ProviderError> {
        let project_id = env_or(config.project_id.as_deref(), SANITY_PROJECT_ID_ENV).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Sanity project id required: set it in config or the {} environment variable",
                SANITY_PROJECT_ID_ENV
            ))
        })?;
        let dataset = env_or(config.dataset.as_deref(), SANITY_DATASET_ENV)
            .unwrap_or_else(|| DEFAULT_DATASET.to_string());
        let token = ApiCredential::from_config_or_env(
            config.token.as_deref(),
            SANITY_API_TOKEN_ENV,
            "Sanity API token",
        )
        .ok();

        let mut store = Self::new(&project_id, &dataset);
        store.api_version = config.api_version.clone();
        store.token = token;
        if let Some(url) = config.base_url.as_deref() {
            store.base_url = trim_base(url);
        }
        Ok(store)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = trim_base(&url.into());
        self
    }

    pub fn with_token(mut self, token: ApiCredential) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/v{}/data/{}/{}",
            self.base_url, self.api_version, action, self.dataset
        )
    }

    /// Run a GROQ query. Parameter values are JSON-encoded per the query API.
    async fn query(&self, groq: &str, params: &[(&str, JsonValue)]) -> Result<JsonValue, ProviderError> {
        let mut pairs = vec![("query".to_string(), groq.to_string())];
        for (name, value) in params {
            pairs.push((format!("${}", name), value.to_string()));
        }

        let mut request = client()
            .get(self.endpoint("query"))
            .query(&pairs)
            .timeout(self.timeout);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose());
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        json_body(check_status(response).await?).await
    }
}

/// `scanHistory` document for a record.
fn scan_document(record: &ScanRecord) -> JsonValue {
    let references: Vec<JsonValue> = record
        .recommended_products
        .iter()
        .enumerate()
        .map(|(index, product)| {
            json!({
                "_type": "reference",
                "_ref": product.id,
                "_key": format!("{}-{}", product.id, index),
            })
        })
        .collect();

    json!({
        "_type": SCAN_DOCUMENT_TYPE,
        "date": record.date,
        "userId": record.user_id,
        "scores": record.scores,
        "recommendedProducts": references,
    })
}

#[async_trait]
impl ContentStore for SanityStore {
    async fn products_by_issue(&self, target_issue: &str) -> Result<Vec<Product>, ProviderError> {
        let groq = format!("{}[0...{}]", PRODUCTS_QUERY, MAX_PRODUCTS);
        let body = self
            .query(&groq, &[("targetIssue", JsonValue::from(target_issue))])
            .await?;
        Ok(adapt_products(&body)?)
    }

    async fn append_scan(&self, record: &ScanRecord) -> Result<(), ProviderError> {
        let token = self.token.as_ref().ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Sanity API token required for writes: set {}",
                SANITY_API_TOKEN_ENV
            ))
        })?;

        let response = client()
            .post(self.endpoint("mutate"))
            .bearer_auth(token.expose())
            .timeout(self.timeout)
            .json(&json!({ "mutations": [{ "create": scan_document(record) }] }))
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        check_status(response).await?;
        Ok(())
    }

    async fn recent_scans(&self, limit: usize) -> Result<Vec<ScanRecord>, ProviderError> {
        let groq = format!(
            r#"*[_type == "{}"] | order(date desc)[0...{}]"#,
            SCAN_DOCUMENT_TYPE, limit
        );
        let body = self.query(&groq, &[]).await?;
        Ok(adapt_scan_records(&body)?)
    }

    fn name(&self) -> &str {
        "sanity"
    }
}
