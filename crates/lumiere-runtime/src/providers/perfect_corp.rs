//! Perfect Corp skin analysis.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use lumiere_core::adapters::adapt_vision;
use lumiere_core::AnalysisScores;

use super::http::{check_status, client, json_body, transport_error, trim_base, DEFAULT_TIMEOUT};
use super::secrets::{ApiCredential, CredentialSource};
use super::{ProviderError, VisionProvider};
use crate::config::ApiKeyConfig;

pub const PERFECT_CORP_API_KEY_ENV: &str = "PERFECT_CORP_API_KEY";
const DEFAULT_BASE_URL: &str = "https://yce-api-01.perfectcorp.com";
const CREDENTIAL_NAME: &str = "Perfect Corp API key";

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    image_data: &'a str,
}

/// Skin analysis over the Perfect Corp REST API.
#[derive(Debug)]
pub struct PerfectCorpVision {
    credential: ApiCredential,
    base_url: String,
    timeout: Duration,
}

impl PerfectCorpVision {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(api_key, CredentialSource::Programmatic, CREDENTIAL_NAME),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build from config, falling back to `PERFECT_CORP_API_KEY`.
    pub fn from_config(config: &ApiKeyConfig) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config.api_key.as_deref(),
            PERFECT_CORP_API_KEY_ENV,
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
impl VisionProvider for PerfectCorpVision {
    async fn analyze(&self, image_data: &str) -> Result<AnalysisScores, ProviderError> {
        let response = client()
            .post(format!("{}/api/v1.0/skin/analyze", self.base_url))
            .bearer_auth(self.credential.expose())
            .timeout(self.timeout)
            .json(&AnalyzeRequest { image_data })
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let body = json_body(check_status(response).await?).await?;
        Ok(adapt_vision(&body)?)
    }

    fn name(&self) -> &str {
        "perfect_corp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::http::testing;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_analyze_sends_bearer_and_image() {
        let app = Router::new().route(
            "/api/v1.0/skin/analyze",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer pc-key");
                if !authorized || body["image_data"] != "aGVsbG8=" {
                    return (StatusCode::UNAUTHORIZED, Json(json!({})));
                }
                (
                    StatusCode::OK,
                    Json(json!({
                        "spots_score": 70,
                        "moisture_score": 30,
                        "texture_score": 90,
                        "dark_circle_score": 55
                    })),
                )
            }),
        );
        let server = testing::spawn(app).await;

        let vision = PerfectCorpVision::new("pc-key").with_base_url(server.url());
        let scores = vision.analyze("aGVsbG8=").await.unwrap();
        assert_eq!(scores, AnalysisScores::new(70.0, 30.0, 90.0, 55.0));
    }

    #[tokio::test]
    async fn test_analyze_error_status() {
        let app = Router::new().route(
            "/api/v1.0/skin/analyze",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let server = testing::spawn(app).await;

        let vision = PerfectCorpVision::new("pc-key").with_base_url(server.url());
        let err = vision.analyze("aGVsbG8=").await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 500, .. }));
    }

    #[test]
    fn test_debug_redacts_key() {
        let vision = PerfectCorpVision::new("pc-secret-key");
        assert!(!format!("{:?}", vision).contains("pc-secret-key"));
    }
}
