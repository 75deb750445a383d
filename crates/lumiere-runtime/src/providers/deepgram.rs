//! Deepgram project keys for the voice agent.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use lumiere_core::adapters::adapt_speech_key;

use super::http::{check_status, client, json_body, transport_error, trim_base, DEFAULT_TIMEOUT};
use super::secrets::{ApiCredential, CredentialSource};
use super::{ProviderError, SpeechKeyIssuer};
use crate::config::SpeechConfig;

pub const DEEPGRAM_API_KEY_ENV: &str = "DEEPGRAM_API_KEY";
pub const DEEPGRAM_PROJECT_ID_ENV: &str = "DEEPGRAM_PROJECT_ID";
const DEFAULT_BASE_URL: &str = "https://api.deepgram.com";
const CREDENTIAL_NAME: &str = "Deepgram API key";

/// Lifetime of issued keys.
pub const TEMPORARY_KEY_TTL: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct CreateKeyRequest<'a> {
    comment: &'a str,
    scopes: &'a [&'a str],
    time_to_live_in_seconds: u64,
}

#[derive(Debug)]
pub struct DeepgramKeys {
    master: ApiCredential,
    project_id: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl DeepgramKeys {
    pub fn new(api_key: impl Into<String>, project_id: Option<String>) -> Self {
        Self {
            master: ApiCredential::new(api_key, CredentialSource::Programmatic, CREDENTIAL_NAME),
            project_id,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build from config, falling back to `DEEPGRAM_API_KEY` and
    /// `DEEPGRAM_PROJECT_ID`. Only the key is required.
    pub fn from_config(config: &SpeechConfig) -> Result<Self, ProviderError> {
        let master = ApiCredential::from_config_or_env(
            config.api_key.as_deref(),
            DEEPGRAM_API_KEY_ENV,
            CREDENTIAL_NAME,
        )?;
        let project_id = config
            .project_id
            .clone()
            .or_else(|| std::env::var(DEEPGRAM_PROJECT_ID_ENV).ok())
            .filter(|v| !v.trim().is_empty());

        Ok(Self {
            master,
            project_id,
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
impl SpeechKeyIssuer for DeepgramKeys {
    async fn temporary_key(&self) -> Result<String, ProviderError> {
        let project_id = self
            .project_id
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("Deepgram project id missing".to_string()))?;

        let response = client()
            .post(format!("{}/v1/projects/{}/keys", self.base_url, project_id))
            .header("Authorization", format!("Token {}", self.master.expose()))
            .timeout(self.timeout)
            .json(&CreateKeyRequest {
                comment: "Temporary Voice Agent Access",
                scopes: &["usage:write"],
                time_to_live_in_seconds: TEMPORARY_KEY_TTL.as_secs(),
            })
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let body = json_body(check_status(response).await?).await?;
        Ok(adapt_speech_key(&body)?)
    }

    fn master_key(&self) -> &ApiCredential {
        &self.master
    }

    fn name(&self) -> &str {
        "deepgram"
    }
}
