//! Foxit document generation.
//!
//! Two calls per report: an OAuth client-credentials token, then the
//! generation request itself, which returns the PDF bytes.

use async_trait::async_trait;
use std::time::Duration;

use lumiere_core::adapters::adapt_access_token;
use lumiere_core::report::DocGenPayload;
use lumiere_core::ShapeError;

use super::http::{check_status, client, json_body, transport_error, trim_base, DEFAULT_TIMEOUT};
use super::secrets::{ApiCredential, CredentialSource};
use super::{DocumentGenerator, ProviderError};
use crate::config::DocumentGeneratorConfig;

pub const FOXIT_CLIENT_ID_ENV: &str = "FOXIT_DOCGEN_CLIENT_ID";
pub const FOXIT_CLIENT_SECRET_ENV: &str = "FOXIT_DOCGEN_CLIENT_SECRET";
const DEFAULT_BASE_URL: &str = "https://na1.fusion.foxit.com";

#[derive(Debug)]
pub struct FoxitDocGen {
    client_id: ApiCredential,
    client_secret: ApiCredential,
    base_url: String,
    timeout: Duration,
}

impl FoxitDocGen {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: ApiCredential::new(client_id, CredentialSource::Programmatic, "Foxit client id"),
            client_secret: ApiCredential::new(
                client_secret,
                CredentialSource::Programmatic,
                "Foxit client secret",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build from config, falling back to `FOXIT_DOCGEN_CLIENT_*`.
    pub fn from_config(config: &DocumentGeneratorConfig) -> Result<Self, ProviderError> {
        let client_id = ApiCredential::from_config_or_env(
            config.client_id.as_deref(),
            FOXIT_CLIENT_ID_ENV,
            "Foxit client id",
        )?;
        let client_secret = ApiCredential::from_config_or_env(
            config.client_secret.as_deref(),
            FOXIT_CLIENT_SECRET_ENV,
            "Foxit client secret",
        )?;
        Ok(Self {
            client_id,
            client_secret,
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

    async fn access_token(&self) -> Result<String, ProviderError> {
        let response = client()
            .post(format!("{}/oauth2/token", self.base_url))
            .basic_auth(self.client_id.expose(), Some(self.client_secret.expose()))
            .form(&[("grant_type", "client_credentials")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let body = json_body(check_status(response).await?).await?;
        Ok(adapt_access_token(&body)?)
    }
}

#[async_trait]
impl DocumentGenerator for FoxitDocGen {
    async fn generate(&self, payload: &DocGenPayload) -> Result<Vec<u8>, ProviderError> {
        let token = self.access_token().await?;

        let response = client()
            .post(format!("{}/docgen/v1/generate", self.base_url))
            .bearer_auth(&token)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let bytes = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if bytes.is_empty() {
            return Err(ShapeError::Empty("document").into());
        }
        if !bytes.starts_with(b"%PDF") {
            return Err(ProviderError::Parse("generated document is not a PDF".to_string()));
        }
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        "foxit"
    }
}
