//! Image input handling for skin analysis.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::time::Duration;

use lumiere_core::patterns::{is_remote_url, strip_data_uri};

use super::http::{check_status, client, transport_error, DEFAULT_TIMEOUT};
use super::{ImageFetcher, ProviderError};

/// Default cap on a downloaded image.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

/// Downloads images over HTTP(S), at most `max_bytes` per image.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    timeout: Duration,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = client()
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let mut response = check_status(response).await?;
        if response
            .content_length()
            .is_some_and(|declared| declared > self.max_bytes as u64)
        {
            return Err(ProviderError::TooLarge { limit: self.max_bytes });
        }

        // Content-Length may be absent or wrong; count what actually arrives.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_error(e, self.timeout))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(ProviderError::TooLarge { limit: self.max_bytes });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

/// Base64 image data for the vision provider.
///
/// Data URIs lose their prefix, URLs are downloaded and encoded, anything
/// else is passed through as base64. `None` when there is nothing to send.
pub async fn image_payload(image: &str, fetcher: &dyn ImageFetcher) -> Option<String> {
    let image = image.trim();

    if is_remote_url(image) {
        return match fetcher.fetch(image).await {
            Ok(bytes) if !bytes.is_empty() => Some(STANDARD.encode(bytes)),
            Ok(_) => {
                tracing::warn!("Downloaded image was empty");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "External image fetch failed");
                None
            }
        };
    }

    let data = strip_data_uri(image);
    if data.is_empty() {
        None
    } else {
        Some(data.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::http::testing;
    use axum::{body::Body, http::StatusCode, routing::get, Router};

    #[tokio::test]
    async fn test_data_uri_prefix_stripped() {
        let fetcher = HttpImageFetcher::default();
        let payload = image_payload("data:image/jpeg;base64,aGVsbG8=", &fetcher).await;
        assert_eq!(payload.as_deref(), Some("aGVsbG8="));
    }

    #[tokio::test]
    async fn test_url_downloaded_and_encoded() {
        let app = Router::new().route("/face.jpg", get(|| async { b"hello".to_vec() }));
        let server = testing::spawn(app).await;

        let fetcher = HttpImageFetcher::default();
        let payload = image_payload(&format!("{}/face.jpg", server.url()), &fetcher).await;
        assert_eq!(payload.as_deref(), Some("aGVsbG8="));
    }

    #[tokio::test]
    async fn test_declared_oversize_rejected() {
        let app = Router::new().route("/face.jpg", get(|| async { vec![0u8; 64] }));
        let server = testing::spawn(app).await;

        let fetcher = HttpImageFetcher::default().with_max_bytes(16);
        let err = fetcher.fetch(&format!("{}/face.jpg", server.url())).await.unwrap_err();
        assert!(matches!(err, ProviderError::TooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn test_streamed_oversize_rejected() {
        let app = Router::new().route(
            "/face.jpg",
            get(|| async {
                let chunks = (0..4).map(|_| Ok::<_, std::io::Error>(vec![7u8; 8]));
                Body::from_stream(futures::stream::iter(chunks))
            }),
        );
        let server = testing::spawn(app).await;

        let url = format!("{}/face.jpg", server.url());
        let err = HttpImageFetcher::default()
            .with_max_bytes(20)
            .fetch(&url)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::TooLarge { limit: 20 }));

        let bytes = HttpImageFetcher::default().with_max_bytes(32).fetch(&url).await.unwrap();
        assert_eq!(bytes.len(), 32);
    }

    #[tokio::test]
    async fn test_oversize_image_yields_none() {
        let app = Router::new().route("/face.jpg", get(|| async { vec![1u8; 64] }));
        let server = testing::spawn(app).await;

        let fetcher = HttpImageFetcher::default().with_max_bytes(16);
        assert!(image_payload(&format!("{}/face.jpg", server.url()), &fetcher)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_failed_download_yields_none() {
        let app = Router::new().route("/face.jpg", get(|| async { StatusCode::NOT_FOUND }));
        let server = testing::spawn(app).await;

        let fetcher = HttpImageFetcher::default();
        assert!(image_payload(&format!("{}/face.jpg", server.url()), &fetcher)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_empty_data_uri_yields_none() {
        let fetcher = HttpImageFetcher::default();
        assert!(image_payload("data:image/png;base64,", &fetcher).await.is_none());
    }
}
