//! Shared HTTP plumbing for the reqwest providers.

use reqwest::{Response, StatusCode};
use serde_json::Value as JsonValue;
use std::sync::OnceLock;
use std::time::Duration;

use super::ProviderError;

/// Default per-request timeout. The resolver applies its own bound on top.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Longest error body kept in `ProviderError::Api`.
const MAX_ERROR_BODY: usize = 256;

/// Process-wide client, shared so connections are pooled.
pub(crate) fn client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .user_agent(concat!("lumiere/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default()
    })
}

pub(crate) fn transport_error(error: reqwest::Error, timeout: Duration) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::Http(error.to_string())
    }
}

/// Turn 429 and non-success statuses into errors.
pub(crate) async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(ProviderError::RateLimited { retry_after });
    }

    if !status.is_success() {
        let mut message = response.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}

pub(crate) async fn json_body(response: Response) -> Result<JsonValue, ProviderError> {
    response
        .json::<JsonValue>()
        .await
        .map_err(|e| ProviderError::Parse(e.to_string()))
}

/// Strip trailing slashes so paths can be appended with `format!`.
pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::get, Router};

    #[tokio::test]
    async fn test_check_status_rate_limited() {
        let app = Router::new().route(
            "/",
            get(|| async { (AxumStatus::TOO_MANY_REQUESTS, [("retry-after", "7")], "slow down") }),
        );
        let server = testing::spawn(app).await;

        let response = client().get(server.url()).send().await.unwrap();
        match check_status(response).await {
            Err(ProviderError::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("unexpected: {:?}", other.map(|r| r.status())),
        }
    }

    #[tokio::test]
    async fn test_check_status_api_error_keeps_body() {
        let app = Router::new().route(
            "/",
            get(|| async { (AxumStatus::BAD_GATEWAY, "upstream down") }),
        );
        let server = testing::spawn(app).await;

        let response = client().get(server.url()).send().await.unwrap();
        match check_status(response).await {
            Err(ProviderError::Api { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected: {:?}", other.map(|r| r.status())),
        }
    }

    #[test]
    fn test_trim_base() {
        assert_eq!(trim_base("http://a.example/"), "http://a.example");
    }
}
