use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShortenerError {
    #[error("Failed to generate tiny URL: {0}")]
    Request(String),

    #[error("failed to generate tiny URL: {0}")]
    Status(StatusCode),

    #[error("Failed to parse tiny URL response: {0}")]
    Parse(String),

    #[error("Tiny URL request timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait LinkShortener: Send + Sync {
    async fn shorten(&self, long_url: &str) -> Result<String, ShortenerError>;
}

#[derive(Serialize)]
struct ShortenRequest<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct ShortenResponse {
    shorturl: Option<String>,
}

/// Client for tinyurl.ph style APIs: `POST {"url": ..}` with a bearer token,
/// answering `{"shorturl": ..}`.
pub struct TinyUrlClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    timeout: Duration,
}

impl TinyUrlClient {
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ShortenerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShortenerError::Request(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            token: token.into(),
            timeout,
        })
    }
}

#[async_trait]
impl LinkShortener for TinyUrlClient {
    async fn shorten(&self, long_url: &str) -> Result<String, ShortenerError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&ShortenRequest { url: long_url })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ShortenerError::Timeout(self.timeout)
                } else {
                    ShortenerError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!("Link shortener answered {}", status);
            return Err(ShortenerError::Status(status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ShortenerError::Request(e.to_string()))?;
        let parsed: ShortenResponse =
            serde_json::from_slice(&body).map_err(|e| ShortenerError::Parse(e.to_string()))?;

        match parsed.shorturl {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => Err(ShortenerError::Parse(
                "response has no shorturl".to_string(),
            )),
        }
    }
}
