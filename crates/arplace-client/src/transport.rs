//! Network transport for model downloads

use anyhow::{Context, Result};
use arplace_core::NetworkConfig;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Response head plus a chunked body
pub struct FetchResponse {
    pub status: u16,
    /// Declared total size, when the server sent one
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Plain HTTP(S) GET with a streamed body
#[async_trait]
pub trait AssetTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchResponse, TransportError>;
}

/// reqwest-backed transport resolving origin-relative URLs against a base
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Option<reqwest::Url>,
}

impl HttpTransport {
    pub fn new(config: &NetworkConfig, base_url: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.fetch_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        let base_url = base_url
            .map(reqwest::Url::parse)
            .transpose()
            .context("Invalid base URL")?;

        Ok(Self { client, base_url })
    }

    fn resolve(&self, url: &str) -> Result<reqwest::Url, TransportError> {
        let parsed = match &self.base_url {
            Some(base) => base.join(url),
            None => reqwest::Url::parse(url),
        };
        parsed.map_err(|e| TransportError(format!("invalid URL {}: {}", url, e)))
    }
}

#[async_trait]
impl AssetTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<FetchResponse, TransportError> {
        let resolved = self.resolve(url)?;
        debug!(url = %resolved, "GET");

        let response = self
            .client
            .get(resolved)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError(e.to_string())))
            .boxed();

        Ok(FetchResponse {
            status,
            content_length,
            body,
        })
    }
}
