//! Runtime configuration: remote endpoint with a built-in fallback

use anyhow::{Context, Result};
use arplace_core::{AppConfig, ConfigOrigin, ResolvedConfig};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

/// Where the app configuration document comes from
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch(&self) -> Result<AppConfig>;
}

/// Fetches the JSON config document over HTTP
pub struct HttpConfigSource {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpConfigSource {
    /// `url` may be relative to `base_url` (e.g. `/api/config`)
    pub fn new(url: &str, base_url: Option<&str>) -> Result<Self> {
        let url = match base_url {
            Some(base) => reqwest::Url::parse(base)
                .context("Invalid base URL")?
                .join(url)
                .context("Invalid config URL")?,
            None => reqwest::Url::parse(url).context("Invalid config URL")?,
        };
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    async fn fetch(&self) -> Result<AppConfig> {
        let body = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .context("Config request failed")?
            .error_for_status()
            .context("Config endpoint returned an error")?
            .text()
            .await
            .context("Failed to read config body")?;

        AppConfig::from_json(&body).context("Invalid config document")
    }
}

/// Two-stage resolution: the remote document within `timeout`, else the built-in one
pub async fn resolve_config(source: Option<&dyn ConfigSource>, timeout: Duration) -> ResolvedConfig {
    let Some(source) = source else {
        info!("No config source, using built-in configuration");
        return builtin();
    };

    match tokio::time::timeout(timeout, source.fetch()).await {
        Ok(Ok(config)) => {
            info!(models = config.models.len(), "Loaded remote configuration");
            ResolvedConfig {
                config,
                origin: ConfigOrigin::Remote,
            }
        }
        Ok(Err(e)) => {
            warn!(error = %format!("{:#}", e), "Remote configuration failed, using built-in");
            builtin()
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Remote configuration timed out, using built-in");
            builtin()
        }
    }
}

fn builtin() -> ResolvedConfig {
    ResolvedConfig {
        config: AppConfig::builtin(),
        origin: ConfigOrigin::Builtin,
    }
}
