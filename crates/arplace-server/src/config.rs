//! Server configuration loading and validation

use anyhow::{Context, Result};
use arplace_core::AppConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    /// Document served at `/api/config`
    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for web server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory holding the built web bundle
    #[serde(default = "default_root")]
    pub root: String,
    /// TLS configuration (optional - enables HTTPS when present)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            root: default_root(),
            tls: None,
        }
    }
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM format)
    pub cert: String,
    /// Path to private key file (PEM format)
    pub key: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_root() -> String {
    "web".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Path to 3D model files
    #[serde(default = "default_models_path")]
    pub path: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            path: default_models_path(),
        }
    }
}

fn default_models_path() -> String {
    "./assets/models".to_string()
}

/// Load configuration from file, or defaults when it does not exist
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        config
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Config {
            server: ServerConfig::default(),
            models: ModelsConfig::default(),
            app: AppConfig::builtin(),
        }
    };

    let app = config.app.normalize().context("Invalid [app] configuration")?;
    Ok(Config { app, ..config })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("arplace.toml")).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert!(config.server.tls.is_none());
        assert_eq!(config.app, AppConfig::builtin());
    }

    #[test]
    fn test_file_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
bind = "127.0.0.1:8443"

[server.tls]
cert = "cert.pem"
key = "key.pem"

[models]
path = "/srv/models"

[[app.models]]
id = "shed"
name = "Garden shed"
url = "/models/shed.glb"

[app.gestures]
max_scale = 3.0
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8443");
        assert_eq!(config.server.root, "web");
        assert_eq!(config.server.tls.unwrap().cert, "cert.pem");
        assert_eq!(config.models.path, "/srv/models");
        assert_eq!(config.app.models.len(), 1);
        assert_eq!(config.app.gestures.max_scale, 3.0);
    }

    #[test]
    fn test_invalid_app_section_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[app.gestures]
min_scale = 4.0
max_scale = 2.0
"#
        )
        .unwrap();
        assert!(load_config(file.path()).is_err());
    }
}
