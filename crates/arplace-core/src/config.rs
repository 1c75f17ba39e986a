//! Application configuration, validation, and built-in defaults

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::model::{ModelDescriptor, SubLayer};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_models")]
    pub models: Vec<ModelDescriptor>,
    #[serde(default)]
    pub gestures: GestureConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            gestures: GestureConfig::default(),
            ui: UiConfig::default(),
            performance: PerformanceConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

/// Which rotation axes a one-finger drag drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationAxes {
    /// Horizontal drag turns the model about its vertical axis only
    #[default]
    YawOnly,
    /// Vertical drag additionally tilts the model
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureConfig {
    #[serde(default = "default_true")]
    pub rotation_enabled: bool,
    #[serde(default = "default_true")]
    pub scale_enabled: bool,
    #[serde(default)]
    pub rotation_axes: RotationAxes,
    /// Radians of rotation per pixel of drag
    #[serde(default = "default_rotation_speed")]
    pub rotation_speed: f32,
    #[serde(default = "default_scale_speed")]
    pub scale_speed: f32,
    /// Multiplier on top of scale_speed so small pinches are visible on large models
    #[serde(default = "default_scale_amplification")]
    pub scale_amplification: f32,
    #[serde(default = "default_min_scale")]
    pub min_scale: f32,
    #[serde(default = "default_max_scale")]
    pub max_scale: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            rotation_enabled: true,
            scale_enabled: true,
            rotation_axes: RotationAxes::default(),
            rotation_speed: default_rotation_speed(),
            scale_speed: default_scale_speed(),
            scale_amplification: default_scale_amplification(),
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_rotation_speed() -> f32 {
    0.01
}

fn default_scale_speed() -> f32 {
    1.0
}

fn default_scale_amplification() -> f32 {
    1.0
}

fn default_min_scale() -> f32 {
    0.1
}

fn default_max_scale() -> f32 {
    5.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    /// How long transient messages stay on screen
    #[serde(default = "default_toast_ms")]
    pub toast_duration_ms: u64,
    /// Lines kept in the debug log panel
    #[serde(default = "default_log_lines")]
    pub log_panel_lines: usize,
    /// Show the debug log panel on startup
    #[serde(default)]
    pub show_debug_panel: bool,
    /// Element id used as the AR DOM overlay root
    #[serde(default = "default_overlay_root")]
    pub overlay_root: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            toast_duration_ms: default_toast_ms(),
            log_panel_lines: default_log_lines(),
            show_debug_panel: false,
            overlay_root: default_overlay_root(),
        }
    }
}

fn default_toast_ms() -> u64 {
    3000
}

fn default_log_lines() -> usize {
    200
}

fn default_overlay_root() -> String {
    "overlay".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Run the hit test every N rendered frames
    #[serde(default = "default_hit_test_interval")]
    pub hit_test_interval_frames: u32,
    /// Distance in front of the viewer used when no surface has been hit yet
    #[serde(default = "default_fallback_distance")]
    pub fallback_distance: f32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            hit_test_interval_frames: default_hit_test_interval(),
            fallback_distance: default_fallback_distance(),
        }
    }
}

fn default_hit_test_interval() -> u32 {
    1
}

fn default_fallback_distance() -> f32 {
    1.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Runtime configuration endpoint (None: built-in configuration only)
    #[serde(default = "default_config_url")]
    pub config_url: Option<String>,
    /// Upper bound on the remote configuration fetch
    #[serde(default = "default_config_timeout")]
    pub config_timeout_ms: u64,
    /// Optional per-request timeout for model downloads (unset: no timeout)
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            config_url: default_config_url(),
            config_timeout_ms: default_config_timeout(),
            fetch_timeout_secs: None,
        }
    }
}

fn default_config_url() -> Option<String> {
    Some("/api/config".to_string())
}

fn default_config_timeout() -> u64 {
    3000
}

fn default_models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor {
            thumbnail: Some("/thumbnails/house1.png".to_string()),
            ..ModelDescriptor::new("house1", "Cottage", "/models/house1.glb")
        },
        ModelDescriptor {
            thumbnail: Some("/thumbnails/house2.png".to_string()),
            default_scale: Some(0.5),
            layers: vec![
                SubLayer {
                    node: "roof".to_string(),
                    name: "Roof".to_string(),
                },
                SubLayer {
                    node: "upper_floor".to_string(),
                    name: "Upper floor".to_string(),
                },
            ],
            ..ModelDescriptor::new("house2", "Two-storey house", "/models/house2.glb")
        },
        ModelDescriptor {
            thumbnail: Some("/thumbnails/cabin.png".to_string()),
            default_scale: Some(0.8),
            ..ModelDescriptor::new("cabin", "Cabin", "/models/cabin.glb")
        },
    ]
}

impl AppConfig {
    /// The statically defined configuration used when no remote one is available
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Parse a configuration document served as JSON
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(content)?;
        config.normalize()
    }

    /// Parse a configuration document stored as TOML
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.normalize()
    }

    /// Validate and normalize values so downstream code can rely on them
    pub fn normalize(mut self) -> Result<Self, ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::Invalid("no models configured".to_string()));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if model.id.as_str().trim().is_empty() {
                return Err(ConfigError::Invalid("model with empty id".to_string()));
            }
            if model.url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("model {} has no url", model.id)));
            }
            if !seen.insert(model.id.clone()) {
                return Err(ConfigError::Invalid(format!("duplicate model id {}", model.id)));
            }
            if let Some(scale) = model.default_scale {
                if !(scale.is_finite() && scale > 0.0) {
                    return Err(ConfigError::Invalid(format!(
                        "model {} has non-positive default_scale {}",
                        model.id, scale
                    )));
                }
            }
        }

        let g = &mut self.gestures;
        if !(g.min_scale > 0.0 && g.max_scale.is_finite()) || g.min_scale > g.max_scale {
            return Err(ConfigError::Invalid(format!(
                "invalid scale range [{}, {}]",
                g.min_scale, g.max_scale
            )));
        }
        if !(g.rotation_speed.is_finite() && g.rotation_speed > 0.0) {
            g.rotation_speed = default_rotation_speed();
        }
        if !(g.scale_speed.is_finite() && g.scale_speed > 0.0) {
            g.scale_speed = default_scale_speed();
        }
        if !(g.scale_amplification.is_finite() && g.scale_amplification > 0.0) {
            g.scale_amplification = default_scale_amplification();
        }

        self.performance.hit_test_interval_frames = self.performance.hit_test_interval_frames.max(1);
        if !(self.performance.fallback_distance.is_finite() && self.performance.fallback_distance > 0.0) {
            self.performance.fallback_distance = default_fallback_distance();
        }
        self.ui.log_panel_lines = self.ui.log_panel_lines.max(1);

        Ok(self)
    }

    /// Look up a model by id
    pub fn model(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id.as_str() == id)
    }

    /// The model auto-selected when the user taps before choosing one
    pub fn first_model(&self) -> Option<&ModelDescriptor> {
        self.models.first()
    }
}

/// Where a resolved configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    Remote,
    File,
    Builtin,
}

/// A normalized configuration together with its origin
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: AppConfig,
    pub origin: ConfigOrigin,
}

/// Load configuration from a TOML file, falling back to the built-in defaults
pub fn load_config(path: &Path) -> Result<ResolvedConfig, ConfigError> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config = AppConfig::from_toml(&content)?;
        info!(path = %path.display(), models = config.models.len(), "Loaded configuration");
        Ok(ResolvedConfig {
            config,
            origin: ConfigOrigin::File,
        })
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(ResolvedConfig {
            config: AppConfig::builtin(),
            origin: ConfigOrigin::Builtin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_is_valid() {
        let config = AppConfig::builtin().normalize().unwrap();
        assert_eq!(config.first_model().unwrap().id.as_str(), "house1");
        assert!(config.model("house2").is_some());
        assert!(config.model("nope").is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [gestures]
            max_scale = 3.0
            rotation_axes = "both"
            "#,
        )
        .unwrap();

        assert_eq!(config.gestures.max_scale, 3.0);
        assert_eq!(config.gestures.min_scale, 0.1);
        assert_eq!(config.gestures.rotation_axes, RotationAxes::Both);
        assert_eq!(config.models.len(), 3);
        assert_eq!(config.network.config_url.as_deref(), Some("/api/config"));
    }

    #[test]
    fn test_normalize_rejects_bad_documents() {
        let dup = r#"{"models": [
            {"id": "a", "name": "A", "url": "/a.glb"},
            {"id": "a", "name": "B", "url": "/b.glb"}
        ]}"#;
        assert!(matches!(AppConfig::from_json(dup), Err(ConfigError::Invalid(_))));

        let empty = r#"{"models": []}"#;
        assert!(matches!(AppConfig::from_json(empty), Err(ConfigError::Invalid(_))));

        let inverted = r#"{"gestures": {"min_scale": 2.0, "max_scale": 1.0}}"#;
        assert!(matches!(AppConfig::from_json(inverted), Err(ConfigError::Invalid(_))));

        assert!(matches!(AppConfig::from_json("not json"), Err(ConfigError::JsonError(_))));
    }

    #[test]
    fn test_normalize_repairs_tunables() {
        let json = r#"{"gestures": {"rotation_speed": -1.0}, "performance": {"hit_test_interval_frames": 0}}"#;
        let config = AppConfig::from_json(json).unwrap();
        assert_eq!(config.gestures.rotation_speed, 0.01);
        assert_eq!(config.performance.hit_test_interval_frames, 1);
    }

    #[test]
    fn test_load_config_file_and_missing() {
        let temp_dir = TempDir::new().unwrap();
        let missing = load_config(&temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(missing.origin, ConfigOrigin::Builtin);

        let path = temp_dir.path().join("arplace.toml");
        std::fs::write(
            &path,
            r#"
            [[models]]
            id = "chair"
            name = "Chair"
            url = "/models/chair.glb"
            "#,
        )
        .unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.origin, ConfigOrigin::File);
        assert_eq!(loaded.config.models.len(), 1);
        assert_eq!(loaded.config.models[0].id.as_str(), "chair");
    }
}
