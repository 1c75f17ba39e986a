//! Model descriptors supplied by configuration

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique model identifier (e.g., "house1")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub String);

impl ModelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A named node inside a model that can be shown or hidden on its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubLayer {
    /// Node name inside the GLB scene graph (e.g., "roof")
    pub node: String,
    /// Display name shown in the gallery
    pub name: String,
}

/// A placeable model as listed in the gallery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: ModelId,
    /// Display name
    pub name: String,
    /// Source URL of the binary asset (absolute or origin-relative)
    pub url: String,
    /// Gallery thumbnail path
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Uniform scale applied when the model is first placed
    #[serde(default)]
    pub default_scale: Option<f32>,
    /// Sub-layers available for visibility toggling
    #[serde(default)]
    pub layers: Vec<SubLayer>,
}

impl ModelDescriptor {
    pub fn new(id: &str, name: &str, url: &str) -> Self {
        Self {
            id: ModelId::new(id),
            name: name.to_string(),
            url: url.to_string(),
            thumbnail: None,
            default_scale: None,
            layers: Vec::new(),
        }
    }

    /// Scale to use on first placement
    pub fn initial_scale(&self) -> f32 {
        self.default_scale.unwrap_or(1.0)
    }

    /// Look up a sub-layer by its node name
    pub fn layer(&self, node: &str) -> Option<&SubLayer> {
        self.layers.iter().find(|l| l.node == node)
    }
}
