//! Host-runtime capabilities consumed as opaque collaborators
//!
//! The immersive-AR runtime and the scene-graph renderer are provided by the
//! platform (a WebXR binding in the browser, a native binding elsewhere, test
//! doubles in unit tests). Only their input/output contracts live here.

use arplace_core::{AssetHandle, ModelTransform, Pose};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Optional or required session capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XrFeature {
    HitTest,
    LocalFloor,
    DomOverlay,
    LightEstimation,
    Anchors,
}

impl XrFeature {
    /// Feature descriptor string as understood by WebXR
    pub fn as_str(&self) -> &'static str {
        match self {
            XrFeature::HitTest => "hit-test",
            XrFeature::LocalFloor => "local-floor",
            XrFeature::DomOverlay => "dom-overlay",
            XrFeature::LightEstimation => "light-estimation",
            XrFeature::Anchors => "anchors",
        }
    }
}

impl fmt::Display for XrFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One capability descriptor tried during session negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInit {
    pub label: &'static str,
    pub required: Vec<XrFeature>,
    pub optional: Vec<XrFeature>,
    /// Element id of the DOM overlay root, when the overlay is requested
    pub dom_overlay_root: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSpaceKind {
    Viewer,
    Local,
    LocalFloor,
}

/// A reference space handle issued by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSpace {
    pub id: u32,
    pub kind: ReferenceSpaceKind,
}

/// A hit-test source handle issued by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitTestSource {
    pub id: u32,
}

/// Opaque per-frame hit-test result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitTestResult(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// The runtime does not support the request (DOMException NotSupportedError)
    NotSupported,
    /// The user or platform policy refused the request
    NotAllowed,
    InvalidState,
    Other,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::NotSupported, message)
    }

    pub fn is_not_supported(&self) -> bool {
        self.kind == RuntimeErrorKind::NotSupported
    }
}

/// Entry point of the immersive-AR runtime
#[async_trait]
pub trait XrRuntime: Send + Sync {
    /// Whether an immersive AR session can be offered at all
    async fn is_session_supported(&self) -> bool;

    async fn request_session(&self, init: &SessionInit) -> Result<Arc<dyn XrSession>, RuntimeError>;
}

/// A live immersive AR session
#[async_trait]
pub trait XrSession: Send + Sync {
    async fn request_reference_space(
        &self,
        kind: ReferenceSpaceKind,
    ) -> Result<ReferenceSpace, RuntimeError>;

    /// Request a hit-test source casting rays from the given space
    async fn request_hit_test_source(&self, space: &ReferenceSpace) -> Result<HitTestSource, RuntimeError>;

    async fn end(&self) -> Result<(), RuntimeError>;
}

/// The runtime's view of one rendered frame
pub trait XrFrame {
    /// Hit-test results for this frame, nearest first
    fn hit_test_results(&self, source: &HitTestSource) -> Vec<HitTestResult>;

    /// Pose of a hit-test result relative to a reference space
    fn pose(&self, result: &HitTestResult, space: &ReferenceSpace) -> Option<Pose>;
}

pub type EntityId = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The renderer could not parse the asset body
    #[error("asset rejected by renderer: {0}")]
    Parse(String),
    #[error("renderer error: {0}")]
    Other(String),
}

/// Scene-graph renderer with a strongly-typed entity API
#[async_trait]
pub trait SceneRenderer: Send + Sync {
    /// Create a model entity; resolves once the asset parsed (or failed to)
    async fn spawn_model(
        &self,
        asset: &AssetHandle,
        transform: &ModelTransform,
    ) -> Result<EntityId, RenderError>;

    fn set_transform(&self, entity: EntityId, transform: &ModelTransform);

    fn set_layer_visible(&self, entity: EntityId, node: &str, visible: bool);

    fn despawn(&self, entity: EntityId);

    /// Move the surface reticle to a pose, or hide it
    fn set_reticle(&self, pose: Option<&Pose>);
}
