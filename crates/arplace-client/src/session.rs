//! Immersive AR session negotiation and per-frame surface detection

use arplace_core::{AppConfig, Pose};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::host::{
    HitTestSource, ReferenceSpace, ReferenceSpaceKind, RuntimeError, SceneRenderer, SessionInit,
    XrFeature, XrFrame, XrRuntime, XrSession,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("immersive AR is not supported on this device")]
    NotSupported,
    #[error("surface detection is unavailable: {message}")]
    HitTestUnavailable {
        /// The runtime reported the feature as unsupported (vs. a generic failure)
        feature_unavailable: bool,
        message: String,
    },
    #[error("no usable reference space: {0}")]
    ReferenceSpace(RuntimeError),
    #[error("AR session request failed: {0}")]
    Runtime(RuntimeError),
    #[error("an AR session is already active")]
    AlreadyActive,
    #[error("tap ignored, no surface has been detected yet")]
    NoPlacementTarget,
}

/// Notifications published by the session controller
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started { descriptor: &'static str },
    /// First hit after searching
    SurfaceFound(Pose),
    /// First miss after a hit
    SurfaceLost,
    /// The user tapped while a surface was known
    Place(Pose),
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceState {
    #[default]
    Searching,
    Active,
}

struct ActiveSession {
    session: Arc<dyn XrSession>,
    descriptor: &'static str,
    world_space: ReferenceSpace,
    viewer_space: ReferenceSpace,
    hit_test_source: HitTestSource,
}

/// Owns the AR session and everything scoped to it
pub struct SessionController {
    runtime: Arc<dyn XrRuntime>,
    renderer: Arc<dyn SceneRenderer>,
    candidates: Vec<SessionInit>,
    hit_test_interval: u64,
    active: Option<ActiveSession>,
    last_hit: Option<Pose>,
    surface: SurfaceState,
    frame_count: u64,
    events: broadcast::Sender<SessionEvent>,
}

/// Capability descriptors in priority order: full, reduced, minimal
pub fn default_candidates(overlay_root: &str) -> Vec<SessionInit> {
    vec![
        SessionInit {
            label: "full",
            required: vec![XrFeature::HitTest, XrFeature::LocalFloor],
            optional: vec![
                XrFeature::DomOverlay,
                XrFeature::LightEstimation,
                XrFeature::Anchors,
            ],
            dom_overlay_root: Some(overlay_root.to_string()),
        },
        SessionInit {
            label: "reduced",
            required: vec![XrFeature::HitTest],
            optional: vec![XrFeature::LocalFloor],
            dom_overlay_root: None,
        },
        SessionInit {
            label: "minimal",
            required: Vec::new(),
            optional: vec![XrFeature::HitTest],
            dom_overlay_root: None,
        },
    ]
}

impl SessionController {
    pub fn new(runtime: Arc<dyn XrRuntime>, renderer: Arc<dyn SceneRenderer>, config: &AppConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            runtime,
            renderer,
            candidates: default_candidates(&config.ui.overlay_root),
            hit_test_interval: u64::from(config.performance.hit_test_interval_frames.max(1)),
            active: None,
            last_hit: None,
            surface: SurfaceState::Searching,
            frame_count: 0,
            events,
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Label of the capability descriptor the live session was granted with
    pub fn descriptor(&self) -> Option<&'static str> {
        self.active.as_ref().map(|a| a.descriptor)
    }

    pub fn last_hit(&self) -> Option<Pose> {
        self.last_hit
    }

    pub fn surface(&self) -> SurfaceState {
        self.surface
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Request a session, then acquire reference spaces and the hit-test source
    pub async fn start(&mut self) -> Result<&'static str, SessionError> {
        if self.active.is_some() {
            return Err(SessionError::AlreadyActive);
        }

        let (session, descriptor) = self.negotiate().await?;

        let world_space = match acquire_world_space(session.as_ref()).await {
            Ok(space) => space,
            Err(e) => {
                warn!(error = %e, "No world-tracking reference space, ending session");
                end_quietly(session.as_ref()).await;
                return Err(SessionError::ReferenceSpace(e));
            }
        };

        let viewer_space = match session.request_reference_space(ReferenceSpaceKind::Viewer).await {
            Ok(space) => space,
            Err(e) => {
                warn!(error = %e, "No viewer reference space, ending session");
                end_quietly(session.as_ref()).await;
                return Err(SessionError::ReferenceSpace(e));
            }
        };

        let hit_test_source = match session.request_hit_test_source(&viewer_space).await {
            Ok(source) => source,
            Err(e) => {
                let feature_unavailable = e.is_not_supported();
                warn!(error = %e, feature_unavailable, "Hit-test source unavailable, ending session");
                end_quietly(session.as_ref()).await;
                return Err(SessionError::HitTestUnavailable {
                    feature_unavailable,
                    message: e.message,
                });
            }
        };

        info!(
            descriptor,
            world_space = ?world_space.kind,
            "AR session started"
        );

        self.active = Some(ActiveSession {
            session,
            descriptor,
            world_space,
            viewer_space,
            hit_test_source,
        });
        self.last_hit = None;
        self.surface = SurfaceState::Searching;
        self.frame_count = 0;
        self.publish(SessionEvent::Started { descriptor });

        Ok(descriptor)
    }

    async fn negotiate(&self) -> Result<(Arc<dyn XrSession>, &'static str), SessionError> {
        for init in &self.candidates {
            debug!(
                descriptor = init.label,
                required = ?init.required,
                optional = ?init.optional,
                "Requesting immersive AR session"
            );
            match self.runtime.request_session(init).await {
                Ok(session) => return Ok((session, init.label)),
                Err(e) if e.is_not_supported() => {
                    debug!(descriptor = init.label, error = %e, "Descriptor not supported, trying next");
                }
                Err(e) => {
                    warn!(descriptor = init.label, error = %e, "Session request failed");
                    return Err(SessionError::Runtime(e));
                }
            }
        }
        Err(SessionError::NotSupported)
    }

    /// Per-frame surface detection, called once per rendered frame by the host
    pub fn on_frame(&mut self, frame: &dyn XrFrame) -> SurfaceState {
        let Some((source, world_space)) = self
            .active
            .as_ref()
            .map(|a| (a.hit_test_source, a.world_space))
        else {
            return SurfaceState::Searching;
        };

        self.frame_count += 1;
        if (self.frame_count - 1) % self.hit_test_interval != 0 {
            return self.surface;
        }

        let hit = frame
            .hit_test_results(&source)
            .first()
            .and_then(|result| frame.pose(result, &world_space));

        match hit {
            Some(pose) => {
                self.renderer.set_reticle(Some(&pose));
                self.last_hit = Some(pose);
                if self.surface == SurfaceState::Searching {
                    debug!(position = ?pose.position, "Surface found");
                    self.surface = SurfaceState::Active;
                    self.publish(SessionEvent::SurfaceFound(pose));
                }
            }
            None => {
                self.renderer.set_reticle(None);
                if self.surface == SurfaceState::Active {
                    debug!("Surface lost");
                    self.surface = SurfaceState::Searching;
                    self.publish(SessionEvent::SurfaceLost);
                }
            }
        }

        self.surface
    }

    /// Tap/select input: emits a place event at the last known hit
    pub fn on_select(&mut self) -> Result<Pose, SessionError> {
        match self.last_hit {
            Some(pose) if self.active.is_some() => {
                self.publish(SessionEvent::Place(pose));
                Ok(pose)
            }
            _ => {
                warn!("Select with no placement target");
                Err(SessionError::NoPlacementTarget)
            }
        }
    }

    /// End the session explicitly
    pub async fn end(&mut self) {
        if let Some(active) = &self.active {
            if let Err(e) = active.session.end().await {
                warn!(error = %e, "Error ending AR session");
            }
        }
        self.teardown();
    }

    /// The host ended the session (user exit, tracking loss, backgrounding)
    pub fn on_host_end(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        debug!(
            descriptor = active.descriptor,
            viewer_space = active.viewer_space.id,
            "Clearing session state"
        );
        self.last_hit = None;
        self.surface = SurfaceState::Searching;
        self.frame_count = 0;
        self.renderer.set_reticle(None);
        info!("AR session ended");
        self.publish(SessionEvent::Ended);
    }
}

async fn acquire_world_space(session: &dyn XrSession) -> Result<ReferenceSpace, RuntimeError> {
    match session.request_reference_space(ReferenceSpaceKind::LocalFloor).await {
        Ok(space) => Ok(space),
        Err(e) if e.is_not_supported() => {
            debug!("local-floor unsupported, falling back to local");
            session.request_reference_space(ReferenceSpaceKind::Local).await
        }
        Err(e) => Err(e),
    }
}

async fn end_quietly(session: &dyn XrSession) {
    if let Err(e) = session.end().await {
        debug!(error = %e, "Ignoring error while ending failed session");
    }
}
