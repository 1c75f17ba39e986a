//! App orchestrator: routes UI commands and host input to the components

use arplace_core::{AppConfig, AssetHandle, ModelDescriptor, ModelId, ModelTransform, PlacedModelState, Pose};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};

use crate::error::{AppError, ErrorKind};
use crate::gesture::{GestureController, Rect, TouchEvent};
use crate::host::{SceneRenderer, XrFrame, XrRuntime};
use crate::loader::ModelLoader;
use crate::session::{SessionController, SessionError, SessionEvent, SurfaceState};
use crate::telemetry::DebugLog;
use crate::transport::AssetTransport;
use crate::ui::{UiFacade, UiSurface};

/// Capabilities supplied by the embedding host
pub struct Host {
    pub runtime: Arc<dyn XrRuntime>,
    pub renderer: Arc<dyn SceneRenderer>,
    pub transport: Arc<dyn AssetTransport>,
    pub surface: Arc<dyn UiSurface>,
}

/// User intents raised by buttons and panels
///
/// Overlay pages post these as JSON, e.g. `{"type":"select_model","id":"house1"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiCommand {
    OpenGallery,
    CloseGallery,
    SelectModel { id: ModelId },
    Clear,
    Reload,
    StartAr,
    EndAr,
    CancelLoad,
    SetLayerVisible { node: String, visible: bool },
    ToggleDebugPanel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    Ready,
    Unsupported,
}

pub struct App {
    config: AppConfig,
    runtime: Arc<dyn XrRuntime>,
    renderer: Arc<dyn SceneRenderer>,
    loader: Arc<ModelLoader>,
    ui: UiFacade,
    session: SessionController,
    events: broadcast::Receiver<SessionEvent>,
    gestures: GestureController,
    selected: Option<ModelId>,
    placed: Option<PlacedModelState>,
}

impl App {
    pub fn new(config: AppConfig, host: Host, log: DebugLog) -> Self {
        let session = SessionController::new(host.runtime.clone(), host.renderer.clone(), &config);
        let events = session.subscribe();
        Self {
            ui: UiFacade::new(host.surface, &config.ui, log),
            gestures: GestureController::new(config.gestures.clone()),
            loader: Arc::new(ModelLoader::new(host.transport)),
            runtime: host.runtime,
            renderer: host.renderer,
            session,
            events,
            selected: None,
            placed: None,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn ui(&self) -> &UiFacade {
        &self.ui
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Shared loader, for cancelling from outside a pending command
    pub fn loader(&self) -> Arc<ModelLoader> {
        self.loader.clone()
    }

    pub fn selected(&self) -> Option<&ModelId> {
        self.selected.as_ref()
    }

    pub fn placed(&self) -> Option<&PlacedModelState> {
        self.placed.as_ref()
    }

    /// Screen regions where touches belong to the UI rather than the model
    pub fn set_chrome_regions(&mut self, regions: Vec<Rect>) {
        self.gestures.set_chrome_regions(regions);
    }

    /// Check device support and show the matching entry screen
    pub async fn startup(&mut self) -> Startup {
        info!(models = self.config.models.len(), "Starting arplace");
        if self.runtime.is_session_supported().await {
            self.ui.ready();
            Startup::Ready
        } else {
            warn!("Immersive AR not supported");
            self.ui.show_unsupported();
            Startup::Unsupported
        }
    }

    /// Proceed past the unsupported screen
    pub fn try_anyway(&mut self) {
        info!("Continuing without confirmed AR support");
        self.ui.ready();
    }

    pub async fn handle(&mut self, command: UiCommand) -> Result<(), AppError> {
        debug!(?command, "UI command");
        match self.dispatch(command).await {
            Err(e) if e.kind() == ErrorKind::Aborted => {
                self.report(&e);
                Ok(())
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    async fn dispatch(&mut self, command: UiCommand) -> Result<(), AppError> {
        match command {
            UiCommand::OpenGallery => self.ui.show_gallery(),
            UiCommand::CloseGallery => self.ui.hide_gallery(),
            UiCommand::SelectModel { id } => self.select_model(&id).await?,
            UiCommand::Clear => {
                if !self.clear_placed() {
                    return Err(AppError::NothingPlaced);
                }
            }
            UiCommand::Reload => self.reload().await?,
            UiCommand::StartAr => self.start_ar().await?,
            UiCommand::EndAr => self.end_ar().await,
            UiCommand::CancelLoad => {
                if !self.loader.cancel_current_load() {
                    debug!("Nothing to cancel");
                }
            }
            UiCommand::SetLayerVisible { node, visible } => self.set_layer_visible(&node, visible)?,
            UiCommand::ToggleDebugPanel => {
                self.ui.toggle_debug_panel();
            }
        }
        Ok(())
    }

    fn report(&self, e: &AppError) {
        match e.kind() {
            ErrorKind::Aborted => debug!(error = %e, "Load cancelled"),
            ErrorKind::InputWarning => warn!(error = %e, "Input ignored"),
            _ => error!(error = %e, "Command failed"),
        }
        if let Some(message) = e.user_message() {
            self.ui.notify_error(message);
        }
    }

    fn descriptor(&self, id: &ModelId) -> Result<ModelDescriptor, AppError> {
        self.config
            .model(id.as_str())
            .cloned()
            .ok_or_else(|| AppError::UnknownModel(id.clone()))
    }

    /// Last known hit, or straight ahead of the viewer
    fn placement_pose(&self) -> Pose {
        self.session.last_hit().unwrap_or_else(|| {
            Pose::from_position(Vec3::new(0.0, 0.0, -self.config.performance.fallback_distance))
        })
    }

    /// Replace the placed model with `id`, spawned at the current placement pose
    pub async fn select_model(&mut self, id: &ModelId) -> Result<(), AppError> {
        let descriptor = self.descriptor(id)?;
        self.clear_placed();
        self.selected = Some(descriptor.id.clone());
        self.ui.hide_gallery();

        let result = match self.fetch(&descriptor).await {
            Ok(asset) => {
                let transform = ModelTransform::at_pose(&self.placement_pose(), descriptor.initial_scale());
                self.spawn(&descriptor, &asset, transform, BTreeSet::new()).await
            }
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.selected = None;
        }
        result
    }

    async fn fetch(&self, descriptor: &ModelDescriptor) -> Result<AssetHandle, AppError> {
        info!(model = %descriptor.id, url = %descriptor.url, "Loading model");
        self.ui.loading_started(&descriptor.name);
        let _panel = LoadingPanel(&self.ui);
        let ui = self.ui.clone();
        self.loader
            .load(&descriptor.url, move |percent| ui.loading_progress(percent))
            .await
            .map_err(AppError::from)
    }

    async fn spawn(
        &mut self,
        descriptor: &ModelDescriptor,
        asset: &AssetHandle,
        transform: ModelTransform,
        hidden_layers: BTreeSet<String>,
    ) -> Result<(), AppError> {
        let entity = self
            .renderer
            .spawn_model(asset, &transform)
            .await
            .map_err(|e| AppError::AssetParse {
                model: descriptor.id.clone(),
                message: e.to_string(),
            })?;

        let mut state = PlacedModelState::new(descriptor.id.clone(), entity, transform);
        for node in &hidden_layers {
            self.renderer.set_layer_visible(entity, node, false);
            state.set_layer_visible(node, false);
        }

        info!(model = %descriptor.id, entity, bytes = asset.len(), "Model placed");
        self.placed = Some(state);
        self.gestures.attach();
        self.ui.model_placed();
        Ok(())
    }

    /// Remove the placed instance; returns whether there was one
    fn clear_placed(&mut self) -> bool {
        let Some(placed) = self.placed.take() else {
            return false;
        };
        self.gestures.detach();
        self.renderer.despawn(placed.entity);
        self.ui.model_cleared();
        debug!(model = %placed.model, entity = placed.entity, "Model cleared");
        true
    }

    /// Recreate the placed model from its own transform and layer state
    async fn reload(&mut self) -> Result<(), AppError> {
        let Some(previous) = self.placed.clone() else {
            return Err(AppError::NothingPlaced);
        };
        let descriptor = self.descriptor(&previous.model)?;
        let asset = self.fetch(&descriptor).await?;

        // The old instance stays in the scene unless its replacement spawns
        self.spawn(&descriptor, &asset, previous.transform, previous.hidden_layers)
            .await?;
        self.renderer.despawn(previous.entity);
        debug!(model = %previous.model, entity = previous.entity, "Replaced model instance");
        self.ui.notify_info(format!("Reloaded {}", descriptor.name));
        Ok(())
    }

    fn set_layer_visible(&mut self, node: &str, visible: bool) -> Result<(), AppError> {
        let Some(placed) = self.placed.as_mut() else {
            return Err(AppError::NothingPlaced);
        };
        let has_layer = self
            .config
            .model(placed.model.as_str())
            .is_some_and(|m| m.layer(node).is_some());
        if !has_layer {
            return Err(AppError::UnknownLayer {
                model: placed.model.clone(),
                node: node.to_string(),
            });
        }

        placed.set_layer_visible(node, visible);
        self.renderer.set_layer_visible(placed.entity, node, visible);
        Ok(())
    }

    async fn place_at(&mut self, pose: Pose) -> Result<(), AppError> {
        if self.loader.is_loading() {
            debug!("Place ignored while a model is loading");
            return Ok(());
        }

        if let Some(placed) = self.placed.as_mut() {
            placed.transform.set_position(pose.position);
            self.renderer.set_transform(placed.entity, &placed.transform);
            debug!(entity = placed.entity, position = ?pose.position, "Moved placed model");
            return Ok(());
        }

        let id = match &self.selected {
            Some(id) => id.clone(),
            None => match self.config.first_model() {
                Some(first) => first.id.clone(),
                None => return Err(AppError::NothingPlaced),
            },
        };
        self.select_model(&id).await
    }

    async fn start_ar(&mut self) -> Result<(), AppError> {
        let result = self.session.start().await;
        self.pump_session_events();
        if result == Err(SessionError::NotSupported) {
            self.ui.show_unsupported();
        }
        result?;
        Ok(())
    }

    async fn end_ar(&mut self) {
        self.session.end().await;
        self.pump_session_events();
    }

    /// Apply queued session events to the UI and the placed model
    fn pump_session_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.apply_session_event(event),
                Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "Session events lagged"),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    fn apply_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Started { descriptor } => {
                info!(descriptor, "AR session started");
                self.ui.session_started();
            }
            SessionEvent::SurfaceFound(_) => self.ui.surface_found(self.placed.is_some()),
            SessionEvent::SurfaceLost => self.ui.surface_searching(),
            // Placement runs from on_select, which owns the async work
            SessionEvent::Place(_) => {}
            SessionEvent::Ended => {
                self.clear_placed();
                self.ui.session_ended();
            }
        }
    }

    /// Per-frame host callback
    pub fn on_frame(&mut self, frame: &dyn XrFrame) -> SurfaceState {
        let state = self.session.on_frame(frame);
        self.pump_session_events();
        state
    }

    /// Host tap/select input
    pub async fn on_select(&mut self) -> Result<(), AppError> {
        let pose = match self.session.on_select() {
            Ok(pose) => pose,
            Err(e) => {
                self.report(&AppError::from(e));
                return Ok(());
            }
        };
        self.pump_session_events();

        let result = self.place_at(pose).await;
        match result {
            Err(e) if e.kind() == ErrorKind::Aborted => {
                self.report(&e);
                Ok(())
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    /// Host touch input; returns true when the placed model moved
    pub fn on_touch(&mut self, event: &TouchEvent) -> bool {
        let Some(placed) = self.placed.as_mut() else {
            return false;
        };
        if !self.gestures.handle(event, &mut placed.transform) {
            return false;
        }
        self.renderer.set_transform(placed.entity, &placed.transform);
        true
    }

    /// The host ended the session on its own
    pub fn on_session_end(&mut self) {
        self.session.on_host_end();
        self.pump_session_events();
    }
}

/// Hides the loading panel when a fetch ends, including when it is dropped
struct LoadingPanel<'a>(&'a UiFacade);

impl Drop for LoadingPanel<'_> {
    fn drop(&mut self) {
        self.0.loading_finished();
    }
}
