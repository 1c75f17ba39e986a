//! In-memory host doubles shared by the unit tests

use arplace_core::{AssetHandle, ModelTransform, Pose};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use crate::host::*;
use crate::transport::{AssetTransport, FetchResponse, TransportError};
use crate::ui::{Notice, Panel, UiSurface};

pub struct MockSession {
    pub local_floor_supported: bool,
    pub hit_test_error: Mutex<Option<RuntimeError>>,
    /// Reference space requests that fail with the paired error
    pub space_errors: Mutex<Vec<(ReferenceSpaceKind, RuntimeError)>>,
    pub spaces: Mutex<Vec<ReferenceSpaceKind>>,
    pub ended: AtomicBool,
    pub next_id: AtomicU32,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            local_floor_supported: true,
            hit_test_error: Mutex::new(None),
            space_errors: Mutex::new(Vec::new()),
            spaces: Mutex::new(Vec::new()),
            ended: AtomicBool::new(false),
            next_id: AtomicU32::new(1),
        }
    }

    pub fn fail_space(self, kind: ReferenceSpaceKind, error: RuntimeError) -> Self {
        self.space_errors.lock().unwrap().push((kind, error));
        self
    }
}

#[async_trait]
impl XrSession for MockSession {
    async fn request_reference_space(
        &self,
        kind: ReferenceSpaceKind,
    ) -> Result<ReferenceSpace, RuntimeError> {
        self.spaces.lock().unwrap().push(kind);
        if let Some((_, e)) = self.space_errors.lock().unwrap().iter().find(|(k, _)| *k == kind) {
            return Err(e.clone());
        }
        if kind == ReferenceSpaceKind::LocalFloor && !self.local_floor_supported {
            return Err(RuntimeError::not_supported("local-floor"));
        }
        Ok(ReferenceSpace {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
        })
    }

    async fn request_hit_test_source(&self, _space: &ReferenceSpace) -> Result<HitTestSource, RuntimeError> {
        match self.hit_test_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(HitTestSource { id: 99 }),
        }
    }

    async fn end(&self) -> Result<(), RuntimeError> {
        self.ended.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockRuntime {
    pub supported: bool,
    /// Outcome per request, in order; requests past the end succeed
    pub outcomes: Mutex<VecDeque<Result<(), RuntimeError>>>,
    pub attempts: Mutex<Vec<SessionInit>>,
    pub session: Arc<MockSession>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::with_session(MockSession::new())
    }

    pub fn with_session(session: MockSession) -> Self {
        Self {
            supported: true,
            outcomes: Mutex::new(VecDeque::new()),
            attempts: Mutex::new(Vec::new()),
            session: Arc::new(session),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub fn push_outcome(&self, outcome: Result<(), RuntimeError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn attempt_labels(&self) -> Vec<&'static str> {
        self.attempts.lock().unwrap().iter().map(|i| i.label).collect()
    }
}

#[async_trait]
impl XrRuntime for MockRuntime {
    async fn is_session_supported(&self) -> bool {
        self.supported
    }

    async fn request_session(&self, init: &SessionInit) -> Result<Arc<dyn XrSession>, RuntimeError> {
        self.attempts.lock().unwrap().push(init.clone());
        match self.outcomes.lock().unwrap().pop_front() {
            Some(Err(e)) => Err(e),
            _ => Ok(self.session.clone() as Arc<dyn XrSession>),
        }
    }
}

/// A frame with at most one hit
pub struct MockFrame {
    pub hit: Option<Pose>,
}

impl MockFrame {
    pub fn hit(pose: Pose) -> Self {
        Self { hit: Some(pose) }
    }

    pub fn miss() -> Self {
        Self { hit: None }
    }
}

impl XrFrame for MockFrame {
    fn hit_test_results(&self, _source: &HitTestSource) -> Vec<HitTestResult> {
        self.hit.iter().map(|_| HitTestResult(0)).collect()
    }

    fn pose(&self, _result: &HitTestResult, _space: &ReferenceSpace) -> Option<Pose> {
        self.hit
    }
}

#[derive(Default)]
pub struct MockRenderer {
    next_id: AtomicU64,
    pub spawned: Mutex<Vec<(EntityId, String, ModelTransform)>>,
    pub despawned: Mutex<Vec<EntityId>>,
    pub transforms: Mutex<HashMap<EntityId, ModelTransform>>,
    pub layers: Mutex<Vec<(EntityId, String, bool)>>,
    pub reticle: Mutex<Option<Pose>>,
    /// Source URLs whose bodies fail to parse
    pub reject: Mutex<HashSet<String>>,
}

impl MockRenderer {
    pub fn live_entities(&self) -> usize {
        self.spawned.lock().unwrap().len() - self.despawned.lock().unwrap().len()
    }

    pub fn transform(&self, entity: EntityId) -> Option<ModelTransform> {
        self.transforms.lock().unwrap().get(&entity).copied()
    }
}

#[async_trait]
impl SceneRenderer for MockRenderer {
    async fn spawn_model(
        &self,
        asset: &AssetHandle,
        transform: &ModelTransform,
    ) -> Result<EntityId, RenderError> {
        if self.reject.lock().unwrap().contains(asset.source_url()) || !asset.is_valid() {
            return Err(RenderError::Parse("invalid glTF header".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.spawned
            .lock()
            .unwrap()
            .push((id, asset.source_url().to_string(), *transform));
        self.transforms.lock().unwrap().insert(id, *transform);
        Ok(id)
    }

    fn set_transform(&self, entity: EntityId, transform: &ModelTransform) {
        self.transforms.lock().unwrap().insert(entity, *transform);
    }

    fn set_layer_visible(&self, entity: EntityId, node: &str, visible: bool) {
        self.layers.lock().unwrap().push((entity, node.to_string(), visible));
    }

    fn despawn(&self, entity: EntityId) {
        self.despawned.lock().unwrap().push(entity);
        self.transforms.lock().unwrap().remove(&entity);
    }

    fn set_reticle(&self, pose: Option<&Pose>) {
        *self.reticle.lock().unwrap() = pose.copied();
    }
}

#[derive(Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub chunks: Vec<Bytes>,
    /// Never finish the body after the listed chunks
    pub stall: bool,
    /// Hold the response until notified
    pub gate: Option<Arc<Notify>>,
}

impl MockResponse {
    pub fn ok(chunk_sizes: &[usize], declare_length: bool) -> Self {
        let chunks: Vec<Bytes> = chunk_sizes.iter().map(|&n| Bytes::from(vec![0x42u8; n])).collect();
        let total: usize = chunk_sizes.iter().sum();
        Self {
            status: 200,
            content_length: declare_length.then_some(total as u64),
            chunks,
            stall: false,
            gate: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_length: Some(9),
            chunks: vec![Bytes::from_static(b"not found")],
            stall: false,
            gate: None,
        }
    }
}

#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<String, MockResponse>>,
    pub requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: MockResponse) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl AssetTransport for MockTransport {
    async fn get(&self, url: &str) -> Result<FetchResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
        let response = self
            .responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError(format!("connection refused: {}", url)))?;

        if let Some(gate) = &response.gate {
            gate.notified().await;
        }

        let chunks = stream::iter(response.chunks.into_iter().map(Ok::<Bytes, TransportError>));
        let body = if response.stall {
            chunks.chain(stream::pending()).boxed()
        } else {
            chunks.boxed()
        };

        Ok(FetchResponse {
            status: response.status,
            content_length: response.content_length,
            body,
        })
    }
}

#[derive(Default)]
pub struct RecordingSurface {
    pub panels: Mutex<HashMap<Panel, bool>>,
    pub progress: Mutex<Vec<Option<u8>>>,
    pub instruction: Mutex<String>,
    pub toasts: Mutex<Vec<Notice>>,
    pub log_lines: Mutex<Vec<String>>,
}

impl RecordingSurface {
    pub fn is_visible(&self, panel: Panel) -> bool {
        self.panels.lock().unwrap().get(&panel).copied().unwrap_or(false)
    }

    pub fn last_toast(&self) -> Option<Notice> {
        self.toasts.lock().unwrap().last().cloned()
    }

    pub fn instruction(&self) -> String {
        self.instruction.lock().unwrap().clone()
    }
}

impl UiSurface for RecordingSurface {
    fn set_panel_visible(&self, panel: Panel, visible: bool) {
        self.panels.lock().unwrap().insert(panel, visible);
    }

    fn set_progress(&self, percent: Option<u8>) {
        self.progress.lock().unwrap().push(percent);
    }

    fn set_instruction(&self, text: &str) {
        *self.instruction.lock().unwrap() = text.to_string();
    }

    fn show_toast(&self, notice: &Notice, _duration: Duration) {
        self.toasts.lock().unwrap().push(notice.clone());
    }

    fn set_log_lines(&self, lines: &[String]) {
        *self.log_lines.lock().unwrap() = lines.to_vec();
    }
}

/// Yield until a condition holds (bounded so a broken test fails instead of hanging)
pub async fn yield_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
