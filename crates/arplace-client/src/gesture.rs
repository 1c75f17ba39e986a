//! Touch gestures: one-finger rotate, two-finger pinch scale

use arplace_core::{GestureConfig, ModelTransform, RotationAxes};
use glam::{Vec2, Vec3};
use std::collections::HashSet;
use tracing::trace;

/// Contact distances below this are treated as coincident
const MIN_PINCH_DISTANCE: f32 = 1.0;

/// A screen-space rectangle in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            min: Vec2::new(x, y),
            max: Vec2::new(x + width, y + height),
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub id: u64,
    pub position: Vec2,
}

impl TouchPoint {
    pub fn new(id: u64, x: f32, y: f32) -> Self {
        Self {
            id,
            position: Vec2::new(x, y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

/// A touch event as delivered by the host
#[derive(Debug, Clone, PartialEq)]
pub struct TouchEvent {
    pub phase: TouchPhase,
    /// Contacts still on the screen after this event
    pub touches: Vec<TouchPoint>,
    /// Contacts that started, moved, or ended in this event
    pub changed: Vec<TouchPoint>,
}

impl TouchEvent {
    pub fn new(phase: TouchPhase, touches: Vec<TouchPoint>, changed: Vec<TouchPoint>) -> Self {
        Self {
            phase,
            touches,
            changed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Rotating {
        id: u64,
        last: Vec2,
    },
    /// Pinch between the two contacts in `ids`
    Scaling {
        ids: (u64, u64),
        last_distance: f32,
    },
}

/// Turns touch sequences into rotate/scale updates on the placed model
pub struct GestureController {
    config: GestureConfig,
    state: GestureState,
    chrome: Vec<Rect>,
    /// Contacts that began on UI chrome; they never take part in a gesture
    ignored: HashSet<u64>,
    attached: bool,
}

impl GestureController {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: GestureState::Idle,
            chrome: Vec::new(),
            ignored: HashSet::new(),
            attached: false,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Start driving the placed model
    pub fn attach(&mut self) {
        self.attached = true;
        self.state = GestureState::Idle;
    }

    pub fn detach(&mut self) {
        self.attached = false;
        self.state = GestureState::Idle;
        self.ignored.clear();
    }

    /// Screen regions occupied by buttons and panels
    pub fn set_chrome_regions(&mut self, regions: Vec<Rect>) {
        self.chrome = regions;
    }

    fn on_chrome(&self, point: Vec2) -> bool {
        self.chrome.iter().any(|r| r.contains(point))
    }

    /// Process one touch event; returns true when the transform changed
    pub fn handle(&mut self, event: &TouchEvent, transform: &mut ModelTransform) -> bool {
        if !self.attached {
            return false;
        }

        if event.phase == TouchPhase::Start {
            for touch in &event.changed {
                if self.on_chrome(touch.position) {
                    trace!(id = touch.id, "Touch on UI chrome ignored");
                    self.ignored.insert(touch.id);
                }
            }
        }

        let active: Vec<TouchPoint> = event
            .touches
            .iter()
            .filter(|t| !self.ignored.contains(&t.id))
            .copied()
            .collect();

        let changed = match event.phase {
            TouchPhase::Move => self.apply_move(&active, transform),
            _ => false,
        };

        if matches!(event.phase, TouchPhase::End | TouchPhase::Cancel) {
            for touch in &event.changed {
                self.ignored.remove(&touch.id);
            }
        }

        self.transition(event.phase, &active);
        changed
    }

    fn transition(&mut self, phase: TouchPhase, active: &[TouchPoint]) {
        let next = match (active, self.state) {
            ([], _) => GestureState::Idle,
            ([first, second, ..], state) if self.config.scale_enabled => match state {
                // The baseline only carries over while the same pair keeps moving
                GestureState::Scaling { ids, .. }
                    if phase == TouchPhase::Move && ids == (first.id, second.id) =>
                {
                    state
                }
                _ => GestureState::Scaling {
                    ids: (first.id, second.id),
                    last_distance: first.position.distance(second.position),
                },
            },
            (_, GestureState::Rotating { id, .. }) if active.iter().any(|t| t.id == id) => self.state,
            ([first, ..], _) if self.config.rotation_enabled => GestureState::Rotating {
                id: first.id,
                last: first.position,
            },
            _ => GestureState::Idle,
        };

        if next != self.state {
            trace!(from = ?self.state, to = ?next, "Gesture state change");
        }
        self.state = next;
    }

    fn apply_move(&mut self, active: &[TouchPoint], transform: &mut ModelTransform) -> bool {
        match self.state {
            GestureState::Idle => false,
            GestureState::Rotating { id, last } => {
                let Some(touch) = active.iter().find(|t| t.id == id) else {
                    return false;
                };
                let delta = touch.position - last;
                self.state = GestureState::Rotating {
                    id,
                    last: touch.position,
                };
                if delta == Vec2::ZERO {
                    return false;
                }

                transform.rotation.y += delta.x * self.config.rotation_speed;
                if self.config.rotation_axes == RotationAxes::Both {
                    transform.rotation.x += delta.y * self.config.rotation_speed;
                }
                true
            }
            GestureState::Scaling { ids, last_distance } => {
                let (Some(first), Some(second)) = (
                    active.iter().find(|t| t.id == ids.0),
                    active.iter().find(|t| t.id == ids.1),
                ) else {
                    return false;
                };
                let distance = first.position.distance(second.position);
                self.state = GestureState::Scaling {
                    ids,
                    last_distance: distance,
                };
                if distance == last_distance
                    || last_distance < MIN_PINCH_DISTANCE
                    || distance < MIN_PINCH_DISTANCE
                {
                    return false;
                }

                let ratio = distance / last_distance;
                let factor = (1.0 + (ratio - 1.0) * self.config.scale_speed * self.config.scale_amplification)
                    .max(0.0);
                let scaled = transform.scale * factor;
                transform.set_scale(scaled.clamp(
                    Vec3::splat(self.config.min_scale),
                    Vec3::splat(self.config.max_scale),
                ));
                true
            }
        }
    }
}
