//! Poses, model transforms, and the placed model instance

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::ModelId;

/// A rigid pose in the world-tracking reference space (Y up, meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    /// Yaw component of the orientation (rotation about +Y), in radians
    pub fn yaw(&self) -> f32 {
        let (yaw, _, _) = self.orientation.to_euler(EulerRot::YXZ);
        yaw
    }
}

/// Transform of a placed model: position, Euler rotation, per-axis scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelTransform {
    pub position: Vec3,
    /// Rotation in radians: x = pitch, y = yaw, z = roll
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl ModelTransform {
    /// Place a model at a hit pose, keeping only the pose's heading
    pub fn at_pose(pose: &Pose, uniform_scale: f32) -> Self {
        Self {
            position: pose.position,
            rotation: Vec3::new(0.0, pose.yaw(), 0.0),
            scale: Vec3::splat(uniform_scale),
        }
    }

    pub fn pitch(&self) -> f32 {
        self.rotation.x
    }

    pub fn yaw(&self) -> f32 {
        self.rotation.y
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    /// Orientation as a quaternion for the renderer
    pub fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, self.rotation.z)
    }
}

/// The single placed model instance
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedModelState {
    pub model: ModelId,
    /// Renderer entity backing this instance
    pub entity: u64,
    pub transform: ModelTransform,
    /// Sub-layer node names currently hidden (default: all visible)
    pub hidden_layers: BTreeSet<String>,
}

impl PlacedModelState {
    pub fn new(model: ModelId, entity: u64, transform: ModelTransform) -> Self {
        Self {
            model,
            entity,
            transform,
            hidden_layers: BTreeSet::new(),
        }
    }

    pub fn is_layer_visible(&self, node: &str) -> bool {
        !self.hidden_layers.contains(node)
    }

    pub fn set_layer_visible(&mut self, node: &str, visible: bool) {
        if visible {
            self.hidden_layers.remove(node);
        } else {
            self.hidden_layers.insert(node.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_at_pose_keeps_heading_only() {
        let tilted = Quat::from_euler(EulerRot::YXZ, FRAC_PI_2, 0.3, 0.0);
        let pose = Pose::new(Vec3::new(1.0, 0.0, -2.0), tilted);
        let transform = ModelTransform::at_pose(&pose, 0.5);

        assert_eq!(transform.position, Vec3::new(1.0, 0.0, -2.0));
        assert!((transform.yaw() - FRAC_PI_2).abs() < 1e-5);
        assert_eq!(transform.pitch(), 0.0);
        assert_eq!(transform.scale, Vec3::splat(0.5));
    }

    #[test]
    fn test_layer_visibility() {
        let mut placed = PlacedModelState::new(ModelId::from("house1"), 7, ModelTransform::default());
        assert!(placed.is_layer_visible("roof"));
        placed.set_layer_visible("roof", false);
        assert!(!placed.is_layer_visible("roof"));
        placed.set_layer_visible("roof", true);
        assert!(placed.hidden_layers.is_empty());
    }
}
