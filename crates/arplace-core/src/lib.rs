//! arplace Core - Core types, configuration, and asset cache
//!
//! This crate provides the foundational types for the arplace system:
//! - Model descriptors and sub-layer definitions supplied by configuration
//! - Poses and the strongly-typed transform of the placed model
//! - Application configuration with two-stage (remote, built-in) resolution
//! - The per-session asset cache keyed by source URL

pub mod cache;
pub mod config;
pub mod model;
pub mod pose;

pub use cache::{AssetCache, AssetHandle};
pub use config::{
    AppConfig, ConfigError, ConfigOrigin, GestureConfig, NetworkConfig, PerformanceConfig,
    ResolvedConfig, RotationAxes, UiConfig,
};
pub use model::{ModelDescriptor, ModelId, SubLayer};
pub use pose::{ModelTransform, PlacedModelState, Pose};
