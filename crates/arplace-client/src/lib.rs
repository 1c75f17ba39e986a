//! arplace Client - AR placement logic over host-supplied capabilities
//!
//! The AR runtime, the scene renderer and the UI widgets are provided by the
//! embedding host through the traits in [`host`], [`transport`] and [`ui`].
//! This crate coordinates them:
//! - [`session`] negotiates the immersive session and polls surface detection
//! - [`loader`] downloads model assets with progress, cancellation and caching
//! - [`gesture`] turns touch input into rotate/scale updates
//! - [`app`] wires everything to UI commands

pub mod app;
pub mod config_source;
pub mod error;
pub mod gesture;
pub mod host;
pub mod loader;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod ui;

#[cfg(test)]
mod test_support;

pub use app::{App, Host, Startup, UiCommand};
pub use config_source::{resolve_config, ConfigSource, HttpConfigSource};
pub use error::{AppError, ErrorKind};
pub use gesture::{GestureController, GestureState, Rect, TouchEvent, TouchPhase, TouchPoint};
pub use loader::{LoadError, ModelLoader};
pub use session::{SessionController, SessionError, SessionEvent, SurfaceState};
pub use telemetry::DebugLog;
pub use transport::{AssetTransport, FetchResponse, HttpTransport, TransportError};
pub use ui::{Notice, Panel, UiFacade, UiSurface};
