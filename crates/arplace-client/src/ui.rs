//! UI façade: panel visibility, progress, instructions and notices

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use arplace_core::UiConfig;
use tracing::debug;

use crate::telemetry::DebugLog;

pub const SEARCHING_TEXT: &str = "Move your phone slowly to find the floor";
pub const TAP_TO_PLACE_TEXT: &str = "Tap to place the model";
pub const MANIPULATE_TEXT: &str = "Drag to rotate, pinch to scale";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Loading,
    Gallery,
    Instructions,
    Unsupported,
    StartButton,
    ModelControls,
    DebugLog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

/// Host-side widgets the façade drives
pub trait UiSurface: Send + Sync {
    fn set_panel_visible(&self, panel: Panel, visible: bool);
    /// `None` hides the progress bar value (indeterminate)
    fn set_progress(&self, percent: Option<u8>);
    fn set_instruction(&self, text: &str);
    fn show_toast(&self, notice: &Notice, duration: Duration);
    fn set_log_lines(&self, lines: &[String]);
}

#[derive(Clone)]
pub struct UiFacade {
    surface: Arc<dyn UiSurface>,
    visible: Arc<Mutex<HashSet<Panel>>>,
    toast_duration: Duration,
    log: DebugLog,
    log_panel_lines: usize,
}

impl UiFacade {
    pub fn new(surface: Arc<dyn UiSurface>, config: &UiConfig, log: DebugLog) -> Self {
        let facade = Self {
            surface,
            visible: Arc::new(Mutex::new(HashSet::new())),
            toast_duration: Duration::from_millis(config.toast_duration_ms),
            log,
            log_panel_lines: config.log_panel_lines.max(1),
        };
        if config.show_debug_panel {
            facade.show(Panel::DebugLog);
            facade.refresh_log();
        }
        facade
    }

    fn panels(&self) -> MutexGuard<'_, HashSet<Panel>> {
        self.visible.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn show(&self, panel: Panel) {
        if self.panels().insert(panel) {
            debug!(?panel, "Show panel");
        }
        self.surface.set_panel_visible(panel, true);
    }

    pub fn hide(&self, panel: Panel) {
        if self.panels().remove(&panel) {
            debug!(?panel, "Hide panel");
        }
        self.surface.set_panel_visible(panel, false);
    }

    pub fn is_visible(&self, panel: Panel) -> bool {
        self.panels().contains(&panel)
    }

    pub fn debug_log(&self) -> &DebugLog {
        &self.log
    }

    pub fn loading_started(&self, model_name: &str) {
        self.show(Panel::Loading);
        self.surface.set_progress(None);
        self.surface.set_instruction(&format!("Loading {}", model_name));
    }

    pub fn loading_progress(&self, percent: u8) {
        self.surface.set_progress(Some(percent.min(100)));
    }

    pub fn loading_finished(&self) {
        self.hide(Panel::Loading);
        self.surface.set_progress(None);
    }

    pub fn show_gallery(&self) {
        self.show(Panel::Gallery);
    }

    pub fn hide_gallery(&self) {
        self.hide(Panel::Gallery);
    }

    /// Device can run AR: offer the start button and the model gallery
    pub fn ready(&self) {
        self.hide(Panel::Unsupported);
        self.show(Panel::StartButton);
        self.show(Panel::Gallery);
    }

    pub fn show_unsupported(&self) {
        self.hide(Panel::StartButton);
        self.hide(Panel::Gallery);
        self.show(Panel::Unsupported);
    }

    pub fn session_started(&self) {
        self.hide(Panel::StartButton);
        self.hide(Panel::Unsupported);
        self.show(Panel::Instructions);
        self.surface_searching();
    }

    pub fn session_ended(&self) {
        for panel in [Panel::Instructions, Panel::ModelControls, Panel::Loading] {
            self.hide(panel);
        }
        self.show(Panel::StartButton);
    }

    pub fn surface_searching(&self) {
        self.surface.set_instruction(SEARCHING_TEXT);
    }

    pub fn surface_found(&self, model_placed: bool) {
        let text = if model_placed { MANIPULATE_TEXT } else { TAP_TO_PLACE_TEXT };
        self.surface.set_instruction(text);
    }

    pub fn model_placed(&self) {
        self.hide(Panel::Gallery);
        self.show(Panel::ModelControls);
        self.surface.set_instruction(MANIPULATE_TEXT);
    }

    pub fn model_cleared(&self) {
        self.hide(Panel::ModelControls);
        self.surface.set_instruction(TAP_TO_PLACE_TEXT);
    }

    pub fn notify_error(&self, message: impl Into<String>) {
        self.surface
            .show_toast(&Notice::Error(message.into()), self.toast_duration);
        self.refresh_log();
    }

    pub fn notify_info(&self, message: impl Into<String>) {
        self.surface
            .show_toast(&Notice::Info(message.into()), self.toast_duration);
    }

    /// Returns whether the debug panel is now visible
    pub fn toggle_debug_panel(&self) -> bool {
        if self.is_visible(Panel::DebugLog) {
            self.hide(Panel::DebugLog);
            false
        } else {
            self.show(Panel::DebugLog);
            self.refresh_log();
            true
        }
    }

    /// Push the buffered log lines to the debug panel when it is open
    pub fn refresh_log(&self) {
        if self.is_visible(Panel::DebugLog) {
            self.surface.set_log_lines(&self.log.tail(self.log_panel_lines));
        }
    }
}
