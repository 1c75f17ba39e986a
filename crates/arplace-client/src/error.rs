//! Application-level errors and their user-facing classification

use arplace_core::ModelId;
use thiserror::Error;

use crate::loader::LoadError;
use crate::session::SessionError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Model {model} could not be parsed: {message}")]
    AssetParse { model: ModelId, message: String },

    #[error("Unknown model: {0}")]
    UnknownModel(ModelId),

    #[error("Model {model} has no layer {node}")]
    UnknownLayer { model: ModelId, node: String },

    #[error("No model is placed")]
    NothingPlaced,
}

/// Coarse error classes the UI reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CapabilityUnsupported,
    Network,
    Aborted,
    AssetParse,
    InputWarning,
    Other,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Session(SessionError::NotSupported | SessionError::HitTestUnavailable { .. }) => {
                ErrorKind::CapabilityUnsupported
            }
            AppError::Session(SessionError::NoPlacementTarget) => ErrorKind::InputWarning,
            AppError::Session(_) => ErrorKind::Other,
            AppError::Load(LoadError::Network { .. }) => ErrorKind::Network,
            AppError::Load(LoadError::Aborted { .. }) => ErrorKind::Aborted,
            AppError::AssetParse { .. } => ErrorKind::AssetParse,
            AppError::UnknownModel(_) | AppError::UnknownLayer { .. } | AppError::NothingPlaced => {
                ErrorKind::InputWarning
            }
        }
    }

    /// Text for the error toast; `None` for errors that are only logged
    pub fn user_message(&self) -> Option<String> {
        match self.kind() {
            ErrorKind::Aborted | ErrorKind::InputWarning => None,
            ErrorKind::CapabilityUnsupported => match self {
                AppError::Session(SessionError::HitTestUnavailable {
                    feature_unavailable: true,
                    ..
                }) => Some("Surface detection is not available on this device".to_string()),
                AppError::Session(SessionError::HitTestUnavailable { .. }) => {
                    Some("Surface detection failed to start".to_string())
                }
                _ => Some("AR is not supported on this device".to_string()),
            },
            ErrorKind::Network => Some("Failed to load model. Check your connection".to_string()),
            ErrorKind::AssetParse => match self {
                AppError::AssetParse { model, .. } => {
                    Some(format!("Failed to display {}, the file may be corrupted", model))
                }
                _ => Some("Failed to display model, the file may be corrupted".to_string()),
            },
            ErrorKind::Other => Some(self.to_string()),
        }
    }
}
