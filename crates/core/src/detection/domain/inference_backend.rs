use thiserror::Error;

use crate::detection::domain::model_config::ModelConfig;
use crate::shared::frame::Frame;

/// A raw detection in model-input pixel space, before filtering and mapping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Failure reported by an inference backend.
///
/// A non-recoverable error means the backend is left unusable; the instance
/// that owns it keeps returning the error until released.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct InferenceError {
    message: String,
    recoverable: bool,
}

impl InferenceError {
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            recoverable: true,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            recoverable: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }
}

/// Black-box face detection model.
///
/// Preprocesses the frame to the model input described by `config` and
/// returns raw boxes in model space. Not assumed reentrant, hence `&mut self`.
pub trait DetectionBackend: Send {
    fn infer(
        &mut self,
        frame: &Frame,
        config: &ModelConfig,
    ) -> Result<Vec<RawDetection>, InferenceError>;
}
