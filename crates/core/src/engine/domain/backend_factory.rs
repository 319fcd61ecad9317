use std::path::PathBuf;

use thiserror::Error;

use crate::detection::domain::inference_backend::DetectionBackend;
use crate::detection::domain::model_config::ModelConfig;
use crate::liveness::domain::liveness_classifier::LivenessClassifier;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("model file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to load {}: {message}", .path.display())]
    Backend { path: PathBuf, message: String },
}

/// Loads inference backends for the models an engine instance is built from.
///
/// Shared by every allocation, so implementations must be thread-safe. Each
/// call returns a fresh backend owned exclusively by one instance.
pub trait BackendFactory: Send + Sync {
    fn detection_backend(
        &self,
        config: &ModelConfig,
    ) -> Result<Box<dyn DetectionBackend>, LoadError>;

    fn liveness_classifier(
        &self,
        config: &ModelConfig,
    ) -> Result<Box<dyn LivenessClassifier>, LoadError>;
}
