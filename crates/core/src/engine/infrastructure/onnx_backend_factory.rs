use std::path::PathBuf;

use crate::detection::domain::inference_backend::DetectionBackend;
use crate::detection::domain::model_config::ModelConfig;
use crate::detection::infrastructure::onnx_face_detector::OnnxFaceDetector;
use crate::engine::domain::backend_factory::{BackendFactory, LoadError};
use crate::liveness::domain::liveness_classifier::LivenessClassifier;
use crate::liveness::infrastructure::onnx_liveness_classifier::OnnxLivenessClassifier;
use crate::shared::constants::MODEL_EXTENSION;

/// Loads ONNX models from a directory, one file per config: `<dir>/<name>.onnx`.
pub struct OnnxBackendFactory {
    model_dir: PathBuf,
}

impl OnnxBackendFactory {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    pub fn model_path(&self, config: &ModelConfig) -> PathBuf {
        self.model_dir
            .join(format!("{}.{MODEL_EXTENSION}", config.name()))
    }

    fn resolve(&self, config: &ModelConfig) -> Result<PathBuf, LoadError> {
        let path = self.model_path(config);
        if config.name().is_empty() || !path.is_file() {
            return Err(LoadError::NotFound(path));
        }
        log::debug!("Loading model '{}' from {}", config.name(), path.display());
        Ok(path)
    }
}

impl BackendFactory for OnnxBackendFactory {
    fn detection_backend(
        &self,
        config: &ModelConfig,
    ) -> Result<Box<dyn DetectionBackend>, LoadError> {
        let path = self.resolve(config)?;
        match OnnxFaceDetector::new(&path, config) {
            Ok(detector) => Ok(Box::new(detector)),
            Err(e) => Err(LoadError::Backend {
                path,
                message: e.to_string(),
            }),
        }
    }

    fn liveness_classifier(
        &self,
        config: &ModelConfig,
    ) -> Result<Box<dyn LivenessClassifier>, LoadError> {
        let path = self.resolve(config)?;
        match OnnxLivenessClassifier::new(&path, config) {
            Ok(classifier) => Ok(Box::new(classifier)),
            Err(e) => Err(LoadError::Backend {
                path,
                message: e.to_string(),
            }),
        }
    }
}
