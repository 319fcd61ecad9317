use thiserror::Error;

use crate::detection::domain::face_box::FaceBox;
use crate::detection::domain::face_detector::{DetectorSettings, FaceDetector};
use crate::detection::domain::inference_backend::InferenceError;
use crate::detection::domain::model_config::ModelConfig;
use crate::engine::domain::backend_factory::{BackendFactory, LoadError};
use crate::engine::domain::handle_registry::{Handle, HandleRegistry, InstanceRef, InvalidHandle};
use crate::liveness::domain::liveness_engine::{
    LivenessEngine, LivenessError, LivenessModel, LivenessResult, LivenessSettings,
};
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("failed to load model '{name}': {reason}")]
    ModelLoadFailure { name: String, reason: String },
    #[error(transparent)]
    InvalidHandle(#[from] InvalidHandle),
    #[error("inference failed: {0}")]
    InferenceFailure(String),
}

impl From<InferenceError> for EngineError {
    fn from(err: InferenceError) -> Self {
        EngineError::InferenceFailure(err.message().to_string())
    }
}

/// What to build behind a new handle.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineSpec {
    Detector {
        config: ModelConfig,
        settings: DetectorSettings,
    },
    Liveness {
        detector: ModelConfig,
        detector_settings: DetectorSettings,
        models: Vec<ModelConfig>,
        settings: LivenessSettings,
    },
}

impl EngineSpec {
    /// Plain face detector with default thresholds.
    pub fn detector(config: ModelConfig) -> Self {
        EngineSpec::Detector {
            config,
            settings: DetectorSettings::default(),
        }
    }

    /// Detector plus liveness models, default thresholds.
    pub fn liveness(detector: ModelConfig, models: Vec<ModelConfig>) -> Self {
        EngineSpec::Liveness {
            detector,
            detector_settings: DetectorSettings::default(),
            models,
            settings: LivenessSettings::default(),
        }
    }

    /// Name used in log lines: the detector model's name.
    pub fn name(&self) -> &str {
        match self {
            EngineSpec::Detector { config, .. } => config.name(),
            EngineSpec::Liveness { detector, .. } => detector.name(),
        }
    }
}

/// An instance owned by the registry.
pub enum EngineInstance {
    Detector(FaceDetector),
    Liveness(LivenessEngine),
}

/// Result of a liveness call. A frame without faces is an outcome, not an error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LivenessOutcome {
    Scored(LivenessResult),
    NoFace,
}

/// Engine façade: builds instances through a [`BackendFactory`] and serves
/// calls against them by handle.
///
/// Shared across threads; each instance serves one call at a time.
pub struct FaceEngine {
    registry: HandleRegistry<EngineInstance>,
    factory: Box<dyn BackendFactory>,
}

impl FaceEngine {
    pub fn new(factory: Box<dyn BackendFactory>) -> Self {
        Self {
            registry: HandleRegistry::new(),
            factory,
        }
    }

    /// Load every model in `spec` and register the instance.
    ///
    /// Nothing is registered unless all models load.
    pub fn allocate(&self, spec: &EngineSpec) -> Result<Handle, EngineError> {
        let instance = match self.build(spec) {
            Ok(instance) => instance,
            Err(err) => {
                log::warn!("Allocation of '{}' failed: {err}", spec.name());
                return Err(err);
            }
        };
        let handle = self.registry.insert(instance);
        log::info!("Allocated '{}' as handle {handle:#x}", spec.name());
        Ok(handle)
    }

    /// Detect faces, in descending confidence order. Empty means no face.
    pub fn detect(&self, handle: Handle, frame: &Frame) -> Result<Vec<FaceBox>, EngineError> {
        let instance = self.registry.lookup(handle)?;
        let result = with_instance(&instance, |inst| match inst {
            EngineInstance::Detector(detector) => detector.detect(frame),
            EngineInstance::Liveness(engine) => engine.detect_faces(frame),
        })?;
        Ok(result?)
    }

    /// Detect faces and score the top one. Needs a liveness handle.
    pub fn detect_liveness(
        &self,
        handle: Handle,
        frame: &Frame,
    ) -> Result<LivenessOutcome, EngineError> {
        let instance = self.registry.lookup(handle)?;
        let result = with_liveness(&instance, |engine| engine.detect(frame))?;
        match result {
            Ok(scored) => Ok(LivenessOutcome::Scored(scored)),
            Err(LivenessError::NoFaceDetected) => Ok(LivenessOutcome::NoFace),
            Err(LivenessError::Inference(err)) => Err(err.into()),
        }
    }

    /// Score a face box the caller already has. Needs a liveness handle.
    pub fn score_box(
        &self,
        handle: Handle,
        frame: &Frame,
        face: &FaceBox,
    ) -> Result<LivenessResult, EngineError> {
        let instance = self.registry.lookup(handle)?;
        match with_liveness(&instance, |engine| engine.score_box(frame, face))? {
            Ok(scored) => Ok(scored),
            Err(LivenessError::Inference(err)) => Err(err.into()),
            Err(LivenessError::NoFaceDetected) => Err(EngineError::InferenceFailure(
                "no face to score".to_string(),
            )),
        }
    }

    /// Invalidate `handle`. Teardown waits for calls still holding it.
    pub fn release(&self, handle: Handle) -> Result<(), EngineError> {
        self.registry.remove(handle)?;
        log::info!("Released handle {handle:#x}");
        Ok(())
    }

    pub fn live_instances(&self) -> usize {
        self.registry.live_count()
    }

    pub fn in_flight(&self, handle: Handle) -> Option<usize> {
        self.registry.in_flight(handle)
    }

    fn build(&self, spec: &EngineSpec) -> Result<EngineInstance, EngineError> {
        match spec {
            EngineSpec::Detector { config, settings } => {
                Ok(EngineInstance::Detector(self.build_detector(config, *settings)?))
            }
            EngineSpec::Liveness {
                detector,
                detector_settings,
                models,
                settings,
            } => {
                let detector = self.build_detector(detector, *detector_settings)?;
                let models = models
                    .iter()
                    .map(|config| {
                        let classifier = self
                            .factory
                            .liveness_classifier(config)
                            .map_err(|e| load_failure(config, e))?;
                        Ok(LivenessModel {
                            config: config.clone(),
                            classifier,
                        })
                    })
                    .collect::<Result<Vec<_>, EngineError>>()?;
                let engine = LivenessEngine::new(detector, models, *settings).map_err(|e| {
                    EngineError::ModelLoadFailure {
                        name: spec.name().to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(EngineInstance::Liveness(engine))
            }
        }
    }

    fn build_detector(
        &self,
        config: &ModelConfig,
        settings: DetectorSettings,
    ) -> Result<FaceDetector, EngineError> {
        let backend = self
            .factory
            .detection_backend(config)
            .map_err(|e| load_failure(config, e))?;
        Ok(FaceDetector::new(backend, config.clone(), settings))
    }
}

fn load_failure(config: &ModelConfig, err: LoadError) -> EngineError {
    EngineError::ModelLoadFailure {
        name: config.name().to_string(),
        reason: err.to_string(),
    }
}

/// Run `f` on the instance, mapping a poisoned instance to `InferenceFailure`.
fn with_instance<R>(
    instance: &InstanceRef<EngineInstance>,
    f: impl FnOnce(&mut EngineInstance) -> R,
) -> Result<R, EngineError> {
    instance.with(f).ok_or_else(|| {
        EngineError::InferenceFailure(format!(
            "handle {:#x} is unusable after a backend panic",
            instance.handle()
        ))
    })
}

/// Like [`with_instance`], but a detector-only handle is rejected as invalid.
fn with_liveness<R>(
    instance: &InstanceRef<EngineInstance>,
    f: impl FnOnce(&mut LivenessEngine) -> R,
) -> Result<R, EngineError> {
    let handle = instance.handle();
    with_instance(instance, |inst| match inst {
        EngineInstance::Liveness(engine) => Some(f(engine)),
        EngineInstance::Detector(_) => None,
    })?
    .ok_or_else(|| {
        log::debug!("Handle {handle:#x} has no liveness models");
        EngineError::InvalidHandle(InvalidHandle(handle))
    })
}
