use thiserror::Error;

use crate::detection::domain::face_box::FaceBox;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::inference_backend::InferenceError;
use crate::detection::domain::model_config::{ModelConfig, ModelConfigError};
use crate::liveness::domain::crop_region::crop_region;
use crate::liveness::domain::liveness_classifier::LivenessClassifier;
use crate::shared::constants::DEFAULT_LIVE_THRESHOLD;
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LivenessError {
    /// Not a failure: the frame simply has no face to score.
    #[error("no face detected")]
    NoFaceDetected,
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LivenessSettings {
    pub live_threshold: f32,
}

impl Default for LivenessSettings {
    fn default() -> Self {
        Self {
            live_threshold: DEFAULT_LIVE_THRESHOLD,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LivenessResult {
    pub face: FaceBox,
    /// Mean live-class probability across the loaded models, in `[0, 1]`.
    pub score: f32,
    pub is_live: bool,
}

/// One anti-spoofing model and the crop geometry it was trained with.
pub struct LivenessModel {
    pub config: ModelConfig,
    pub classifier: Box<dyn LivenessClassifier>,
}

/// Detector plus one or more anti-spoofing classifiers scoring the
/// highest-confidence face.
pub struct LivenessEngine {
    detector: FaceDetector,
    models: Vec<LivenessModel>,
    settings: LivenessSettings,
    failure: Option<InferenceError>,
}

impl LivenessEngine {
    /// Requires at least one liveness model.
    pub fn new(
        detector: FaceDetector,
        models: Vec<LivenessModel>,
        settings: LivenessSettings,
    ) -> Result<Self, ModelConfigError> {
        if models.is_empty() {
            return Err(ModelConfigError::Empty);
        }
        Ok(Self {
            detector,
            models,
            settings,
            failure: None,
        })
    }

    /// Faces only, without liveness scoring.
    ///
    /// Fails once any classifier has failed unrecoverably.
    pub fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, InferenceError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        self.detector.detect(frame)
    }

    /// Detect faces and score the top one.
    pub fn detect(&mut self, frame: &Frame) -> Result<LivenessResult, LivenessError> {
        let faces = self.detect_faces(frame)?;
        let top = faces.first().ok_or(LivenessError::NoFaceDetected)?;
        self.score_box(frame, top)
    }

    /// Score a face box supplied by the caller.
    pub fn score_box(
        &mut self,
        frame: &Frame,
        face: &FaceBox,
    ) -> Result<LivenessResult, LivenessError> {
        if let Some(err) = &self.failure {
            return Err(err.clone().into());
        }

        let mut total = 0.0f32;
        for model in &mut self.models {
            let region = crop_region(face, &model.config, frame.width(), frame.height());
            let score = match model.classifier.classify(frame, region) {
                Ok(score) if score.is_finite() => score.clamp(0.0, 1.0),
                Ok(score) => {
                    return Err(InferenceError::recoverable(format!(
                        "liveness model '{}' returned {score}",
                        model.config.name()
                    ))
                    .into())
                }
                Err(err) => {
                    if !err.is_recoverable() {
                        log::warn!(
                            "Liveness model '{}' failed unrecoverably: {err}",
                            model.config.name()
                        );
                        self.failure = Some(err.clone());
                    }
                    return Err(err.into());
                }
            };
            log::debug!("Liveness model '{}' scored {score:.3}", model.config.name());
            total += score;
        }

        let score = total / self.models.len() as f32;
        Ok(LivenessResult {
            face: *face,
            score,
            is_live: score >= self.settings.live_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_detector::DetectorSettings;
    use crate::detection::domain::inference_backend::{DetectionBackend, RawDetection};
    use crate::liveness::domain::crop_region::CropRegion;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    struct FixedBackend(Vec<RawDetection>);

    impl DetectionBackend for FixedBackend {
        fn infer(
            &mut self,
            _frame: &Frame,
            _config: &ModelConfig,
        ) -> Result<Vec<RawDetection>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    struct FixedClassifier {
        result: Result<f32, InferenceError>,
        seen: Arc<Mutex<Vec<CropRegion>>>,
    }

    impl LivenessClassifier for FixedClassifier {
        fn classify(
            &mut self,
            _frame: &Frame,
            region: CropRegion,
        ) -> Result<f32, InferenceError> {
            self.seen.lock().unwrap().push(region);
            self.result.clone()
        }
    }

    fn frame() -> Frame {
        Frame::new(vec![0u8; 200 * 200 * 3], 200, 200)
    }

    fn detector(raw: Vec<RawDetection>) -> FaceDetector {
        let config = ModelConfig::letterbox("det", 200, 200, 1.0, 0.0, 0.0).unwrap();
        FaceDetector::new(
            Box::new(FixedBackend(raw)),
            config,
            DetectorSettings::default(),
        )
    }

    fn model(
        scale: f32,
        result: Result<f32, InferenceError>,
    ) -> (LivenessModel, Arc<Mutex<Vec<CropRegion>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let model = LivenessModel {
            config: ModelConfig::letterbox("live", 80, 80, scale, 0.0, 0.0).unwrap(),
            classifier: Box::new(FixedClassifier {
                result,
                seen: seen.clone(),
            }),
        };
        (model, seen)
    }

    fn engine_with(
        detector: FaceDetector,
        m: LivenessModel,
        settings: LivenessSettings,
    ) -> LivenessEngine {
        LivenessEngine::new(detector, vec![m], settings).unwrap()
    }

    fn one_face_engine(m: LivenessModel) -> LivenessEngine {
        engine_with(
            detector(vec![face(0.9, 0.0, 0.0)]),
            m,
            LivenessSettings::default(),
        )
    }

    fn face(confidence: f32, x1: f32, y1: f32) -> RawDetection {
        RawDetection {
            confidence,
            x1,
            y1,
            x2: x1 + 39.0,
            y2: y1 + 39.0,
        }
    }

    #[test]
    fn test_requires_a_model() {
        let result =
            LivenessEngine::new(detector(Vec::new()), Vec::new(), LivenessSettings::default());
        assert!(matches!(result, Err(ModelConfigError::Empty)));
    }

    #[test]
    fn test_no_face_is_reported_distinctly() {
        let (m, seen) = model(1.0, Ok(0.99));
        let mut engine = engine_with(detector(Vec::new()), m, LivenessSettings::default());

        assert_eq!(engine.detect(&frame()), Err(LivenessError::NoFaceDetected));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_scores_top_face() {
        let (m, seen) = model(1.0, Ok(0.97));
        let faces = vec![face(0.7, 120.0, 120.0), face(0.95, 10.0, 10.0)];
        let mut engine = engine_with(detector(faces), m, LivenessSettings::default());

        let result = engine.detect(&frame()).unwrap();

        assert_relative_eq!(result.face.confidence, 0.95);
        assert_relative_eq!(result.score, 0.97);
        assert!(result.is_live);
        assert_eq!(seen.lock().unwrap()[0].x, 10);
    }

    #[test]
    fn test_score_is_mean_across_models() {
        let (a, _) = model(2.7, Ok(0.9));
        let (b, _) = model(4.0, Ok(0.5));
        let mut engine = LivenessEngine::new(
            detector(vec![face(0.9, 80.0, 80.0)]),
            vec![a, b],
            LivenessSettings::default(),
        )
        .unwrap();

        let result = engine.detect(&frame()).unwrap();

        assert_relative_eq!(result.score, 0.7);
        assert!(!result.is_live);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let (m, _) = model(1.0, Ok(0.5));
        let settings = LivenessSettings { live_threshold: 0.5 };
        let mut engine = engine_with(detector(vec![face(0.9, 0.0, 0.0)]), m, settings);
        assert!(engine.detect(&frame()).unwrap().is_live);
    }

    #[test]
    fn test_score_box_uses_caller_box() {
        let (m, seen) = model(1.0, Ok(0.2));
        let mut engine = engine_with(detector(Vec::new()), m, LivenessSettings::default());
        let host_box = FaceBox::new(0.0, 50.0, 60.0, 89.0, 99.0);

        let result = engine.score_box(&frame(), &host_box).unwrap();

        assert_eq!(result.face, host_box);
        assert_eq!(
            seen.lock().unwrap()[0],
            CropRegion {
                x: 50,
                y: 60,
                width: 40,
                height: 40
            }
        );
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        let (m, _) = model(1.0, Ok(1.4));
        let mut engine = one_face_engine(m);
        assert_eq!(engine.detect(&frame()).unwrap().score, 1.0);
    }

    #[test]
    fn test_nan_score_is_inference_failure() {
        let (m, _) = model(1.0, Ok(f32::NAN));
        let mut engine = one_face_engine(m);
        assert!(matches!(
            engine.detect(&frame()),
            Err(LivenessError::Inference(_))
        ));
    }

    #[test]
    fn test_fatal_classifier_failure_sticks() {
        let (m, seen) = model(1.0, Err(InferenceError::fatal("classifier gone")));
        let mut engine = one_face_engine(m);

        assert!(engine.detect(&frame()).is_err());
        assert!(engine.detect(&frame()).is_err());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_fatal_classifier_failure_also_blocks_detection() {
        let (m, _) = model(1.0, Err(InferenceError::fatal("classifier gone")));
        let mut engine = one_face_engine(m);
        assert_eq!(engine.detect_faces(&frame()).unwrap().len(), 1);

        let host_box = FaceBox::new(1.0, 10.0, 10.0, 49.0, 49.0);
        assert!(engine.score_box(&frame(), &host_box).is_err());

        assert_eq!(
            engine.detect_faces(&frame()),
            Err(InferenceError::fatal("classifier gone"))
        );
    }

    #[test]
    fn test_recoverable_classifier_failure_keeps_detection() {
        let (m, _) = model(1.0, Err(InferenceError::recoverable("busy")));
        let mut engine = one_face_engine(m);

        assert!(engine.detect(&frame()).is_err());
        assert_eq!(engine.detect_faces(&frame()).unwrap().len(), 1);
    }
}
