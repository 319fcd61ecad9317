use crate::detection::domain::coordinate_transform::transform;
use crate::detection::domain::face_box::FaceBox;
use crate::detection::domain::inference_backend::{DetectionBackend, InferenceError};
use crate::detection::domain::model_config::ModelConfig;
use crate::detection::domain::nms::non_max_suppression;
use crate::shared::constants::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_NMS_IOU_THRESHOLD};
use crate::shared::frame::Frame;

/// Post-processing thresholds applied to raw backend output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorSettings {
    pub confidence_threshold: f32,
    pub nms_iou_threshold: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_iou_threshold: DEFAULT_NMS_IOU_THRESHOLD,
        }
    }
}

/// Face detector: one loaded backend plus the geometry that maps its output
/// back onto the source frame.
///
/// Pipeline: infer → confidence filter → coordinate transform → NMS.
pub struct FaceDetector {
    backend: Box<dyn DetectionBackend>,
    config: ModelConfig,
    settings: DetectorSettings,
    failure: Option<InferenceError>,
}

impl FaceDetector {
    pub fn new(
        backend: Box<dyn DetectionBackend>,
        config: ModelConfig,
        settings: DetectorSettings,
    ) -> Self {
        Self {
            backend,
            config,
            settings,
            failure: None,
        }
    }

    /// Detect faces, returned in descending confidence order.
    ///
    /// An empty vector means no face was found.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, InferenceError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let raw = match self.backend.infer(frame, &self.config) {
            Ok(raw) => raw,
            Err(err) => {
                if !err.is_recoverable() {
                    log::warn!(
                        "Detector '{}' failed unrecoverably: {err}",
                        self.config.name()
                    );
                    self.failure = Some(err.clone());
                }
                return Err(err);
            }
        };

        let threshold = self.settings.confidence_threshold;
        let candidates: Vec<FaceBox> = raw
            .iter()
            // Written so NaN confidences are dropped too.
            .filter(|d| d.confidence >= threshold)
            .map(|d| transform(d, &self.config, frame.width(), frame.height()))
            .collect();

        let faces = non_max_suppression(candidates, self.settings.nms_iou_threshold);
        log::debug!(
            "Detector '{}': {} raw, {} kept",
            self.config.name(),
            raw.len(),
            faces.len()
        );
        Ok(faces)
    }
}
