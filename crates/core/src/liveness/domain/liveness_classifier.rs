use crate::detection::domain::inference_backend::InferenceError;
use crate::liveness::domain::crop_region::CropRegion;
use crate::shared::frame::Frame;

/// Black-box anti-spoofing model.
///
/// Classifies `region` of the frame and returns the probability that it shows
/// a live subject.
pub trait LivenessClassifier: Send {
    fn classify(&mut self, frame: &Frame, region: CropRegion) -> Result<f32, InferenceError>;
}
