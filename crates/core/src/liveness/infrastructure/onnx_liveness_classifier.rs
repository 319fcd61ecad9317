/// Anti-spoofing classifier using ONNX Runtime via `ort`.
///
/// Crops the requested region, resizes it to the model input, and feeds raw
/// BGR values (0–255) in NCHW layout. The output logits are softmaxed and the
/// probability of class 1 ("live") is returned.
use std::path::Path;

use image::imageops::{self, FilterType};
use image::GenericImageView;

use crate::detection::domain::inference_backend::InferenceError;
use crate::detection::domain::model_config::ModelConfig;
use crate::detection::infrastructure::onnx_session::{check_input_size, open_session};
use crate::liveness::domain::crop_region::CropRegion;
use crate::liveness::domain::liveness_classifier::LivenessClassifier;
use crate::shared::frame::Frame;

/// Index of the "live" class in the classifier output.
const LIVE_CLASS: usize = 1;

pub struct OnnxLivenessClassifier {
    session: ort::session::Session,
    input_width: u32,
    input_height: u32,
    name: String,
}

impl OnnxLivenessClassifier {
    pub fn new(
        model_path: &Path,
        config: &ModelConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = open_session(model_path)?;
        check_input_size(&session, config)?;
        Ok(Self {
            session,
            input_width: config.width(),
            input_height: config.height(),
            name: config.name().to_string(),
        })
    }
}

impl LivenessClassifier for OnnxLivenessClassifier {
    fn classify(&mut self, frame: &Frame, region: CropRegion) -> Result<f32, InferenceError> {
        let input_tensor = preprocess(frame, region, self.input_width, self.input_height);
        let input_value = ort::value::Tensor::from_array(input_tensor)
            .map_err(|e| InferenceError::recoverable(format!("input tensor: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|e| InferenceError::recoverable(format!("session run: {e}")))?;
        if outputs.len() == 0 {
            return Err(InferenceError::fatal(format!(
                "liveness model '{}' produced no outputs",
                self.name
            )));
        }

        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| InferenceError::recoverable(format!("output tensor: {e}")))?;
        let logits = tensor
            .as_slice()
            .ok_or_else(|| InferenceError::recoverable("output tensor is not contiguous"))?;
        if logits.len() <= LIVE_CLASS {
            // The class count is fixed by the model, so every later call fails too.
            return Err(InferenceError::fatal(format!(
                "liveness model '{}' has {} classes, expected at least {}",
                self.name,
                logits.len(),
                LIVE_CLASS + 1
            )));
        }

        Ok(softmax(logits)[LIVE_CLASS])
    }
}

/// Crop `region`, resize to `width` × `height`, BGR NCHW float32.
fn preprocess(
    frame: &Frame,
    region: CropRegion,
    width: u32,
    height: u32,
) -> ndarray::Array4<f32> {
    let view = frame.as_image();
    let sub = imageops::crop_imm(&view, region.x, region.y, region.width, region.height);
    let crop = image::RgbImage::from_fn(sub.width(), sub.height(), |x, y| sub.get_pixel(x, y));
    let resized = imageops::resize(&crop, width, height, FilterType::Triangle);

    let (w, h) = (width as usize, height as usize);
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, h, w));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let (x, y) = (x as usize, y as usize);
        tensor[[0, 0, y, x]] = b as f32;
        tensor[[0, 1, y, x]] = g as f32;
        tensor[[0, 2, y, x]] = r as f32;
    }
    tensor
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
