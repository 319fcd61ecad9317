/// Face detection backend using ONNX Runtime via `ort`.
///
/// Samples the frame into the model input described by the `ModelConfig`,
/// runs the session and decodes raw `[x1, y1, x2, y2, score]` rows in model
/// space. Filtering, mapping and NMS happen in the domain detector.
use std::path::Path;

use crate::detection::domain::coordinate_transform::to_image_space;
use crate::detection::domain::inference_backend::{
    DetectionBackend, InferenceError, RawDetection,
};
use crate::detection::domain::model_config::ModelConfig;
use crate::shared::frame::Frame;

use super::onnx_session::{check_input_size, open_session};

/// Values per output row: x1, y1, x2, y2, score.
const ROW_LEN: usize = 5;

pub struct OnnxFaceDetector {
    session: ort::session::Session,
}

impl OnnxFaceDetector {
    /// Load a detection model, checking its input size against `config`.
    pub fn new(
        model_path: &Path,
        config: &ModelConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = open_session(model_path)?;
        check_input_size(&session, config)?;
        Ok(Self { session })
    }
}

impl DetectionBackend for OnnxFaceDetector {
    fn infer(
        &mut self,
        frame: &Frame,
        config: &ModelConfig,
    ) -> Result<Vec<RawDetection>, InferenceError> {
        let input_tensor = preprocess(frame, config);
        let input_value = ort::value::Tensor::from_array(input_tensor)
            .map_err(|e| InferenceError::recoverable(format!("input tensor: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|e| InferenceError::recoverable(format!("session run: {e}")))?;
        if outputs.len() == 0 {
            return Err(InferenceError::fatal(format!(
                "detector '{}' produced no outputs",
                config.name()
            )));
        }

        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| InferenceError::recoverable(format!("output tensor: {e}")))?;
        let data = tensor
            .as_slice()
            .ok_or_else(|| InferenceError::recoverable("output tensor is not contiguous"))?;
        decode(data, tensor.shape())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Sample the frame into a `1 × 3 × height × width` float tensor in `[0, 1]`.
///
/// Each model pixel centre is mapped to the image with the same transform
/// used for the outputs, so geometry stays consistent in both directions.
/// Pixels that fall outside the frame stay zero (padding).
fn preprocess(frame: &Frame, config: &ModelConfig) -> ndarray::Array4<f32> {
    let mw = config.width() as usize;
    let mh = config.height() as usize;
    let fw = frame.width();
    let fh = frame.height();
    let src = frame.as_ndarray();

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, mh, mw));
    for v in 0..mh {
        for u in 0..mw {
            let (x, y) = to_image_space(u as f32 + 0.5, v as f32 + 0.5, config, fw, fh);
            if x < 0.0 || y < 0.0 {
                continue;
            }
            let (sx, sy) = (x as usize, y as usize);
            if sx >= fw as usize || sy >= fh as usize {
                continue;
            }
            for c in 0..3 {
                tensor[[0, c, v, u]] = src[[sy, sx, c]] as f32 / 255.0;
            }
        }
    }
    tensor
}

// ---------------------------------------------------------------------------
// Output decoding
// ---------------------------------------------------------------------------

/// Decode `[1, N, 5]`, `[N, 5]` or transposed `[1, 5, N]` output.
fn decode(data: &[f32], shape: &[usize]) -> Result<Vec<RawDetection>, InferenceError> {
    let (rows, transposed) = match shape {
        [1, n, ROW_LEN] | [n, ROW_LEN] => (*n, false),
        [1, ROW_LEN, n] => (*n, true),
        _ => {
            return Err(InferenceError::recoverable(format!(
                "unexpected detector output shape: {shape:?}"
            )))
        }
    };
    if data.len() != rows * ROW_LEN {
        return Err(InferenceError::recoverable(format!(
            "detector output has {} values, expected {}",
            data.len(),
            rows * ROW_LEN
        )));
    }

    let value = |row: usize, field: usize| {
        if transposed {
            data[field * rows + row]
        } else {
            data[row * ROW_LEN + field]
        }
    };

    Ok((0..rows)
        .map(|i| RawDetection {
            x1: value(i, 0),
            y1: value(i, 1),
            x2: value(i, 2),
            y2: value(i, 3),
            confidence: value(i, 4),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
