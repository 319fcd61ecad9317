pub mod onnx_liveness_classifier;
