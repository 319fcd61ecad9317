pub mod coordinate_transform;
pub mod face_box;
pub mod face_detector;
pub mod inference_backend;
pub mod model_config;
pub mod nms;
