pub mod crop_region;
pub mod liveness_classifier;
pub mod liveness_engine;
