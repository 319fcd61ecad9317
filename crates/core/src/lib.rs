pub mod detection;
pub mod engine;
pub mod host;
pub mod liveness;
pub mod shared;
