/// Minimum detector confidence for a box to survive filtering.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// NMS IoU threshold: a box overlapping a kept box by more than this is dropped.
pub const DEFAULT_NMS_IOU_THRESHOLD: f32 = 0.4;

/// Liveness score at or above which a face is reported as live.
pub const DEFAULT_LIVE_THRESHOLD: f32 = 0.915;

/// Handle value the host boundary returns when allocation fails.
pub const INVALID_HANDLE: i64 = 0;

/// Version of the host function tables served by `host::capability_table`.
pub const ENGINE_API_VERSION: u32 = 1;

/// File extension appended to a model's `name` when resolving it on disk.
pub const MODEL_EXTENSION: &str = "onnx";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
