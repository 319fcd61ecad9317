//! Process-wide entry points called by the host.
//!
//! Every call is wrapped in `catch_unwind` and reports through a [`Status`];
//! handles cross the boundary as `i64` with `0` meaning "no handle".

use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use crate::detection::domain::face_box::FaceBox;
use crate::engine::domain::backend_factory::BackendFactory;
use crate::engine::domain::face_engine::{EngineSpec, FaceEngine, LivenessOutcome};
use crate::engine::domain::handle_registry::Handle;
use crate::host::result_marshaller::{as_bytes, marshal, WireFaceBox};
use crate::host::status::Status;
use crate::liveness::domain::liveness_engine::LivenessResult;
use crate::shared::constants::INVALID_HANDLE;
use crate::shared::frame::{Frame, FrameError};

static ENGINE: OnceLock<FaceEngine> = OnceLock::new();

/// Image as handed over by the host.
#[derive(Clone, Copy, Debug)]
pub enum HostImage<'a> {
    /// Packed RGB, row-major.
    Rgb {
        data: &'a [u8],
        width: u32,
        height: u32,
    },
    /// Camera preview buffer, rotated clockwise by `orientation` degrees.
    Nv21 {
        data: &'a [u8],
        width: u32,
        height: u32,
        orientation: i32,
    },
}

impl HostImage<'_> {
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        match *self {
            HostImage::Rgb {
                data,
                width,
                height,
            } => Frame::from_rgb(data.to_vec(), width, height),
            HostImage::Nv21 {
                data,
                width,
                height,
                orientation,
            } => Frame::from_nv21(data, width, height, orientation),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HostDetection {
    pub status: Status,
    /// Descending confidence. Empty with `Status::Ok` means no face.
    pub boxes: Vec<WireFaceBox>,
}

impl HostDetection {
    fn failed(status: Status) -> Self {
        Self {
            status,
            boxes: Vec::new(),
        }
    }

    /// The boxes as the contiguous buffer a host reads them from.
    pub fn as_bytes(&self) -> &[u8] {
        as_bytes(&self.boxes)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HostLiveness {
    pub status: Status,
    pub face: WireFaceBox,
    pub score: f32,
    pub is_live: bool,
}

impl HostLiveness {
    fn failed(status: Status) -> Self {
        Self {
            status,
            face: WireFaceBox::default(),
            score: 0.0,
            is_live: false,
        }
    }

    fn scored(result: &LivenessResult) -> Self {
        Self {
            status: Status::Ok,
            face: WireFaceBox::from(&result.face),
            score: result.score,
            is_live: result.is_live,
        }
    }
}

/// Install the engine with the factory that loads its models.
///
/// Only the first call takes effect; returns whether this one did.
pub fn install(factory: Box<dyn BackendFactory>) -> bool {
    let mut installed = false;
    ENGINE.get_or_init(|| {
        installed = true;
        FaceEngine::new(factory)
    });
    if installed {
        log::info!("Engine installed");
    } else {
        log::warn!("Engine already installed, keeping the existing backend factory");
    }
    installed
}

/// Returns a new handle, or `0` if the models could not be loaded.
pub fn allocate(spec: &EngineSpec) -> i64 {
    allocate_on(ENGINE.get(), spec)
}

pub fn detect(handle: i64, image: &HostImage) -> HostDetection {
    detect_on(ENGINE.get(), handle, image)
}

/// Score the top face. `Status::NoFace` when the image has none.
pub fn detect_liveness(handle: i64, image: &HostImage) -> HostLiveness {
    liveness_on(ENGINE.get(), handle, image, None)
}

/// Score a face box the host found itself.
pub fn score_box(handle: i64, image: &HostImage, face: &WireFaceBox) -> HostLiveness {
    liveness_on(ENGINE.get(), handle, image, Some(face))
}

/// `Status::InvalidHandle` on a second release.
pub fn release(handle: i64) -> Status {
    release_on(ENGINE.get(), handle)
}

pub fn live_instances() -> usize {
    ENGINE.get().map_or(0, FaceEngine::live_instances)
}

fn allocate_on(engine: Option<&FaceEngine>, spec: &EngineSpec) -> i64 {
    guarded(
        engine,
        |_| INVALID_HANDLE,
        |engine| match engine.allocate(spec) {
            Ok(handle) => match i64::try_from(handle) {
                Ok(handle) => handle,
                Err(_) => {
                    log::error!("Handle {handle:#x} does not fit the host handle type");
                    let _ = engine.release(handle);
                    INVALID_HANDLE
                }
            },
            Err(_) => INVALID_HANDLE,
        },
    )
}

fn detect_on(engine: Option<&FaceEngine>, handle: i64, image: &HostImage) -> HostDetection {
    guarded(engine, HostDetection::failed, |engine| {
        let Some(handle) = to_handle(handle) else {
            return HostDetection::failed(Status::InvalidHandle);
        };
        let frame = match image.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("Rejected image for handle {handle:#x}: {e}");
                return HostDetection::failed(Status::InvalidInput);
            }
        };
        match engine.detect(handle, &frame) {
            Ok(faces) => HostDetection {
                status: Status::Ok,
                boxes: marshal(&faces),
            },
            Err(e) => {
                log::debug!("Detect on handle {handle:#x} failed: {e}");
                HostDetection::failed(Status::from(&e))
            }
        }
    })
}

fn liveness_on(
    engine: Option<&FaceEngine>,
    handle: i64,
    image: &HostImage,
    face: Option<&WireFaceBox>,
) -> HostLiveness {
    guarded(engine, HostLiveness::failed, |engine| {
        let Some(handle) = to_handle(handle) else {
            return HostLiveness::failed(Status::InvalidHandle);
        };
        let frame = match image.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("Rejected image for handle {handle:#x}: {e}");
                return HostLiveness::failed(Status::InvalidInput);
            }
        };
        let outcome = match face {
            Some(face) => engine
                .score_box(handle, &frame, &FaceBox::from(*face))
                .map(LivenessOutcome::Scored),
            None => engine.detect_liveness(handle, &frame),
        };
        match outcome {
            Ok(LivenessOutcome::Scored(result)) => HostLiveness::scored(&result),
            Ok(LivenessOutcome::NoFace) => HostLiveness::failed(Status::NoFace),
            Err(e) => {
                log::debug!("Liveness on handle {handle:#x} failed: {e}");
                HostLiveness::failed(Status::from(&e))
            }
        }
    })
}

fn release_on(engine: Option<&FaceEngine>, handle: i64) -> Status {
    guarded(
        engine,
        |status| status,
        |engine| match to_handle(handle).map(|h| engine.release(h)) {
            Some(Ok(())) => Status::Ok,
            Some(Err(e)) => Status::from(&e),
            None => Status::InvalidHandle,
        },
    )
}

/// Negative values are never issued.
fn to_handle(handle: i64) -> Option<Handle> {
    Handle::try_from(handle).ok()
}

/// Run `call` against the installed engine without letting a panic escape.
fn guarded<R>(
    engine: Option<&FaceEngine>,
    on_error: impl FnOnce(Status) -> R,
    call: impl FnOnce(&FaceEngine) -> R,
) -> R {
    let Some(engine) = engine else {
        log::warn!("Host call before the engine was installed");
        return on_error(Status::NotInitialized);
    };
    match panic::catch_unwind(AssertUnwindSafe(|| call(engine))) {
        Ok(result) => result,
        Err(_) => {
            log::error!("Panic caught at the host boundary");
            on_error(Status::InferenceFailure)
        }
    }
}
