//! Versioned function tables, one per capability.
//!
//! The host resolves the functions it needs by `(version, capability)`
//! instead of by exported symbol name.

use crate::engine::domain::face_engine::EngineSpec;
use crate::host::api::{self, HostDetection, HostImage, HostLiveness};
use crate::host::result_marshaller::WireFaceBox;
use crate::host::status::Status;
use crate::shared::constants::ENGINE_API_VERSION;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    FaceDetection,
    Liveness,
    LivenessOnBox,
}

/// The capability-specific entry point.
#[derive(Clone, Copy)]
pub enum DetectEntry {
    Faces(fn(i64, &HostImage) -> HostDetection),
    Liveness(fn(i64, &HostImage) -> HostLiveness),
    LivenessOnBox(fn(i64, &HostImage, &WireFaceBox) -> HostLiveness),
}

#[derive(Clone, Copy)]
pub struct FunctionTable {
    pub version: u32,
    pub capability: Capability,
    pub allocate: fn(&EngineSpec) -> i64,
    pub release: fn(i64) -> Status,
    pub entry: DetectEntry,
}

static FACE_DETECTION_V1: FunctionTable = FunctionTable {
    version: 1,
    capability: Capability::FaceDetection,
    allocate: api::allocate,
    release: api::release,
    entry: DetectEntry::Faces(api::detect),
};

static LIVENESS_V1: FunctionTable = FunctionTable {
    version: 1,
    capability: Capability::Liveness,
    allocate: api::allocate,
    release: api::release,
    entry: DetectEntry::Liveness(api::detect_liveness),
};

static LIVENESS_ON_BOX_V1: FunctionTable = FunctionTable {
    version: 1,
    capability: Capability::LivenessOnBox,
    allocate: api::allocate,
    release: api::release,
    entry: DetectEntry::LivenessOnBox(api::score_box),
};

/// Look up the table for `capability`. `None` for unsupported versions.
pub fn capability_table(version: u32, capability: Capability) -> Option<&'static FunctionTable> {
    if version != ENGINE_API_VERSION {
        log::warn!("Host requested API version {version}, engine serves {ENGINE_API_VERSION}");
        return None;
    }
    Some(match capability {
        Capability::FaceDetection => &FACE_DETECTION_V1,
        Capability::Liveness => &LIVENESS_V1,
        Capability::LivenessOnBox => &LIVENESS_ON_BOX_V1,
    })
}
