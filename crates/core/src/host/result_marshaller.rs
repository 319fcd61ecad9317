//! Host-visible face box layout: five native-endian `f32`s in the
//! order confidence, x1, y1, x2, y2.

use std::mem::size_of;

use crate::detection::domain::face_box::FaceBox;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct WireFaceBox {
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

pub const WIRE_FACE_BOX_SIZE: usize = size_of::<WireFaceBox>();

impl From<&FaceBox> for WireFaceBox {
    fn from(face: &FaceBox) -> Self {
        Self {
            confidence: face.confidence,
            x1: face.x1,
            y1: face.y1,
            x2: face.x2,
            y2: face.y2,
        }
    }
}

impl From<WireFaceBox> for FaceBox {
    fn from(wire: WireFaceBox) -> Self {
        FaceBox::new(wire.confidence, wire.x1, wire.y1, wire.x2, wire.y2)
    }
}

/// Convert detector output to wire boxes, keeping order and count.
pub fn marshal(faces: &[FaceBox]) -> Vec<WireFaceBox> {
    faces.iter().map(WireFaceBox::from).collect()
}

/// View wire boxes as the contiguous byte buffer handed to the host.
pub fn as_bytes(boxes: &[WireFaceBox]) -> &[u8] {
    bytemuck::cast_slice(boxes)
}
