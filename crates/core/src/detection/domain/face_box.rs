use serde::Serialize;

/// A detected face in image space.
///
/// Corners are kept ordered (`x1 <= x2`, `y1 <= y2`) by every constructor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FaceBox {
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl FaceBox {
    /// Build a box from two arbitrary corners, ordering them.
    pub fn new(confidence: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            confidence,
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection-over-Union with another box; 0 for degenerate boxes.
    pub fn iou(&self, other: &FaceBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Clamp the corners to pixel coordinates of a `width` × `height` image,
    /// i.e. `[0, width - 1]` × `[0, height - 1]`.
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;
        Self {
            confidence: self.confidence,
            x1: self.x1.clamp(0.0, max_x),
            y1: self.y1.clamp(0.0, max_y),
            x2: self.x2.clamp(0.0, max_x),
            y2: self.y2.clamp(0.0, max_y),
        }
    }

    /// True when the box lies inside a `width` × `height` image.
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        self.x1 >= 0.0 && self.y1 >= 0.0 && self.x2 < width as f32 && self.y2 < height as f32
    }
}
