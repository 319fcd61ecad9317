use crate::detection::domain::face_box::FaceBox;
use crate::detection::domain::model_config::ModelConfig;

/// Integer pixel rectangle inside a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    pub fn full(image_width: u32, image_height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: image_width,
            height: image_height,
        }
    }
}

/// Region of the frame a liveness model looks at for `face`.
///
/// Direct-resize models see the whole frame. Otherwise the face box is grown
/// by `scale` (capped so it still fits the frame), its centre moved by
/// `shift_x`/`shift_y` box widths/heights, and the result slid back inside
/// the frame rather than shrunk.
pub fn crop_region(
    face: &FaceBox,
    config: &ModelConfig,
    image_width: u32,
    image_height: u32,
) -> CropRegion {
    if config.org_resize() {
        return CropRegion::full(image_width, image_height);
    }

    let box_w = (face.x2 - face.x1 + 1.0).max(1.0);
    let box_h = (face.y2 - face.y1 + 1.0).max(1.0);
    let scale = config
        .scale()
        .min((image_width as f32 - 1.0) / box_w)
        .min((image_height as f32 - 1.0) / box_h)
        .max(0.0);

    let (x, width) = place(
        (face.x1 as i64).saturating_add(box_w as i64 / 2),
        (box_w * scale) as i64,
        (box_w * config.shift_x()) as i64,
        image_width as i64,
    );
    let (y, height) = place(
        (face.y1 as i64).saturating_add(box_h as i64 / 2),
        (box_h * scale) as i64,
        (box_h * config.shift_y()) as i64,
        image_height as i64,
    );
    CropRegion {
        x,
        y,
        width,
        height,
    }
}

/// Place a span of `extent` centred on `center + shift` inside `[0, limit)`.
///
/// Host boxes may sit arbitrarily far outside the frame, so the arithmetic
/// saturates before the final clamp.
fn place(center: i64, extent: i64, shift: i64, limit: i64) -> (u32, u32) {
    let extent = extent.clamp(1, limit.max(1));
    let start = center
        .saturating_sub(extent / 2)
        .saturating_add(shift)
        .clamp(0, (limit - extent).max(0));
    (start as u32, extent as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letterbox(scale: f32, shift_x: f32, shift_y: f32) -> ModelConfig {
        ModelConfig::letterbox("live", 80, 80, scale, shift_x, shift_y).unwrap()
    }

    fn inside(region: &CropRegion, w: u32, h: u32) -> bool {
        region.width > 0
            && region.height > 0
            && region.x + region.width <= w
            && region.y + region.height <= h
    }

    #[test]
    fn test_direct_model_uses_whole_frame() {
        let face = FaceBox::new(0.9, 100.0, 100.0, 200.0, 200.0);
        let config = ModelConfig::direct("live", 80, 80).unwrap();
        assert_eq!(crop_region(&face, &config, 640, 480), CropRegion::full(640, 480));
    }

    #[test]
    fn test_scale_grows_around_centre() {
        // 100x100 box (inclusive corners 100..199) centred at 150.
        let face = FaceBox::new(0.9, 100.0, 100.0, 199.0, 199.0);
        let region = crop_region(&face, &letterbox(2.0, 0.0, 0.0), 640, 480);
        assert_eq!(
            region,
            CropRegion {
                x: 50,
                y: 50,
                width: 200,
                height: 200
            }
        );
    }

    #[test]
    fn test_shift_moves_by_box_fraction() {
        let face = FaceBox::new(0.9, 100.0, 100.0, 199.0, 199.0);
        let region = crop_region(&face, &letterbox(1.0, 0.5, -0.25), 640, 480);
        assert_eq!((region.x, region.y), (150, 75));
        assert_eq!((region.width, region.height), (100, 100));
    }

    #[test]
    fn test_scale_capped_by_frame() {
        let face = FaceBox::new(0.9, 200.0, 100.0, 399.0, 299.0);
        let region = crop_region(&face, &letterbox(4.0, 0.0, 0.0), 640, 480);
        assert!(region.height <= 479);
        assert!(inside(&region, 640, 480));
    }

    #[test]
    fn test_crop_slides_inside_at_edges() {
        let face = FaceBox::new(0.9, 0.0, 0.0, 49.0, 49.0);
        let region = crop_region(&face, &letterbox(2.7, 0.0, 0.0), 640, 480);
        assert_eq!((region.x, region.y), (0, 0));
        assert_eq!(region.width, 135);

        let face = FaceBox::new(0.9, 590.0, 430.0, 639.0, 479.0);
        let region = crop_region(&face, &letterbox(2.7, 0.0, 0.0), 640, 480);
        assert!(inside(&region, 640, 480));
        assert_eq!(region.x + region.width, 640);
    }

    #[test]
    fn test_far_out_of_frame_box_stays_inside() {
        let far = FaceBox::new(1.0, 6.0e18, 0.0, 1.9e19, 10.0);
        let region = crop_region(&far, &letterbox(2.7, 0.0, 0.0), 200, 200);
        assert!(inside(&region, 200, 200));
        assert_eq!(region.x + region.width, 200);

        let huge = FaceBox::new(1.0, -f32::MAX, -f32::MAX, f32::MAX, f32::MAX);
        let region = crop_region(&huge, &letterbox(1.0, 0.5, -0.5), 200, 200);
        assert!(inside(&region, 200, 200));
    }

    #[test]
    fn test_degenerate_box_still_yields_pixels() {
        let face = FaceBox::new(0.9, 10.0, 10.0, 10.0, 10.0);
        let region = crop_region(&face, &letterbox(1.0, 0.0, 0.0), 32, 32);
        assert!(inside(&region, 32, 32));
    }
}
