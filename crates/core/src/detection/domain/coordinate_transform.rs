//! Mapping between model-input space and source-image space.
//!
//! Direct mode (`org_resize`) scales each axis by image/model size. Letterbox
//! mode undoes a uniform `scale` and removes the (`shift_x`, `shift_y`)
//! offset: `x' = x / scale - shift_x`.

use crate::detection::domain::face_box::FaceBox;
use crate::detection::domain::inference_backend::RawDetection;
use crate::detection::domain::model_config::ModelConfig;

/// Map a model-space point to image space, without clamping.
pub fn to_image_space(
    x: f32,
    y: f32,
    config: &ModelConfig,
    image_width: u32,
    image_height: u32,
) -> (f32, f32) {
    if config.org_resize() {
        (
            x * image_width as f32 / config.width() as f32,
            y * image_height as f32 / config.height() as f32,
        )
    } else {
        (
            x / config.scale() - config.shift_x(),
            y / config.scale() - config.shift_y(),
        )
    }
}

/// Inverse of [`to_image_space`].
pub fn to_model_space(
    x: f32,
    y: f32,
    config: &ModelConfig,
    image_width: u32,
    image_height: u32,
) -> (f32, f32) {
    if config.org_resize() {
        (
            x * config.width() as f32 / image_width as f32,
            y * config.height() as f32 / image_height as f32,
        )
    } else {
        (
            (x + config.shift_x()) * config.scale(),
            (y + config.shift_y()) * config.scale(),
        )
    }
}

/// Map a raw model-space detection to an image-space box clamped to the
/// image's pixel grid. Confidence is clamped to `[0, 1]`.
pub fn transform(
    raw: &RawDetection,
    config: &ModelConfig,
    image_width: u32,
    image_height: u32,
) -> FaceBox {
    let (x1, y1) = to_image_space(raw.x1, raw.y1, config, image_width, image_height);
    let (x2, y2) = to_image_space(raw.x2, raw.y2, config, image_width, image_height);
    FaceBox::new(raw.confidence.clamp(0.0, 1.0), x1, y1, x2, y2).clamped(image_width, image_height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn raw(x1: f32, y1: f32, x2: f32, y2: f32) -> RawDetection {
        RawDetection {
            confidence: 0.9,
            x1,
            y1,
            x2,
            y2,
        }
    }

    #[test]
    fn test_direct_mode_scales_per_axis() {
        let config = ModelConfig::direct("det", 100, 50).unwrap();
        let b = transform(&raw(10.0, 10.0, 50.0, 25.0), &config, 400, 300);
        assert_relative_eq!(b.x1, 40.0);
        assert_relative_eq!(b.y1, 60.0);
        assert_relative_eq!(b.x2, 200.0);
        assert_relative_eq!(b.y2, 150.0);
    }

    #[test]
    fn test_letterbox_mode_scales_then_shifts() {
        let config = ModelConfig::letterbox("det", 128, 128, 0.5, 10.0, 20.0).unwrap();
        let b = transform(&raw(20.0, 30.0, 60.0, 70.0), &config, 640, 480);
        assert_relative_eq!(b.x1, 30.0);
        assert_relative_eq!(b.y1, 40.0);
        assert_relative_eq!(b.x2, 110.0);
        assert_relative_eq!(b.y2, 120.0);
    }

    #[test]
    fn test_letterbox_ignores_image_size_for_mapping() {
        let config = ModelConfig::letterbox("det", 128, 128, 1.0, 0.0, 0.0).unwrap();
        let b = transform(&raw(1.0, 2.0, 3.0, 4.0), &config, 1000, 1000);
        assert_eq!((b.x1, b.y1, b.x2, b.y2), (1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn test_output_is_clamped() {
        let config = ModelConfig::letterbox("det", 128, 128, 1.0, 50.0, 50.0).unwrap();
        let b = transform(&raw(10.0, 10.0, 500.0, 500.0), &config, 200, 100);
        assert_eq!((b.x1, b.y1), (0.0, 0.0));
        assert_eq!((b.x2, b.y2), (199.0, 99.0));
    }

    #[test]
    fn test_confidence_is_clamped() {
        let config = ModelConfig::direct("det", 10, 10).unwrap();
        let mut r = raw(0.0, 0.0, 1.0, 1.0);
        r.confidence = 1.7;
        assert_eq!(transform(&r, &config, 10, 10).confidence, 1.0);
    }

    #[test]
    fn test_transform_is_bit_reproducible() {
        let config = ModelConfig::letterbox("det", 96, 96, 0.37, 3.3, -1.7).unwrap();
        let r = raw(12.345, 6.789, 80.123, 91.011);
        let a = transform(&r, &config, 720, 1280);
        let b = transform(&r, &config, 720, 1280);
        assert_eq!(a.x1.to_bits(), b.x1.to_bits());
        assert_eq!(a.y1.to_bits(), b.y1.to_bits());
        assert_eq!(a.x2.to_bits(), b.x2.to_bits());
        assert_eq!(a.y2.to_bits(), b.y2.to_bits());
    }

    #[rstest]
    #[case(1.0, 0.0, 0.0)]
    #[case(0.25, 12.0, 40.0)]
    #[case(2.5, -3.5, 7.25)]
    #[case(0.6, 100.0, 0.0)]
    fn test_letterbox_inverse_recovers_model_point(
        #[case] scale: f32,
        #[case] shift_x: f32,
        #[case] shift_y: f32,
    ) {
        let config = ModelConfig::letterbox("det", 128, 128, scale, shift_x, shift_y).unwrap();
        for &(x, y) in &[(0.0, 0.0), (17.5, 99.25), (127.0, 64.0)] {
            let (ix, iy) = to_image_space(x, y, &config, 640, 480);
            let (mx, my) = to_model_space(ix, iy, &config, 640, 480);
            assert_relative_eq!(mx, x, epsilon = 1e-3);
            assert_relative_eq!(my, y, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_direct_inverse_recovers_model_point() {
        let config = ModelConfig::direct("det", 320, 240).unwrap();
        let (ix, iy) = to_image_space(160.0, 60.0, &config, 1280, 720);
        let (mx, my) = to_model_space(ix, iy, &config, 1280, 720);
        assert_relative_eq!(mx, 160.0, epsilon = 1e-3);
        assert_relative_eq!(my, 60.0, epsilon = 1e-3);
    }
}
