use image::{ImageBuffer, Rgb, RgbImage};
use ndarray::ArrayView3;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions are zero")]
    ZeroDimensions,
    #[error("invalid rgb data size: expected {expected} bytes, got {actual}")]
    InvalidRgbSize { expected: usize, actual: usize },
    #[error("invalid yuv data size: expected {expected} bytes, got {actual}")]
    InvalidYuvSize { expected: usize, actual: usize },
    #[error("nv21 frames need even dimensions, got {width}x{height}")]
    OddYuvDimensions { width: u32, height: u32 },
    #[error("unsupported orientation {0}, expected 0, 90, 180 or 270")]
    InvalidOrientation(i32),
}

/// A single camera frame: contiguous RGB bytes in row-major order.
///
/// Host pixel formats are converted at construction; everything downstream
/// treats the frame as packed RGB.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * Self::CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
        }
    }

    /// Wrap packed RGB bytes, checking the length against the dimensions.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroDimensions);
        }
        let expected = (width as usize) * (height as usize) * Self::CHANNELS;
        if data.len() != expected {
            return Err(FrameError::InvalidRgbSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self::new(data, width, height))
    }

    /// Convert an NV21 (YUV420SP, interleaved VU) preview buffer to RGB and
    /// rotate it clockwise by `orientation` degrees.
    pub fn from_nv21(
        yuv: &[u8],
        width: u32,
        height: u32,
        orientation: i32,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroDimensions);
        }
        if width % 2 != 0 || height % 2 != 0 {
            return Err(FrameError::OddYuvDimensions { width, height });
        }
        let expected = (width as usize) * (height as usize) * 3 / 2;
        if yuv.len() != expected {
            return Err(FrameError::InvalidYuvSize {
                expected,
                actual: yuv.len(),
            });
        }
        if !matches!(orientation, 0 | 90 | 180 | 270) {
            return Err(FrameError::InvalidOrientation(orientation));
        }

        let w = width as usize;
        let h = height as usize;
        let (luma, chroma) = yuv.split_at(w * h);
        let mut rgb = Vec::with_capacity(w * h * Self::CHANNELS);
        for y in 0..h {
            for x in 0..w {
                let vu = (y / 2) * w + (x / 2) * 2;
                let pixel = yuv_to_rgb(luma[y * w + x], chroma[vu + 1], chroma[vu]);
                rgb.extend_from_slice(&pixel);
            }
        }

        let upright = Self::new(rgb, width, height);
        Ok(upright.rotated(orientation))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, Self::CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Borrow the pixels as an `image` buffer for cropping and resizing.
    pub fn as_image(&self) -> ImageBuffer<Rgb<u8>, &[u8]> {
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
            .expect("Frame data length must match dimensions")
    }

    /// True when every pixel carries the same value.
    pub fn is_uniform(&self) -> bool {
        match self.data.chunks_exact(Self::CHANNELS).next() {
            Some(first) => self.data.chunks_exact(Self::CHANNELS).all(|p| p == first),
            None => true,
        }
    }

    fn rotated(self, orientation: i32) -> Self {
        let view = self.as_image();
        let rotated: RgbImage = match orientation {
            90 => image::imageops::rotate90(&view),
            180 => image::imageops::rotate180(&view),
            270 => image::imageops::rotate270(&view),
            _ => return self,
        };
        let (width, height) = rotated.dimensions();
        Self::new(rotated.into_raw(), width, height)
    }
}

/// BT.601 full-range YUV → RGB.
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    let r = y + 1.402 * v;
    let g = y - 0.344_136 * u - 0.714_136 * v;
    let b = y + 1.772 * u;
    [
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    ]
}
