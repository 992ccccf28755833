//! Ambient brightness as the mean of per-pixel `(R + G + B) / 3`.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Mean luminance of a packed RGBA buffer, in `[0, 255]`. Alpha is ignored.
///
/// Trailing bytes that do not form a whole pixel are ignored. An empty
/// buffer has brightness 0.
pub fn mean_luminance(rgba: &[u8]) -> f64 {
    let mut sum: u64 = 0;
    let mut pixels: u64 = 0;
    for px in rgba.chunks_exact(4) {
        sum += px[0] as u64 + px[1] as u64 + px[2] as u64;
        pixels += 1;
    }
    if pixels == 0 {
        return 0.0;
    }
    sum as f64 / (3 * pixels) as f64
}

/// Fixed-size render target that frames are drawn into before measuring.
///
/// Frames at a different resolution are resampled to the surface size, so
/// brightness readings stay comparable when the stream resolution changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrightnessSurface {
    pub width: u32,
    pub height: u32,
}

impl BrightnessSurface {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn measure(&self, frame: &RgbaImage) -> f64 {
        if frame.width() == self.width && frame.height() == self.height {
            return mean_luminance(frame.as_raw());
        }
        let rendered = imageops::resize(frame, self.width, self.height, FilterType::Triangle);
        mean_luminance(rendered.as_raw())
    }
}

impl Default for BrightnessSurface {
    fn default() -> Self {
        Self::new(640, 480)
    }
}
