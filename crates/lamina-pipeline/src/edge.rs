//! Canny edge detection.
//!
//! Follows `imageproc::edges::canny` step for step (Gaussian pre-blur,
//! Sobel gradients, non-maximum suppression, hysteresis) but keeps the
//! hysteresis flood fill inside the image bounds. Upstream's BFS walks
//! `x - 1` off the left/top border (u32 underflow) and skips two of the
//! eight neighbours; see <https://github.com/image-rs/imageproc/issues/705>.
//!
//! [`edge_detect`] is the catalog entry point: luma in, binary edge map
//! out, re-expanded to three channels.

use image::{GrayImage, Luma};
use imageproc::definitions::Image as Plane;
use imageproc::filter::{filter_clamped, gaussian_blur_f32};
use imageproc::kernel;

use crate::codec::{from_luma, to_luma};
use crate::filter::hysteresis_thresholds;
use crate::types::Image;

/// Minimum allowed hysteresis threshold.
///
/// A low threshold of zero would mark every pixel with any gradient as
/// a candidate edge.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Sigma of the smoothing pass applied before gradients are taken.
const PRE_BLUR_SIGMA: f32 = 1.4;

/// Detect edges with thresholds `(threshold, 2 * threshold)` and return
/// the edge map as a 3-channel image (255 = edge, 0 = background).
#[must_use = "returns the edge map"]
#[allow(clippy::cast_precision_loss)]
pub fn edge_detect(image: &Image, threshold: i32) -> Image {
    let (low, high) = hysteresis_thresholds(threshold);
    from_luma(&canny(&to_luma(image), low as f32, high as f32))
}

/// Run Canny on a grayscale image.
///
/// Returns a binary image: 255 for edge pixels, 0 for non-edge. Both
/// thresholds are clamped to at least [`MIN_THRESHOLD`] and `low` is
/// clamped to at most `high`.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);

    let blurred = gaussian_blur_f32(image, PRE_BLUR_SIGMA);
    let gx: Plane<Luma<i16>> = filter_clamped(&blurred, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Plane<Luma<i16>> = filter_clamped(&blurred, kernel::SOBEL_VERTICAL_3X3);

    let gradients = Gradients {
        width: image.width() as usize,
        height: image.height() as usize,
        gx: gx.as_raw(),
        gy: gy.as_raw(),
    };
    let thinned = gradients.suppress_non_maxima();
    let edges = hysteresis(&thinned, gradients.width, gradients.height, low, high);

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([edges[y as usize * gradients.width + x as usize]])
    })
}

/// Quantized gradient direction, in degrees modulo 180.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Around 0 degrees: compare left and right.
    Horizontal,
    /// Around 45 degrees: compare the down-right and up-left diagonal.
    Falling,
    /// Around 90 degrees: compare up and down.
    Vertical,
    /// Around 135 degrees: compare the down-left and up-right diagonal.
    Rising,
}

impl Direction {
    fn of(dx: f32, dy: f32) -> Self {
        let mut angle = dy.atan2(dx).to_degrees();
        if angle < 0.0 {
            angle += 180.0;
        }
        if (22.5..67.5).contains(&angle) {
            Self::Falling
        } else if (67.5..112.5).contains(&angle) {
            Self::Vertical
        } else if (112.5..157.5).contains(&angle) {
            Self::Rising
        } else {
            Self::Horizontal
        }
    }
}

/// Row-major Sobel responses for one image.
struct Gradients<'a> {
    width: usize,
    height: usize,
    gx: &'a [i16],
    gy: &'a [i16],
}

impl Gradients<'_> {
    fn magnitude(&self, i: usize) -> f32 {
        f32::from(self.gx[i]).hypot(f32::from(self.gy[i]))
    }

    /// Keep only pixels whose magnitude is a local maximum across the
    /// gradient direction. The one-pixel border is always zero.
    fn suppress_non_maxima(&self) -> Vec<f32> {
        let (w, h) = (self.width, self.height);
        let mut out = vec![0.0; w * h];
        if w < 3 || h < 3 {
            return out;
        }
        let magnitude: Vec<f32> = (0..w * h).map(|i| self.magnitude(i)).collect();

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let i = y * w + x;
                let m = magnitude[i];
                if m == 0.0 {
                    continue;
                }
                let (a, b) = match Direction::of(f32::from(self.gx[i]), f32::from(self.gy[i])) {
                    Direction::Horizontal => (magnitude[i - 1], magnitude[i + 1]),
                    Direction::Falling => (magnitude[i + w + 1], magnitude[i - w - 1]),
                    Direction::Vertical => (magnitude[i - w], magnitude[i + w]),
                    Direction::Rising => (magnitude[i + w - 1], magnitude[i - w + 1]),
                };
                if m >= a && m >= b {
                    out[i] = m;
                }
            }
        }
        out
    }
}

/// Seed from every pixel at or above `high`, then flood through
/// 8-connected neighbours at or above `low`.
fn hysteresis(strength: &[f32], width: usize, height: usize, low: f32, high: f32) -> Vec<u8> {
    let mut out = vec![0u8; width * height];
    let mut stack = Vec::new();

    for seed in 0..strength.len() {
        if strength[seed] < high || out[seed] != 0 {
            continue;
        }
        out[seed] = u8::MAX;
        stack.push(seed);

        while let Some(i) = stack.pop() {
            let (x, y) = (i % width, i / width);
            for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    let j = ny * width + nx;
                    if out[j] == 0 && strength[j] >= low {
                        out[j] = u8::MAX;
                        stack.push(j);
                    }
                }
            }
        }
    }
    out
}
