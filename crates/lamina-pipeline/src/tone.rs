//! Per-pixel tone filters: brightness, contrast and sepia.
//!
//! Each one maps every channel value independently of its neighbours
//! and saturates into `[0, 255]`.

use crate::types::Image;

/// Sepia color matrix, rows are output R, G, B.
const SEPIA: [[f32; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn saturate(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Add `delta` to every channel, saturating.
#[must_use = "returns the adjusted image"]
pub fn brightness(image: &Image, delta: i32) -> Image {
    Image::new(image::imageops::brighten(image.pixels(), delta))
}

/// Multiply every channel by `scale`, rounding and saturating.
#[must_use = "returns the adjusted image"]
pub fn contrast(image: &Image, scale: f32) -> Image {
    let mut out = image.pixels().clone();
    for pixel in out.pixels_mut() {
        for c in &mut pixel.0 {
            *c = saturate(f32::from(*c) * scale);
        }
    }
    Image::new(out)
}

/// Apply the sepia matrix and clip to the valid intensity range.
#[must_use = "returns the toned image"]
pub fn sepia(image: &Image) -> Image {
    let mut out = image.pixels().clone();
    for pixel in out.pixels_mut() {
        let [r, g, b] = pixel.0.map(f32::from);
        pixel.0 = SEPIA.map(|[kr, kg, kb]| saturate(kb.mul_add(b, kr.mul_add(r, kg * g))));
    }
    Image::new(out)
}
