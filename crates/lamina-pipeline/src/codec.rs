//! Image decoding, encoding and color-space conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the
//! 3-channel [`Image`] every other module works on. Alpha is dropped on
//! decode. No file I/O happens here; callers hand in bytes.

use std::io::Cursor;

use image::{GrayImage, ImageFormat};

use crate::types::{Image, RgbImage, SessionError};

/// Decode raw image bytes into an RGB [`Image`].
///
/// Supports whatever formats the `image` crate was built with.
///
/// # Errors
///
/// Returns [`SessionError::EmptyInput`] if `bytes` is empty.
/// Returns [`SessionError::ImageLoad`] if the format is unrecognized or
/// the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<Image, SessionError> {
    if bytes.is_empty() {
        return Err(SessionError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(Image::new(img.to_rgb8()))
}

/// Encode an [`Image`] in the given container format.
///
/// # Errors
///
/// Returns the underlying [`image::ImageError`] if the format is not
/// compiled in or cannot represent 8-bit RGB.
pub fn encode(image: &Image, format: ImageFormat) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    image.pixels().write_to(&mut buf, format)?;
    Ok(buf.into_inner())
}

/// Convert to single-channel luma.
#[must_use = "returns the luma image"]
pub fn to_luma(image: &Image) -> GrayImage {
    image::imageops::grayscale(image.pixels())
}

/// Re-expand a single-channel image to three identical channels so it
/// composes uniformly with color layers.
#[must_use = "returns the expanded image"]
pub fn from_luma(gray: &GrayImage) -> Image {
    Image::new(RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        image::Rgb([v, v, v])
    }))
}
