//! Grayscale conversion.
//!
//! Converts to luma and re-expands to three identical channels, so a
//! grayscale layer has the same layout as every color layer.

use crate::codec::{from_luma, to_luma};
use crate::types::Image;

/// Convert `image` to gray while keeping three channels.
#[must_use = "returns the grayscale image"]
pub fn grayscale(image: &Image) -> Image {
    from_luma(&to_luma(image))
}
