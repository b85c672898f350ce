//! Gaussian blur.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`]. The filter catalog
//! speaks in odd kernel sizes (the way image editors present the
//! slider), so [`sigma_for_kernel`] maps a kernel size to the sigma
//! OpenCV derives for `GaussianBlur(img, (k, k), 0)`.
//!
//! [`gaussian_blur`] operates on a single channel.
//! [`gaussian_blur_rgb`] blurs each R/G/B channel independently and
//! reassembles them.

use image::GrayImage;

use crate::types::{Image, RgbImage};

/// Sigma for a square Gaussian kernel of size `kernel_size`:
/// `0.3 * ((k - 1) * 0.5 - 1) + 0.8`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sigma_for_kernel(kernel_size: i32) -> f32 {
    0.3f32.mul_add((kernel_size - 1) as f32 * 0.5 - 1.0, 0.8)
}

/// Apply Gaussian blur to a grayscale image.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Blur an RGB image with a `kernel_size` x `kernel_size` Gaussian.
///
/// A kernel size of 1 (or less) is the identity and returns a handle
/// to the same pixel buffer.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur_rgb(image: &Image, kernel_size: i32) -> Image {
    if kernel_size <= 1 {
        return image.clone();
    }
    let sigma = sigma_for_kernel(kernel_size);
    let src = image.pixels();
    let (w, h) = (src.width(), src.height());

    let channels: [GrayImage; 3] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([src.get_pixel(x, y).0[c]]))
    });
    let blurred: [GrayImage; 3] = std::array::from_fn(|c| gaussian_blur(&channels[c], sigma));

    Image::new(RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
        ])
    }))
}
