//! The boundary between the edit session and the filter math.
//!
//! [`ImageOps`] is the only way the session touches pixels. The
//! contract every backend must honor:
//!
//! - **Pure**: the source image is never modified.
//! - **Deterministic**: identical spec and source give bit-identical
//!   output. Preview, commit and script replay all rely on this.
//! - **Normalizing**: a spec is applied as if [`validate`] had been
//!   called on it first.
//!
//! [`CpuOps`] is the default backend, built on `image` and `imageproc`.

use std::time::Instant;

use crate::filter::{FilterSpec, validate};
use crate::types::{Image, OpsError};

/// A filter backend.
pub trait ImageOps {
    /// Apply one filter to `source`, returning a new image.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::InvalidImage`] if `source` has a zero
    /// dimension.
    fn apply(&self, spec: &FilterSpec, source: &Image) -> Result<Image, OpsError>;

    /// Apply `specs` in order, each to the previous result.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first error from [`apply`](Self::apply).
    fn apply_chain<'a, I>(&self, specs: I, source: &Image) -> Result<Image, OpsError>
    where
        I: IntoIterator<Item = &'a FilterSpec>,
    {
        specs
            .into_iter()
            .try_fold(source.clone(), |image, spec| self.apply(spec, &image))
    }
}

/// CPU backend on top of `image` / `imageproc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuOps;

impl ImageOps for CpuOps {
    #[tracing::instrument(level = "trace", skip_all, fields(filter = %spec.kind()))]
    fn apply(&self, spec: &FilterSpec, source: &Image) -> Result<Image, OpsError> {
        if source.is_empty() {
            return Err(OpsError::InvalidImage {
                width: source.width(),
                height: source.height(),
            });
        }

        let start = Instant::now();
        let image = match validate(*spec) {
            FilterSpec::Grayscale => crate::grayscale::grayscale(source),
            FilterSpec::Blur { kernel_size } => crate::blur::gaussian_blur_rgb(source, kernel_size),
            FilterSpec::EdgeDetect { threshold } => crate::edge::edge_detect(source, threshold),
            FilterSpec::Brightness { delta } => crate::tone::brightness(source, delta),
            FilterSpec::Contrast { scale } => crate::tone::contrast(source, scale),
            FilterSpec::Sepia => crate::tone::sepia(source),
        };
        tracing::trace!(
            elapsed = ?start.elapsed(),
            fingerprint = image.fingerprint(),
            "filter applied"
        );
        Ok(image)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::filter::FilterKind;
    use crate::types::RgbImage;

    #[allow(clippy::cast_possible_truncation)]
    fn gradient() -> Image {
        Image::new(RgbImage::from_fn(24, 16, |x, y| {
            image::Rgb([(x * 10) as u8, (y * 15) as u8, ((x + y) * 6) as u8])
        }))
    }

    fn every_spec() -> Vec<FilterSpec> {
        vec![
            FilterSpec::Grayscale,
            FilterSpec::Blur { kernel_size: 1 },
            FilterSpec::Blur { kernel_size: 5 },
            FilterSpec::Blur { kernel_size: 31 },
            FilterSpec::EdgeDetect { threshold: 50 },
            FilterSpec::EdgeDetect { threshold: 200 },
            FilterSpec::Brightness { delta: -100 },
            FilterSpec::Brightness { delta: 100 },
            FilterSpec::Contrast { scale: 0.01 },
            FilterSpec::Contrast { scale: 3.0 },
            FilterSpec::Sepia,
        ]
    }

    #[test]
    fn apply_is_deterministic_for_every_filter() {
        let source = gradient();
        for spec in every_spec() {
            let a = CpuOps.apply(&spec, &source).unwrap();
            let b = CpuOps.apply(&spec, &source).unwrap();
            assert_eq!(a, b, "{spec:?} is not deterministic");
        }
    }

    #[test]
    fn apply_never_mutates_source() {
        let source = gradient();
        let before = source.fingerprint();
        for spec in every_spec() {
            let out = CpuOps.apply(&spec, &source).unwrap();
            assert_eq!(out.dimensions(), source.dimensions(), "{spec:?}");
        }
        assert_eq!(source.fingerprint(), before);
    }

    #[test]
    fn empty_source_is_rejected() {
        let empty = Image::new(RgbImage::new(0, 4));
        for kind in FilterKind::ALL {
            let err = CpuOps.apply(&kind.default_spec(), &empty).unwrap_err();
            assert_eq!(err, OpsError::InvalidImage { width: 0, height: 4 });
        }
    }

    #[test]
    fn unnormalized_spec_matches_its_validated_form() {
        let source = gradient();
        let raw = CpuOps.apply(&FilterSpec::Blur { kernel_size: 4 }, &source).unwrap();
        let normalized = CpuOps.apply(&FilterSpec::Blur { kernel_size: 5 }, &source).unwrap();
        assert_eq!(raw, normalized);
    }

    #[test]
    fn chain_applies_in_order() {
        let source = gradient();
        let specs = [FilterSpec::Grayscale, FilterSpec::Brightness { delta: 10 }];
        let chained = CpuOps.apply_chain(&specs, &source).unwrap();

        let step = CpuOps.apply(&specs[0], &source).unwrap();
        let step = CpuOps.apply(&specs[1], &step).unwrap();
        assert_eq!(chained, step);
    }

    #[test]
    fn empty_chain_returns_source() {
        let source = gradient();
        let out = CpuOps.apply_chain(&[], &source).unwrap();
        assert!(out.shares_buffer(&source));
    }

    /// `io::Write` sink shared between the subscriber and the test.
    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn apply_traces_filter_timing() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            CpuOps.apply(&FilterSpec::Sepia, &gradient()).unwrap();
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line = logs
            .lines()
            .find(|l| l.contains("filter applied"))
            .unwrap();
        assert!(line.contains("elapsed="));
        assert!(line.contains("filter=sepia"));
    }
}
