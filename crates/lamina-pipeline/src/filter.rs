//! Filter catalog: the closed set of filter kinds, their parameter
//! schemas, and normalization of user-supplied parameters.
//!
//! Everything here is pure. [`validate`] never fails -- out-of-range
//! input is clamped into range so a slider or a hand-written script
//! can never produce a spec the image backend would reject.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::OpsError;

/// Smallest Gaussian kernel size (identity blur).
pub const MIN_KERNEL_SIZE: i32 = 1;
/// Largest Gaussian kernel size.
pub const MAX_KERNEL_SIZE: i32 = 31;
const _: () = assert!(MAX_KERNEL_SIZE % 2 == 1);
/// Default Gaussian kernel size.
pub const DEFAULT_KERNEL_SIZE: i32 = 5;

/// Lowest edge-detection threshold.
pub const MIN_EDGE_THRESHOLD: i32 = 50;
/// Highest edge-detection threshold.
pub const MAX_EDGE_THRESHOLD: i32 = 200;
/// Default edge-detection threshold.
pub const DEFAULT_EDGE_THRESHOLD: i32 = 100;

/// Brightness offset bound (applied symmetrically).
pub const MAX_BRIGHTNESS_DELTA: i32 = 100;

/// Smallest contrast scale `validate` produces. The valid range is open
/// at zero, so only zero and negative scales are raised to this.
pub const MIN_CONTRAST_SCALE: f32 = f32::MIN_POSITIVE;
/// Lower end of the contrast slider.
pub const CONTRAST_SLIDER_MIN: f32 = 0.01;
/// Highest contrast scale.
pub const MAX_CONTRAST_SCALE: f32 = 3.0;
/// Default contrast scale (identity).
pub const DEFAULT_CONTRAST_SCALE: f32 = 1.0;

/// The kind of a filter, without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Luma conversion, re-expanded to three channels.
    Grayscale,
    /// Gaussian blur.
    Blur,
    /// Canny edge detection.
    EdgeDetect,
    /// Additive brightness offset.
    Brightness,
    /// Multiplicative contrast scale.
    Contrast,
    /// Sepia tone matrix.
    Sepia,
}

impl FilterKind {
    /// Every kind, in catalog order.
    pub const ALL: [Self; 6] = [
        Self::Grayscale,
        Self::Blur,
        Self::EdgeDetect,
        Self::Brightness,
        Self::Contrast,
        Self::Sepia,
    ];

    /// Stable machine name, used in scripts and JSON.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Blur => "blur",
            Self::EdgeDetect => "edge_detect",
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Sepia => "sepia",
        }
    }

    /// Human-readable label for menus.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Grayscale => "Grayscale",
            Self::Blur => "Blur",
            Self::EdgeDetect => "Edge Detect",
            Self::Brightness => "Brightness",
            Self::Contrast => "Contrast",
            Self::Sepia => "Sepia",
        }
    }

    /// The spec this kind starts with when first selected.
    #[must_use]
    pub const fn default_spec(self) -> FilterSpec {
        match self {
            Self::Grayscale => FilterSpec::Grayscale,
            Self::Blur => FilterSpec::Blur {
                kernel_size: DEFAULT_KERNEL_SIZE,
            },
            Self::EdgeDetect => FilterSpec::EdgeDetect {
                threshold: DEFAULT_EDGE_THRESHOLD,
            },
            Self::Brightness => FilterSpec::Brightness { delta: 0 },
            Self::Contrast => FilterSpec::Contrast {
                scale: DEFAULT_CONTRAST_SCALE,
            },
            Self::Sepia => FilterSpec::Sepia,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterKind {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| OpsError::UnsupportedFilter(s.to_owned()))
    }
}

/// A filter together with its parameters.
///
/// Serialized as an internally tagged object, e.g.
/// `{"filter": "blur", "kernel_size": 5}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum FilterSpec {
    /// Luma conversion.
    Grayscale,
    /// Gaussian blur with a square `kernel_size` x `kernel_size` kernel.
    Blur {
        /// Positive odd kernel size in `[1, 31]`.
        kernel_size: i32,
    },
    /// Canny edge detection with hysteresis thresholds
    /// `(threshold, 2 * threshold)`.
    EdgeDetect {
        /// Low hysteresis threshold in `[50, 200]`.
        threshold: i32,
    },
    /// Saturating add of `delta` to every channel.
    Brightness {
        /// Offset in `[-100, 100]`.
        delta: i32,
    },
    /// Saturating multiply of every channel by `scale`.
    Contrast {
        /// Scale in `(0, 3]`.
        scale: f32,
    },
    /// Sepia tone.
    Sepia,
}

impl FilterSpec {
    /// The parameter-less kind of this spec.
    #[must_use]
    pub const fn kind(&self) -> FilterKind {
        match self {
            Self::Grayscale => FilterKind::Grayscale,
            Self::Blur { .. } => FilterKind::Blur,
            Self::EdgeDetect { .. } => FilterKind::EdgeDetect,
            Self::Brightness { .. } => FilterKind::Brightness,
            Self::Contrast { .. } => FilterKind::Contrast,
            Self::Sepia => FilterKind::Sepia,
        }
    }

    /// Shorthand for [`validate`].
    #[must_use]
    pub fn validated(self) -> Self {
        validate(self)
    }

    /// Label for a layer created from this spec, e.g. `"Blur (kernel_size 5)"`.
    #[must_use]
    pub fn label(&self) -> String {
        let kind = self.kind().label();
        match *self {
            Self::Grayscale | Self::Sepia => kind.to_owned(),
            Self::Blur { kernel_size } => format!("{kind} (kernel_size {kernel_size})"),
            Self::EdgeDetect { threshold } => format!("{kind} (threshold {threshold})"),
            Self::Brightness { delta } => format!("{kind} (delta {delta:+})"),
            Self::Contrast { scale } => format!("{kind} (scale {scale})"),
        }
    }
}

/// Canny hysteresis thresholds for a low threshold: the high threshold
/// is always exactly twice the low one.
#[must_use]
pub const fn hysteresis_thresholds(threshold: i32) -> (i32, i32) {
    (threshold, threshold * 2)
}

/// Slider metadata for one filter parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSchema {
    /// Parameter name, matching the [`FilterSpec`] field.
    pub name: &'static str,
    /// Smallest accepted value.
    pub min: f64,
    /// Largest accepted value.
    pub max: f64,
    /// Initial slider value.
    pub default: f64,
    /// Slider increment.
    pub step: f64,
}

const BLUR_PARAMS: [ParamSchema; 1] = [ParamSchema {
    name: "kernel_size",
    min: MIN_KERNEL_SIZE as f64,
    max: MAX_KERNEL_SIZE as f64,
    default: DEFAULT_KERNEL_SIZE as f64,
    step: 2.0,
}];

const EDGE_PARAMS: [ParamSchema; 1] = [ParamSchema {
    name: "threshold",
    min: MIN_EDGE_THRESHOLD as f64,
    max: MAX_EDGE_THRESHOLD as f64,
    default: DEFAULT_EDGE_THRESHOLD as f64,
    step: 10.0,
}];

const BRIGHTNESS_PARAMS: [ParamSchema; 1] = [ParamSchema {
    name: "delta",
    min: -MAX_BRIGHTNESS_DELTA as f64,
    max: MAX_BRIGHTNESS_DELTA as f64,
    default: 0.0,
    step: 1.0,
}];

const CONTRAST_PARAMS: [ParamSchema; 1] = [ParamSchema {
    name: "scale",
    min: CONTRAST_SLIDER_MIN as f64,
    max: MAX_CONTRAST_SCALE as f64,
    default: DEFAULT_CONTRAST_SCALE as f64,
    step: 0.05,
}];

/// Parameter schemas for `kind`, for populating UI sliders.
///
/// Parameter-less filters return an empty slice.
#[must_use]
pub const fn describe(kind: FilterKind) -> &'static [ParamSchema] {
    match kind {
        FilterKind::Grayscale | FilterKind::Sepia => &[],
        FilterKind::Blur => &BLUR_PARAMS,
        FilterKind::EdgeDetect => &EDGE_PARAMS,
        FilterKind::Brightness => &BRIGHTNESS_PARAMS,
        FilterKind::Contrast => &CONTRAST_PARAMS,
    }
}

/// Clamp and normalize a spec's parameters into their valid ranges.
///
/// - `kernel_size` is clamped to `[1, 31]`, then an even value is
///   bumped up by one (never down).
/// - `threshold` is clamped to `[50, 200]`.
/// - `delta` is clamped to `[-100, 100]`.
/// - `scale` at or below zero becomes [`MIN_CONTRAST_SCALE`] and above
///   3.0 becomes 3.0; NaN or infinity becomes 1.0.
#[must_use]
pub fn validate(spec: FilterSpec) -> FilterSpec {
    match spec {
        FilterSpec::Grayscale | FilterSpec::Sepia => spec,
        FilterSpec::Blur { kernel_size } => {
            let k = kernel_size.clamp(MIN_KERNEL_SIZE, MAX_KERNEL_SIZE);
            FilterSpec::Blur {
                kernel_size: if k % 2 == 0 { k + 1 } else { k },
            }
        }
        FilterSpec::EdgeDetect { threshold } => FilterSpec::EdgeDetect {
            threshold: threshold.clamp(MIN_EDGE_THRESHOLD, MAX_EDGE_THRESHOLD),
        },
        FilterSpec::Brightness { delta } => FilterSpec::Brightness {
            delta: delta.clamp(-MAX_BRIGHTNESS_DELTA, MAX_BRIGHTNESS_DELTA),
        },
        FilterSpec::Contrast { scale } => FilterSpec::Contrast {
            scale: if scale.is_finite() {
                scale.clamp(MIN_CONTRAST_SCALE, MAX_CONTRAST_SCALE)
            } else {
                DEFAULT_CONTRAST_SCALE
            },
        },
    }
}
