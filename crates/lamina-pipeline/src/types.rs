//! Shared types for the lamina edit pipeline.

use std::hash::Hasher;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use crate::filter::FilterKind;

/// Re-export `RgbImage` so downstream crates can build and inspect
/// pixel buffers without depending on `image` directly.
pub use image::RgbImage;

/// Re-export `GrayImage` for the single-channel intermediates used by
/// luma-based filters.
pub use image::GrayImage;

/// An immutable 3-channel, 8-bit RGB image.
///
/// Cloning an `Image` is cheap: the pixel buffer is reference counted
/// and never mutated after construction. Every filter produces a fresh
/// `Image`, so layers and history snapshots can share buffers freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image(Arc<RgbImage>);

impl Image {
    /// Wrap an owned pixel buffer.
    #[must_use]
    pub fn new(pixels: RgbImage) -> Self {
        Self(Arc::new(pixels))
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Width and height as a [`Dimensions`] value.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Returns `true` if either dimension is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Borrow the underlying pixel buffer.
    #[must_use]
    pub fn pixels(&self) -> &RgbImage {
        &self.0
    }

    /// Take the pixel buffer, cloning it only if other handles exist.
    #[must_use]
    pub fn into_pixels(self) -> RgbImage {
        Arc::unwrap_or_clone(self.0)
    }

    /// Whether two handles point at the same pixel buffer.
    #[must_use]
    pub fn shares_buffer(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Deterministic 64-bit digest of dimensions and pixel data.
    ///
    /// Uses SipHash-1-3 with fixed zero keys so the value is stable
    /// across runs and platforms. Two images with equal fingerprints
    /// are, for all practical purposes, pixel-identical.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(0, 0);
        hasher.write_u32(self.width());
        hasher.write_u32(self.height());
        hasher.write(self.0.as_raw());
        hasher.finish()
    }
}

impl From<RgbImage> for Image {
    fn from(pixels: RgbImage) -> Self {
        Self::new(pixels)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Configuration for an [`EditSession`](crate::EditSession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of undo steps retained. Older steps are dropped
    /// (and their snapshots freed) once the limit is exceeded. Values
    /// below 1 are treated as 1.
    pub max_history: usize,
}

impl SessionConfig {
    /// Default for [`max_history`](Self::max_history).
    pub const DEFAULT_MAX_HISTORY: usize = 50;

    /// The effective history limit (never zero).
    #[must_use]
    pub fn history_limit(&self) -> usize {
        self.max_history.max(1)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: Self::DEFAULT_MAX_HISTORY,
        }
    }
}

/// Errors raised by an [`ImageOps`](crate::ImageOps) backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpsError {
    /// The filter name is not part of the catalog.
    #[error("unsupported filter: {0:?}")]
    UnsupportedFilter(String),

    /// The source image has a zero dimension.
    #[error("invalid source image: {width}x{height}")]
    InvalidImage {
        /// Width of the rejected image.
        width: u32,
        /// Height of the rejected image.
        height: u32,
    },
}

/// Misuse of the [`LayerStack`](crate::LayerStack) API.
///
/// No mutation is performed when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayerError {
    /// The index is the fixed original layer or past the end.
    #[error("layer index {index} out of range (stack has {len} layers; layer 0 is fixed)")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Stack length at the time of the call.
        len: usize,
    },

    /// The requested length would remove the original layer.
    #[error("invalid layer stack length {length}: the original layer cannot be removed")]
    InvalidLength {
        /// The requested length.
        length: usize,
    },
}

/// Errors returned by [`EditSession`](crate::EditSession) transitions.
///
/// Every transition is all-or-nothing: when an error is returned the
/// session is exactly as it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Failed to decode the input image.
    #[error("failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The operation needs a loaded image.
    #[error("no image loaded")]
    NoImage,

    /// The operation needs an active preview.
    #[error("no filter preview is active")]
    NotPreviewing,

    /// `commit` was called without a pending preview.
    #[error("nothing to commit")]
    NothingToCommit,

    /// `undo` was called with empty undo history.
    #[error("nothing to undo")]
    NothingToUndo,

    /// `redo` was called with empty redo history.
    #[error("nothing to redo")]
    NothingToRedo,

    /// A preview update named a different filter than the one selected.
    #[error("preview is showing {selected}, cannot update it with {requested} parameters")]
    FilterKindMismatch {
        /// Kind of the active selection.
        selected: FilterKind,
        /// Kind of the rejected update.
        requested: FilterKind,
    },

    /// An imported layer does not match the document size.
    #[error("layer is {actual}, document is {expected}")]
    DimensionMismatch {
        /// Size of the loaded document.
        expected: Dimensions,
        /// Size of the rejected image.
        actual: Dimensions,
    },

    /// The filter backend rejected the request.
    #[error(transparent)]
    Ops(#[from] OpsError),

    /// The layer stack rejected the request.
    #[error(transparent)]
    Layer(#[from] LayerError),
}

impl SessionError {
    /// Whether this is an expected empty-history condition that a UI
    /// should treat as a silent no-op rather than a failure.
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::NothingToCommit | Self::NothingToUndo | Self::NothingToRedo
        )
    }
}
