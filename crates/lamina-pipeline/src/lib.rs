//! lamina-pipeline: Non-destructive layered edit pipeline (sans-IO).
//!
//! Holds an original image, a stack of committed filter layers, a live
//! preview of the pending filter and bounded undo/redo history:
//!
//! select filter -> preview -> commit (new layer) -> undo / redo,
//! with per-layer visibility deciding the composite.
//!
//! This crate has **no I/O dependencies** -- it decodes in-memory byte
//! slices and hands back immutable [`Image`] values. Files, windows and
//! logging setup live in the `lamina` binary.

pub mod blur;
pub mod codec;
pub mod edge;
pub mod filter;
pub mod grayscale;
pub mod history;
pub mod layer;
pub mod ops;
pub mod session;
pub mod tone;
pub mod types;

pub use filter::{FilterKind, FilterSpec, ParamSchema, describe, validate};
pub use history::History;
pub use layer::{Layer, LayerOrigin, LayerStack};
pub use ops::{CpuOps, ImageOps};
pub use session::{EditSession, SessionState};
pub use types::{
    Dimensions, GrayImage, Image, LayerError, OpsError, RgbImage, SessionConfig, SessionError,
};
