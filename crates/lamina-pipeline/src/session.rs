//! The edit session: preview, commit, undo/redo and layer visibility.
//!
//! ```text
//!            load                select_filter(Some)
//!   Empty ─────────▶ Loaded ◀──────────────────────▶ Previewing
//!                      ▲    commit / select(None) /        │
//!                      │    undo / redo                    │ update_preview_params
//!                      └───────────────────────────────────┘
//! ```
//!
//! Every transition is all-or-nothing. Fallible work (decoding,
//! running a filter) finishes before any session state is replaced, so
//! an error leaves the session exactly as it was.
//!
//! ```rust
//! # use lamina_pipeline::{EditSession, FilterSpec, Image, RgbImage, SessionError};
//! # fn run() -> Result<(), SessionError> {
//! let mut session: EditSession = EditSession::default();
//! session.load_image(None, Image::new(RgbImage::new(8, 8)))?;
//! session.select_filter(Some(FilterSpec::Blur { kernel_size: 3 }))?;
//! session.update_preview_params(FilterSpec::Blur { kernel_size: 7 })?;
//! session.commit()?;
//! session.undo()?;
//! session.redo()?;
//! # Ok(())
//! # }
//! ```

use crate::filter::FilterSpec;
use crate::history::History;
use crate::layer::{Layer, LayerOrigin, LayerStack};
use crate::ops::{CpuOps, ImageOps};
use crate::types::{Image, OpsError, SessionConfig, SessionError};

/// Observable state of an [`EditSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No image loaded.
    Empty,
    /// An image is loaded and no filter preview is active.
    Loaded,
    /// A filter is selected and its preview has been computed.
    Previewing,
}

/// A filter preview that has not been committed.
#[derive(Debug, Clone)]
struct Preview {
    spec: FilterSpec,
    /// Composite captured when the filter was selected. Parameter
    /// updates re-run against this, never against a newer composite.
    base: Image,
    base_index: usize,
    image: Image,
}

/// Everything that belongs to one loaded image.
#[derive(Debug)]
struct Document {
    original: Image,
    source_path: Option<String>,
    layers: LayerStack,
    history: History,
    preview: Option<Preview>,
}

/// Non-destructive editing state for one open image.
///
/// Generic over the filter backend so hosts can substitute their own
/// [`ImageOps`]; the default is [`CpuOps`].
#[derive(Debug)]
pub struct EditSession<O = CpuOps> {
    config: SessionConfig,
    ops: O,
    document: Option<Document>,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl EditSession {
    /// A session using the CPU backend.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_ops(config, CpuOps)
    }
}

impl<O: ImageOps> EditSession<O> {
    /// A session using a custom backend.
    #[must_use]
    pub const fn with_ops(config: SessionConfig, ops: O) -> Self {
        Self {
            config,
            ops,
            document: None,
        }
    }

    /// The session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The filter backend.
    #[must_use]
    pub const fn ops(&self) -> &O {
        &self.ops
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match &self.document {
            None => SessionState::Empty,
            Some(doc) if doc.preview.is_some() => SessionState::Previewing,
            Some(_) => SessionState::Loaded,
        }
    }

    // ───────────────────────── Loading ─────────────────────────

    /// Decode `bytes` and start a fresh document.
    ///
    /// On success, layers, history and any preview are replaced in one
    /// step. `source_path` is recorded for script export.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EmptyInput`] or [`SessionError::ImageLoad`]
    /// if decoding fails; the previous document (if any) is untouched.
    pub fn load(&mut self, bytes: &[u8], source_path: Option<&str>) -> Result<&Image, SessionError> {
        let image = crate::codec::decode(bytes)?;
        self.load_image(source_path.map(str::to_owned), image)
    }

    /// Start a fresh document from an already-decoded image.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::InvalidImage`] (wrapped) if the image has a
    /// zero dimension.
    pub fn load_image(
        &mut self,
        source_path: Option<String>,
        image: Image,
    ) -> Result<&Image, SessionError> {
        if image.is_empty() {
            return Err(OpsError::InvalidImage {
                width: image.width(),
                height: image.height(),
            }
            .into());
        }
        tracing::debug!(
            path = source_path.as_deref().unwrap_or("<memory>"),
            dimensions = %image.dimensions(),
            "loaded image"
        );
        let doc = self.document.insert(Document {
            layers: LayerStack::new(image.clone()),
            history: History::new(self.config.history_limit()),
            original: image,
            source_path,
            preview: None,
        });
        Ok(&doc.original)
    }

    // ───────────────────────── Preview ─────────────────────────

    /// Select a filter and compute its preview from the current
    /// composite, or clear the preview with `None`.
    ///
    /// The spec is normalized with [`validate`](crate::filter::validate)
    /// first. Returns the preview image, or `None` when cleared.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoImage`] with no document loaded, or the
    /// backend's error if the filter fails (the previous preview, if
    /// any, is kept).
    pub fn select_filter(
        &mut self,
        selection: Option<FilterSpec>,
    ) -> Result<Option<&Image>, SessionError> {
        let doc = self.document.as_mut().ok_or(SessionError::NoImage)?;
        let Some(spec) = selection else {
            doc.preview = None;
            return Ok(None);
        };

        let spec = spec.validated();
        let base_index = doc.layers.composite_index();
        let base = doc.layers.composite();
        let image = self.ops.apply(&spec, &base)?;
        tracing::debug!(filter = %spec.kind(), base = base_index, "preview selected");

        let preview = doc.preview.insert(Preview {
            spec,
            base,
            base_index,
            image,
        });
        Ok(Some(&preview.image))
    }

    /// Clear any active preview. Equivalent to `select_filter(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoImage`] with no document loaded.
    pub fn cancel_preview(&mut self) -> Result<(), SessionError> {
        self.select_filter(None).map(|_| ())
    }

    /// Re-run the selected filter with new parameters against the base
    /// captured at selection time.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotPreviewing`] without an active
    /// preview, [`SessionError::FilterKindMismatch`] if `spec` is a
    /// different filter, or the backend's error.
    pub fn update_preview_params(&mut self, spec: FilterSpec) -> Result<&Image, SessionError> {
        let doc = self.document.as_mut().ok_or(SessionError::NoImage)?;
        let preview = doc.preview.as_mut().ok_or(SessionError::NotPreviewing)?;

        let spec = spec.validated();
        if spec.kind() != preview.spec.kind() {
            return Err(SessionError::FilterKindMismatch {
                selected: preview.spec.kind(),
                requested: spec.kind(),
            });
        }
        let image = self.ops.apply(&spec, &preview.base)?;
        preview.spec = spec;
        preview.image = image;
        Ok(&preview.image)
    }

    // ───────────────────────── Commit ─────────────────────────

    /// Turn the pending preview into a new layer and return its index.
    ///
    /// Records an undo step and invalidates redo.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NothingToCommit`] without a pending
    /// preview.
    pub fn commit(&mut self) -> Result<usize, SessionError> {
        let doc = self.document_mut()?;
        let preview = doc.preview.take().ok_or(SessionError::NothingToCommit)?;

        doc.history.record(doc.layers.clone());
        let index = doc.layers.append(
            preview.image,
            preview.spec.label(),
            LayerOrigin::Filter {
                spec: preview.spec,
                base: preview.base_index,
            },
        );
        tracing::debug!(
            index,
            filter = %preview.spec.kind(),
            undo_depth = doc.history.undo_len(),
            "committed layer"
        );
        Ok(index)
    }

    /// Commit an image produced outside the filter catalog (a paste, a
    /// hand-painted edit) as an [`Untracked`](LayerOrigin::Untracked)
    /// layer. Any pending preview is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DimensionMismatch`] unless `image` has
    /// the document's dimensions.
    pub fn import_layer(
        &mut self,
        image: Image,
        label: impl Into<String>,
    ) -> Result<usize, SessionError> {
        let doc = self.document_mut()?;
        if image.dimensions() != doc.original.dimensions() {
            return Err(SessionError::DimensionMismatch {
                expected: doc.original.dimensions(),
                actual: image.dimensions(),
            });
        }

        doc.preview = None;
        doc.history.record(doc.layers.clone());
        let index = doc.layers.append(image, label, LayerOrigin::Untracked);
        tracing::debug!(index, "imported untracked layer");
        Ok(index)
    }

    // ───────────────────────── History ─────────────────────────

    /// Restore the layer stack as it was before the last commit.
    ///
    /// Layers that survive keep their current visibility. Any pending
    /// preview is discarded, since its base may no longer
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NothingToUndo`] if history is empty.
    pub fn undo(&mut self) -> Result<(), SessionError> {
        let doc = self.document_mut()?;
        if !doc.history.undo(&mut doc.layers) {
            return Err(SessionError::NothingToUndo);
        }
        doc.preview = None;
        tracing::debug!(layers = doc.layers.len(), "undo");
        Ok(())
    }

    /// Re-apply the last undone commit.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NothingToRedo`] if there is nothing to
    /// redo.
    pub fn redo(&mut self) -> Result<(), SessionError> {
        let doc = self.document_mut()?;
        if !doc.history.redo(&mut doc.layers) {
            return Err(SessionError::NothingToRedo);
        }
        doc.preview = None;
        tracing::debug!(layers = doc.layers.len(), "redo");
        Ok(())
    }

    /// Whether [`undo`](Self::undo) would succeed.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.document
            .as_ref()
            .is_some_and(|doc| doc.history.undo_len() > 0)
    }

    /// Whether [`redo`](Self::redo) would succeed.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.document
            .as_ref()
            .is_some_and(|doc| doc.history.redo_len() > 0)
    }

    // ───────────────────────── Visibility ─────────────────────────

    /// Flip a layer's visibility and return the new composite.
    ///
    /// Visibility is a view setting: it is not recorded in undo
    /// history, and an active preview keeps its original base.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::IndexOutOfRange`](crate::LayerError) for
    /// index 0 or past the end.
    pub fn toggle_layer_visibility(&mut self, index: usize) -> Result<Image, SessionError> {
        let doc = self.document_mut()?;
        let visible = doc.layers.toggle_visibility(index)?;
        tracing::debug!(index, visible, "layer visibility changed");
        Ok(doc.layers.composite())
    }

    /// Set a layer's visibility and return the new composite.
    ///
    /// # Errors
    ///
    /// Same as [`toggle_layer_visibility`](Self::toggle_layer_visibility).
    pub fn set_layer_visibility(
        &mut self,
        index: usize,
        visible: bool,
    ) -> Result<Image, SessionError> {
        let doc = self.document_mut()?;
        doc.layers.set_visibility(index, visible)?;
        tracing::debug!(index, visible, "layer visibility changed");
        Ok(doc.layers.composite())
    }

    // ───────────────────────── Accessors ─────────────────────────

    /// The loaded, unmodified image.
    #[must_use]
    pub fn original_image(&self) -> Option<&Image> {
        self.document.as_ref().map(|doc| &doc.original)
    }

    /// The visible result of the committed layers.
    #[must_use]
    pub fn composite(&self) -> Option<Image> {
        self.document.as_ref().map(|doc| doc.layers.composite())
    }

    /// The committed layer stack.
    #[must_use]
    pub fn layers(&self) -> Option<&LayerStack> {
        self.document.as_ref().map(|doc| &doc.layers)
    }

    /// Shorthand for `layers()` as a slice, empty without a document.
    #[must_use]
    pub fn layer_list(&self) -> &[Layer] {
        self.document
            .as_ref()
            .map(|doc| doc.layers.layers())
            .unwrap_or_default()
    }

    /// Path the image was loaded from, if known.
    #[must_use]
    pub fn source_path(&self) -> Option<&str> {
        self.document.as_ref()?.source_path.as_deref()
    }

    /// The selected (validated) filter, if previewing.
    #[must_use]
    pub fn current_selection(&self) -> Option<FilterSpec> {
        Some(self.document.as_ref()?.preview.as_ref()?.spec)
    }

    /// The pending preview image, if previewing.
    #[must_use]
    pub fn pending_preview(&self) -> Option<&Image> {
        Some(&self.document.as_ref()?.preview.as_ref()?.image)
    }

    fn document_mut(&mut self) -> Result<&mut Document, SessionError> {
        self.document.as_mut().ok_or(SessionError::NoImage)
    }
}
