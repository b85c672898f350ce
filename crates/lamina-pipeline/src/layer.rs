//! Committed layers and full-replace compositing.
//!
//! A [`LayerStack`] is an ordered list of materialized images. Layer 0
//! is always the untouched original and is always visible. Every later
//! layer is the result of one committed edit and can be hidden.
//!
//! # Compositing
//!
//! Layers are not blended. Walking the stack in order, each visible
//! layer replaces the running result, so the composite is simply the
//! last visible layer's image. Hiding the newest layer therefore
//! reveals whatever was visible before it, down to the original.

use crate::filter::FilterSpec;
use crate::types::{Image, LayerError};

/// Label given to layer 0.
pub const ORIGINAL_LABEL: &str = "Original";

/// Where a layer's image came from.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerOrigin {
    /// The loaded image (layer 0 only).
    Original,
    /// A committed filter.
    Filter {
        /// The validated spec that produced the image.
        spec: FilterSpec,
        /// Index of the layer that was the composite when the filter
        /// was previewed.
        base: usize,
    },
    /// An image produced outside the filter catalog; the operation that
    /// made it was not recorded.
    Untracked,
}

impl LayerOrigin {
    /// The filter spec, if this layer came from one.
    #[must_use]
    pub const fn spec(&self) -> Option<&FilterSpec> {
        match self {
            Self::Filter { spec, .. } => Some(spec),
            Self::Original | Self::Untracked => None,
        }
    }
}

/// One materialized image in the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    image: Image,
    label: String,
    visible: bool,
    origin: LayerOrigin,
}

impl Layer {
    /// The layer's pixels.
    #[must_use]
    pub const fn image(&self) -> &Image {
        &self.image
    }

    /// Display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the layer takes part in compositing.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Provenance of the image.
    #[must_use]
    pub const fn origin(&self) -> &LayerOrigin {
        &self.origin
    }
}

/// Ordered layers with a fixed, always-visible original at index 0.
///
/// The stack is never empty and is never reordered. Layers are only
/// appended, or removed from the tail via [`truncate_to`](Self::truncate_to).
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

#[allow(clippy::len_without_is_empty)]
impl LayerStack {
    /// A stack holding only `original`.
    #[must_use]
    pub fn new(original: Image) -> Self {
        Self {
            layers: vec![Layer {
                image: original,
                label: ORIGINAL_LABEL.to_owned(),
                visible: true,
                origin: LayerOrigin::Original,
            }],
        }
    }

    /// Number of layers, including the original. Always at least 1.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Layer 0.
    #[must_use]
    pub fn original(&self) -> &Layer {
        &self.layers[0]
    }

    /// The layer at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    /// All layers in stack order.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Iterate layers in stack order.
    pub fn iter(&self) -> std::slice::Iter<'_, Layer> {
        self.layers.iter()
    }

    /// Add a visible layer at the tail and return its index.
    ///
    /// `origin` must not be [`LayerOrigin::Original`]; that origin
    /// belongs to layer 0 alone.
    pub fn append(&mut self, image: Image, label: impl Into<String>, origin: LayerOrigin) -> usize {
        debug_assert!(
            origin != LayerOrigin::Original,
            "only layer 0 may have the original origin"
        );
        self.layers.push(Layer {
            image,
            label: label.into(),
            visible: true,
            origin,
        });
        self.layers.len() - 1
    }

    /// Set the visibility of a non-original layer.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::IndexOutOfRange`] if `index` is 0 or past
    /// the end.
    pub fn set_visibility(&mut self, index: usize, visible: bool) -> Result<(), LayerError> {
        let layer = self.editable(index)?;
        layer.visible = visible;
        Ok(())
    }

    /// Flip the visibility of a non-original layer and return the new
    /// value.
    ///
    /// # Errors
    ///
    /// Same as [`set_visibility`](Self::set_visibility).
    pub fn toggle_visibility(&mut self, index: usize) -> Result<bool, LayerError> {
        let layer = self.editable(index)?;
        layer.visible = !layer.visible;
        Ok(layer.visible)
    }

    /// Remove and return every layer at or beyond `length`.
    ///
    /// A `length` at or past the current length removes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::InvalidLength`] if `length` is 0.
    pub fn truncate_to(&mut self, length: usize) -> Result<Vec<Layer>, LayerError> {
        if length < 1 {
            return Err(LayerError::InvalidLength { length });
        }
        if length >= self.layers.len() {
            return Ok(Vec::new());
        }
        Ok(self.layers.split_off(length))
    }

    /// Copy the visibility of every layer `other` also has at the same
    /// index. Layers past the end of `other` keep their own flag.
    pub fn carry_visibility(&mut self, other: &Self) {
        for (layer, theirs) in self.layers.iter_mut().zip(&other.layers).skip(1) {
            layer.visible = theirs.visible;
        }
    }

    /// Index of the layer [`composite`](Self::composite) returns: the
    /// last visible layer.
    #[must_use]
    pub fn composite_index(&self) -> usize {
        self.layers
            .iter()
            .enumerate()
            .skip(1)
            .fold(0, |current, (i, layer)| if layer.visible { i } else { current })
    }

    /// The visible result under full-replace compositing.
    ///
    /// O(n) in layer count; returns a shared handle, not a copy.
    #[must_use]
    pub fn composite(&self) -> Image {
        self.layers[self.composite_index()].image.clone()
    }

    fn editable(&mut self, index: usize) -> Result<&mut Layer, LayerError> {
        let len = self.layers.len();
        if index == 0 {
            return Err(LayerError::IndexOutOfRange { index, len });
        }
        self.layers
            .get_mut(index)
            .ok_or(LayerError::IndexOutOfRange { index, len })
    }
}

impl<'a> IntoIterator for &'a LayerStack {
    type Item = &'a Layer;
    type IntoIter = std::slice::Iter<'a, Layer>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::RgbImage;

    fn solid(v: u8) -> Image {
        Image::new(RgbImage::from_pixel(2, 2, image::Rgb([v, v, v])))
    }

    fn filter(base: usize) -> LayerOrigin {
        LayerOrigin::Filter {
            spec: FilterSpec::Grayscale,
            base,
        }
    }

    /// Original (0) plus layers with values 1..=n.
    fn stack_with(n: u8) -> LayerStack {
        let mut stack = LayerStack::new(solid(0));
        for v in 1..=n {
            let base = stack.composite_index();
            stack.append(solid(v), format!("L{v}"), filter(base));
        }
        stack
    }

    #[test]
    fn carry_visibility_copies_shared_indices_only() {
        let mut hidden = stack_with(3);
        hidden.set_visibility(1, false).unwrap();
        hidden.set_visibility(3, false).unwrap();

        let mut shorter = stack_with(2);
        shorter.carry_visibility(&hidden);
        assert!(!shorter.get(1).unwrap().is_visible());
        assert!(shorter.get(2).unwrap().is_visible());

        let mut longer = stack_with(4);
        longer.set_visibility(4, false).unwrap();
        longer.carry_visibility(&shorter);
        assert!(!longer.get(1).unwrap().is_visible());
        assert!(longer.get(3).unwrap().is_visible());
        assert!(!longer.get(4).unwrap().is_visible());
        assert!(longer.original().is_visible());
    }

    #[test]
    fn new_stack_holds_only_the_original() {
        let stack = LayerStack::new(solid(9));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.original().label(), ORIGINAL_LABEL);
        assert!(stack.original().is_visible());
        assert_eq!(stack.original().origin(), &LayerOrigin::Original);
        assert_eq!(stack.composite(), solid(9));
    }

    #[test]
    fn append_returns_tail_index_and_is_visible() {
        let mut stack = LayerStack::new(solid(0));
        assert_eq!(stack.append(solid(1), "one", filter(0)), 1);
        assert_eq!(stack.append(solid(2), "two", LayerOrigin::Untracked), 2);
        assert!(stack.get(2).unwrap().is_visible());
        assert_eq!(stack.get(1).unwrap().label(), "one");
    }

    #[test]
    fn original_visibility_cannot_change() {
        let mut stack = stack_with(2);
        assert_eq!(
            stack.set_visibility(0, false),
            Err(LayerError::IndexOutOfRange { index: 0, len: 3 })
        );
        assert_eq!(
            stack.toggle_visibility(0),
            Err(LayerError::IndexOutOfRange { index: 0, len: 3 })
        );
        assert!(stack.original().is_visible());
    }

    #[test]
    fn visibility_index_past_end_is_rejected() {
        let mut stack = stack_with(2);
        let before = stack.clone();
        assert_eq!(
            stack.set_visibility(3, false),
            Err(LayerError::IndexOutOfRange { index: 3, len: 3 })
        );
        assert_eq!(stack, before);
    }

    #[test]
    fn composite_is_last_visible_layer() {
        let mut stack = stack_with(3);
        assert_eq!(stack.composite(), solid(3));

        stack.set_visibility(3, false).unwrap();
        assert_eq!(stack.composite_index(), 2);
        assert_eq!(stack.composite(), solid(2));

        // A hidden middle layer does not matter while a later one is visible.
        stack.set_visibility(3, true).unwrap();
        stack.set_visibility(2, false).unwrap();
        assert_eq!(stack.composite(), solid(3));

        stack.set_visibility(3, false).unwrap();
        assert_eq!(stack.composite(), solid(1));
    }

    #[test]
    fn hiding_every_layer_reveals_the_original() {
        let mut stack = stack_with(3);
        for i in 1..=3 {
            stack.set_visibility(i, false).unwrap();
        }
        assert_eq!(stack.composite_index(), 0);
        assert_eq!(stack.composite(), solid(0));
    }

    #[test]
    fn toggle_flips_and_reports() {
        let mut stack = stack_with(1);
        assert!(!stack.toggle_visibility(1).unwrap());
        assert!(stack.toggle_visibility(1).unwrap());
    }

    #[test]
    fn truncate_returns_removed_tail() {
        let mut stack = stack_with(4);
        let removed = stack.truncate_to(2).unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(removed.len(), 3);
        assert_eq!(removed[0].label(), "L2");
        assert_eq!(removed[2].label(), "L4");
        assert_eq!(stack.composite(), solid(1));
    }

    #[test]
    fn truncate_to_zero_is_invalid_and_harmless() {
        let mut stack = stack_with(2);
        assert_eq!(
            stack.truncate_to(0),
            Err(LayerError::InvalidLength { length: 0 })
        );
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn truncate_to_one_keeps_the_original() {
        let mut stack = stack_with(2);
        stack.truncate_to(1).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.composite(), solid(0));
    }

    #[test]
    fn truncate_past_end_removes_nothing() {
        let mut stack = stack_with(2);
        assert!(stack.truncate_to(10).unwrap().is_empty());
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn cloned_stacks_share_images() {
        let stack = stack_with(2);
        let copy = stack.clone();
        for (a, b) in stack.iter().zip(&copy) {
            assert!(a.image().shares_buffer(b.image()));
        }
    }

    #[test]
    fn origin_spec_accessor() {
        assert_eq!(filter(0).spec(), Some(&FilterSpec::Grayscale));
        assert_eq!(LayerOrigin::Untracked.spec(), None);
        assert_eq!(LayerOrigin::Original.spec(), None);
    }
}
