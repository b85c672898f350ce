//! Undo/redo history as an arena of layer-stack snapshots.
//!
//! Snapshots live in a slot arena and the undo/redo stacks hold
//! [`SnapshotId`]s into it. A snapshot is a [`LayerStack`] clone, which
//! shares every pixel buffer with the live stack, so each history step
//! costs one `Vec` of layer handles rather than a copy of the images.
//! Slots are recycled through a free list when a snapshot leaves both
//! stacks (redo invalidated by a new commit, or undo trimmed past the
//! history limit).
//!
//! Visibility is not part of a step. Undo and redo restore layer
//! content and carry the live visibility flags over to every layer
//! index both stacks share.

use std::collections::VecDeque;

use crate::layer::LayerStack;

/// Handle to a snapshot in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotId(usize);

/// Slot arena holding immutable snapshots.
#[derive(Debug, Default)]
struct SnapshotArena {
    slots: Vec<Option<LayerStack>>,
    free: Vec<usize>,
}

impl SnapshotArena {
    fn insert(&mut self, stack: LayerStack) -> SnapshotId {
        if let Some(slot) = self.free.pop() {
            self.slots[slot] = Some(stack);
            SnapshotId(slot)
        } else {
            self.slots.push(Some(stack));
            SnapshotId(self.slots.len() - 1)
        }
    }

    fn take(&mut self, id: SnapshotId) -> Option<LayerStack> {
        let stack = self.slots.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        Some(stack)
    }

    fn get(&self, id: SnapshotId) -> Option<&LayerStack> {
        self.slots.get(id.0)?.as_ref()
    }

    fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/// Bounded undo history with a redo branch.
#[derive(Debug)]
pub struct History {
    arena: SnapshotArena,
    undo: VecDeque<SnapshotId>,
    redo: Vec<SnapshotId>,
    limit: usize,
}

impl History {
    /// Empty history keeping at most `limit` undo steps (at least 1).
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            arena: SnapshotArena::default(),
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record the stack as it was before a new edit.
    ///
    /// Clears the redo branch. Drops the oldest undo step when the
    /// limit is exceeded.
    pub fn record(&mut self, before: LayerStack) {
        for id in std::mem::take(&mut self.redo) {
            self.arena.take(id);
        }
        let id = self.arena.insert(before);
        self.undo.push_back(id);
        while self.undo.len() > self.limit {
            if let Some(oldest) = self.undo.pop_front() {
                self.arena.take(oldest);
            }
        }
    }

    /// Swap `current` with the most recent undo snapshot, moving the
    /// replaced stack onto the redo branch. Visibility of surviving
    /// layers is kept.
    ///
    /// Returns `false` (leaving `current` alone) if there is nothing to
    /// undo.
    pub fn undo(&mut self, current: &mut LayerStack) -> bool {
        let Some(id) = self.undo.pop_back() else {
            return false;
        };
        let Some(previous) = self.arena.take(id) else {
            return false;
        };
        let replaced = std::mem::replace(current, previous);
        current.carry_visibility(&replaced);
        self.redo.push(self.arena.insert(replaced));
        true
    }

    /// Inverse of [`undo`](Self::undo).
    ///
    /// Returns `false` (leaving `current` alone) if there is nothing to
    /// redo.
    pub fn redo(&mut self, current: &mut LayerStack) -> bool {
        let Some(id) = self.redo.pop() else {
            return false;
        };
        let Some(next) = self.arena.take(id) else {
            return false;
        };
        let replaced = std::mem::replace(current, next);
        current.carry_visibility(&replaced);
        self.undo.push_back(self.arena.insert(replaced));
        true
    }

    /// Number of available undo steps.
    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Number of available redo steps.
    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// The snapshot the next [`undo`](Self::undo) would restore.
    #[must_use]
    pub fn peek_undo(&self) -> Option<&LayerStack> {
        self.arena.get(*self.undo.back()?)
    }

    /// Snapshots currently held in the arena.
    #[must_use]
    pub fn live_snapshots(&self) -> usize {
        self.arena.live()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::filter::FilterSpec;
    use crate::layer::LayerOrigin;
    use crate::types::{Image, RgbImage};

    fn solid(v: u8) -> Image {
        Image::new(RgbImage::from_pixel(1, 1, image::Rgb([v, v, v])))
    }

    fn push(stack: &mut LayerStack, v: u8) {
        let base = stack.composite_index();
        stack.append(
            solid(v),
            format!("L{v}"),
            LayerOrigin::Filter {
                spec: FilterSpec::Sepia,
                base,
            },
        );
    }

    /// Simulate a commit: record, then append.
    fn commit(history: &mut History, stack: &mut LayerStack, v: u8) {
        history.record(stack.clone());
        push(stack, v);
    }

    #[test]
    fn undo_on_empty_history_leaves_stack_alone() {
        let mut history = History::new(10);
        let mut stack = LayerStack::new(solid(0));
        assert!(!history.undo(&mut stack));
        assert!(!history.redo(&mut stack));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn undo_then_redo_round_trips() {
        let mut history = History::new(10);
        let mut stack = LayerStack::new(solid(0));
        commit(&mut history, &mut stack, 1);
        commit(&mut history, &mut stack, 2);
        let after = stack.clone();

        assert!(history.undo(&mut stack));
        assert_eq!(stack.len(), 2);
        assert!(history.undo(&mut stack));
        assert_eq!(stack.len(), 1);
        assert!(!history.undo(&mut stack));

        assert!(history.redo(&mut stack));
        assert!(history.redo(&mut stack));
        assert_eq!(stack, after);
        assert!(!history.redo(&mut stack));
    }

    #[test]
    fn record_clears_redo_and_frees_its_snapshots() {
        let mut history = History::new(10);
        let mut stack = LayerStack::new(solid(0));
        commit(&mut history, &mut stack, 1);
        commit(&mut history, &mut stack, 2);
        history.undo(&mut stack);
        history.undo(&mut stack);
        assert_eq!(history.redo_len(), 2);
        assert_eq!(history.live_snapshots(), 2);

        commit(&mut history, &mut stack, 3);
        assert_eq!(history.redo_len(), 0);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.live_snapshots(), 1);
        assert!(!history.redo(&mut stack));
    }

    #[test]
    fn limit_drops_oldest_steps() {
        let mut history = History::new(2);
        let mut stack = LayerStack::new(solid(0));
        for v in 1..=5 {
            commit(&mut history, &mut stack, v);
        }
        assert_eq!(history.undo_len(), 2);
        assert_eq!(history.live_snapshots(), 2);

        assert!(history.undo(&mut stack));
        assert!(history.undo(&mut stack));
        assert!(!history.undo(&mut stack));
        // Oldest reachable state has layers 0..=3.
        assert_eq!(stack.len(), 4);
    }

    #[test]
    fn slots_are_recycled() {
        let mut history = History::new(1);
        let mut stack = LayerStack::new(solid(0));
        for v in 1..=20 {
            commit(&mut history, &mut stack, v);
        }
        assert_eq!(history.live_snapshots(), 1);
        assert!(history.arena.slots.len() <= 2);
    }

    #[test]
    fn peek_undo_shows_previous_state() {
        let mut history = History::new(10);
        let mut stack = LayerStack::new(solid(0));
        assert!(history.peek_undo().is_none());
        commit(&mut history, &mut stack, 1);
        assert_eq!(history.peek_undo().unwrap().len(), 1);
    }

    #[test]
    fn snapshots_share_pixel_buffers_with_live_stack() {
        let mut history = History::new(10);
        let mut stack = LayerStack::new(solid(0));
        commit(&mut history, &mut stack, 1);
        let snapshot = history.peek_undo().unwrap();
        assert!(
            snapshot
                .original()
                .image()
                .shares_buffer(stack.original().image())
        );
    }

    #[test]
    fn undo_and_redo_keep_live_visibility() {
        let mut history = History::new(10);
        let mut stack = LayerStack::new(solid(0));
        commit(&mut history, &mut stack, 1);
        commit(&mut history, &mut stack, 2);
        stack.set_visibility(1, false).unwrap();

        assert!(history.undo(&mut stack));
        assert!(!stack.get(1).unwrap().is_visible());
        assert_eq!(stack.composite(), solid(0));

        stack.set_visibility(1, true).unwrap();
        assert!(history.redo(&mut stack));
        assert!(stack.get(1).unwrap().is_visible());
        assert_eq!(stack.composite(), solid(2));
    }

    #[test]
    fn zero_limit_is_raised_to_one() {
        let mut history = History::new(0);
        let mut stack = LayerStack::new(solid(0));
        commit(&mut history, &mut stack, 1);
        assert_eq!(history.undo_len(), 1);
    }
}
