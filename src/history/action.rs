// ============================================================================
// HISTORY ACTIONS: one variant per kind of undoable change
// ============================================================================
//
// Each variant carries only the delta needed to replay its change in either
// direction. Pixel and mask deltas are gathered in a hash map while the
// gesture is running (so a pixel touched twice keeps its first "old" value)
// and frozen into a sorted vector by `build()` when the action is committed.

use std::collections::HashMap;

use crate::canvas::CanvasState;
use crate::frame::Frame;
use crate::layer::Layer;
use crate::pixels::{Color, PixelBuffer, Point, Size};
use crate::selection::Selection;

// ----------------------------------------------------------------------------
//  Pixel deltas
// ----------------------------------------------------------------------------

/// Address of one pixel on one layer of one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PixelKey {
    pub frame: u64,
    pub layer: u64,
    pub pos: Point,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelDelta {
    pub key: PixelKey,
    pub old: Color,
    pub new: Color,
}

/// Two-phase pixel change log.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PixelChanges {
    pending: HashMap<PixelKey, (Color, Color)>,
    built: Vec<PixelDelta>,
}

impl PixelChanges {
    /// Note a pixel going from `old` to `new`. Repeated writes keep the very
    /// first `old`.
    pub fn record(&mut self, key: PixelKey, old: Color, new: Color) {
        self.pending
            .entry(key)
            .and_modify(|e| e.1 = new)
            .or_insert((old, new));
    }

    pub fn has_changes(&self) -> bool {
        !self.built.is_empty() || self.pending.values().any(|(old, new)| old != new)
    }

    /// Number of pixels that actually changed.
    pub fn len(&self) -> usize {
        self.built.len() + self.pending.values().filter(|(old, new)| old != new).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze pending entries into the dense, key-sorted array. No-op
    /// entries are dropped.
    pub fn build(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.built.extend(
            self.pending
                .drain()
                .filter(|(_, (old, new))| old != new)
                .map(|(key, (old, new))| PixelDelta { key, old, new }),
        );
        self.built.sort_by_key(|d| d.key);
        self.pending.shrink_to_fit();
    }

    pub fn deltas(&self) -> &[PixelDelta] {
        &self.built
    }

    fn apply(&self, state: &mut CanvasState, forward: bool) {
        for d in &self.built {
            let color = if forward { d.new } else { d.old };
            state.write_layer_pixel(d.key.frame, d.key.layer, d.key.pos, color);
        }
        // Not built yet (replayed mid-gesture): fall back to the map.
        for (key, (old, new)) in &self.pending {
            state.write_layer_pixel(key.frame, key.layer, key.pos, if forward { *new } else { *old });
        }
    }
}

// ----------------------------------------------------------------------------
//  Selection mask deltas
// ----------------------------------------------------------------------------

/// Two-phase log of mask bits, keyed by mask position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaskChanges {
    pending: HashMap<Point, (bool, bool)>,
    built: Vec<(Point, bool, bool)>,
}

impl MaskChanges {
    pub fn record(&mut self, local: Point, old: bool, new: bool) {
        self.pending
            .entry(local)
            .and_modify(|e| e.1 = new)
            .or_insert((old, new));
    }

    pub fn has_changes(&self) -> bool {
        !self.built.is_empty() || self.pending.values().any(|(old, new)| old != new)
    }

    pub fn len(&self) -> usize {
        self.built.len() + self.pending.values().filter(|(old, new)| old != new).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn build(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.built.extend(
            self.pending
                .drain()
                .filter(|(_, (old, new))| old != new)
                .map(|(p, (old, new))| (p, old, new)),
        );
        self.built.sort_by_key(|(p, _, _)| *p);
        self.pending.shrink_to_fit();
    }

    fn apply(&self, state: &mut CanvasState, forward: bool) {
        let entries = self
            .built
            .iter()
            .copied()
            .chain(self.pending.iter().map(|(p, (o, n))| (*p, *o, *n)));
        for (local, old, new) in entries {
            state.selection.set_local(local, if forward { new } else { old });
            let p = state.selection.to_canvas(local);
            state.chunks.mark_pixel(p);
        }
    }
}

// ----------------------------------------------------------------------------
//  Whole-buffer swaps (flip / rotate / resize / crop)
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct BufferSwap {
    pub frame: u64,
    pub layer: u64,
    pub old: PixelBuffer,
    pub new: PixelBuffer,
}

// ----------------------------------------------------------------------------
//  The action enum
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionType {
    Pixels,
    Selection,
    SelectionMove,
    LayerOpacity,
    LayerVisibility,
    LayerName,
    LayerAdded,
    LayerRemoved,
    LayerMoved,
    LayersMerged,
    FrameAdded,
    FrameRemoved,
    FrameMoved,
    CanvasTransform,
}

#[derive(Clone, Debug, PartialEq)]
pub enum HistoryAction {
    /// Brush strokes, fills, gradients, colour replacement, cut.
    PixelsChanged {
        description: String,
        changes: PixelChanges,
    },
    SelectionChanged {
        changes: MaskChanges,
    },
    /// Lift, slide (and maybe rotate), then drop of a floating selection.
    SelectionMoved {
        old_offset: Point,
        new_offset: Point,
        mask: MaskChanges,
        pixels: PixelChanges,
    },
    LayerOpacity {
        frame: u64,
        layer: u64,
        old: f32,
        new: f32,
    },
    LayerVisibility {
        frame: u64,
        layer: u64,
        old: bool,
        new: bool,
    },
    LayerRenamed {
        frame: u64,
        layer: u64,
        old: String,
        new: String,
    },
    /// New or duplicated layer; `layer` is the snapshot re-inserted on redo.
    LayerAdded {
        frame: u64,
        index: usize,
        layer: Box<Layer>,
    },
    LayerRemoved {
        frame: u64,
        index: usize,
        layer: Box<Layer>,
    },
    LayerMoved {
        frame: u64,
        from: usize,
        to: usize,
    },
    LayersMerged {
        frame: u64,
        /// Index the upper layer had before the merge.
        index: usize,
        upper: Box<Layer>,
        below: u64,
        old_below: PixelBuffer,
        new_below: PixelBuffer,
    },
    FrameAdded {
        index: usize,
        frame: Box<Frame>,
    },
    FrameRemoved {
        index: usize,
        frame: Box<Frame>,
    },
    FrameMoved {
        from: usize,
        to: usize,
    },
    CanvasTransformed {
        description: String,
        old_size: Size,
        new_size: Size,
        layers: Vec<BufferSwap>,
        old_selection: Box<Selection>,
        new_selection: Box<Selection>,
    },
}

impl HistoryAction {
    pub fn pixels(description: impl Into<String>) -> Self {
        Self::PixelsChanged {
            description: description.into(),
            changes: PixelChanges::default(),
        }
    }

    pub fn selection() -> Self {
        Self::SelectionChanged {
            changes: MaskChanges::default(),
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Self::PixelsChanged { .. } => ActionType::Pixels,
            Self::SelectionChanged { .. } => ActionType::Selection,
            Self::SelectionMoved { .. } => ActionType::SelectionMove,
            Self::LayerOpacity { .. } => ActionType::LayerOpacity,
            Self::LayerVisibility { .. } => ActionType::LayerVisibility,
            Self::LayerRenamed { .. } => ActionType::LayerName,
            Self::LayerAdded { .. } => ActionType::LayerAdded,
            Self::LayerRemoved { .. } => ActionType::LayerRemoved,
            Self::LayerMoved { .. } => ActionType::LayerMoved,
            Self::LayersMerged { .. } => ActionType::LayersMerged,
            Self::FrameAdded { .. } => ActionType::FrameAdded,
            Self::FrameRemoved { .. } => ActionType::FrameRemoved,
            Self::FrameMoved { .. } => ActionType::FrameMoved,
            Self::CanvasTransformed { .. } => ActionType::CanvasTransform,
        }
    }

    /// Human-readable label for a history list.
    pub fn description(&self) -> String {
        match self {
            Self::PixelsChanged { description, .. } => description.clone(),
            Self::SelectionChanged { .. } => "Selection".to_string(),
            Self::SelectionMoved { .. } => "Move Selection".to_string(),
            Self::LayerOpacity { new, .. } => format!("Layer Opacity: {:.0}%", new * 100.0),
            Self::LayerVisibility { new, .. } => {
                if *new { "Show Layer".to_string() } else { "Hide Layer".to_string() }
            }
            Self::LayerRenamed { old, new, .. } => format!("Rename: {} → {}", old, new),
            Self::LayerAdded { layer, .. } => format!("Add Layer: {}", layer.name),
            Self::LayerRemoved { layer, .. } => format!("Delete Layer: {}", layer.name),
            Self::LayerMoved { from, to, .. } => format!("Move Layer {} → {}", from, to),
            Self::LayersMerged { upper, .. } => format!("Merge Down: {}", upper.name),
            Self::FrameAdded { index, .. } => format!("Add Frame {}", index + 1),
            Self::FrameRemoved { index, .. } => format!("Delete Frame {}", index + 1),
            Self::FrameMoved { from, to } => format!("Move Frame {} → {}", from + 1, to + 1),
            Self::CanvasTransformed { description, .. } => description.clone(),
        }
    }

    /// Whether this action would change anything when replayed.
    pub fn has_changes(&self) -> bool {
        match self {
            Self::PixelsChanged { changes, .. } => changes.has_changes(),
            Self::SelectionChanged { changes } => changes.has_changes(),
            Self::SelectionMoved { old_offset, new_offset, mask, pixels } => {
                old_offset != new_offset || mask.has_changes() || pixels.has_changes()
            }
            Self::LayerOpacity { old, new, .. } => old != new,
            Self::LayerVisibility { old, new, .. } => old != new,
            Self::LayerRenamed { old, new, .. } => old != new,
            Self::LayerMoved { from, to, .. } | Self::FrameMoved { from, to } => from != to,
            Self::LayerAdded { .. }
            | Self::LayerRemoved { .. }
            | Self::LayersMerged { .. }
            | Self::FrameAdded { .. }
            | Self::FrameRemoved { .. }
            | Self::CanvasTransformed { .. } => true,
        }
    }

    /// Slider-style edits opt in to coalescing with the previous entry.
    pub fn try_merge(&self) -> bool {
        matches!(self, Self::LayerOpacity { .. } | Self::LayerRenamed { .. })
    }

    /// Fold `other` (the newer action) into `self`. Only actions of the same
    /// type aimed at the same layer merge.
    pub fn merge(&mut self, other: &HistoryAction) -> bool {
        match (self, other) {
            (
                Self::LayerOpacity { frame, layer, new, .. },
                Self::LayerOpacity { frame: f2, layer: l2, new: n2, .. },
            ) if frame == f2 && layer == l2 => {
                *new = *n2;
                true
            }
            (
                Self::LayerRenamed { frame, layer, new, .. },
                Self::LayerRenamed { frame: f2, layer: l2, new: n2, .. },
            ) if frame == f2 && layer == l2 => {
                new.clone_from(n2);
                true
            }
            _ => false,
        }
    }

    /// Compact the accumulated deltas once the action is final.
    pub fn build(&mut self) {
        match self {
            Self::PixelsChanged { changes, .. } => changes.build(),
            Self::SelectionChanged { changes } => changes.build(),
            Self::SelectionMoved { mask, pixels, .. } => {
                mask.build();
                pixels.build();
            }
            _ => {}
        }
    }

    /// Note a pixel write. Ignored by variants that carry no pixel deltas.
    pub fn record_pixel(&mut self, key: PixelKey, old: Color, new: Color) {
        match self {
            Self::PixelsChanged { changes, .. } | Self::SelectionMoved { pixels: changes, .. } => {
                changes.record(key, old, new)
            }
            _ => {}
        }
    }

    /// Mask delta recorder, for variants that carry one.
    pub fn mask_changes(&mut self) -> Option<&mut MaskChanges> {
        match self {
            Self::SelectionChanged { changes } | Self::SelectionMoved { mask: changes, .. } => Some(changes),
            _ => None,
        }
    }

    pub fn pixel_changes(&self) -> Option<&PixelChanges> {
        match self {
            Self::PixelsChanged { changes, .. } | Self::SelectionMoved { pixels: changes, .. } => Some(changes),
            _ => None,
        }
    }

    pub fn undo(&self, state: &mut CanvasState) {
        self.replay(state, false);
    }

    pub fn redo(&self, state: &mut CanvasState) {
        self.replay(state, true);
    }

    fn replay(&self, state: &mut CanvasState, forward: bool) {
        match self {
            Self::PixelsChanged { changes, .. } => changes.apply(state, forward),
            Self::SelectionChanged { changes } => changes.apply(state, forward),
            Self::SelectionMoved { old_offset, new_offset, mask, pixels } => {
                // Offsets first: mask deltas are in mask space and do not
                // depend on it, but the dirty marks do.
                state.selection.set_offset(pick(forward, *old_offset, *new_offset));
                mask.apply(state, forward);
                pixels.apply(state, forward);
                state.chunks.mark_all();
            }
            Self::LayerOpacity { frame, layer, old, new } => {
                state.with_layer(*frame, *layer, |l| l.opacity = pick(forward, *old, *new));
                state.layers_changed();
            }
            Self::LayerVisibility { frame, layer, old, new } => {
                state.with_layer(*frame, *layer, |l| l.visible = pick(forward, *old, *new));
                state.layers_changed();
            }
            Self::LayerRenamed { frame, layer, old, new } => {
                let name = pick(forward, old, new).clone();
                state.with_layer(*frame, *layer, |l| l.name = name);
                state.layers_changed();
            }
            Self::LayerAdded { frame, index, layer } => {
                if forward {
                    Self::insert_layer(state, *frame, *index, layer);
                } else {
                    Self::remove_layer(state, *frame, layer.id);
                }
            }
            Self::LayerRemoved { frame, index, layer } => {
                if forward {
                    Self::remove_layer(state, *frame, layer.id);
                } else {
                    Self::insert_layer(state, *frame, *index, layer);
                }
            }
            Self::LayerMoved { frame, from, to } => {
                if let Some(f) = state.reel.frame_by_id_mut(*frame) {
                    let (a, b) = if forward { (*from, *to) } else { (*to, *from) };
                    f.move_layer_to(a, b);
                }
                state.layers_changed();
            }
            Self::LayersMerged { frame, index, upper, below, old_below, new_below } => {
                if let Some(f) = state.reel.frame_by_id_mut(*frame) {
                    if forward {
                        if let Some(i) = f.layer_index(upper.id) {
                            f.remove_layer(i);
                        }
                        if let Some(l) = f.layer_by_id_mut(*below) {
                            l.replace_pixels(new_below.clone());
                        }
                    } else {
                        if let Some(l) = f.layer_by_id_mut(*below) {
                            l.replace_pixels(old_below.clone());
                        }
                        f.insert_layer(*index, (**upper).clone());
                    }
                }
                state.layers_changed();
            }
            Self::FrameAdded { index, frame } => {
                if forward {
                    state.reel.add_frame(*index, (**frame).clone());
                } else if let Some(i) = state.reel.find_frame(frame.id) {
                    state.reel.remove_frame(i);
                }
                state.frames_changed();
            }
            Self::FrameRemoved { index, frame } => {
                if forward {
                    if let Some(i) = state.reel.find_frame(frame.id) {
                        state.reel.remove_frame(i);
                    }
                } else {
                    state.reel.add_frame(*index, (**frame).clone());
                }
                state.frames_changed();
            }
            Self::FrameMoved { from, to } => {
                let (a, b) = if forward { (*from, *to) } else { (*to, *from) };
                state.reel.move_frame(a, b);
                state.frames_changed();
            }
            Self::CanvasTransformed { old_size, new_size, layers, old_selection, new_selection, .. } => {
                let size = pick(forward, *old_size, *new_size);
                for frame in state.reel.frames_mut() {
                    frame.set_size(size);
                }
                for swap in layers {
                    let buffer = pick(forward, &swap.old, &swap.new).clone();
                    state.with_layer(swap.frame, swap.layer, |l| {
                        l.replace_pixels(buffer);
                    });
                }
                let selection = pick(forward, old_selection, new_selection);
                state.selection = (**selection).clone();
                state.set_size(size);
                state.layers_changed();
            }
        }
    }

    fn insert_layer(state: &mut CanvasState, frame: u64, index: usize, layer: &Layer) {
        if let Some(f) = state.reel.frame_by_id_mut(frame) {
            f.insert_layer(index, layer.clone());
        }
        state.layers_changed();
    }

    fn remove_layer(state: &mut CanvasState, frame: u64, layer: u64) {
        if let Some(f) = state.reel.frame_by_id_mut(frame)
            && let Some(i) = f.layer_index(layer)
        {
            f.remove_layer(i);
        }
        state.layers_changed();
    }
}

/// `new` when replaying forward, `old` when undoing.
fn pick<T>(forward: bool, old: T, new: T) -> T {
    if forward { new } else { old }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(x: i32) -> PixelKey {
        PixelKey { frame: 1, layer: 2, pos: Point::new(x, 0) }
    }

    #[test]
    fn repeated_writes_keep_first_old_value() {
        let mut changes = PixelChanges::default();
        changes.record(key(0), Color::WHITE, Color::RED);
        changes.record(key(0), Color::RED, Color::BLACK);
        changes.build();
        assert_eq!(changes.deltas(), &[PixelDelta { key: key(0), old: Color::WHITE, new: Color::BLACK }]);
    }

    #[test]
    fn build_drops_round_trips_and_sorts() {
        let mut changes = PixelChanges::default();
        changes.record(key(3), Color::WHITE, Color::RED);
        changes.record(key(1), Color::WHITE, Color::RED);
        changes.record(key(2), Color::WHITE, Color::RED);
        changes.record(key(2), Color::RED, Color::WHITE);
        assert_eq!(changes.len(), 2);
        changes.build();
        let xs: Vec<i32> = changes.deltas().iter().map(|d| d.key.pos.x).collect();
        assert_eq!(xs, vec![1, 3]);
    }

    #[test]
    fn opacity_merges_only_on_same_layer() {
        let mut a = HistoryAction::LayerOpacity { frame: 1, layer: 2, old: 1.0, new: 0.8 };
        let b = HistoryAction::LayerOpacity { frame: 1, layer: 2, old: 0.8, new: 0.5 };
        let c = HistoryAction::LayerOpacity { frame: 1, layer: 3, old: 1.0, new: 0.2 };
        assert!(a.merge(&b));
        assert!(!a.merge(&c));
        assert_eq!(a, HistoryAction::LayerOpacity { frame: 1, layer: 2, old: 1.0, new: 0.5 });
    }

    #[test]
    fn empty_actions_report_no_changes() {
        assert!(!HistoryAction::pixels("Pencil").has_changes());
        assert!(!HistoryAction::selection().has_changes());
        assert!(!HistoryAction::LayerMoved { frame: 1, from: 2, to: 2 }.has_changes());
    }
}
