// ============================================================================
// HISTORY: linear undo list with a cursor
// ============================================================================

pub mod action;

use tracing::debug;

use crate::canvas::{CanvasState, Notification};
pub use action::{ActionType, HistoryAction, MaskChanges, PixelChanges, PixelKey};

/// Undo/redo history. `actions[..=last_action_index]` are applied, the rest
/// form the redo branch.
#[derive(Debug)]
pub struct History {
    actions: Vec<HistoryAction>,
    /// `-1` when nothing is applied.
    last_action_index: isize,
    max_len: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

impl History {
    pub fn new(max_len: usize) -> Self {
        Self {
            actions: Vec::new(),
            last_action_index: -1,
            max_len: max_len.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn last_action_index(&self) -> isize {
        self.last_action_index
    }

    pub fn actions(&self) -> &[HistoryAction] {
        &self.actions
    }

    /// Record an action that has already been applied to the canvas.
    pub fn add_action(&mut self, mut action: HistoryAction, state: &mut CanvasState) {
        if !action.has_changes() {
            return;
        }

        // Drop the redo branch
        self.actions.truncate((self.last_action_index + 1) as usize);

        action.build();

        let merged = action.try_merge()
            && self
                .actions
                .last_mut()
                .is_some_and(|prev| prev.try_merge() && prev.action_type() == action.action_type() && prev.merge(&action));

        if merged {
            debug!(action = %action.description(), "history: merged");
        } else {
            debug!(action = %action.description(), "history: push");
            self.actions.push(action);
        }

        // Evict oldest
        if self.actions.len() > self.max_len {
            let excess = self.actions.len() - self.max_len;
            self.actions.drain(..excess);
        }
        self.last_action_index = self.actions.len() as isize - 1;
        state.notify(Notification::HistoryChanged);
    }

    pub fn can_undo(&self) -> bool {
        self.last_action_index >= 0
    }

    pub fn can_redo(&self) -> bool {
        self.last_action_index + 1 < self.actions.len() as isize
    }

    /// Returns the description of the undone action.
    pub fn undo(&mut self, state: &mut CanvasState) -> Option<String> {
        if !self.can_undo() {
            return None;
        }
        let action = &self.actions[self.last_action_index as usize];
        action.undo(state);
        self.last_action_index -= 1;
        state.notify(Notification::HistoryChanged);
        Some(action.description())
    }

    /// Returns the description of the redone action.
    pub fn redo(&mut self, state: &mut CanvasState) -> Option<String> {
        if !self.can_redo() {
            return None;
        }
        self.last_action_index += 1;
        let action = &self.actions[self.last_action_index as usize];
        action.redo(state);
        state.notify(Notification::HistoryChanged);
        Some(action.description())
    }

    /// Undo or redo until `index` is the last applied action. `-1` undoes
    /// everything; indices past the end are clamped.
    pub fn jump_to_action(&mut self, index: isize, state: &mut CanvasState) {
        let target = index.clamp(-1, self.actions.len() as isize - 1);
        while self.last_action_index > target {
            self.undo(state);
        }
        while self.last_action_index < target {
            self.redo(state);
        }
    }

    pub fn undo_description(&self) -> Option<String> {
        if !self.can_undo() {
            return None;
        }
        self.actions.get(self.last_action_index as usize).map(|a| a.description())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.actions.get((self.last_action_index + 1) as usize).map(|a| a.description())
    }

    /// Labels of every entry, oldest first, for a history list.
    pub fn descriptions(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.description()).collect()
    }

    pub fn clear(&mut self, state: &mut CanvasState) {
        self.actions.clear();
        self.last_action_index = -1;
        state.notify(Notification::HistoryChanged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels::Size;
    use crate::settings::{CanvasContext, EngineSettings};

    fn state() -> CanvasState {
        let settings = EngineSettings {
            default_size: Size::new(4, 4),
            ..EngineSettings::default()
        };
        CanvasState::new(CanvasContext::new(settings), Size::new(4, 4))
    }

    fn opacity(layer: u64, old: f32, new: f32) -> HistoryAction {
        HistoryAction::LayerOpacity { frame: 0, layer, old, new }
    }

    #[test]
    fn empty_action_is_ignored() {
        let mut st = state();
        let mut h = History::new(10);
        h.add_action(HistoryAction::pixels("Pencil"), &mut st);
        assert!(h.is_empty());
        assert!(!h.can_undo());
    }

    #[test]
    fn new_action_discards_redo_branch() {
        let mut st = state();
        let mut h = History::new(10);
        h.add_action(HistoryAction::FrameMoved { from: 0, to: 1 }, &mut st);
        h.add_action(HistoryAction::FrameMoved { from: 1, to: 0 }, &mut st);
        h.undo(&mut st);
        assert!(h.can_redo());
        h.add_action(HistoryAction::LayerMoved { frame: 0, from: 0, to: 1 }, &mut st);
        assert_eq!(h.len(), 2);
        assert!(!h.can_redo());
    }

    #[test]
    fn opacity_drags_coalesce_per_layer() {
        let mut st = state();
        let mut h = History::new(10);
        h.add_action(opacity(1, 1.0, 0.9), &mut st);
        h.add_action(opacity(1, 0.9, 0.4), &mut st);
        assert_eq!(h.len(), 1);
        assert_eq!(h.actions()[0], opacity(1, 1.0, 0.4));
        h.add_action(opacity(2, 1.0, 0.5), &mut st);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn oldest_entries_are_evicted() {
        let mut st = state();
        let mut h = History::new(3);
        for i in 0..5 {
            h.add_action(HistoryAction::LayerMoved { frame: 0, from: i, to: i + 1 }, &mut st);
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.last_action_index(), 2);
        assert_eq!(h.actions()[0], HistoryAction::LayerMoved { frame: 0, from: 2, to: 3 });
    }

    #[test]
    fn jump_walks_cursor_both_ways() {
        let mut st = state();
        let mut h = History::new(10);
        for i in 0..4 {
            h.add_action(HistoryAction::LayerMoved { frame: 0, from: i, to: i + 1 }, &mut st);
        }
        h.jump_to_action(0, &mut st);
        assert_eq!(h.last_action_index(), 0);
        h.jump_to_action(-1, &mut st);
        assert!(!h.can_undo());
        h.jump_to_action(99, &mut st);
        assert_eq!(h.last_action_index(), 3);
        assert!(st.drain_notifications().contains(&Notification::HistoryChanged));
    }
}
