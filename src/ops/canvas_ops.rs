// ============================================================================
// CANVAS-LEVEL OPERATIONS: layer and frame structure, with history
// ============================================================================
//
// Each op applies the raw `Frame` / `AnimationReel` edit, queues the list
// notification, marks every tile dirty and, when `record` is set, pushes the
// matching history action.

use tracing::info;

use crate::canvas::Canvas;
use crate::history::HistoryAction;

// ---------------------------------------------------------------------------
//  Layers (current frame)
// ---------------------------------------------------------------------------

/// Add a transparent layer above the current one. Returns its index.
pub fn add_layer(canvas: &mut Canvas, record: bool) -> usize {
    canvas.end_move_selection();
    let frame = canvas.state.reel.current_frame_mut();
    let index = frame.new_layer(frame.current_layer_index() + 1);
    let snapshot = frame.current_layer().clone();
    let frame_id = frame.id;
    info!(index, name = %snapshot.name, "layer added");
    canvas.state.layers_changed();
    if record {
        canvas.record(HistoryAction::LayerAdded { frame: frame_id, index, layer: Box::new(snapshot) });
    }
    index
}

pub fn duplicate_layer(canvas: &mut Canvas, index: usize, record: bool) -> Option<usize> {
    canvas.end_move_selection();
    let frame = canvas.state.reel.current_frame_mut();
    let new_index = frame.duplicate_layer(index)?;
    let snapshot = frame.current_layer().clone();
    let frame_id = frame.id;
    info!(index, new_index, "layer duplicated");
    canvas.state.layers_changed();
    if record {
        canvas.record(HistoryAction::LayerAdded { frame: frame_id, index: new_index, layer: Box::new(snapshot) });
    }
    Some(new_index)
}

/// Delete a layer. Refused when it is the last one.
pub fn delete_layer(canvas: &mut Canvas, index: usize, record: bool) -> bool {
    canvas.end_move_selection();
    let frame = canvas.state.reel.current_frame_mut();
    let frame_id = frame.id;
    let Some(removed) = frame.remove_layer(index) else {
        return false;
    };
    info!(index, name = %removed.name, "layer deleted");
    canvas.state.layers_changed();
    if record {
        canvas.record(HistoryAction::LayerRemoved { frame: frame_id, index, layer: Box::new(removed) });
    }
    true
}

/// Move a layer one step, wrapping at the ends. Returns the new index.
pub fn move_layer(canvas: &mut Canvas, index: usize, up: bool, record: bool) -> Option<usize> {
    canvas.end_move_selection();
    let frame = canvas.state.reel.current_frame_mut();
    let frame_id = frame.id;
    let to = frame.move_layer(index, up)?;
    canvas.state.layers_changed();
    if record {
        canvas.record(HistoryAction::LayerMoved { frame: frame_id, from: index, to });
    }
    Some(to)
}

/// Composite a layer into the one below it.
pub fn merge_down(canvas: &mut Canvas, index: usize, record: bool) -> bool {
    canvas.end_move_selection();
    let frame = canvas.state.reel.current_frame_mut();
    let frame_id = frame.id;
    let Some((upper, old_below)) = frame.merge_down(index) else {
        return false;
    };
    let below = &frame.layers()[index - 1];
    let (below_id, new_below) = (below.id, below.pixels.clone());
    info!(index, name = %upper.name, "layer merged down");
    canvas.state.layers_changed();
    if record {
        canvas.record(HistoryAction::LayersMerged {
            frame: frame_id,
            index,
            upper: Box::new(upper),
            below: below_id,
            old_below,
            new_below,
        });
    }
    true
}

/// Set opacity (clamped to `[0, 1]`). Consecutive changes to the same layer
/// collapse into one undo step.
pub fn set_layer_opacity(canvas: &mut Canvas, index: usize, opacity: f32, record: bool) -> bool {
    let frame = canvas.state.reel.current_frame_mut();
    let frame_id = frame.id;
    let Some(old) = frame.set_opacity(index, opacity) else {
        return false;
    };
    let (layer_id, new) = (frame.layers()[index].id, frame.layers()[index].opacity);
    canvas.state.layers_changed();
    if record {
        canvas.record(HistoryAction::LayerOpacity { frame: frame_id, layer: layer_id, old, new });
    }
    true
}

pub fn set_layer_visibility(canvas: &mut Canvas, index: usize, visible: bool, record: bool) -> bool {
    let frame = canvas.state.reel.current_frame_mut();
    let frame_id = frame.id;
    let Some(old) = frame.set_visibility(index, visible) else {
        return false;
    };
    let layer_id = frame.layers()[index].id;
    canvas.state.layers_changed();
    if record {
        canvas.record(HistoryAction::LayerVisibility { frame: frame_id, layer: layer_id, old, new: visible });
    }
    true
}

pub fn rename_layer(canvas: &mut Canvas, index: usize, name: &str, record: bool) -> bool {
    let frame = canvas.state.reel.current_frame_mut();
    let frame_id = frame.id;
    let Some(old) = frame.rename(index, name) else {
        return false;
    };
    let layer_id = frame.layers()[index].id;
    canvas.state.notify(crate::canvas::Notification::LayerListChanged);
    if record {
        canvas.record(HistoryAction::LayerRenamed { frame: frame_id, layer: layer_id, old, new: name.to_string() });
    }
    true
}

// ---------------------------------------------------------------------------
//  Frames
// ---------------------------------------------------------------------------

/// Add a blank frame after the current one and switch to it.
pub fn add_frame(canvas: &mut Canvas, record: bool) -> usize {
    canvas.end_move_selection();
    let index = canvas.state.reel.new_frame();
    let snapshot = canvas.state.reel.current_frame().clone();
    info!(index, "frame added");
    canvas.state.frames_changed();
    if record {
        canvas.record(HistoryAction::FrameAdded { index, frame: Box::new(snapshot) });
    }
    index
}

pub fn duplicate_frame(canvas: &mut Canvas, index: usize, record: bool) -> Option<usize> {
    canvas.end_move_selection();
    let new_index = canvas.state.reel.duplicate_frame(index)?;
    let snapshot = canvas.state.reel.current_frame().clone();
    info!(index, new_index, "frame duplicated");
    canvas.state.frames_changed();
    if record {
        canvas.record(HistoryAction::FrameAdded { index: new_index, frame: Box::new(snapshot) });
    }
    Some(new_index)
}

/// Delete a frame. Refused when it is the last one.
pub fn delete_frame(canvas: &mut Canvas, index: usize, record: bool) -> bool {
    canvas.end_move_selection();
    let Some(removed) = canvas.state.reel.remove_frame(index) else {
        return false;
    };
    info!(index, "frame deleted");
    canvas.state.frames_changed();
    if record {
        canvas.record(HistoryAction::FrameRemoved { index, frame: Box::new(removed) });
    }
    true
}

pub fn move_frame(canvas: &mut Canvas, from: usize, to: usize, record: bool) -> bool {
    canvas.end_move_selection();
    if from == to || !canvas.state.reel.move_frame(from, to) {
        return false;
    }
    canvas.state.frames_changed();
    if record {
        canvas.record(HistoryAction::FrameMoved { from, to });
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Notification, WriteMode};
    use crate::pixels::{Color, Point, Size};
    use crate::settings::{CanvasContext, EngineSettings};

    fn canvas() -> Canvas {
        Canvas::with_size(CanvasContext::new(EngineSettings::default()), Size::new(4, 4))
    }

    #[test]
    fn add_and_delete_layer_undo() {
        let mut c = canvas();
        let idx = add_layer(&mut c, true);
        assert_eq!(idx, 1);
        assert_eq!(c.current_frame().layer_count(), 2);
        assert!(c.drain_notifications().contains(&Notification::LayerListChanged));

        assert!(delete_layer(&mut c, 0, true));
        assert_eq!(c.current_frame().layer_count(), 1);
        assert!(!delete_layer(&mut c, 0, true));

        c.undo();
        assert_eq!(c.current_frame().layer_count(), 2);
        c.undo();
        assert_eq!(c.current_frame().layer_count(), 1);
        c.redo();
        assert_eq!(c.current_frame().layer_count(), 2);
    }

    #[test]
    fn merge_down_undo_restores_both_layers() {
        let mut c = canvas();
        add_layer(&mut c, false);
        c.write_pixel(Point::new(0, 0), Color::RED, WriteMode::Paint, None);
        assert!(merge_down(&mut c, 1, true));
        assert_eq!(c.current_frame().layer_count(), 1);
        assert_eq!(c.pick_color(Point::new(0, 0), false), Color::RED);

        c.undo();
        let frame = c.current_frame();
        assert_eq!(frame.layer_count(), 2);
        assert_eq!(frame.layers()[0].get_pixel(Point::new(0, 0)), Color::TRANSPARENT);
        assert_eq!(frame.layers()[1].get_pixel(Point::new(0, 0)), Color::RED);
    }

    #[test]
    fn opacity_drag_is_one_step() {
        let mut c = canvas();
        for v in [0.9, 0.7, 0.5] {
            set_layer_opacity(&mut c, 0, v, true);
        }
        assert_eq!(c.history.len(), 1);
        c.undo();
        assert_eq!(c.current_frame().layers()[0].opacity, 1.0);
    }

    #[test]
    fn frame_ops_round_trip_through_history() {
        let mut c = canvas();
        add_frame(&mut c, true);
        duplicate_frame(&mut c, 1, true);
        assert_eq!(c.reel().frame_count(), 3);
        let moved = c.reel().frame(2).map(|f| f.id);
        assert!(move_frame(&mut c, 2, 0, true));
        assert_eq!(c.reel().frame(0).map(|f| f.id), moved);
        assert!(delete_frame(&mut c, 0, true));

        c.jump_to_action(-1);
        assert_eq!(c.reel().frame_count(), 1);
        c.jump_to_action(3);
        assert_eq!(c.reel().frame_count(), 2);
    }
}
