// ============================================================================
// TRANSFORM: whole-canvas flip / rotate / resize / crop
// ============================================================================
//
// Every transform touches all layers of all frames. The old and new buffers
// of each layer go into one `CanvasTransformed` action so undo is a swap,
// never a recompute. The selection is reset: its mask is sized to the canvas.

use rayon::prelude::*;
use tracing::info;

use crate::canvas::Canvas;
use crate::history::action::BufferSwap;
use crate::history::HistoryAction;
use crate::layer::Layer;
use crate::pixels::{PixelBuffer, Rect, ResizeMode, Size};
use crate::selection::Selection;

/// Apply `f` to every layer of every frame and adopt `new_size`.
fn transform_all<F>(canvas: &mut Canvas, description: &str, new_size: Size, record: bool, f: F)
where
    F: Fn(&mut Layer) -> PixelBuffer + Sync,
{
    canvas.settle();
    let old_size = canvas.size();
    let old_selection = canvas.state.selection.clone();

    let mut swaps: Vec<BufferSwap> = Vec::new();
    for frame in canvas.state.reel.frames_mut() {
        let frame_id = frame.id;
        let frame_swaps: Vec<Option<BufferSwap>> = frame
            .layers_mut()
            .par_iter_mut()
            .map(|layer| {
                let old = f(layer);
                record.then(|| BufferSwap {
                    frame: frame_id,
                    layer: layer.id,
                    old,
                    new: layer.pixels.clone(),
                })
            })
            .collect();
        swaps.extend(frame_swaps.into_iter().flatten());
        frame.set_size(new_size);
    }

    let new_selection = Selection::new(new_size);
    canvas.state.selection = new_selection.clone();
    canvas.state.set_size(new_size);
    canvas.state.layers_changed();
    info!(op = description, ?old_size, ?new_size, "canvas transformed");

    if record {
        canvas.record(HistoryAction::CanvasTransformed {
            description: description.to_string(),
            old_size,
            new_size,
            layers: swaps,
            old_selection: Box::new(old_selection),
            new_selection: Box::new(new_selection),
        });
    }
}

pub fn flip_horizontal(canvas: &mut Canvas, record: bool) {
    let size = canvas.size();
    transform_all(canvas, "Flip Horizontal", size, record, Layer::flip_horizontally);
}

pub fn flip_vertical(canvas: &mut Canvas, record: bool) {
    let size = canvas.size();
    transform_all(canvas, "Flip Vertical", size, record, Layer::flip_vertically);
}

/// Rotate 90° clockwise; width and height swap.
pub fn rotate_cw(canvas: &mut Canvas, record: bool) {
    let size = canvas.size();
    transform_all(canvas, "Rotate 90° CW", Size::new(size.height, size.width), record, Layer::rotate_cw);
}

pub fn rotate_ccw(canvas: &mut Canvas, record: bool) {
    let size = canvas.size();
    transform_all(canvas, "Rotate 90° CCW", Size::new(size.height, size.width), record, Layer::rotate_ccw);
}

/// Resize every layer. Non-positive or unchanged sizes are ignored.
pub fn resize(canvas: &mut Canvas, size: Size, mode: ResizeMode, record: bool) -> bool {
    if size.is_empty() || size == canvas.size() {
        info!(?size, "resize ignored");
        return false;
    }
    let description = match mode {
        ResizeMode::Scale => "Resize Image",
        ResizeMode::Crop => "Resize Canvas",
    };
    transform_all(canvas, description, size, record, |layer| layer.resize(size, mode));
    true
}

/// Crop every layer to `rect` (clipped to the canvas). Empty or full-canvas
/// rectangles are ignored.
pub fn crop_to_bounds(canvas: &mut Canvas, rect: Rect, record: bool) -> bool {
    let full = Rect::from_size(canvas.size());
    let rect = rect.intersect(&full);
    if rect.is_empty() || rect == full {
        info!(?rect, "crop ignored");
        return false;
    }
    transform_all(canvas, "Crop", rect.size(), record, |layer| layer.crop_to_bounds(rect));
    true
}

/// Crop to the bounding box of the selection.
pub fn crop_to_selection(canvas: &mut Canvas, record: bool) -> bool {
    canvas.end_move_selection();
    match canvas.selection().bounds() {
        Some(bounds) => crop_to_bounds(canvas, bounds, record),
        None => {
            info!("crop to selection ignored: nothing selected");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::WriteMode;
    use crate::pixels::{Color, Point};
    use crate::settings::{CanvasContext, EngineSettings};

    fn canvas(w: i32, h: i32) -> Canvas {
        let settings = EngineSettings { parallel_tiles: false, ..EngineSettings::default() };
        Canvas::with_size(CanvasContext::new(settings), Size::new(w, h))
    }

    #[test]
    fn rotate_swaps_size_and_undoes() {
        let mut c = canvas(4, 2);
        c.write_pixel(Point::new(3, 0), Color::RED, WriteMode::Paint, None);
        rotate_cw(&mut c, true);
        assert_eq!(c.size(), Size::new(2, 4));
        assert_eq!(c.pick_color(Point::new(1, 3), false), Color::RED);
        assert_eq!(c.selection().canvas_size(), Size::new(2, 4));

        c.undo();
        assert_eq!(c.size(), Size::new(4, 2));
        assert_eq!(c.current_frame().size(), Size::new(4, 2));
        assert_eq!(c.pick_color(Point::new(3, 0), false), Color::RED);
        c.redo();
        assert_eq!(c.pick_color(Point::new(1, 3), false), Color::RED);
    }

    #[test]
    fn transforms_cover_every_frame() {
        let mut c = canvas(3, 3);
        crate::ops::canvas_ops::add_frame(&mut c, false);
        flip_horizontal(&mut c, false);
        assert!(c.reel().frames().iter().all(|f| f.size() == Size::new(3, 3)));
        assert!(!c.history.can_undo());
        assert!(resize(&mut c, Size::new(6, 2), ResizeMode::Scale, true));
        assert!(c.reel().frames().iter().all(|f| f.layers()[0].size() == Size::new(6, 2)));
    }

    #[test]
    fn degenerate_crop_and_resize_are_noops() {
        let mut c = canvas(4, 4);
        assert!(!resize(&mut c, Size::new(0, 3), ResizeMode::Crop, true));
        assert!(!crop_to_bounds(&mut c, Rect::new(10, 10, 2, 2), true));
        assert!(!crop_to_bounds(&mut c, Rect::new(0, 0, 4, 4), true));
        assert!(!crop_to_selection(&mut c, true));
        assert!(!c.history.can_undo());
    }

    #[test]
    fn crop_to_selection_shrinks_canvas() {
        let mut c = canvas(6, 6);
        c.write_pixel(Point::new(2, 3), Color::WHITE, WriteMode::Paint, None);
        c.select_area(Point::new(1, 2), Point::new(3, 4), true);
        assert!(crop_to_selection(&mut c, true));
        assert_eq!(c.size(), Size::new(3, 3));
        assert_eq!(c.pick_color(Point::new(1, 1), false), Color::WHITE);
        assert!(!c.selection().has_selection());
    }
}
