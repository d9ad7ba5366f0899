use pixelreel::chunks::FramebufferPresenter;
use pixelreel::ops::{brush, canvas_ops, fill, transform};
use pixelreel::pixels::blend_colors;
use pixelreel::selection::Selection;
use pixelreel::{BrushShape, Canvas, CanvasContext, Color, EngineSettings, Frame, HistoryAction, PixelBuffer, Point, Size, WriteMode};

fn canvas(w: i32, h: i32) -> Canvas {
    Canvas::with_size(CanvasContext::new(EngineSettings::default()), Size::new(w, h))
}

/// Everything a user could see: per frame, each layer's visible state.
fn snapshot(c: &Canvas) -> Vec<(Size, Vec<(String, f32, bool, PixelBuffer)>)> {
    c.reel()
        .frames()
        .iter()
        .map(|f| {
            let layers = f
                .layers()
                .iter()
                .map(|l| (l.name.clone(), l.opacity, l.visible, l.pixels.clone()))
                .collect();
            (f.size(), layers)
        })
        .collect()
}

fn close(a: Color, b: Color) -> bool {
    (a.r - b.r).abs() < 1e-5 && (a.g - b.g).abs() < 1e-5 && (a.b - b.b).abs() < 1e-5 && (a.a - b.a).abs() < 1e-5
}

#[test]
fn red_line_then_undo() {
    let mut c = canvas(8, 8);
    let mut action = HistoryAction::pixels("Line");
    let written = brush::line(
        &mut c,
        Point::new(0, 4),
        Point::new(7, 4),
        Color::RED,
        1,
        BrushShape::Round,
        WriteMode::Paint,
        Some(&mut action),
    );
    assert_eq!(written, 8);
    c.record(action);

    let flat = c.current_frame().flatten_image();
    for y in 0..8 {
        for x in 0..8 {
            let expected = if y == 4 { Color::RED } else { Color::TRANSPARENT };
            assert_eq!(flat.get_pixel(Point::new(x, y)), expected, "pixel {x},{y}");
        }
    }

    assert_eq!(c.undo().as_deref(), Some("Line"));
    assert!(c.current_frame().flatten_image().is_transparent());
    assert!(!c.history.can_undo());
}

#[test]
fn undo_all_then_redo_all_restores_each_state() {
    let mut c = canvas(6, 4);
    let initial = snapshot(&c);

    let mut paint = HistoryAction::pixels("Paint");
    brush::rectangle(&mut c, Point::new(0, 0), Point::new(2, 1), Color::RED, true, WriteMode::Paint, Some(&mut paint));
    c.record(paint);
    canvas_ops::add_layer(&mut c, true);
    canvas_ops::set_layer_opacity(&mut c, 1, 0.4, true);
    canvas_ops::add_frame(&mut c, true);
    c.select_frame(0);
    transform::flip_horizontal(&mut c, true);
    transform::resize(&mut c, Size::new(3, 2), pixelreel::pixels::ResizeMode::Crop, true);
    let last = snapshot(&c);
    let steps = c.history.len();
    assert!(steps >= 6);

    for _ in 0..steps {
        assert!(c.undo().is_some());
    }
    assert!(c.undo().is_none());
    assert_eq!(snapshot(&c), initial);
    assert_eq!(c.size(), Size::new(6, 4));

    for _ in 0..steps {
        assert!(c.redo().is_some());
    }
    assert!(c.redo().is_none());
    assert_eq!(snapshot(&c), last);
    assert_eq!(c.size(), Size::new(3, 2));
}

#[test]
fn opacity_changes_merge_per_layer() {
    let mut c = canvas(4, 4);
    canvas_ops::add_layer(&mut c, false);
    assert_eq!(c.history.len(), 0);

    canvas_ops::set_layer_opacity(&mut c, 1, 0.8, true);
    canvas_ops::set_layer_opacity(&mut c, 1, 0.5, true);
    canvas_ops::set_layer_opacity(&mut c, 1, 0.2, true);
    assert_eq!(c.history.len(), 1);

    // A different layer starts a new step.
    canvas_ops::set_layer_opacity(&mut c, 0, 0.3, true);
    assert_eq!(c.history.len(), 2);

    c.undo();
    c.undo();
    assert_eq!(c.current_frame().layers()[1].opacity, 1.0);
    assert_eq!(c.current_frame().layers()[0].opacity, 1.0);
    c.redo();
    assert_eq!(c.current_frame().layers()[1].opacity, 0.2);
}

#[test]
fn flood_fill_respects_connectivity() {
    let mut c = canvas(4, 4);
    for i in 0..4 {
        c.write_pixel(Point::new(i, 3 - i), Color::BLACK, WriteMode::Paint, None);
    }

    let four = fill::flood_region(&c, Point::new(0, 0), 0.0, false, WriteMode::Paint);
    assert_eq!(four.len(), 6);
    assert!(four.iter().all(|p| p.x + p.y < 3));

    let eight = fill::flood_region(&c, Point::new(0, 0), 0.0, true, WriteMode::Paint);
    assert_eq!(eight.len(), 12);
    assert!(eight.iter().all(|p| p.x + p.y != 3));

    let mut action = HistoryAction::pixels("Fill");
    fill::flood_fill(&mut c, Point::new(0, 0), Color::RED, 0.0, false, WriteMode::Paint, Some(&mut action));
    c.record(action);
    assert_eq!(c.pick_color(Point::new(2, 0), false), Color::RED);
    assert_eq!(c.pick_color(Point::new(3, 3), false), Color::TRANSPARENT);
    assert_eq!(c.pick_color(Point::new(3, 0), false), Color::BLACK);
}

#[test]
fn selection_offset_is_clamped() {
    let mut sel = Selection::new(Size::new(4, 3));
    assert_eq!(sel.offset(), Point::new(-4, -3));
    assert_eq!(sel.set_offset(Point::new(5, 5)), Point::ZERO);
    assert_eq!(sel.set_offset(Point::new(-100, -100)), Point::new(-8, -6));
    assert_eq!(sel.translate(Point::new(1, -1)), Point::new(-7, -6));
}

#[test]
fn blend_rule() {
    let opaque = Color::new(0.1, 0.2, 0.3, 1.0);
    assert_eq!(blend_colors(opaque, Color::WHITE), opaque);
    assert!(close(blend_colors(Color::new(1.0, 0.0, 0.0, 0.0), Color::WHITE), Color::WHITE));
    assert!(close(
        blend_colors(Color::new(1.0, 0.0, 0.0, 0.5), Color::WHITE),
        Color::new(1.0, 0.5, 0.5, 1.0)
    ));
    assert_eq!(blend_colors(Color::TRANSPARENT, Color::TRANSPARENT), Color::TRANSPARENT);
}

#[test]
fn only_touched_tiles_are_redrawn() {
    let mut c = canvas(64, 64);
    let mut presenter = FramebufferPresenter::new(Size::new(64, 64));
    assert_eq!(c.tick(&mut presenter), 4);
    assert_eq!(c.tick(&mut presenter), 0);

    c.write_pixel(Point::new(40, 5), Color::RED, WriteMode::Paint, None);
    assert_eq!(c.state.chunks.dirty_tile_count(), 1);
    assert!(c.state.chunks.is_tile_dirty(1, 0));
    assert_eq!(c.tick(&mut presenter), 1);
    assert_eq!(presenter.image.get_pixel(Point::new(40, 5)), Color::RED);
    assert_eq!(presenter.uploads, 5);

    c.state.chunks.mark_all();
    assert_eq!(c.state.chunks.dirty_tile_count(), 4);
}

#[test]
fn three_layer_frame_round_trip() {
    let size = Size::new(16, 16);
    let mut frame = Frame::new(size);
    frame.new_layer(1);
    frame.new_layer(2);
    frame.set_opacity(1, 0.25);
    frame.set_visibility(2, false);
    frame.rename(0, "Background");
    for (i, layer) in frame.layers_mut().iter_mut().enumerate() {
        for x in 0..16 {
            layer.set_pixel(Point::new(x, i as i32 * 5), Color::new(x as f32 / 16.0, 0.5, 1.0, 1.0));
        }
    }
    frame.select_layer(1);

    let bytes = frame.serialize().unwrap();
    let back = Frame::deserialize(&bytes).unwrap();
    assert_eq!(back, frame);
    assert_eq!(back.layer_count(), 3);
    assert_eq!(back.layers()[0].name, "Background");
    assert_eq!(back.current_layer_index(), 1);
}
