// ============================================================================
// BRUSH: pencil, line, dither, rectangle
// ============================================================================
//
// Stateless rasterisers. Every write goes through `Canvas::write_pixel`, so
// the write mode decides whether it lands on a layer, the selection mask or
// the preview overlay, and the optional action collects the deltas.

use std::collections::HashSet;

use tracing::debug;

use crate::canvas::{BrushShape, Canvas, WriteMode};
use crate::history::HistoryAction;
use crate::pixels::{Color, Point, Rect};

/// Pixels covered by one brush stamp centred on `center`.
pub fn stamp_points(center: Point, size: i32, shape: BrushShape) -> Vec<Point> {
    if size <= 1 {
        return vec![center];
    }
    match shape {
        BrushShape::Round => {
            let r = size / 2;
            let max_dist = size as f32 / 2.0;
            let mut out = Vec::with_capacity((size * size) as usize);
            for dy in -r..=r {
                for dx in -r..=r {
                    if ((dx * dx + dy * dy) as f32).sqrt() <= max_dist {
                        out.push(center + Point::new(dx, dy));
                    }
                }
            }
            out
        }
        BrushShape::Square => {
            let lo = -(size / 2);
            let hi = (size - 1) / 2;
            let mut out = Vec::with_capacity((size * size) as usize);
            for dy in lo..=hi {
                for dx in lo..=hi {
                    out.push(center + Point::new(dx, dy));
                }
            }
            out
        }
    }
}

/// Stamp one brush shape. Positions in `ignore` are skipped and every
/// stamped position is added to it. Returns the number of pixels changed.
#[allow(clippy::too_many_arguments)]
pub fn pencil(
    canvas: &mut Canvas,
    center: Point,
    color: Color,
    size: i32,
    shape: BrushShape,
    mode: WriteMode,
    mut action: Option<&mut HistoryAction>,
    mut ignore: Option<&mut HashSet<Point>>,
) -> usize {
    let mut written = 0;
    for p in stamp_points(center, size, shape) {
        if let Some(set) = ignore.as_deref_mut()
            && !set.insert(p)
        {
            continue;
        }
        if canvas.write_pixel(p, color, mode, action.as_deref_mut()) {
            written += 1;
        }
    }
    written
}

/// Step from `from` toward `to` by at most `step`.
pub fn move_toward(from: (f32, f32), to: (f32, f32), step: f32) -> (f32, f32) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let dist = (dx * dx + dy * dy).sqrt();
    if dist <= step || dist == 0.0 {
        return to;
    }
    (from.0 + dx / dist * step, from.1 + dy / dist * step)
}

/// Every point a line walk from `a` to `b` visits, without repeats.
pub fn line_points(a: Point, b: Point) -> Vec<Point> {
    let target = (b.x as f32, b.y as f32);
    let mut pos = (a.x as f32, a.y as f32);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    loop {
        let p = Point::new(pos.0.round() as i32, pos.1.round() as i32);
        if seen.insert(p) {
            out.push(p);
        }
        if pos == target {
            break;
        }
        pos = move_toward(pos, target, 1.0);
    }
    out
}

/// Stamp the pencil along the straight walk from `a` to `b`.
#[allow(clippy::too_many_arguments)]
pub fn line(
    canvas: &mut Canvas,
    a: Point,
    b: Point,
    color: Color,
    size: i32,
    shape: BrushShape,
    mode: WriteMode,
    mut action: Option<&mut HistoryAction>,
) -> usize {
    let mut touched = HashSet::new();
    let mut written = 0;
    for p in line_points(a, b) {
        written += pencil(canvas, p, color, size, shape, mode, action.as_deref_mut(), Some(&mut touched));
    }
    debug!(?a, ?b, written, "line");
    written
}

/// Checkerboard colour for a canvas position: `first` on even `x + y`.
pub fn dither_color(p: Point, first: Color, second: Color) -> Color {
    if (p.x + p.y).rem_euclid(2) == 0 { first } else { second }
}

/// Pencil stamp alternating two colours on a fixed canvas checkerboard.
#[allow(clippy::too_many_arguments)]
pub fn dither(
    canvas: &mut Canvas,
    center: Point,
    first: Color,
    second: Color,
    size: i32,
    shape: BrushShape,
    mode: WriteMode,
    mut action: Option<&mut HistoryAction>,
) -> usize {
    stamp_points(center, size, shape)
        .into_iter()
        .filter(|p| canvas.write_pixel(*p, dither_color(*p, first, second), mode, action.as_deref_mut()))
        .count()
}

/// Axis-aligned rectangle between two inclusive corners. Hollow rectangles
/// only touch the border rows and columns.
pub fn rectangle(
    canvas: &mut Canvas,
    a: Point,
    b: Point,
    color: Color,
    filled: bool,
    mode: WriteMode,
    mut action: Option<&mut HistoryAction>,
) -> usize {
    let rect = Rect::from_corners(a, b);
    let mut written = 0;
    for p in rect.points() {
        let border = p.x == rect.x || p.y == rect.y || p.x == rect.right() - 1 || p.y == rect.bottom() - 1;
        if (filled || border) && canvas.write_pixel(p, color, mode, action.as_deref_mut()) {
            written += 1;
        }
    }
    written
}
