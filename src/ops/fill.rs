// ============================================================================
// FILL: flood fill and colour replacement
// ============================================================================

use std::collections::VecDeque;

use tracing::debug;

use crate::canvas::{Canvas, WriteMode};
use crate::history::{HistoryAction, PixelKey};
use crate::pixels::{Color, Point, Rect};

const NEIGHBOURS_4: [Point; 4] = [Point::new(1, 0), Point::new(-1, 0), Point::new(0, 1), Point::new(0, -1)];
const NEIGHBOURS_8: [Point; 8] = [
    Point::new(1, 0),
    Point::new(-1, 0),
    Point::new(0, 1),
    Point::new(0, -1),
    Point::new(1, 1),
    Point::new(-1, -1),
    Point::new(1, -1),
    Point::new(-1, 1),
];

/// Whether a pixel may join the fill region under `mode`.
fn eligible(canvas: &Canvas, p: Point, mode: WriteMode) -> bool {
    let sel = canvas.selection();
    match mode {
        WriteMode::Paint | WriteMode::EffectArea => !sel.has_selection() || sel.is_selected(p),
        WriteMode::Select => !sel.is_selected(p),
        WriteMode::Deselect => sel.is_selected(p),
    }
}

/// Collect the connected region around `seed` whose colour on the current
/// layer is within `tolerance` of the seed colour.
pub fn flood_region(canvas: &Canvas, seed: Point, tolerance: f32, diagonal: bool, mode: WriteMode) -> Vec<Point> {
    let size = canvas.size();
    if !size.contains(seed) || !eligible(canvas, seed, mode) {
        return Vec::new();
    }
    let layer = canvas.current_frame().current_layer();
    let target = layer.get_pixel(seed);
    let neighbours: &[Point] = if diagonal { &NEIGHBOURS_8 } else { &NEIGHBOURS_4 };

    let width = size.width as usize;
    let mut visited = vec![false; size.area()];
    let mut queue = VecDeque::new();
    let mut region = Vec::new();
    visited[seed.y as usize * width + seed.x as usize] = true;
    queue.push_back(seed);

    while let Some(p) = queue.pop_front() {
        region.push(p);
        for d in neighbours {
            let q = p + *d;
            if !size.contains(q) {
                continue;
            }
            let idx = q.y as usize * width + q.x as usize;
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            if layer.get_pixel(q).delta(&target) <= tolerance && eligible(canvas, q, mode) {
                queue.push_back(q);
            }
        }
    }
    region
}

/// Breadth-first fill from `seed`. Returns the number of pixels changed.
pub fn flood_fill(
    canvas: &mut Canvas,
    seed: Point,
    color: Color,
    tolerance: f32,
    diagonal: bool,
    mode: WriteMode,
    mut action: Option<&mut HistoryAction>,
) -> usize {
    let region = flood_region(canvas, seed, tolerance, diagonal, mode);
    let written = region
        .into_iter()
        .filter(|p| canvas.write_pixel(*p, color, mode, action.as_deref_mut()))
        .count();
    debug!(?seed, tolerance, diagonal, written, "flood fill");
    written
}

/// Which layers a colour replacement scans.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ReplaceScope {
    pub all_layers: bool,
    pub all_frames: bool,
}

/// Rewrite every pixel exactly equal to `target`. Without `match_opacity`
/// only RGB is compared and each pixel keeps its own alpha. The selection
/// gates which positions may change, on every frame.
pub fn replace_color(
    canvas: &mut Canvas,
    target: Color,
    replacement: Color,
    match_opacity: bool,
    scope: ReplaceScope,
    action: &mut HistoryAction,
) -> usize {
    let current_frame = canvas.state.current_frame_id();
    let sel = canvas.selection();
    let gate = sel.has_selection();

    let mut hits: Vec<(PixelKey, Color)> = Vec::new();
    for frame in canvas.reel().frames() {
        if !scope.all_frames && frame.id != current_frame {
            continue;
        }
        for (i, layer) in frame.layers().iter().enumerate() {
            if !scope.all_layers && i != frame.current_layer_index() {
                continue;
            }
            for p in Rect::from_size(layer.size()).points() {
                if gate && !sel.is_selected(p) {
                    continue;
                }
                let c = layer.get_pixel(p);
                let new = if match_opacity {
                    (c == target).then_some(replacement)
                } else {
                    c.rgb_eq(&target).then(|| replacement.with_alpha(c.a))
                };
                if let Some(new) = new {
                    hits.push((PixelKey { frame: frame.id, layer: layer.id, pos: p }, new));
                }
            }
        }
    }

    let written = hits
        .into_iter()
        .filter(|(key, color)| canvas.write_layer_pixel(*key, *color, Some(&mut *action)))
        .count();
    debug!(written, ?scope, "replace colour");
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::brush;
    use crate::pixels::Size;
    use crate::settings::{CanvasContext, EngineSettings};

    fn canvas(w: i32, h: i32) -> Canvas {
        Canvas::with_size(CanvasContext::new(EngineSettings::default()), Size::new(w, h))
    }

    #[test]
    fn tolerance_uses_weighted_alpha() {
        let mut c = canvas(3, 1);
        c.write_pixel(Point::new(1, 0), Color::new(0.0, 0.0, 0.0, 0.1), WriteMode::Paint, None);
        // alpha delta 0.1 weighs 0.1 * 5 / 8
        assert_eq!(flood_region(&c, Point::new(0, 0), 0.06, false, WriteMode::Paint).len(), 1);
        assert_eq!(flood_region(&c, Point::new(2, 0), 0.07, false, WriteMode::Paint).len(), 3);
    }

    #[test]
    fn select_fill_skips_already_selected() {
        let mut c = canvas(4, 1);
        c.select_area(Point::new(2, 0), Point::new(3, 0), true);
        let mut action = HistoryAction::selection();
        let n = flood_fill(&mut c, Point::new(0, 0), Color::WHITE, 0.0, false, WriteMode::Select, Some(&mut action));
        assert_eq!(n, 2);
        assert_eq!(c.selection().selected_count(), 4);
    }

    #[test]
    fn replace_keeps_alpha_when_not_matching_opacity() {
        let mut c = canvas(3, 3);
        let half_red = Color::RED.with_alpha(0.5);
        brush::pencil(&mut c, Point::new(0, 0), half_red, 1, Default::default(), WriteMode::Paint, None, None);
        brush::pencil(&mut c, Point::new(1, 0), Color::RED, 1, Default::default(), WriteMode::Paint, None, None);

        let mut action = HistoryAction::pixels("Replace Colour");
        let n = replace_color(&mut c, Color::RED, Color::WHITE, false, ReplaceScope::default(), &mut action);
        assert_eq!(n, 2);
        assert_eq!(c.pick_color(Point::new(0, 0), false), Color::WHITE.with_alpha(0.5));

        let mut exact = HistoryAction::pixels("Replace Colour");
        let n = replace_color(&mut c, Color::WHITE, Color::BLACK, true, ReplaceScope::default(), &mut exact);
        assert_eq!(n, 1);
        assert_eq!(c.pick_color(Point::new(1, 0), false), Color::BLACK);
    }
}
