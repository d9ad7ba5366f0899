// ============================================================================
// GRADIENT: two-colour linear / radial fill over the whole canvas
// ============================================================================

use tracing::debug;

use crate::canvas::{Canvas, WriteMode};
use crate::history::HistoryAction;
use crate::pixels::{Color, Point, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GradientKind {
    #[default]
    Linear,
    Radial,
}

/// Interpolation factor of `p` between the anchors, clamped to `[0, 1]`.
/// Coincident anchors give `1.0`, i.e. the end colour everywhere.
pub fn gradient_t(p: Point, start: Point, end: Point, kind: GradientKind) -> f32 {
    let (dx, dy) = ((end.x - start.x) as f32, (end.y - start.y) as f32);
    let (px, py) = ((p.x - start.x) as f32, (p.y - start.y) as f32);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return 1.0;
    }
    let t = match kind {
        GradientKind::Linear => (px * dx + py * dy) / len2,
        GradientKind::Radial => (px * px + py * py).sqrt() / len2.sqrt(),
    };
    t.clamp(0.0, 1.0)
}

/// Paint the gradient onto every canvas pixel (clipped to the selection in
/// paint mode). Returns the number of pixels changed.
#[allow(clippy::too_many_arguments)]
pub fn gradient(
    canvas: &mut Canvas,
    start: Point,
    end: Point,
    from: Color,
    to: Color,
    kind: GradientKind,
    mode: WriteMode,
    mut action: Option<&mut HistoryAction>,
) -> usize {
    let rect = Rect::from_size(canvas.size());
    let written = rect
        .points()
        .filter(|p| {
            let color = from.lerp(to, gradient_t(*p, start, end, kind));
            canvas.write_pixel(*p, color, mode, action.as_deref_mut())
        })
        .count();
    debug!(?start, ?end, ?kind, written, "gradient");
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels::Size;
    use crate::settings::{CanvasContext, EngineSettings};

    #[test]
    fn linear_projects_onto_axis() {
        let (a, b) = (Point::new(0, 0), Point::new(4, 0));
        assert_eq!(gradient_t(Point::new(2, 3), a, b, GradientKind::Linear), 0.5);
        assert_eq!(gradient_t(Point::new(-3, 0), a, b, GradientKind::Linear), 0.0);
        assert_eq!(gradient_t(Point::new(9, 0), a, b, GradientKind::Linear), 1.0);
    }

    #[test]
    fn radial_uses_distance() {
        let (a, b) = (Point::new(0, 0), Point::new(0, 10));
        assert_eq!(gradient_t(Point::new(6, 8), a, b, GradientKind::Radial), 1.0);
        assert_eq!(gradient_t(Point::new(3, 4), a, b, GradientKind::Radial), 0.5);
    }

    #[test]
    fn degenerate_anchors_paint_end_colour() {
        let mut c = Canvas::with_size(CanvasContext::new(EngineSettings::default()), Size::new(3, 3));
        let n = gradient(&mut c, Point::new(1, 1), Point::new(1, 1), Color::BLACK, Color::WHITE, GradientKind::Radial, WriteMode::Paint, None);
        assert_eq!(n, 9);
        assert_eq!(c.pick_color(Point::new(0, 2), false), Color::WHITE);
    }
}
