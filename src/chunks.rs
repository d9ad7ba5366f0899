// ============================================================================
// CHUNK RENDERER: re-flatten only the tiles that changed
// ============================================================================

use rayon::prelude::*;
use tracing::trace;

use crate::dirty::DirtyTracker;
use crate::frame::{FlattenContext, Frame};
use crate::pixels::{Color, PixelBuffer, Point, Rect, Size};

/// Thumbnail that a presenter should rebuild.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PreviewTarget {
    Layer(u64),
    Frame(u64),
}

/// Display side of the engine. The core never draws to screen itself; it
/// hands finished tiles and staleness hints to whoever implements this.
pub trait Presenter {
    /// Replace the texture of one tile with freshly flattened pixels
    /// (row-major, `tile.width * tile.height` entries).
    fn update_chunk_texture(&mut self, tile: Rect, pixels: &[Color]);

    fn mark_preview_stale(&mut self, _target: PreviewTarget) {}
}

/// Presenter that assembles tiles into one full-canvas buffer. Used by the
/// headless binary and handy in tests.
#[derive(Clone, Debug)]
pub struct FramebufferPresenter {
    pub image: PixelBuffer,
    pub uploads: usize,
    pub stale: Vec<PreviewTarget>,
}

impl FramebufferPresenter {
    pub fn new(size: Size) -> Self {
        Self {
            image: PixelBuffer::new(size),
            uploads: 0,
            stale: Vec::new(),
        }
    }
}

impl Presenter for FramebufferPresenter {
    fn update_chunk_texture(&mut self, tile: Rect, pixels: &[Color]) {
        for (p, c) in tile.points().zip(pixels) {
            self.image.set_pixel(p, *c);
        }
        self.uploads += 1;
    }

    fn mark_preview_stale(&mut self, target: PreviewTarget) {
        if !self.stale.contains(&target) {
            self.stale.push(target);
        }
    }
}

/// Splits the canvas into square tiles and keeps a dirty flag per tile.
#[derive(Clone, Debug)]
pub struct ChunkRenderer {
    tile_size: i32,
    canvas_size: Size,
    tracker: DirtyTracker,
    parallel: bool,
}

impl ChunkRenderer {
    pub fn new(canvas_size: Size, tile_size: i32, parallel: bool) -> Self {
        let tile_size = tile_size.max(1);
        let (cols, rows) = Self::grid(canvas_size, tile_size);
        let mut tracker = DirtyTracker::new(cols, rows);
        tracker.mark_all();
        Self {
            tile_size,
            canvas_size,
            tracker,
            parallel,
        }
    }

    fn grid(size: Size, tile: i32) -> (usize, usize) {
        let cols = (size.width.max(0) + tile - 1) / tile;
        let rows = (size.height.max(0) + tile - 1) / tile;
        (cols as usize, rows as usize)
    }

    /// Rebuild the tile grid for a new canvas size; everything becomes dirty.
    pub fn resize(&mut self, canvas_size: Size) {
        *self = Self::new(canvas_size, self.tile_size, self.parallel);
    }

    pub fn tile_size(&self) -> i32 {
        self.tile_size
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas_size
    }

    pub fn tile_grid(&self) -> (usize, usize) {
        (self.tracker.cols(), self.tracker.rows())
    }

    pub fn tile_count(&self) -> usize {
        self.tracker.cols() * self.tracker.rows()
    }

    /// Pixel rectangle of a tile; edge tiles are clipped to the canvas.
    pub fn tile_rect(&self, col: usize, row: usize) -> Rect {
        let x = col as i32 * self.tile_size;
        let y = row as i32 * self.tile_size;
        Rect::new(x, y, self.tile_size, self.tile_size).intersect(&Rect::from_size(self.canvas_size))
    }

    pub fn tile_at(&self, p: Point) -> Option<(usize, usize)> {
        if !self.canvas_size.contains(p) {
            return None;
        }
        Some(((p.x / self.tile_size) as usize, (p.y / self.tile_size) as usize))
    }

    pub fn mark_pixel(&mut self, p: Point) {
        if let Some((col, row)) = self.tile_at(p) {
            self.tracker.mark(col, row);
        }
    }

    pub fn mark_rect(&mut self, rect: Rect) {
        let rect = rect.intersect(&Rect::from_size(self.canvas_size));
        if rect.is_empty() {
            return;
        }
        let t = self.tile_size;
        for row in rect.y / t..=(rect.bottom() - 1) / t {
            for col in rect.x / t..=(rect.right() - 1) / t {
                self.tracker.mark(col as usize, row as usize);
            }
        }
    }

    pub fn mark_all(&mut self) {
        self.tracker.mark_all();
    }

    pub fn is_tile_dirty(&self, col: usize, row: usize) -> bool {
        self.tracker.is_dirty(col, row)
    }

    pub fn dirty_tile_count(&self) -> usize {
        self.tracker.dirty_count()
    }

    pub fn has_pending(&self) -> bool {
        self.tracker.any_dirty()
    }

    /// Re-flatten every dirty tile of `frame` and push it to the presenter.
    /// Returns the number of tiles updated; zero when nothing was dirty.
    pub fn update(&mut self, frame: &Frame, ctx: &FlattenContext<'_>, presenter: &mut dyn Presenter) -> usize {
        if !self.tracker.any_dirty() {
            return 0;
        }
        let rects: Vec<Rect> = self
            .tracker
            .dirty_cells(true)
            .into_iter()
            .map(|(col, row)| self.tile_rect(col, row))
            .filter(|r| !r.is_empty())
            .collect();

        // Tiles are disjoint, so they can be flattened independently; the
        // collect is the join point before anything is presented.
        let rendered: Vec<(Rect, Vec<Color>)> = if self.parallel && rects.len() > 1 {
            rects
                .par_iter()
                .map(|rect| (*rect, frame.flatten_region(*rect, ctx)))
                .collect()
        } else {
            rects
                .iter()
                .map(|rect| (*rect, frame.flatten_region(*rect, ctx)))
                .collect()
        };

        for (rect, pixels) in &rendered {
            presenter.update_chunk_texture(*rect, pixels);
        }
        trace!(tiles = rendered.len(), "chunk update");
        rendered.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_tiles_are_clipped() {
        let r = ChunkRenderer::new(Size::new(70, 40), 32, false);
        assert_eq!(r.tile_grid(), (3, 2));
        assert_eq!(r.tile_rect(2, 1), Rect::new(64, 32, 6, 8));
    }

    #[test]
    fn single_pixel_marks_single_tile() {
        let mut r = ChunkRenderer::new(Size::new(64, 64), 32, false);
        r.tracker.clear();
        r.mark_pixel(Point::new(40, 5));
        assert_eq!(r.dirty_tile_count(), 1);
        assert!(r.is_tile_dirty(1, 0));
        r.mark_rect(Rect::new(30, 30, 4, 4));
        assert_eq!(r.dirty_tile_count(), 4);
    }

    #[test]
    fn update_is_noop_when_clean() {
        let frame = Frame::new(Size::new(8, 8));
        let mut r = ChunkRenderer::new(Size::new(8, 8), 4, true);
        let mut fb = FramebufferPresenter::new(Size::new(8, 8));
        assert_eq!(r.update(&frame, &FlattenContext::default(), &mut fb), 4);
        assert_eq!(r.update(&frame, &FlattenContext::default(), &mut fb), 0);
        assert_eq!(fb.uploads, 4);
    }

    #[test]
    fn rendered_tiles_match_full_flatten() {
        let mut frame = Frame::new(Size::new(10, 7));
        frame.current_layer_mut().set_pixel(Point::new(9, 6), Color::RED);
        frame.current_layer_mut().set_pixel(Point::new(3, 2), Color::WHITE);
        let mut r = ChunkRenderer::new(frame.size(), 4, true);
        let mut fb = FramebufferPresenter::new(frame.size());
        r.update(&frame, &FlattenContext::default(), &mut fb);
        assert_eq!(fb.image, frame.flatten_image());
    }
}
