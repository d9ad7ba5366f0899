// ============================================================================
// SELECTION: oversized boolean mask with a sliding canvas window
// ============================================================================
//
// The mask is three times the canvas in each direction. The canvas maps into
// it through `offset` (mask position = canvas position - offset), so moving a
// selection only changes the offset; nothing is reallocated. The offset is
// clamped so the canvas window always lies inside the mask.

use std::collections::HashMap;

use crate::history::action::MaskChanges;
use crate::layer::Layer;
use crate::pixels::{Color, Point, Rect, Size};

/// Where the selection tool currently is in its gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    Empty,
    /// A selection drag is in progress.
    Selecting,
    Selected,
    /// Selected pixels are lifted off the layer and follow the offset.
    Moving,
}

/// A pixel changed on a layer by picking up or dropping floating pixels:
/// `(canvas position, old colour, new colour)`.
pub type LayerPixelChange = (Point, Color, Color);

#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    canvas_size: Size,
    mask_size: Size,
    mask: Vec<bool>,
    offset: Point,
    selected_count: usize,
    state: SelectionState,
    /// Colours lifted off the layer, keyed by mask position.
    floating: Option<HashMap<Point, Color>>,
}

impl Selection {
    pub fn new(canvas_size: Size) -> Self {
        let mask_size = Size::new(canvas_size.width * 3, canvas_size.height * 3);
        Self {
            canvas_size,
            mask_size,
            mask: vec![false; mask_size.area()],
            offset: Point::new(-canvas_size.width, -canvas_size.height),
            selected_count: 0,
            state: SelectionState::Empty,
            floating: None,
        }
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas_size
    }

    pub fn mask_size(&self) -> Size {
        self.mask_size
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn selected_count(&self) -> usize {
        self.selected_count
    }

    pub fn has_selection(&self) -> bool {
        self.selected_count > 0
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn is_moving(&self) -> bool {
        self.state == SelectionState::Moving
    }

    /// Set the offset, clamped to `[-2 * size, 0]` on each axis. Returns the
    /// offset actually applied.
    pub fn set_offset(&mut self, offset: Point) -> Point {
        self.offset = Point::new(
            offset.x.clamp(-2 * self.canvas_size.width, 0),
            offset.y.clamp(-2 * self.canvas_size.height, 0),
        );
        self.offset
    }

    pub fn translate(&mut self, delta: Point) -> Point {
        self.set_offset(self.offset + delta)
    }

    #[inline]
    fn local_index(&self, local: Point) -> Option<usize> {
        if !self.mask_size.contains(local) {
            return None;
        }
        Some(local.y as usize * self.mask_size.width as usize + local.x as usize)
    }

    /// Canvas position to mask position.
    #[inline]
    pub fn to_local(&self, p: Point) -> Point {
        p - self.offset
    }

    /// Mask position to canvas position.
    #[inline]
    pub fn to_canvas(&self, local: Point) -> Point {
        local + self.offset
    }

    /// Selection bit at a canvas position, `None` when it falls off the mask.
    pub fn try_get_pixel(&self, p: Point) -> Option<bool> {
        self.local_index(self.to_local(p)).map(|i| self.mask[i])
    }

    #[inline]
    pub fn is_selected(&self, p: Point) -> bool {
        self.try_get_pixel(p).unwrap_or(false)
    }

    pub fn get_local(&self, local: Point) -> bool {
        self.local_index(local).map(|i| self.mask[i]).unwrap_or(false)
    }

    /// Set a mask bit directly. Returns `true` when the bit flipped.
    pub fn set_local(&mut self, local: Point, selected: bool) -> bool {
        let Some(i) = self.local_index(local) else {
            return false;
        };
        if self.mask[i] == selected {
            return false;
        }
        self.mask[i] = selected;
        if selected {
            self.selected_count += 1;
        } else {
            self.selected_count -= 1;
        }
        self.refresh_state();
        true
    }

    /// Set the bit under a canvas position, recording the flip if any.
    pub fn set_pixel(&mut self, p: Point, selected: bool, changes: Option<&mut MaskChanges>) -> bool {
        let local = self.to_local(p);
        let flipped = self.set_local(local, selected);
        if flipped && let Some(changes) = changes {
            changes.record(local, !selected, selected);
        }
        flipped
    }

    /// Select or deselect the rectangle spanned by two canvas corners.
    pub fn set_area(&mut self, a: Point, b: Point, selected: bool, changes: &mut MaskChanges) {
        for p in Rect::from_corners(a, b).points() {
            self.set_pixel(p, selected, Some(changes));
        }
    }

    pub fn select_all(&mut self, changes: &mut MaskChanges) {
        let size = self.canvas_size;
        if size.is_empty() {
            return;
        }
        self.set_area(Point::ZERO, Point::new(size.width - 1, size.height - 1), true, changes);
    }

    /// Deselect every bit in the mask, including bits that slid off-canvas.
    pub fn clear(&mut self, changes: &mut MaskChanges) {
        if self.selected_count == 0 {
            return;
        }
        let width = self.mask_size.width as usize;
        for i in 0..self.mask.len() {
            if self.mask[i] {
                let local = Point::new((i % width) as i32, (i / width) as i32);
                self.set_local(local, false);
                changes.record(local, true, false);
            }
        }
    }

    /// Flip every bit inside the canvas window.
    pub fn invert(&mut self, changes: &mut MaskChanges) {
        for p in Rect::from_size(self.canvas_size).points() {
            let now = self.is_selected(p);
            self.set_pixel(p, !now, Some(changes));
        }
    }

    pub fn begin_selecting(&mut self) {
        if !self.is_moving() {
            self.state = SelectionState::Selecting;
        }
    }

    pub fn finish_selecting(&mut self) {
        if self.state == SelectionState::Selecting {
            self.state = SelectionState::Empty;
            self.refresh_state();
        }
    }

    fn refresh_state(&mut self) {
        match self.state {
            SelectionState::Selecting | SelectionState::Moving => {}
            _ => {
                self.state = if self.selected_count > 0 {
                    SelectionState::Selected
                } else {
                    SelectionState::Empty
                };
            }
        }
    }

    fn selected_locals(&self) -> impl Iterator<Item = Point> + '_ {
        let width = self.mask_size.width as usize;
        self.mask
            .iter()
            .enumerate()
            .filter(|(_, s)| **s)
            .map(move |(i, _)| Point::new((i % width) as i32, (i / width) as i32))
    }

    /// Canvas-space bounding box of everything selected.
    pub fn bounds(&self) -> Option<Rect> {
        let mut it = self.selected_locals();
        let first = it.next()?;
        let (mut min, mut max) = (first, first);
        for p in it {
            min = Point::new(min.x.min(p.x), min.y.min(p.y));
            max = Point::new(max.x.max(p.x), max.y.max(p.y));
        }
        Some(Rect::from_corners(self.to_canvas(min), self.to_canvas(max)))
    }

    // ---- floating pixels ----------------------------------------------------

    /// Colour of a floating pixel at a canvas position.
    pub fn floating_color(&self, p: Point) -> Option<Color> {
        self.floating.as_ref()?.get(&self.to_local(p)).copied()
    }

    /// Lift every selected pixel off `layer`: capture its colour and clear it
    /// to transparent. Returns the pixels changed on the layer.
    pub fn take_selected_colors(&mut self, layer: &mut Layer) -> Vec<LayerPixelChange> {
        let mut changed = Vec::new();
        if self.is_moving() || !self.has_selection() {
            return changed;
        }
        let locals: Vec<Point> = self.selected_locals().collect();
        let mut floating = HashMap::with_capacity(locals.len());
        for local in locals {
            let p = self.to_canvas(local);
            let color = layer.get_pixel(p);
            floating.insert(local, color);
            if layer.pixels.in_bounds(p) && color != Color::TRANSPARENT {
                layer.set_pixel(p, Color::TRANSPARENT);
                changed.push((p, color, Color::TRANSPARENT));
            }
        }
        self.floating = Some(floating);
        self.state = SelectionState::Moving;
        changed
    }

    /// Drop the floating pixels onto `layer` at the current offset. Returns
    /// the pixels overwritten on the layer.
    pub fn commit_selected_colors(&mut self, layer: &mut Layer) -> Vec<LayerPixelChange> {
        let mut changed = Vec::new();
        let Some(floating) = self.floating.take() else {
            return changed;
        };
        let mut entries: Vec<(Point, Color)> = floating.into_iter().collect();
        entries.sort_by_key(|(local, _)| *local);
        for (local, color) in entries {
            let p = self.to_canvas(local);
            if color.a == 0.0 || !layer.pixels.in_bounds(p) {
                continue;
            }
            let old = layer.get_pixel(p);
            if old != color {
                layer.set_pixel(p, color);
                changed.push((p, old, color));
            }
        }
        self.state = SelectionState::Empty;
        self.refresh_state();
        changed
    }

    /// Start floating an externally supplied image at `origin` (paste). The
    /// previous mask is replaced by the image's footprint.
    pub fn float_pixels(&mut self, origin: Point, size: Size, pixels: &[Color], changes: &mut MaskChanges) {
        self.clear(changes);
        let mut floating = HashMap::with_capacity(pixels.len());
        for (i, color) in pixels.iter().enumerate() {
            let p = origin + Point::new(i as i32 % size.width.max(1), i as i32 / size.width.max(1));
            if self.set_pixel(p, true, Some(changes)) {
                floating.insert(self.to_local(p), *color);
            }
        }
        self.floating = Some(floating);
        self.state = SelectionState::Moving;
    }

    /// Rotate the selection (and any floating pixels) 90° clockwise around
    /// the top-left of its bounding box.
    pub fn rotate_cw(&mut self, changes: &mut MaskChanges) {
        let locals: Vec<Point> = self.selected_locals().collect();
        let Some(first) = locals.first().copied() else {
            return;
        };
        let mut min = first;
        let mut max = first;
        for p in &locals {
            min = Point::new(min.x.min(p.x), min.y.min(p.y));
            max = Point::new(max.x.max(p.x), max.y.max(p.y));
        }
        let box_h = max.y - min.y + 1;
        let rotate = |p: Point| {
            let rel = p - min;
            min + Point::new(box_h - 1 - rel.y, rel.x)
        };

        for p in &locals {
            if self.set_local(*p, false) {
                changes.record(*p, true, false);
            }
        }
        for p in &locals {
            let q = rotate(*p);
            if self.set_local(q, true) {
                changes.record(q, false, true);
            }
        }
        if let Some(floating) = self.floating.take() {
            let rotated = floating
                .into_iter()
                .map(|(p, c)| (rotate(p), c))
                .filter(|(p, _)| self.mask_size.contains(*p))
                .collect();
            self.floating = Some(rotated);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels::PixelBuffer;

    #[test]
    fn offset_is_clamped_to_keep_canvas_inside_mask() {
        let mut sel = Selection::new(Size::new(10, 6));
        assert_eq!(sel.offset(), Point::new(-10, -6));
        for target in [Point::new(5, 5), Point::new(-100, -3), Point::new(-20, -12), Point::new(-21, 1)] {
            let applied = sel.set_offset(target);
            assert!((-20..=0).contains(&applied.x));
            assert!((-12..=0).contains(&applied.y));
        }
        assert_eq!(sel.translate(Point::new(-50, -50)), Point::new(-20, -12));
    }

    #[test]
    fn set_area_records_only_flipped_pixels() {
        let mut sel = Selection::new(Size::new(8, 8));
        let mut first = MaskChanges::default();
        sel.set_area(Point::new(0, 0), Point::new(1, 1), true, &mut first);
        assert_eq!(first.len(), 4);
        assert_eq!(sel.selected_count(), 4);
        assert_eq!(sel.state(), SelectionState::Selected);

        let mut second = MaskChanges::default();
        sel.set_area(Point::new(1, 1), Point::new(2, 2), true, &mut second);
        assert_eq!(second.len(), 3);
        assert_eq!(sel.selected_count(), 7);
    }

    #[test]
    fn moving_selection_slides_mask_with_offset() {
        let mut sel = Selection::new(Size::new(4, 4));
        let mut changes = MaskChanges::default();
        sel.set_pixel(Point::new(1, 1), true, Some(&mut changes));
        sel.translate(Point::new(2, 0));
        assert!(!sel.is_selected(Point::new(1, 1)));
        assert!(sel.is_selected(Point::new(3, 1)));
        assert_eq!(sel.bounds(), Some(Rect::new(3, 1, 1, 1)));
    }

    #[test]
    fn take_and_commit_move_pixels() {
        let mut layer = Layer::from_pixels("l", PixelBuffer::new(Size::new(4, 4)));
        layer.set_pixel(Point::new(0, 0), Color::RED);
        let mut sel = Selection::new(Size::new(4, 4));
        let mut changes = MaskChanges::default();
        sel.set_pixel(Point::new(0, 0), true, Some(&mut changes));

        let taken = sel.take_selected_colors(&mut layer);
        assert_eq!(taken, vec![(Point::new(0, 0), Color::RED, Color::TRANSPARENT)]);
        assert!(sel.is_moving());
        assert_eq!(sel.floating_color(Point::new(0, 0)), Some(Color::RED));

        sel.translate(Point::new(1, 2));
        assert_eq!(sel.floating_color(Point::new(1, 2)), Some(Color::RED));
        let dropped = sel.commit_selected_colors(&mut layer);
        assert_eq!(dropped, vec![(Point::new(1, 2), Color::TRANSPARENT, Color::RED)]);
        assert_eq!(layer.get_pixel(Point::new(1, 2)), Color::RED);
        assert_eq!(layer.get_pixel(Point::new(0, 0)), Color::TRANSPARENT);
        assert_eq!(sel.state(), SelectionState::Selected);
    }

    #[test]
    fn clear_and_invert_track_count() {
        let mut sel = Selection::new(Size::new(3, 3));
        let mut changes = MaskChanges::default();
        sel.set_pixel(Point::new(0, 0), true, Some(&mut changes));
        sel.invert(&mut changes);
        assert_eq!(sel.selected_count(), 8);
        sel.clear(&mut changes);
        assert!(!sel.has_selection());
        assert_eq!(sel.state(), SelectionState::Empty);
    }

    #[test]
    fn rotate_turns_a_row_into_a_column() {
        let mut sel = Selection::new(Size::new(6, 6));
        let mut changes = MaskChanges::default();
        sel.set_area(Point::new(1, 1), Point::new(3, 1), true, &mut changes);
        sel.rotate_cw(&mut changes);
        assert_eq!(sel.selected_count(), 3);
        assert_eq!(sel.bounds(), Some(Rect::new(1, 1, 1, 3)));
    }
}
