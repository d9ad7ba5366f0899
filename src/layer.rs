use uuid::Uuid;

use crate::pixels::{blend_colors, Color, PixelBuffer, Rect, ResizeMode, Size, Point};

/// Random 64-bit id (the high half of a v4 UUID).
pub fn random_id() -> u64 {
    Uuid::new_v4().as_u64_pair().0
}

/// One paintable layer of a frame.
///
/// Every method that changes pixels returns the buffer as it was *before*
/// the change so callers can build an undo record without copying twice.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub id: u64,
    pub name: String,
    pub opacity: f32,
    pub visible: bool,
    pub pixels: PixelBuffer,
    /// Set whenever pixels change; the presenter rebuilds its thumbnail
    /// and clears it.
    pub preview_stale: bool,
}

impl Layer {
    pub fn new(name: impl Into<String>, size: Size) -> Self {
        Self::from_pixels(name, PixelBuffer::new(size))
    }

    pub fn from_pixels(name: impl Into<String>, pixels: PixelBuffer) -> Self {
        Self {
            id: random_id(),
            name: name.into(),
            opacity: 1.0,
            visible: true,
            pixels,
            preview_stale: true,
        }
    }

    pub fn size(&self) -> Size {
        self.pixels.size()
    }

    #[inline]
    pub fn get_pixel(&self, p: Point) -> Color {
        self.pixels.get_pixel(p)
    }

    #[inline]
    pub fn set_pixel(&mut self, p: Point, color: Color) -> bool {
        let written = self.pixels.set_pixel(p, color);
        if written {
            self.preview_stale = true;
        }
        written
    }

    /// Swap in a whole new buffer, returning the old one.
    pub fn replace_pixels(&mut self, pixels: PixelBuffer) -> PixelBuffer {
        self.preview_stale = true;
        std::mem::replace(&mut self.pixels, pixels)
    }

    pub fn flip_horizontally(&mut self) -> PixelBuffer {
        let flipped = self.pixels.flipped_horizontally();
        self.replace_pixels(flipped)
    }

    pub fn flip_vertically(&mut self) -> PixelBuffer {
        let flipped = self.pixels.flipped_vertically();
        self.replace_pixels(flipped)
    }

    pub fn rotate_cw(&mut self) -> PixelBuffer {
        let rotated = self.pixels.rotated_cw();
        self.replace_pixels(rotated)
    }

    pub fn rotate_ccw(&mut self) -> PixelBuffer {
        let rotated = self.pixels.rotated_ccw();
        self.replace_pixels(rotated)
    }

    pub fn resize(&mut self, size: Size, mode: ResizeMode) -> PixelBuffer {
        let resized = self.pixels.resized(size, mode);
        self.replace_pixels(resized)
    }

    pub fn crop_to_bounds(&mut self, rect: Rect) -> PixelBuffer {
        let cropped = self.pixels.cropped(rect);
        self.replace_pixels(cropped)
    }

    /// Colour this layer contributes to a composite at `p`: its pixel with
    /// alpha scaled by the layer opacity.
    #[inline]
    pub fn composite_color(&self, p: Point) -> Color {
        let c = self.pixels.get_pixel(p);
        if self.opacity >= 1.0 {
            c
        } else {
            c.with_alpha(c.a * self.opacity)
        }
    }

    /// Composite `upper` onto this layer pixel by pixel (this layer sits
    /// underneath). Returns the pre-merge buffer.
    pub fn merge_under(&mut self, upper: &Layer) -> PixelBuffer {
        let mut merged = self.pixels.clone();
        let size = merged.size();
        for y in 0..size.height {
            for x in 0..size.width {
                let p = Point::new(x, y);
                let bottom = merged.get_pixel(p);
                merged.set_pixel(p, blend_colors(upper.composite_color(p), bottom));
            }
        }
        self.replace_pixels(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutators_return_previous_buffer() {
        let mut layer = Layer::new("Layer 1", Size::new(3, 2));
        layer.set_pixel(Point::new(0, 0), Color::RED);
        let before = layer.pixels.clone();
        layer.preview_stale = false;

        let old = layer.flip_horizontally();
        assert_eq!(old, before);
        assert!(layer.preview_stale);
        assert_eq!(layer.get_pixel(Point::new(2, 0)), Color::RED);

        let old = layer.rotate_cw();
        assert_eq!(old.size(), Size::new(3, 2));
        assert_eq!(layer.size(), Size::new(2, 3));
    }

    #[test]
    fn merge_under_respects_upper_opacity() {
        let mut bottom = Layer::from_pixels("bg", PixelBuffer::filled(Size::new(1, 1), Color::rgb(0.0, 0.0, 1.0)));
        let mut top = Layer::from_pixels("fg", PixelBuffer::filled(Size::new(1, 1), Color::RED));
        top.opacity = 0.5;

        let old = bottom.merge_under(&top);
        assert_eq!(old.get_pixel(Point::ZERO), Color::rgb(0.0, 0.0, 1.0));
        let merged = bottom.get_pixel(Point::ZERO);
        assert_eq!(merged, Color::new(0.5, 0.0, 0.5, 1.0));
    }

    #[test]
    fn fully_opaque_upper_wins() {
        let mut bottom = Layer::from_pixels("bg", PixelBuffer::filled(Size::new(2, 1), Color::WHITE));
        let mut top = Layer::new("fg", Size::new(2, 1));
        top.set_pixel(Point::new(1, 0), Color::RED);
        bottom.merge_under(&top);
        assert_eq!(bottom.get_pixel(Point::new(0, 0)), Color::WHITE);
        assert_eq!(bottom.get_pixel(Point::new(1, 0)), Color::RED);
    }
}
