// ============================================================================
// CLIPBOARD OPERATIONS: cut, copy, paste through a PNG hand-off
// ============================================================================

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageOutputFormat};
use thiserror::Error;
use tracing::debug;

use crate::canvas::Canvas;
use crate::history::{HistoryAction, PixelKey};
use crate::pixels::{Color, PixelBuffer, Point, Rect};

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard is empty")]
    Empty,
    #[error("clipboard image is not a valid PNG: {0}")]
    Image(#[from] image::ImageError),
}

/// A copied rectangle of pixels and where it came from on the canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipboardImage {
    pub origin: Point,
    pub pixels: PixelBuffer,
}

/// System clipboard collaborator. The engine only trades PNG bytes.
pub trait Clipboard {
    fn set_png(&mut self, bytes: Vec<u8>);
    fn get_png(&self) -> Option<Vec<u8>>;
}

/// In-process clipboard.
#[derive(Clone, Debug, Default)]
pub struct MemoryClipboard {
    data: Option<Vec<u8>>,
}

impl Clipboard for MemoryClipboard {
    fn set_png(&mut self, bytes: Vec<u8>) {
        self.data = Some(bytes);
    }

    fn get_png(&self) -> Option<Vec<u8>> {
        self.data.clone()
    }
}

pub fn encode_png(pixels: &PixelBuffer) -> Result<Vec<u8>, ClipboardError> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(pixels.to_rgba_image()).write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)?;
    Ok(bytes)
}

pub fn decode_png(bytes: &[u8]) -> Result<PixelBuffer, ClipboardError> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8();
    Ok(PixelBuffer::from_rgba_image(&img))
}

/// Copy the selected pixels of the current layer (or, with nothing
/// selected, the whole layer). `cut` also clears them as one undo step.
/// The flag is `true` when the whole-layer fallback was taken.
pub fn copy(canvas: &mut Canvas, cut: bool) -> (ClipboardImage, bool) {
    canvas.end_move_selection();
    let selection = canvas.selection();
    let layer = canvas.current_frame().current_layer();
    let whole_layer = !selection.has_selection();

    let rect = match selection.bounds() {
        Some(b) if !whole_layer => b.intersect(&Rect::from_size(layer.size())),
        _ => Rect::from_size(layer.size()),
    };
    let mut pixels = PixelBuffer::new(rect.size());
    let mut taken = Vec::new();
    for p in rect.points() {
        if whole_layer || selection.is_selected(p) {
            let c = layer.get_pixel(p);
            pixels.set_pixel(p - Point::new(rect.x, rect.y), c);
            if c != Color::TRANSPARENT {
                taken.push(p);
            }
        }
    }

    if cut && !taken.is_empty() {
        let frame = canvas.state.current_frame_id();
        let layer = canvas.state.current_layer_id();
        let mut action = HistoryAction::pixels("Cut");
        for pos in taken {
            canvas.write_layer_pixel(PixelKey { frame, layer, pos }, Color::TRANSPARENT, Some(&mut action));
        }
        canvas.record(action);
    }
    debug!(?rect, cut, whole_layer, "copy");
    (ClipboardImage { origin: Point::new(rect.x, rect.y), pixels }, whole_layer)
}

/// Start a floating selection holding `image` at `origin`. Dropping it
/// (`Canvas::end_move_selection`) commits the paste.
pub fn paste(canvas: &mut Canvas, image: &ClipboardImage, origin: Point) {
    canvas.float_pixels(origin, image.pixels.size(), image.pixels.data());
    debug!(?origin, size = ?image.pixels.size(), "paste");
}

/// Copy (or cut) into a clipboard as PNG. Returns the whole-layer flag.
pub fn copy_to(canvas: &mut Canvas, clipboard: &mut dyn Clipboard, cut: bool) -> Result<bool, ClipboardError> {
    let (image, whole_layer) = copy(canvas, cut);
    clipboard.set_png(encode_png(&image.pixels)?);
    Ok(whole_layer)
}

/// Paste PNG bytes from a clipboard at `origin`.
pub fn paste_from(canvas: &mut Canvas, clipboard: &dyn Clipboard, origin: Point) -> Result<(), ClipboardError> {
    let bytes = clipboard.get_png().ok_or(ClipboardError::Empty)?;
    let pixels = decode_png(&bytes)?;
    paste(canvas, &ClipboardImage { origin, pixels }, origin);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::WriteMode;
    use crate::pixels::Size;
    use crate::settings::{CanvasContext, EngineSettings};

    fn canvas() -> Canvas {
        Canvas::with_size(CanvasContext::new(EngineSettings::default()), Size::new(5, 5))
    }

    #[test]
    fn copy_without_selection_takes_whole_layer() {
        let mut c = canvas();
        c.write_pixel(Point::new(4, 4), Color::RED, WriteMode::Paint, None);
        let (img, whole) = copy(&mut c, false);
        assert!(whole);
        assert_eq!(img.pixels.size(), Size::new(5, 5));
        assert_eq!(img.pixels.get_pixel(Point::new(4, 4)), Color::RED);
    }

    #[test]
    fn cut_selection_is_undoable() {
        let mut c = canvas();
        c.write_pixel(Point::new(1, 1), Color::RED, WriteMode::Paint, None);
        c.write_pixel(Point::new(3, 3), Color::WHITE, WriteMode::Paint, None);
        c.select_area(Point::new(1, 1), Point::new(2, 2), true);
        let (img, whole) = copy(&mut c, true);
        assert!(!whole);
        assert_eq!(img.origin, Point::new(1, 1));
        assert_eq!(img.pixels.size(), Size::new(2, 2));
        assert_eq!(c.pick_color(Point::new(1, 1), false), Color::TRANSPARENT);
        assert_eq!(c.pick_color(Point::new(3, 3), false), Color::WHITE);
        c.undo();
        assert_eq!(c.pick_color(Point::new(1, 1), false), Color::RED);
    }

    #[test]
    fn paste_through_memory_clipboard() {
        let mut c = canvas();
        c.write_pixel(Point::new(0, 0), Color::RED, WriteMode::Paint, None);
        let mut clip = MemoryClipboard::default();
        c.select_area(Point::new(0, 0), Point::new(0, 0), true);
        assert_eq!(copy_to(&mut c, &mut clip, false).ok(), Some(false));

        paste_from(&mut c, &clip, Point::new(3, 2)).unwrap();
        assert!(c.is_moving_selection());
        c.end_move_selection();
        assert_eq!(c.pick_color(Point::new(3, 2), false), Color::RED);
        c.undo();
        assert_eq!(c.pick_color(Point::new(3, 2), false), Color::TRANSPARENT);
        assert!(c.selection().is_selected(Point::new(0, 0)));
    }

    #[test]
    fn empty_clipboard_is_an_error() {
        let mut c = canvas();
        let clip = MemoryClipboard::default();
        assert!(matches!(paste_from(&mut c, &clip, Point::ZERO), Err(ClipboardError::Empty)));
        assert!(decode_png(b"not a png").is_err());
    }
}
