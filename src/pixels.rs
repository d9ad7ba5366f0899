// ============================================================================
// PIXEL PRIMITIVES: colours, integer geometry, and the flat RGBA buffer
// ============================================================================

use std::ops::{Add, Neg, Sub};

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::io::FormatError;

// ----------------------------------------------------------------------------
//  Colour
// ----------------------------------------------------------------------------

/// Straight (non-premultiplied) RGBA colour, one `f32` per channel in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque colour.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Linear interpolation between two colours, channel by channel.
    pub fn lerp(self, other: Color, t: f32) -> Self {
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    /// True when the colour channels match, ignoring alpha.
    pub fn rgb_eq(&self, other: &Color) -> bool {
        self.r == other.r && self.g == other.g && self.b == other.b
    }

    /// Flood-fill distance: alpha differences weigh five times the colour
    /// channels, then everything is averaged over 8.
    pub fn delta(&self, other: &Color) -> f32 {
        ((self.r - other.r).abs()
            + (self.g - other.g).abs()
            + (self.b - other.b).abs()
            + (self.a - other.a).abs() * 5.0)
            / 8.0
    }

    pub fn from_rgba8(px: Rgba<u8>) -> Self {
        Self::new(
            px[0] as f32 / 255.0,
            px[1] as f32 / 255.0,
            px[2] as f32 / 255.0,
            px[3] as f32 / 255.0,
        )
    }

    pub fn to_rgba8(self) -> Rgba<u8> {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([q(self.r), q(self.g), q(self.b), q(self.a)])
    }
}

/// Source-over compositing of `top` onto `bottom`.
///
/// A fully opaque `top` replaces `bottom` outright; this short-circuit keeps
/// opaque strokes bit-exact instead of going through the float blend.
pub fn blend_colors(top: Color, bottom: Color) -> Color {
    if top.a == 1.0 {
        return top;
    }
    let inv = 1.0 - top.a;
    let out_a = top.a + bottom.a * inv;
    if out_a == 0.0 {
        return Color::TRANSPARENT;
    }
    Color {
        r: (top.r * top.a + bottom.r * bottom.a * inv) / out_a,
        g: (top.g * top.a + bottom.g * bottom.a * inv) / out_a,
        b: (top.b * top.a + bottom.b * bottom.a * inv) / out_a,
        a: out_a,
    }
}

// ----------------------------------------------------------------------------
//  Integer geometry
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Point = Point::new(0, 0);

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> usize {
        self.width.max(0) as usize * self.height.max(0) as usize
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.width && p.y < self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Axis-aligned rectangle with an inclusive origin and exclusive far edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// Smallest rectangle containing both corner pixels.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs() + 1, (a.y - b.y).abs() + 1)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.right() && p.y < self.bottom()
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let r = self.right().min(other.right());
        let b = self.bottom().min(other.bottom());
        Rect::new(x, y, (r - x).max(0), (b - y).max(0))
    }

    /// Row-major iterator over every pixel inside the rectangle.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        let (x0, x1) = (self.x, self.right());
        (self.y..self.bottom()).flat_map(move |y| (x0..x1).map(move |x| Point::new(x, y)))
    }
}

// ----------------------------------------------------------------------------
//  PixelBuffer
// ----------------------------------------------------------------------------

/// How a buffer is brought to a new size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeMode {
    /// Nearest-neighbour resample of the whole image.
    #[default]
    Scale,
    /// Keep pixels top-left aligned; new space is transparent.
    Crop,
}

/// Row-major grid of straight RGBA colours with bounds-checked access.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    width: i32,
    height: i32,
    data: Vec<Color>,
}

impl PixelBuffer {
    /// Fully transparent buffer.
    pub fn new(size: Size) -> Self {
        Self::filled(size, Color::TRANSPARENT)
    }

    pub fn filled(size: Size, color: Color) -> Self {
        let size = Size::new(size.width.max(0), size.height.max(0));
        Self {
            width: size.width,
            height: size.height,
            data: vec![color; size.area()],
        }
    }

    /// Wrap an existing colour vector. The length must be exactly
    /// `width * height`.
    pub fn from_data(size: Size, data: Vec<Color>) -> Result<Self, FormatError> {
        if size.width < 0 || size.height < 0 || data.len() != size.area() {
            return Err(FormatError::ColorBufferLength {
                width: size.width,
                height: size.height,
                expected: size.area(),
                actual: data.len(),
            });
        }
        Ok(Self {
            width: size.width,
            height: size.height,
            data,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn data(&self) -> &[Color] {
        &self.data
    }

    pub fn into_data(self) -> Vec<Color> {
        self.data
    }

    #[inline]
    pub fn in_bounds(&self, p: Point) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.width && p.y < self.height
    }

    #[inline(always)]
    fn index(&self, p: Point) -> usize {
        p.y as usize * self.width as usize + p.x as usize
    }

    /// Read a pixel; anything outside the buffer is transparent black.
    #[inline]
    pub fn get_pixel(&self, p: Point) -> Color {
        if !self.in_bounds(p) {
            return Color::TRANSPARENT;
        }
        self.data[self.index(p)]
    }

    /// Write a pixel. Returns `false` (and does nothing) when out of range.
    #[inline]
    pub fn set_pixel(&mut self, p: Point, color: Color) -> bool {
        if !self.in_bounds(p) {
            return false;
        }
        let idx = self.index(p);
        self.data[idx] = color;
        true
    }

    pub fn fill(&mut self, color: Color) {
        self.data.fill(color);
    }

    pub fn clear(&mut self) {
        self.fill(Color::TRANSPARENT);
    }

    pub fn is_transparent(&self) -> bool {
        self.data.iter().all(|c| c.a == 0.0)
    }

    /// Copy of the pixels inside `rect`, row-major. Out-of-range cells are
    /// transparent.
    pub fn region(&self, rect: Rect) -> Vec<Color> {
        rect.points().map(|p| self.get_pixel(p)).collect()
    }

    // ---- geometric transforms (all return a new buffer) ---------------------

    pub fn flipped_horizontally(&self) -> PixelBuffer {
        let mut out = PixelBuffer::new(self.size());
        let w = self.width as usize;
        for (src, dst) in self.data.chunks_exact(w.max(1)).zip(out.data.chunks_exact_mut(w.max(1))) {
            for (x, px) in src.iter().enumerate() {
                dst[w - 1 - x] = *px;
            }
        }
        out
    }

    pub fn flipped_vertically(&self) -> PixelBuffer {
        let mut out = PixelBuffer::new(self.size());
        let w = self.width as usize;
        if w == 0 {
            return out;
        }
        for (y, row) in self.data.chunks_exact(w).enumerate() {
            let dy = self.height as usize - 1 - y;
            out.data[dy * w..(dy + 1) * w].copy_from_slice(row);
        }
        out
    }

    /// Rotate 90° clockwise; width and height swap.
    pub fn rotated_cw(&self) -> PixelBuffer {
        let mut out = PixelBuffer::new(Size::new(self.height, self.width));
        for ny in 0..out.height {
            for nx in 0..out.width {
                let src = Point::new(ny, self.height - 1 - nx);
                out.set_pixel(Point::new(nx, ny), self.get_pixel(src));
            }
        }
        out
    }

    /// Rotate 90° counter-clockwise; width and height swap.
    pub fn rotated_ccw(&self) -> PixelBuffer {
        let mut out = PixelBuffer::new(Size::new(self.height, self.width));
        for ny in 0..out.height {
            for nx in 0..out.width {
                let src = Point::new(self.width - 1 - ny, nx);
                out.set_pixel(Point::new(nx, ny), self.get_pixel(src));
            }
        }
        out
    }

    pub fn resized(&self, size: Size, mode: ResizeMode) -> PixelBuffer {
        let mut out = PixelBuffer::new(size);
        match mode {
            ResizeMode::Scale => {
                if self.width == 0 || self.height == 0 {
                    return out;
                }
                for y in 0..out.height {
                    let sy = (y as i64 * self.height as i64 / out.height as i64) as i32;
                    for x in 0..out.width {
                        let sx = (x as i64 * self.width as i64 / out.width as i64) as i32;
                        out.set_pixel(Point::new(x, y), self.get_pixel(Point::new(sx, sy)));
                    }
                }
            }
            ResizeMode::Crop => {
                let keep = Rect::from_size(size).intersect(&Rect::from_size(self.size()));
                for p in keep.points() {
                    out.set_pixel(p, self.get_pixel(p));
                }
            }
        }
        out
    }

    /// Extract `rect` as a new buffer of the rectangle's size.
    pub fn cropped(&self, rect: Rect) -> PixelBuffer {
        let mut out = PixelBuffer::new(rect.size());
        let origin = Point::new(rect.x, rect.y);
        for y in 0..out.height {
            for x in 0..out.width {
                let p = Point::new(x, y);
                out.set_pixel(p, self.get_pixel(p + origin));
            }
        }
        out
    }

    // ---- 8-bit interop ------------------------------------------------------

    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut img = RgbaImage::new(self.width as u32, self.height as u32);
        for (i, px) in img.pixels_mut().enumerate() {
            *px = self.data[i].to_rgba8();
        }
        img
    }

    pub fn from_rgba_image(img: &RgbaImage) -> Self {
        Self {
            width: img.width() as i32,
            height: img.height() as i32,
            data: img.pixels().map(|px| Color::from_rgba8(*px)).collect(),
        }
    }
}
