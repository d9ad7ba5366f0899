// ============================================================================
// FRAME: ordered layer stack of one animation frame
// ============================================================================

use tracing::warn;

use crate::layer::{random_id, Layer};
use crate::pixels::{blend_colors, Color, PixelBuffer, Point, Rect, Size};
use crate::selection::Selection;

/// Extra inputs for compositing that live outside the layer list.
#[derive(Clone, Copy, Default)]
pub struct FlattenContext<'a> {
    /// When the selection is floating, the current layer shows the floating
    /// pixels under the mask instead of its own.
    pub selection: Option<&'a Selection>,
    /// Tint drawn over selected pixels (selection overlay).
    pub selection_tint: Option<Color>,
    /// Virtual layers drawn above everything, bottom first.
    pub overlays: &'a [&'a PixelBuffer],
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub id: u64,
    size: Size,
    /// Back-to-front: index 0 is the bottom layer. Never empty.
    layers: Vec<Layer>,
    current_layer: usize,
    /// Flattened thumbnail. Dropped on any mutable access to the layers and
    /// rebuilt by [`Frame::preview`].
    preview: Option<PixelBuffer>,
}

// The cached preview is derived state and takes no part in equality.
impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.size == other.size
            && self.layers == other.layers
            && self.current_layer == other.current_layer
    }
}

impl Frame {
    /// Blank frame holding a single transparent layer.
    pub fn new(size: Size) -> Self {
        Self {
            id: random_id(),
            size,
            layers: vec![Layer::new("Layer 1", size)],
            current_layer: 0,
            preview: None,
        }
    }

    /// Rebuild a frame from parts. Returns `None` for an empty layer list.
    pub fn from_parts(id: u64, size: Size, layers: Vec<Layer>, current_layer: usize) -> Option<Self> {
        if layers.is_empty() {
            return None;
        }
        let current_layer = current_layer.min(layers.len() - 1);
        Some(Self {
            id,
            size,
            layers,
            current_layer,
            preview: None,
        })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Only for whole-canvas transforms, which resize every layer too.
    pub(crate) fn set_size(&mut self, size: Size) {
        self.size = size;
        self.preview = None;
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        self.preview = None;
        &mut self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.preview = None;
        self.layers.get_mut(index)
    }

    pub fn layer_index(&self, id: u64) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn layer_by_id_mut(&mut self, id: u64) -> Option<&mut Layer> {
        self.preview = None;
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn current_layer_index(&self) -> usize {
        self.current_layer
    }

    pub fn current_layer(&self) -> &Layer {
        &self.layers[self.current_layer]
    }

    pub fn current_layer_mut(&mut self) -> &mut Layer {
        self.preview = None;
        &mut self.layers[self.current_layer]
    }

    pub fn select_layer(&mut self, index: usize) -> bool {
        if index >= self.layers.len() {
            return false;
        }
        self.current_layer = index;
        true
    }

    fn unique_layer_id(&self) -> u64 {
        loop {
            let id = random_id();
            if self.layer_index(id).is_none() {
                return id;
            }
        }
    }

    // ---- structural edits ---------------------------------------------------

    /// Insert a blank layer at `index` (clamped) and make it current.
    pub fn new_layer(&mut self, index: usize) -> usize {
        let name = format!("Layer {}", self.layers.len() + 1);
        self.insert_layer(index, Layer::new(name, self.size))
    }

    /// Insert an existing layer, re-rolling its id on a sibling collision.
    pub fn insert_layer(&mut self, index: usize, mut layer: Layer) -> usize {
        if self.layer_index(layer.id).is_some() {
            layer.id = self.unique_layer_id();
        }
        let index = index.min(self.layers.len());
        self.layers.insert(index, layer);
        self.preview = None;
        self.current_layer = index;
        index
    }

    /// Copy the layer at `index` directly above itself.
    pub fn duplicate_layer(&mut self, index: usize) -> Option<usize> {
        let src = self.layers.get(index)?;
        let mut dup = src.clone();
        dup.name = format!("{} Copy", src.name);
        dup.id = self.unique_layer_id();
        dup.preview_stale = true;
        Some(self.insert_layer(index + 1, dup))
    }

    /// Remove a layer. The last remaining layer can never be removed.
    pub fn remove_layer(&mut self, index: usize) -> Option<Layer> {
        if self.layers.len() <= 1 {
            warn!(frame = self.id, "refusing to delete the only layer of a frame");
            return None;
        }
        if index >= self.layers.len() {
            return None;
        }
        let removed = self.layers.remove(index);
        self.preview = None;
        if self.current_layer > index || self.current_layer >= self.layers.len() {
            self.current_layer = self.current_layer.saturating_sub(1);
        }
        Some(removed)
    }

    /// Move a layer one step up (towards the top) or down, wrapping around
    /// at either end. Returns the new index.
    pub fn move_layer(&mut self, index: usize, up: bool) -> Option<usize> {
        let len = self.layers.len();
        if index >= len {
            return None;
        }
        let to = if up { (index + 1) % len } else { (index + len - 1) % len };
        self.move_layer_to(index, to);
        Some(to)
    }

    /// Move a layer to an absolute index; the current layer follows it.
    pub fn move_layer_to(&mut self, from: usize, to: usize) -> bool {
        if from >= self.layers.len() || to >= self.layers.len() {
            return false;
        }
        let current_id = self.current_layer().id;
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        self.preview = None;
        self.current_layer = self.layer_index(current_id).unwrap_or(0);
        true
    }

    /// Composite the layer at `index` into the one below it and remove it.
    /// Returns the removed upper layer and the lower layer's old pixels.
    pub fn merge_down(&mut self, index: usize) -> Option<(Layer, PixelBuffer)> {
        if index == 0 || index >= self.layers.len() {
            return None;
        }
        let upper = self.layers.remove(index);
        self.preview = None;
        let old_below = self.layers[index - 1].merge_under(&upper);
        if self.current_layer >= index {
            self.current_layer -= 1;
        }
        Some((upper, old_below))
    }

    /// Returns the previous opacity.
    pub fn set_opacity(&mut self, index: usize, opacity: f32) -> Option<f32> {
        let layer = self.layers.get_mut(index)?;
        let old = layer.opacity;
        layer.opacity = opacity.clamp(0.0, 1.0);
        self.preview = None;
        Some(old)
    }

    /// Returns the previous visibility.
    pub fn set_visibility(&mut self, index: usize, visible: bool) -> Option<bool> {
        let layer = self.layers.get_mut(index)?;
        let old = std::mem::replace(&mut layer.visible, visible);
        self.preview = None;
        Some(old)
    }

    /// Returns the previous name.
    pub fn rename(&mut self, index: usize, name: impl Into<String>) -> Option<String> {
        let layer = self.layers.get_mut(index)?;
        Some(std::mem::replace(&mut layer.name, name.into()))
    }

    // ---- compositing --------------------------------------------------------

    /// Cached flatten of the frame, rebuilt when anything changed since the
    /// last call.
    pub fn preview(&mut self) -> &PixelBuffer {
        if self.preview.is_none() {
            self.preview = Some(self.flatten_image());
        }
        let size = self.size;
        self.preview.get_or_insert_with(|| PixelBuffer::new(size))
    }

    pub fn has_cached_preview(&self) -> bool {
        self.preview.is_some()
    }

    /// All visible layers composited into one buffer.
    pub fn flatten_image(&self) -> PixelBuffer {
        self.flatten_with(&FlattenContext::default())
    }

    pub fn flatten_with(&self, ctx: &FlattenContext<'_>) -> PixelBuffer {
        let data = self.flatten_region(Rect::from_size(self.size), ctx);
        PixelBuffer::from_data(self.size, data).unwrap_or_else(|_| PixelBuffer::new(self.size))
    }

    /// Composite the pixels of `rect`, row-major, back-to-front.
    pub fn flatten_region(&self, rect: Rect, ctx: &FlattenContext<'_>) -> Vec<Color> {
        let floating = ctx.selection.filter(|s| s.is_moving());
        let mut out = Vec::with_capacity(rect.size().area());
        for p in rect.points() {
            let mut acc = Color::TRANSPARENT;
            for (i, layer) in self.layers.iter().enumerate() {
                if !layer.visible {
                    continue;
                }
                let mut top = layer.composite_color(p);
                // Transparent floating pixels are not dropped on commit, so
                // the layer shows through them.
                if i == self.current_layer
                    && let Some(sel) = floating
                    && sel.is_selected(p)
                    && let Some(c) = sel.floating_color(p)
                    && c.a > 0.0
                {
                    top = c.with_alpha(c.a * layer.opacity.min(1.0));
                }
                acc = blend_colors(top, acc);
            }
            if let (Some(tint), Some(sel)) = (ctx.selection_tint, ctx.selection)
                && sel.is_selected(p)
            {
                acc = blend_colors(tint, acc);
            }
            for overlay in ctx.overlays {
                acc = blend_colors(overlay.get_pixel(p), acc);
            }
            out.push(acc);
        }
        out
    }
}
