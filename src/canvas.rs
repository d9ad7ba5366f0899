// ============================================================================
// CANVAS: editing state, pending notifications, and the history that edits it
// ============================================================================
//
// `CanvasState` is everything a history action may touch when it is replayed.
// `Canvas` wraps it together with the `History` so that ops can write pixels
// and record actions through one `&mut` borrow. Bulk operations need that
// exclusive borrow too, so the renderer never sees a half-applied change.

use tracing::{debug, info};

use crate::chunks::{ChunkRenderer, PreviewTarget, Presenter};
use crate::frame::{FlattenContext, Frame};
use crate::history::{History, HistoryAction, PixelKey};
use crate::layer::Layer;
use crate::pixels::{Color, PixelBuffer, Point, Size};
use crate::reel::AnimationReel;
use crate::selection::Selection;
use crate::settings::CanvasContext;

/// Events queued for the UI, drained once per tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notification {
    LayerListChanged,
    FrameListChanged,
    HistoryChanged,
    CurrentFrameChanged,
    PreviewStale(PreviewTarget),
}

/// Where a brush write lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Current layer of the current frame, clipped to the selection.
    #[default]
    Paint,
    Select,
    Deselect,
    /// Temporary preview overlay; never recorded.
    EffectArea,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BrushShape {
    #[default]
    Round,
    Square,
}

// ----------------------------------------------------------------------------
//  CanvasState
// ----------------------------------------------------------------------------

pub struct CanvasState {
    pub ctx: CanvasContext,
    pub reel: AnimationReel,
    pub selection: Selection,
    pub chunks: ChunkRenderer,
    /// Line/rectangle previews, composited above every layer.
    pub effect_area: PixelBuffer,
    size: Size,
    notifications: Vec<Notification>,
}

impl CanvasState {
    pub fn new(ctx: CanvasContext, size: Size) -> Self {
        let s = &ctx.settings;
        let reel = AnimationReel::new(size, s.frame_time_ms, s.loop_playback);
        Self::from_reel(ctx, reel)
    }

    /// Wrap an existing reel (e.g. one loaded from disk).
    pub fn from_reel(ctx: CanvasContext, reel: AnimationReel) -> Self {
        let size = reel.current_frame().size();
        let chunks = ChunkRenderer::new(size, ctx.settings.tile_size, ctx.settings.parallel_tiles);
        Self {
            ctx,
            reel,
            selection: Selection::new(size),
            chunks,
            effect_area: PixelBuffer::new(size),
            size,
            notifications: Vec::new(),
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Queue a notification; duplicates already waiting are collapsed.
    pub fn notify(&mut self, n: Notification) {
        if !self.notifications.contains(&n) {
            self.notifications.push(n);
        }
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn current_frame_id(&self) -> u64 {
        self.reel.current_frame().id
    }

    pub fn current_layer_id(&self) -> u64 {
        self.reel.current_frame().current_layer().id
    }

    /// Write one pixel of a specific layer. Tiles are only marked when the
    /// frame is the one on screen.
    pub fn write_layer_pixel(&mut self, frame: u64, layer: u64, p: Point, color: Color) -> bool {
        let on_screen = self.current_frame_id() == frame;
        let Some(l) = self.reel.frame_by_id_mut(frame).and_then(|f| f.layer_by_id_mut(layer)) else {
            return false;
        };
        if !l.set_pixel(p, color) {
            return false;
        }
        if on_screen {
            self.chunks.mark_pixel(p);
        }
        true
    }

    /// Run `f` on a layer looked up by id. Returns `false` when not found.
    pub fn with_layer(&mut self, frame: u64, layer: u64, f: impl FnOnce(&mut Layer)) -> bool {
        match self.reel.frame_by_id_mut(frame).and_then(|fr| fr.layer_by_id_mut(layer)) {
            Some(l) => {
                f(l);
                true
            }
            None => false,
        }
    }

    /// Something in a frame's layer list changed (order, count, opacity…).
    pub fn layers_changed(&mut self) {
        self.notify(Notification::LayerListChanged);
        self.chunks.mark_all();
    }

    pub fn frames_changed(&mut self) {
        self.notify(Notification::FrameListChanged);
        self.notify(Notification::CurrentFrameChanged);
        self.chunks.mark_all();
    }

    /// Adopt a new canvas size after a whole-canvas transform. Frames and
    /// layers are resized by the caller.
    pub fn set_size(&mut self, size: Size) {
        if size != self.size {
            self.size = size;
            self.chunks.resize(size);
            self.effect_area = PixelBuffer::new(size);
        }
        self.chunks.mark_all();
    }
}

// ----------------------------------------------------------------------------
//  Canvas
// ----------------------------------------------------------------------------

/// A floating selection being dragged, with the layer it was lifted from.
struct PendingMove {
    frame: u64,
    layer: u64,
    action: HistoryAction,
}

pub struct Canvas {
    pub state: CanvasState,
    pub history: History,
    pending_move: Option<PendingMove>,
}

impl Canvas {
    pub fn new(ctx: CanvasContext) -> Self {
        let size = ctx.settings.default_size;
        Self::with_size(ctx, size)
    }

    pub fn with_size(ctx: CanvasContext, size: Size) -> Self {
        Self::from_state(CanvasState::new(ctx, size))
    }

    pub fn from_reel(ctx: CanvasContext, reel: AnimationReel) -> Self {
        Self::from_state(CanvasState::from_reel(ctx, reel))
    }

    fn from_state(state: CanvasState) -> Self {
        let history = History::new(state.ctx.settings.max_history);
        Self {
            state,
            history,
            pending_move: None,
        }
    }

    pub fn size(&self) -> Size {
        self.state.size()
    }

    pub fn reel(&self) -> &AnimationReel {
        &self.state.reel
    }

    pub fn current_frame(&self) -> &Frame {
        self.state.reel.current_frame()
    }

    pub fn selection(&self) -> &Selection {
        &self.state.selection
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.state.drain_notifications()
    }

    /// Commit an action that has already been applied.
    pub fn record(&mut self, action: HistoryAction) {
        self.history.add_action(action, &mut self.state);
    }

    // ---- per-tick presentation ----------------------------------------------

    /// Flatten dirty tiles of the current frame into the presenter and flush
    /// stale thumbnails. Returns the number of tiles updated.
    pub fn tick(&mut self, presenter: &mut dyn Presenter) -> usize {
        let state = &mut self.state;
        let overlays = [&state.effect_area];
        let ctx = FlattenContext {
            selection: Some(&state.selection),
            selection_tint: state.ctx.settings.selection_tint,
            overlays: &overlays,
        };
        let updated = state.chunks.update(state.reel.current_frame(), &ctx, presenter);

        let mut stale = Vec::new();
        for frame in state.reel.frames_mut() {
            // Mutable layer access drops the frame's cached preview, so
            // only take it when something is stale.
            if !frame.layers().iter().any(|l| l.preview_stale) {
                continue;
            }
            let mut frame_stale = false;
            for layer in frame.layers_mut() {
                if layer.preview_stale {
                    layer.preview_stale = false;
                    stale.push(PreviewTarget::Layer(layer.id));
                    frame_stale = true;
                }
            }
            if frame_stale {
                stale.push(PreviewTarget::Frame(frame.id));
            }
        }
        for target in stale {
            presenter.mark_preview_stale(target);
            state.notify(Notification::PreviewStale(target));
        }
        updated
    }

    // ---- pixel access ---------------------------------------------------------

    /// Route one brush write according to `mode`. Returns `true` when
    /// something changed.
    pub fn write_pixel(&mut self, p: Point, color: Color, mode: WriteMode, action: Option<&mut HistoryAction>) -> bool {
        let state = &mut self.state;
        if !state.size.contains(p) {
            return false;
        }
        match mode {
            WriteMode::Paint => {
                if state.selection.has_selection() && !state.selection.is_selected(p) {
                    return false;
                }
                let frame = state.current_frame_id();
                let layer = state.current_layer_id();
                let old = state.reel.current_frame().current_layer().get_pixel(p);
                if old == color {
                    return false;
                }
                state.reel.current_frame_mut().current_layer_mut().set_pixel(p, color);
                state.chunks.mark_pixel(p);
                if let Some(action) = action {
                    action.record_pixel(PixelKey { frame, layer, pos: p }, old, color);
                }
                true
            }
            WriteMode::Select | WriteMode::Deselect => {
                let selected = mode == WriteMode::Select;
                let changes = action.and_then(|a| a.mask_changes());
                let flipped = state.selection.set_pixel(p, selected, changes);
                if flipped {
                    state.chunks.mark_pixel(p);
                }
                flipped
            }
            WriteMode::EffectArea => {
                if state.effect_area.get_pixel(p) == color {
                    return false;
                }
                state.effect_area.set_pixel(p, color);
                state.chunks.mark_pixel(p);
                true
            }
        }
    }

    /// Write a pixel on any layer of any frame, recording it into `action`.
    pub fn write_layer_pixel(&mut self, key: PixelKey, color: Color, action: Option<&mut HistoryAction>) -> bool {
        let Some(old) = self.layer_pixel(key) else {
            return false;
        };
        if old == color || !self.state.write_layer_pixel(key.frame, key.layer, key.pos, color) {
            return false;
        }
        if let Some(action) = action {
            action.record_pixel(key, old, color);
        }
        true
    }

    fn layer_pixel(&self, key: PixelKey) -> Option<Color> {
        let frame = self.state.reel.frames().iter().find(|f| f.id == key.frame)?;
        let layer = frame.layer(frame.layer_index(key.layer)?)?;
        Some(layer.get_pixel(key.pos))
    }

    /// Colour under `p`: the current layer's, or the composite of the whole
    /// frame when `merged`.
    pub fn pick_color(&self, p: Point, merged: bool) -> Color {
        let frame = self.state.reel.current_frame();
        if merged {
            let rect = crate::pixels::Rect::new(p.x, p.y, 1, 1);
            frame
                .flatten_region(rect, &FlattenContext::default())
                .first()
                .copied()
                .unwrap_or(Color::TRANSPARENT)
        } else {
            frame.current_layer().get_pixel(p)
        }
    }

    /// Wipe the preview overlay, marking only tiles it touched.
    pub fn clear_effect_area(&mut self) {
        let state = &mut self.state;
        if state.effect_area.is_transparent() {
            return;
        }
        let size = state.effect_area.size();
        for p in crate::pixels::Rect::from_size(size).points() {
            if state.effect_area.get_pixel(p) != Color::TRANSPARENT {
                state.chunks.mark_pixel(p);
            }
        }
        state.effect_area.clear();
    }

    /// Abandon a line/rectangle preview. Nothing reaches history.
    pub fn cancel_gesture(&mut self) {
        self.clear_effect_area();
    }

    // ---- navigation -----------------------------------------------------------

    pub fn select_layer(&mut self, index: usize) -> bool {
        self.end_move_selection();
        if !self.state.reel.current_frame_mut().select_layer(index) {
            return false;
        }
        self.state.notify(Notification::LayerListChanged);
        true
    }

    pub fn select_frame(&mut self, index: usize) -> bool {
        self.end_move_selection();
        if index == self.state.reel.current_frame_index() || !self.state.reel.select_frame(index) {
            return false;
        }
        self.frame_switched();
        true
    }

    pub fn next_frame(&mut self) {
        self.end_move_selection();
        self.state.reel.next_frame();
        self.frame_switched();
    }

    pub fn previous_frame(&mut self) {
        self.end_move_selection();
        self.state.reel.previous_frame();
        self.frame_switched();
    }

    fn frame_switched(&mut self) {
        self.state.notify(Notification::CurrentFrameChanged);
        self.state.notify(Notification::LayerListChanged);
        self.state.chunks.mark_all();
    }

    pub fn play(&mut self) {
        self.end_move_selection();
        self.state.reel.play();
    }

    pub fn stop(&mut self) {
        self.state.reel.stop();
    }

    /// Step playback; returns `true` when the visible frame changed.
    pub fn advance(&mut self, delta_ms: u32) -> bool {
        let changed = self.state.reel.advance(delta_ms);
        if changed {
            self.frame_switched();
        }
        changed
    }

    // ---- undo / redo ----------------------------------------------------------

    pub fn undo(&mut self) -> Option<String> {
        self.end_move_selection();
        let d = self.history.undo(&mut self.state);
        if let Some(d) = &d {
            info!(action = %d, "undo");
        }
        d
    }

    pub fn redo(&mut self) -> Option<String> {
        self.end_move_selection();
        let d = self.history.redo(&mut self.state);
        if let Some(d) = &d {
            info!(action = %d, "redo");
        }
        d
    }

    pub fn jump_to_action(&mut self, index: isize) {
        self.end_move_selection();
        self.history.jump_to_action(index, &mut self.state);
    }

    // ---- selection ------------------------------------------------------------

    /// Select (or deselect) the rectangle spanned by two corners.
    pub fn select_area(&mut self, a: Point, b: Point, selected: bool) {
        self.end_move_selection();
        let mut action = HistoryAction::selection();
        if let Some(changes) = action.mask_changes() {
            self.state.selection.set_area(a, b, selected, changes);
        }
        self.selection_edited(action);
    }

    pub fn select_all(&mut self) {
        self.end_move_selection();
        let mut action = HistoryAction::selection();
        if let Some(changes) = action.mask_changes() {
            self.state.selection.select_all(changes);
        }
        self.selection_edited(action);
    }

    pub fn deselect_all(&mut self) {
        self.end_move_selection();
        let mut action = HistoryAction::selection();
        if let Some(changes) = action.mask_changes() {
            self.state.selection.clear(changes);
        }
        self.selection_edited(action);
    }

    pub fn invert_selection(&mut self) {
        self.end_move_selection();
        let mut action = HistoryAction::selection();
        if let Some(changes) = action.mask_changes() {
            self.state.selection.invert(changes);
        }
        self.selection_edited(action);
    }

    fn selection_edited(&mut self, action: HistoryAction) {
        if action.has_changes() {
            self.state.chunks.mark_all();
        }
        self.record(action);
    }

    pub fn is_moving_selection(&self) -> bool {
        self.pending_move.is_some()
    }

    fn pending_move_action(frame: u64, layer: u64, offset: Point) -> PendingMove {
        PendingMove {
            frame,
            layer,
            action: HistoryAction::SelectionMoved {
                old_offset: offset,
                new_offset: offset,
                mask: Default::default(),
                pixels: Default::default(),
            },
        }
    }

    /// Lift the selected pixels off the current layer so they can be dragged.
    pub fn begin_move_selection(&mut self) -> bool {
        if self.pending_move.is_some() {
            return true;
        }
        let state = &mut self.state;
        if !state.selection.has_selection() {
            return false;
        }
        let frame = state.current_frame_id();
        let layer = state.current_layer_id();
        let mut pending = Self::pending_move_action(frame, layer, state.selection.offset());
        let lifted = state
            .selection
            .take_selected_colors(state.reel.current_frame_mut().current_layer_mut());
        for (pos, old, new) in lifted {
            pending.action.record_pixel(PixelKey { frame, layer, pos }, old, new);
        }
        debug!(frame, layer, "selection lifted");
        state.chunks.mark_all();
        self.pending_move = Some(pending);
        true
    }

    /// Slide the floating selection. Starts a move if none is running.
    pub fn move_selection(&mut self, delta: Point) {
        if !self.begin_move_selection() {
            return;
        }
        self.state.selection.translate(delta);
        self.state.chunks.mark_all();
    }

    /// Rotate the selection 90° clockwise, lifting it first if needed.
    pub fn rotate_selection_cw(&mut self) {
        if !self.begin_move_selection() {
            return;
        }
        if let Some(pending) = &mut self.pending_move
            && let Some(changes) = pending.action.mask_changes()
        {
            self.state.selection.rotate_cw(changes);
        }
        self.state.chunks.mark_all();
    }

    /// Start floating external pixels at `origin` (paste).
    pub fn float_pixels(&mut self, origin: Point, size: Size, pixels: &[Color]) {
        self.end_move_selection();
        let frame = self.state.current_frame_id();
        let layer = self.state.current_layer_id();
        let mut pending = Self::pending_move_action(frame, layer, self.state.selection.offset());
        if let Some(changes) = pending.action.mask_changes() {
            self.state.selection.float_pixels(origin, size, pixels, changes);
        }
        self.state.chunks.mark_all();
        self.pending_move = Some(pending);
    }

    /// Drop the floating pixels at the current offset and record the move.
    pub fn end_move_selection(&mut self) {
        let Some(mut pending) = self.pending_move.take() else {
            return;
        };
        let state = &mut self.state;
        let target = state
            .reel
            .frame_by_id_mut(pending.frame)
            .and_then(|f| f.layer_by_id_mut(pending.layer));
        if let Some(layer) = target {
            for (pos, old, new) in state.selection.commit_selected_colors(layer) {
                let key = PixelKey { frame: pending.frame, layer: pending.layer, pos };
                pending.action.record_pixel(key, old, new);
            }
        }
        if let HistoryAction::SelectionMoved { new_offset, .. } = &mut pending.action {
            *new_offset = state.selection.offset();
        }
        state.chunks.mark_all();
        debug!("selection dropped");
        self.record(pending.action);
    }

    /// Drop any pending move before a whole-canvas operation.
    pub(crate) fn settle(&mut self) {
        self.end_move_selection();
        self.clear_effect_area();
    }
}
