// ============================================================================
// ANIMATION REEL: ordered frames, a cursor, and playback timing
// ============================================================================

use tracing::{debug, warn};

use crate::frame::Frame;
use crate::layer::random_id;
use crate::pixels::Size;

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationReel {
    /// Never empty.
    frames: Vec<Frame>,
    current_frame: usize,
    pub loop_playback: bool,
    pub frame_time_ms: u32,
    playing: bool,
    elapsed_ms: u32,
}

impl AnimationReel {
    pub fn new(size: Size, frame_time_ms: u32, loop_playback: bool) -> Self {
        Self {
            frames: vec![Frame::new(size)],
            current_frame: 0,
            loop_playback,
            frame_time_ms,
            playing: false,
            elapsed_ms: 0,
        }
    }

    /// Rebuild from loaded frames. Returns `None` for an empty list.
    pub fn from_frames(frames: Vec<Frame>, current_frame: usize, frame_time_ms: u32, loop_playback: bool) -> Option<Self> {
        if frames.is_empty() {
            return None;
        }
        let current_frame = current_frame.min(frames.len() - 1);
        Some(Self {
            frames,
            current_frame,
            loop_playback,
            frame_time_ms,
            playing: false,
            elapsed_ms: 0,
        })
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frame_mut(&mut self, index: usize) -> Option<&mut Frame> {
        self.frames.get_mut(index)
    }

    pub fn find_frame(&self, id: u64) -> Option<usize> {
        self.frames.iter().position(|f| f.id == id)
    }

    pub fn frame_by_id_mut(&mut self, id: u64) -> Option<&mut Frame> {
        self.frames.iter_mut().find(|f| f.id == id)
    }

    pub fn current_frame_index(&self) -> usize {
        self.current_frame
    }

    pub fn current_frame(&self) -> &Frame {
        &self.frames[self.current_frame]
    }

    pub fn current_frame_mut(&mut self) -> &mut Frame {
        &mut self.frames[self.current_frame]
    }

    pub fn select_frame(&mut self, index: usize) -> bool {
        if index >= self.frames.len() {
            return false;
        }
        self.current_frame = index;
        true
    }

    pub fn next_frame(&mut self) -> usize {
        self.current_frame = (self.current_frame + 1) % self.frames.len();
        self.current_frame
    }

    pub fn previous_frame(&mut self) -> usize {
        let len = self.frames.len();
        self.current_frame = (self.current_frame + len - 1) % len;
        self.current_frame
    }

    fn unique_frame_id(&self) -> u64 {
        loop {
            let id = random_id();
            if self.find_frame(id).is_none() {
                return id;
            }
        }
    }

    // ---- structural edits ---------------------------------------------------

    /// Insert a frame at `index` (clamped) and make it current.
    pub fn add_frame(&mut self, index: usize, mut frame: Frame) -> usize {
        if self.find_frame(frame.id).is_some() {
            frame.id = self.unique_frame_id();
        }
        let index = index.min(self.frames.len());
        self.frames.insert(index, frame);
        self.current_frame = index;
        index
    }

    /// Insert a blank frame right after the current one.
    pub fn new_frame(&mut self) -> usize {
        let size = self.current_frame().size();
        self.add_frame(self.current_frame + 1, Frame::new(size))
    }

    /// Copy a frame (layers, names, pixels) right after itself. Layer ids
    /// are kept: they only need to be unique within a frame.
    pub fn duplicate_frame(&mut self, index: usize) -> Option<usize> {
        let mut copy = self.frames.get(index)?.clone();
        copy.id = self.unique_frame_id();
        for layer in copy.layers_mut() {
            layer.preview_stale = true;
        }
        Some(self.add_frame(index + 1, copy))
    }

    /// Remove a frame. The last remaining frame can never be removed.
    pub fn remove_frame(&mut self, index: usize) -> Option<Frame> {
        if self.frames.len() <= 1 {
            warn!("refusing to delete the only frame of the reel");
            return None;
        }
        if index >= self.frames.len() {
            return None;
        }
        let removed = self.frames.remove(index);
        if self.current_frame > index || self.current_frame >= self.frames.len() {
            self.current_frame = self.current_frame.saturating_sub(1);
        }
        Some(removed)
    }

    /// Move a frame to an absolute position; the cursor follows the frame
    /// it was on.
    pub fn move_frame(&mut self, from: usize, to: usize) -> bool {
        if from >= self.frames.len() || to >= self.frames.len() {
            return false;
        }
        let current_id = self.current_frame().id;
        let frame = self.frames.remove(from);
        self.frames.insert(to, frame);
        self.current_frame = self.find_frame(current_id).unwrap_or(0);
        true
    }

    // ---- playback -----------------------------------------------------------

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn play(&mut self) {
        self.playing = self.frames.len() > 1;
        self.elapsed_ms = 0;
    }

    pub fn stop(&mut self) {
        self.playing = false;
        self.elapsed_ms = 0;
    }

    /// Advance playback by `delta_ms`. Returns `true` when the current frame
    /// changed. Without looping, playback stops on the last frame.
    pub fn advance(&mut self, delta_ms: u32) -> bool {
        if !self.playing || self.frame_time_ms == 0 {
            return false;
        }
        self.elapsed_ms += delta_ms;
        let start = self.current_frame;
        while self.playing && self.elapsed_ms >= self.frame_time_ms {
            self.elapsed_ms -= self.frame_time_ms;
            if self.current_frame + 1 < self.frames.len() {
                self.current_frame += 1;
            } else if self.loop_playback {
                self.current_frame = 0;
            } else {
                self.stop();
            }
        }
        let changed = self.current_frame != start;
        if changed {
            debug!(frame = self.current_frame, "playback advanced");
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reel_with(n: usize) -> AnimationReel {
        let mut reel = AnimationReel::new(Size::new(4, 4), 100, true);
        for _ in 1..n {
            reel.new_frame();
        }
        reel.select_frame(0);
        reel
    }

    #[test]
    fn last_frame_cannot_be_removed() {
        let mut reel = reel_with(1);
        assert!(reel.remove_frame(0).is_none());
        assert_eq!(reel.frame_count(), 1);
    }

    #[test]
    fn looping_playback_wraps() {
        let mut reel = reel_with(3);
        reel.play();
        assert!(reel.advance(250));
        assert_eq!(reel.current_frame_index(), 2);
        assert!(reel.advance(100));
        assert_eq!(reel.current_frame_index(), 0);
    }

    #[test]
    fn non_looping_playback_stops_on_last_frame() {
        let mut reel = reel_with(2);
        reel.loop_playback = false;
        reel.play();
        reel.advance(500);
        assert_eq!(reel.current_frame_index(), 1);
        assert!(!reel.is_playing());
    }

    #[test]
    fn duplicate_and_move_keep_cursor_on_frame() {
        let mut reel = reel_with(2);
        let first = reel.frame(0).unwrap().id;
        let idx = reel.duplicate_frame(0).unwrap();
        assert_eq!(idx, 1);
        assert_ne!(reel.frame(1).unwrap().id, first);
        reel.select_frame(0);
        reel.move_frame(0, 2);
        assert_eq!(reel.current_frame().id, first);
        assert_eq!(reel.current_frame_index(), 2);
    }
}
