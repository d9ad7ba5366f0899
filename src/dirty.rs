//! Generation-stamped dirty flags.
//!
//! A cell is dirty when its stamp equals the tracker's current stamp (or the
//! whole grid is flagged). Clearing bumps the stamp instead of touching every
//! cell, so a clear costs nothing no matter how large the grid is. Only when
//! the stamp wraps is the grid physically zeroed.

#[derive(Clone, Debug)]
pub struct DirtyTracker {
    cols: usize,
    rows: usize,
    stamps: Vec<u32>,
    current_stamp: u32,
    all_dirty: bool,
    /// Cells stamped with `current_stamp`.
    marked: usize,
}

impl DirtyTracker {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            stamps: vec![0; cols * rows],
            current_stamp: 1,
            all_dirty: false,
            marked: 0,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn mark(&mut self, col: usize, row: usize) {
        if col >= self.cols || row >= self.rows {
            return;
        }
        let idx = row * self.cols + col;
        if self.stamps[idx] != self.current_stamp {
            self.stamps[idx] = self.current_stamp;
            self.marked += 1;
        }
    }

    pub fn mark_all(&mut self) {
        self.all_dirty = true;
    }

    pub fn is_dirty(&self, col: usize, row: usize) -> bool {
        if col >= self.cols || row >= self.rows {
            return false;
        }
        self.all_dirty || self.stamps[row * self.cols + col] == self.current_stamp
    }

    /// True when at least one cell needs work.
    pub fn any_dirty(&self) -> bool {
        (self.all_dirty && !self.stamps.is_empty()) || self.marked > 0
    }

    pub fn dirty_count(&self) -> usize {
        if self.all_dirty { self.stamps.len() } else { self.marked }
    }

    /// Every dirty cell as `(col, row)`, optionally clearing afterwards.
    pub fn dirty_cells(&mut self, clear: bool) -> Vec<(usize, usize)> {
        let mut cells = Vec::with_capacity(self.dirty_count());
        if self.any_dirty() {
            for row in 0..self.rows {
                for col in 0..self.cols {
                    if self.is_dirty(col, row) {
                        cells.push((col, row));
                    }
                }
            }
        }
        if clear {
            self.clear();
        }
        cells
    }

    pub fn clear(&mut self) {
        self.all_dirty = false;
        self.marked = 0;
        if self.current_stamp == u32::MAX {
            self.stamps.fill(0);
            self.current_stamp = 1;
        } else {
            self.current_stamp += 1;
        }
    }

    #[cfg(test)]
    fn force_stamp(&mut self, stamp: u32) {
        self.current_stamp = stamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_one_then_clear() {
        let mut t = DirtyTracker::new(4, 3);
        assert!(!t.any_dirty());
        t.mark(2, 1);
        t.mark(2, 1);
        assert_eq!(t.dirty_count(), 1);
        assert_eq!(t.dirty_cells(true), vec![(2, 1)]);
        assert!(!t.is_dirty(2, 1));
        assert!(!t.any_dirty());
    }

    #[test]
    fn mark_all_reports_every_cell() {
        let mut t = DirtyTracker::new(3, 2);
        t.mark_all();
        assert_eq!(t.dirty_cells(false).len(), 6);
        assert!(t.any_dirty());
        t.clear();
        assert!(t.dirty_cells(true).is_empty());
    }

    #[test]
    fn stamp_overflow_zeroes_grid() {
        let mut t = DirtyTracker::new(2, 2);
        t.force_stamp(u32::MAX);
        t.mark(0, 0);
        t.clear();
        assert!(!t.is_dirty(0, 0));
        t.mark(1, 1);
        assert_eq!(t.dirty_cells(false), vec![(1, 1)]);
    }

    #[test]
    fn out_of_range_marks_are_ignored() {
        let mut t = DirtyTracker::new(2, 2);
        t.mark(5, 0);
        assert!(!t.any_dirty());
    }
}
