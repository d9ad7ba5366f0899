use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

use crate::canvas::Canvas;
use crate::io::{self, FormatError};
use crate::settings::CanvasContext;

/// Single open document.
pub struct Project {
    pub id: Uuid,
    pub canvas: Canvas,
    /// `None` for unsaved/untitled files.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    /// Display name (derived from path or "Untitled-X")
    pub name: String,

    /// History cursor at the last save.
    saved_at: isize,
}

impl Project {
    pub fn new_untitled(untitled_counter: usize, ctx: CanvasContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            canvas: Canvas::new(ctx),
            path: None,
            is_dirty: false,
            name: format!("Untitled-{}", untitled_counter),
            saved_at: -1,
        }
    }

    /// Open a project file.
    pub fn open(path: &Path, ctx: CanvasContext) -> Result<Self, FormatError> {
        let reel = io::load_project(path)?;
        let mut project = Self {
            id: Uuid::new_v4(),
            canvas: Canvas::from_reel(ctx, reel),
            path: Some(path.to_path_buf()),
            is_dirty: false,
            name: String::new(),
            saved_at: -1,
        };
        project.update_name_from_path();
        Ok(project)
    }

    /// Save to the current path. Untitled projects need [`Project::save_as`].
    pub fn save(&mut self) -> Result<bool, FormatError> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        self.canvas.end_move_selection();
        io::save_project(self.canvas.reel(), &path)?;
        self.mark_clean();
        info!(project = %self.name, "saved");
        Ok(true)
    }

    pub fn save_as(&mut self, path: PathBuf) -> Result<(), FormatError> {
        self.path = Some(path);
        self.update_name_from_path();
        self.save().map(|_| ())
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
        self.saved_at = self.canvas.history.last_action_index();
    }

    /// Recompute the dirty flag from the history cursor, so undoing back to
    /// the saved state reads as clean again.
    pub fn refresh_dirty(&mut self) {
        self.is_dirty = self.canvas.history.last_action_index() != self.saved_at;
    }

    pub fn update_name_from_path(&mut self) {
        if let Some(ref path) = self.path {
            self.name = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
        }
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::canvas_ops;

    #[test]
    fn dirty_flag_follows_history_cursor() {
        let mut p = Project::new_untitled(1, CanvasContext::default());
        assert_eq!(p.display_title(), "Untitled-1");
        canvas_ops::add_layer(&mut p.canvas, true);
        p.refresh_dirty();
        assert_eq!(p.display_title(), "Untitled-1*");
        p.canvas.undo();
        p.refresh_dirty();
        assert!(!p.is_dirty);
    }

    #[test]
    fn save_as_then_open() {
        let dir = std::env::temp_dir().join(format!("pixelreel-project-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("demo.pxr");

        let mut p = Project::new_untitled(2, CanvasContext::default());
        assert!(!p.save().unwrap());
        canvas_ops::add_frame(&mut p.canvas, true);
        p.save_as(path.clone()).unwrap();
        assert_eq!(p.name, "demo.pxr");
        assert!(!p.is_dirty);

        let opened = Project::open(&path, CanvasContext::default()).unwrap();
        assert_eq!(opened.canvas.reel().frame_count(), 2);
        assert_eq!(opened.display_title(), "demo.pxr");
        std::fs::remove_dir_all(&dir).ok();
    }
}
