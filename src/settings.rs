// ============================================================================
// ENGINE SETTINGS: key=value config file, passed down in a context object
// ============================================================================

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::pixels::{Color, Size};

/// Tunables for one editing session.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    /// Undo entries kept before the oldest is evicted.
    pub max_history: usize,
    /// Edge length of a render tile in pixels.
    pub tile_size: i32,
    pub default_size: Size,
    pub frame_time_ms: u32,
    pub loop_playback: bool,
    /// Flatten dirty tiles on the rayon pool.
    pub parallel_tiles: bool,
    /// Overlay drawn over selected pixels; `None` disables the overlay.
    pub selection_tint: Option<Color>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_history: 100,
            tile_size: 32,
            default_size: Size::new(64, 64),
            frame_time_ms: 100,
            loop_playback: true,
            parallel_tiles: true,
            selection_tint: Some(Color::new(0.2, 0.5, 1.0, 0.35)),
        }
    }
}

impl EngineSettings {
    /// Default location: `<data dir>/PixelReel/settings.cfg`.
    pub fn default_path() -> PathBuf {
        crate::logger::data_dir().join("PixelReel").join("settings.cfg")
    }

    /// Load from disk; missing or unreadable files give the defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                debug!(path = %path.display(), "loading settings");
                Self::parse(&content)
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no settings file, using defaults");
                Self::default()
            }
        }
    }

    /// Parse `key = value` lines. Blank lines and `#` comments are skipped;
    /// unknown keys and malformed values are logged and ignored.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for (n, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else {
                warn!(line = n + 1, "settings: expected key=value");
                continue;
            };
            let key = key.trim();
            let val = val.trim();
            let ok = match key {
                "max_history" => set_parsed(&mut s.max_history, val, |v| *v > 0),
                "tile_size" => set_parsed(&mut s.tile_size, val, |v| (1..=1024).contains(v)),
                "default_size" => match parse_size(val) {
                    Some(size) => {
                        s.default_size = size;
                        true
                    }
                    None => false,
                },
                "frame_time_ms" => set_parsed(&mut s.frame_time_ms, val, |v| *v > 0),
                "loop_playback" => set_parsed(&mut s.loop_playback, val, |_| true),
                "parallel_tiles" => set_parsed(&mut s.parallel_tiles, val, |_| true),
                "selection_tint" => {
                    if val == "none" {
                        s.selection_tint = None;
                        true
                    } else if let Some(c) = parse_color(val) {
                        s.selection_tint = Some(c);
                        true
                    } else {
                        false
                    }
                }
                _ => {
                    warn!(key, "settings: unknown key ignored");
                    continue;
                }
            };
            if !ok {
                warn!(key, value = val, "settings: bad value ignored");
            }
        }
        s
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, val: &str, valid: impl Fn(&T) -> bool) -> bool {
    match val.parse::<T>() {
        Ok(v) if valid(&v) => {
            *slot = v;
            true
        }
        _ => false,
    }
}

/// `WxH`, both positive.
pub fn parse_size(val: &str) -> Option<Size> {
    let (w, h) = val.split_once(['x', 'X'])?;
    let w = w.trim().parse::<i32>().ok()?;
    let h = h.trim().parse::<i32>().ok()?;
    (w > 0 && h > 0).then_some(Size::new(w, h))
}

/// `r,g,b,a` with 8-bit components.
fn parse_color(val: &str) -> Option<Color> {
    let parts: Vec<&str> = val.split(',').collect();
    if parts.len() != 4 {
        return None;
    }
    let r = parts[0].trim().parse::<u8>().ok()?;
    let g = parts[1].trim().parse::<u8>().ok()?;
    let b = parts[2].trim().parse::<u8>().ok()?;
    let a = parts[3].trim().parse::<u8>().ok()?;
    Some(Color::from_rgba8(image::Rgba([r, g, b, a])))
}

/// Everything the engine needs from its surroundings, handed down
/// explicitly instead of living in globals.
#[derive(Clone, Debug, Default)]
pub struct CanvasContext {
    pub settings: EngineSettings,
}

impl CanvasContext {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_overrides_known_keys() {
        let s = EngineSettings::parse(
            "# engine\nmax_history = 20\ntile_size=16\ndefault_size=8x8\nloop_playback=false\nselection_tint=none\n",
        );
        assert_eq!(s.max_history, 20);
        assert_eq!(s.tile_size, 16);
        assert_eq!(s.default_size, Size::new(8, 8));
        assert!(!s.loop_playback);
        assert_eq!(s.selection_tint, None);
        assert!(s.parallel_tiles);
    }

    #[test]
    fn bad_values_and_unknown_keys_keep_defaults() {
        let s = EngineSettings::parse("tile_size=0\nmax_history=lots\ncolour=blue\nnot a pair\n");
        assert_eq!(s, EngineSettings::default());
    }

    #[test]
    fn size_parser_rejects_non_positive() {
        assert_eq!(parse_size("32x16"), Some(Size::new(32, 16)));
        assert_eq!(parse_size("0x16"), None);
        assert_eq!(parse_size("32"), None);
    }
}
