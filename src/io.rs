// ============================================================================
// FRAME / LAYER RECORDS AND THE PROJECT FILE
// ============================================================================
//
// Frames and layers serialise to tagged records through serde + bincode:
// a type byte, the id, the size, then the type's own fields. A frame record
// carries its layer records bottom-first. A project file wraps every frame of
// the reel behind a magic string.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::frame::Frame;
use crate::layer::Layer;
use crate::pixels::{Color, PixelBuffer, Size};
use crate::reel::AnimationReel;

const FRAME_TAG: u8 = b'F';
const LAYER_TAG: u8 = b'L';

/// Magic header of a project file.
const PROJECT_MAGIC: &str = "PXR1";

/// Maximum supported canvas dimension in pixels (per axis).
/// Prevents memory exhaustion from crafted files.
const MAX_CANVAS_DIM: i32 = 32_768;
/// Maximum number of layers in one frame.
const MAX_LAYERS: usize = 256;
/// Maximum number of frames in a project.
const MAX_FRAMES: usize = 4096;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("colour buffer for {width}x{height} needs {expected} pixels, got {actual}")]
    ColorBufferLength {
        width: i32,
        height: i32,
        expected: usize,
        actual: usize,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] Box<bincode::ErrorKind>),
    #[error("expected record tag {expected:#04x}, found {found:#04x}")]
    UnknownTag { expected: u8, found: u8 },
    #[error("unknown magic '{0}'")]
    InvalidMagic(String),
    #[error("{0}")]
    LimitExceeded(String),
    #[error("layer {layer} is {actual:?} but its frame is {expected:?}")]
    SizeMismatch { layer: String, expected: Size, actual: Size },
    #[error("frame {frame} has more than one layer with id {layer}")]
    DuplicateLayerId { frame: u64, layer: u64 },
    #[error("frame {0} contains no layers")]
    EmptyFrame(u64),
    #[error("project contains no frames")]
    EmptyProject,
}

// ----------------------------------------------------------------------------
//  Records
// ----------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct LayerRecord {
    tag: u8,
    id: u64,
    width: i32,
    height: i32,
    name: String,
    opacity: f32,
    visible: bool,
    pixels: Vec<Color>,
}

#[derive(Serialize, Deserialize)]
struct FrameRecord {
    tag: u8,
    id: u64,
    width: i32,
    height: i32,
    current_layer: u32,
    layers: Vec<LayerRecord>,
}

#[derive(Serialize, Deserialize)]
struct ProjectFile {
    magic: String,
    frame_time_ms: u32,
    loop_playback: bool,
    current_frame: u32,
    frames: Vec<FrameRecord>,
}

fn check_size(size: Size) -> Result<(), FormatError> {
    if size.is_empty() || size.width > MAX_CANVAS_DIM || size.height > MAX_CANVAS_DIM {
        return Err(FormatError::LimitExceeded(format!(
            "canvas size {}x{} is outside 1x1..{}x{}",
            size.width, size.height, MAX_CANVAS_DIM, MAX_CANVAS_DIM
        )));
    }
    Ok(())
}

fn check_tag(expected: u8, found: u8) -> Result<(), FormatError> {
    if expected != found {
        return Err(FormatError::UnknownTag { expected, found });
    }
    Ok(())
}

impl LayerRecord {
    fn from_layer(layer: &Layer) -> Self {
        Self {
            tag: LAYER_TAG,
            id: layer.id,
            width: layer.pixels.width(),
            height: layer.pixels.height(),
            name: layer.name.clone(),
            opacity: layer.opacity,
            visible: layer.visible,
            pixels: layer.pixels.data().to_vec(),
        }
    }

    fn into_layer(self) -> Result<Layer, FormatError> {
        check_tag(LAYER_TAG, self.tag)?;
        let size = Size::new(self.width, self.height);
        check_size(size)?;
        let pixels = PixelBuffer::from_data(size, self.pixels)?;
        let mut layer = Layer::from_pixels(self.name, pixels);
        layer.id = self.id;
        layer.opacity = self.opacity.clamp(0.0, 1.0);
        layer.visible = self.visible;
        Ok(layer)
    }
}

impl FrameRecord {
    fn from_frame(frame: &Frame) -> Self {
        Self {
            tag: FRAME_TAG,
            id: frame.id,
            width: frame.size().width,
            height: frame.size().height,
            current_layer: frame.current_layer_index() as u32,
            layers: frame.layers().iter().map(LayerRecord::from_layer).collect(),
        }
    }

    fn into_frame(self) -> Result<Frame, FormatError> {
        check_tag(FRAME_TAG, self.tag)?;
        let size = Size::new(self.width, self.height);
        check_size(size)?;
        if self.layers.len() > MAX_LAYERS {
            return Err(FormatError::LimitExceeded(format!(
                "frame contains {} layers, which exceeds the maximum of {}",
                self.layers.len(),
                MAX_LAYERS
            )));
        }
        let mut layers: Vec<Layer> = Vec::with_capacity(self.layers.len());
        for record in self.layers {
            let layer = record.into_layer()?;
            if layer.size() != size {
                return Err(FormatError::SizeMismatch {
                    layer: layer.name,
                    expected: size,
                    actual: layer.pixels.size(),
                });
            }
            if layers.iter().any(|l| l.id == layer.id) {
                return Err(FormatError::DuplicateLayerId { frame: self.id, layer: layer.id });
            }
            layers.push(layer);
        }
        Frame::from_parts(self.id, size, layers, self.current_layer as usize).ok_or(FormatError::EmptyFrame(self.id))
    }
}

// ----------------------------------------------------------------------------
//  Public codec
// ----------------------------------------------------------------------------

impl Layer {
    pub fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        Ok(bincode::serialize(&LayerRecord::from_layer(self))?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Layer, FormatError> {
        bincode::deserialize::<LayerRecord>(bytes)?.into_layer()
    }
}

impl Frame {
    /// Frame record: id, size, then one block per layer (bottom first).
    pub fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        Ok(bincode::serialize(&FrameRecord::from_frame(self))?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Frame, FormatError> {
        bincode::deserialize::<FrameRecord>(bytes)?.into_frame()
    }
}

// ----------------------------------------------------------------------------
//  Project file
// ----------------------------------------------------------------------------

/// Write the whole reel to `path`.
pub fn save_project(reel: &AnimationReel, path: &Path) -> Result<(), FormatError> {
    let project = ProjectFile {
        magic: PROJECT_MAGIC.to_string(),
        frame_time_ms: reel.frame_time_ms,
        loop_playback: reel.loop_playback,
        current_frame: reel.current_frame_index() as u32,
        frames: reel.frames().iter().map(FrameRecord::from_frame).collect(),
    };
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &project)?;
    info!(path = %path.display(), frames = reel.frame_count(), "project saved");
    Ok(())
}

/// Read a project written by [`save_project`].
pub fn load_project(path: &Path) -> Result<AnimationReel, FormatError> {
    let raw = std::fs::read(path)?;
    let reel = decode_project(&raw)?;
    info!(path = %path.display(), frames = reel.frame_count(), "project loaded");
    Ok(reel)
}

pub fn decode_project(raw: &[u8]) -> Result<AnimationReel, FormatError> {
    // bincode writes a String as an 8-byte length prefix + UTF-8 data, so a
    // four-character magic sits in bytes 8..12.
    let magic = raw.get(8..12).and_then(|m| std::str::from_utf8(m).ok()).unwrap_or("");
    if magic != PROJECT_MAGIC {
        return Err(FormatError::InvalidMagic(magic.to_string()));
    }
    let project: ProjectFile = bincode::deserialize(raw)?;
    project_into_reel(project)
}

fn project_into_reel(project: ProjectFile) -> Result<AnimationReel, FormatError> {
    if project.magic != PROJECT_MAGIC {
        return Err(FormatError::InvalidMagic(project.magic));
    }
    if project.frames.len() > MAX_FRAMES {
        return Err(FormatError::LimitExceeded(format!(
            "project contains {} frames, which exceeds the maximum of {}",
            project.frames.len(),
            MAX_FRAMES
        )));
    }
    let mut frames = Vec::with_capacity(project.frames.len());
    for record in project.frames {
        frames.push(record.into_frame()?);
    }
    if let Some(first) = frames.first() {
        let size = first.size();
        if let Some(odd) = frames.iter().find(|f| f.size() != size) {
            return Err(FormatError::LimitExceeded(format!(
                "frame {} is {}x{} but the reel is {}x{}",
                odd.id,
                odd.size().width,
                odd.size().height,
                size.width,
                size.height
            )));
        }
    }
    debug!(frames = frames.len(), "project decoded");
    AnimationReel::from_frames(
        frames,
        project.current_frame as usize,
        project.frame_time_ms,
        project.loop_playback,
    )
    .ok_or(FormatError::EmptyProject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels::Point;

    #[test]
    fn frame_record_keeps_layers_and_ids() {
        let mut frame = Frame::new(Size::new(3, 2));
        frame.new_layer(1);
        frame.rename(1, "ink");
        frame.set_opacity(1, 0.25);
        frame.set_visibility(0, false);
        frame.layer_mut(1).unwrap().set_pixel(Point::new(2, 1), Color::RED);

        let bytes = frame.serialize().unwrap();
        assert_eq!(bytes[0], FRAME_TAG);
        let back = Frame::deserialize(&bytes).unwrap();
        assert_eq!(back.id, frame.id);
        assert_eq!(back.size(), frame.size());
        assert_eq!(back.layer_count(), 2);
        assert_eq!(back.layers()[1].name, "ink");
        assert_eq!(back.layers()[1].opacity, 0.25);
        assert!(!back.layers()[0].visible);
        assert_eq!(back.layers()[1].id, frame.layers()[1].id);
        assert_eq!(back.flatten_image(), frame.flatten_image());
    }

    #[test]
    fn layer_bytes_are_not_a_frame() {
        let layer = Layer::new("l", Size::new(2, 2));
        let bytes = layer.serialize().unwrap();
        assert!(Frame::deserialize(&bytes).is_err());
    }

    #[test]
    fn short_colour_buffer_is_rejected() {
        let mut record = LayerRecord::from_layer(&Layer::new("l", Size::new(2, 2)));
        record.pixels.pop();
        let bytes = bincode::serialize(&record).unwrap();
        assert!(matches!(
            Layer::deserialize(&bytes),
            Err(FormatError::ColorBufferLength { expected: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn duplicate_layer_ids_are_rejected() {
        let mut frame = Frame::new(Size::new(2, 2));
        frame.new_layer(1);
        let id = frame.layers()[0].id;
        frame.layers_mut()[1].id = id;

        let bytes = frame.serialize().unwrap();
        assert!(matches!(
            Frame::deserialize(&bytes),
            Err(FormatError::DuplicateLayerId { layer, .. }) if layer == id
        ));
    }

    #[test]
    fn oversize_frame_is_rejected() {
        let record = FrameRecord {
            tag: FRAME_TAG,
            id: 1,
            width: MAX_CANVAS_DIM + 1,
            height: 1,
            current_layer: 0,
            layers: Vec::new(),
        };
        let bytes = bincode::serialize(&record).unwrap();
        assert!(matches!(Frame::deserialize(&bytes), Err(FormatError::LimitExceeded(_))));
    }

    #[test]
    fn project_round_trip_and_bad_magic() {
        let dir = std::env::temp_dir().join(format!("pixelreel-io-{}", crate::layer::random_id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("reel.pxr");

        let mut reel = AnimationReel::new(Size::new(4, 4), 80, false);
        reel.new_frame();
        reel.current_frame_mut().current_layer_mut().set_pixel(Point::new(1, 1), Color::WHITE);
        save_project(&reel, &path).unwrap();

        let back = load_project(&path).unwrap();
        assert_eq!(back.frame_count(), 2);
        assert_eq!(back.current_frame_index(), 1);
        assert_eq!(back.frame_time_ms, 80);
        assert!(!back.loop_playback);
        assert_eq!(back.current_frame().current_layer().get_pixel(Point::new(1, 1)), Color::WHITE);

        assert!(matches!(decode_project(b"garbage bytes here"), Err(FormatError::InvalidMagic(_))));
        std::fs::remove_dir_all(&dir).ok();
    }
}
