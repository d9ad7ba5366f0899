//! Frame-by-frame pixel-art animation engine: layered frames, a tiled dirty
//! renderer, selections, undo history and a binary project format.

pub mod canvas;
pub mod chunks;
pub mod cli;
pub mod dirty;
pub mod frame;
pub mod history;
pub mod io;
pub mod layer;
pub mod logger;
pub mod ops;
pub mod pixels;
pub mod project;
pub mod reel;
pub mod selection;
pub mod settings;

pub use canvas::{BrushShape, Canvas, CanvasState, Notification, WriteMode};
pub use frame::Frame;
pub use history::{History, HistoryAction};
pub use layer::Layer;
pub use pixels::{Color, PixelBuffer, Point, Rect, Size};
pub use reel::AnimationReel;
pub use settings::{CanvasContext, EngineSettings};
