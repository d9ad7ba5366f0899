//! Editing operations that write through a [`crate::canvas::Canvas`].

pub mod brush;
pub mod canvas_ops;
pub mod clipboard;
pub mod fill;
pub mod gradient;
pub mod transform;
