//! Drag-and-drop resolution

pub mod engine;
pub mod targets;

pub use engine::{DragEngine, DragOutcome, DragPhase};
pub use targets::{classify, resolve_drop_target, DropTarget};
