//! Sculpting
//!
//! The brush (a list of SDF primitives rasterized into a mask) and the
//! sculpture volume it is stamped into, with its file format and save
//! state machine.

pub mod brush;
pub mod sculpture;
pub mod shapes;
pub mod volume_file;

pub use brush::{BrushEditor, BrushParams, SculptMode};
pub use sculpture::{PromptAnswer, SaveRequest, SaveState, Sculpture, UnsavedPrompt};
pub use shapes::{Alteration, Operation, ShapeBuilder, ShapeKind, ShapeRecord};
pub use volume_file::VolumeData;
