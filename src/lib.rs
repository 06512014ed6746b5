//! voxel-sculpt
//!
//! Interactive sculpting of a signed distance volume on the GPU. The crate
//! is the engine core: handle registries over move-only GPU objects,
//! hot-reloading shaders, the brush and sculpture editors, and progressive
//! ray tracing. Windowing stays outside; `SculptApp::frame` takes the
//! input of one frame and drives everything else.

pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod gpu;
pub mod hot_reload;
pub mod memory;
pub mod raytrace;
pub mod renderer;
pub mod sculpt;
pub mod task;
pub mod ui;

pub use app::{FrameInput, SculptApp, SessionScript};
pub use config::SculptConfig;
pub use error::{EngineError, EngineResult};
pub use gpu::{GpuBackend, RecordingBackend, WgpuBackend};
pub use memory::{GpuObjects, Handle, Registry};
pub use sculpt::{PromptAnswer, SaveState, SculptMode, UnsavedPrompt};
