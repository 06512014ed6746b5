//! GPU object layer
//!
//! The `GpuBackend` seam and the move-only wrappers built on it. Wrappers
//! own their native ids and release them through `GpuResource::cleanup`;
//! nothing here frees GPU memory on `Drop`.

pub mod backend;
pub mod buffer;
pub mod constants;
pub mod mesh;
pub mod preprocessor;
pub mod recording;
pub mod shader;
pub mod texture;
pub mod wgpu_backend;

pub use backend::{
    Binding, BindingResource, BufferDesc, BufferUsage, ComputeDispatch, DrawCall, GpuBackend,
    NativeBuffer, NativeShader, NativeTexture, ShaderStage, StorageAccess, TextureDesc,
    TextureDimension, TextureFormat, VertexInput,
};
pub use buffer::{Buffer, BufferKind};
pub use constants::generate_wgsl_constants;
pub use mesh::Mesh;
pub use preprocessor::WgslPreprocessor;
pub use recording::{GpuCommand, RecordingBackend};
pub use shader::{group_count, parse_workgroup_size, Shader};
pub use texture::{RenderTexture, Texture2D, Texture3D};
pub use wgpu_backend::WgpuBackend;
