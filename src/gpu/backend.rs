//! Thin graphics API seam
//!
//! Everything above this module talks to the device through `GpuBackend`
//! using opaque native ids. `WgpuBackend` drives a real device;
//! `RecordingBackend` keeps the data on the CPU and records the command
//! stream, which is what the tests and the `--headless` dry run use.

use crate::error::EngineResult;

/// Opaque native buffer id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeBuffer(pub u64);

/// Opaque native texture id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeTexture(pub u64);

/// Opaque native shader program id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeShader(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Small constant block, bound as a uniform
    Uniform,
    /// Structured array, bound as a storage buffer
    Storage,
    /// Per-vertex data for a mesh
    Vertex,
}

#[derive(Debug, Clone)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub size: u64,
    pub usage: BufferUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Single channel distance value, storage read/write capable
    R32Float,
    /// Display colour
    Rgba8Unorm,
}

impl TextureFormat {
    pub fn bytes_per_texel(&self) -> u32 {
        match self {
            TextureFormat::R32Float => 4,
            TextureFormat::Rgba8Unorm => 4,
        }
    }

    /// WGSL storage format name
    pub fn wgsl_name(&self) -> &'static str {
        match self {
            TextureFormat::R32Float => "r32float",
            TextureFormat::Rgba8Unorm => "rgba8unorm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D2,
    D3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: String,
    /// Width, height and depth (1 for 2D textures)
    pub size: [u32; 3],
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    /// Usable as a colour attachment
    pub render_target: bool,
}

impl TextureDesc {
    pub fn byte_size(&self) -> u64 {
        self.size[0] as u64
            * self.size[1] as u64
            * self.size[2] as u64
            * self.format.bytes_per_texel() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Compute,
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// File name suffix, `<name>.<suffix>.wgsl`
    pub fn suffix(&self) -> &'static str {
        match self {
            ShaderStage::Compute => "comp",
            ShaderStage::Vertex => "vert",
            ShaderStage::Fragment => "frag",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageAccess {
    WriteOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingResource {
    Uniform(NativeBuffer),
    Storage { buffer: NativeBuffer, read_only: bool },
    /// Sampled with `textureLoad`, no filtering
    Texture(NativeTexture),
    StorageTexture {
        texture: NativeTexture,
        access: StorageAccess,
    },
}

/// One entry of bind group 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Binding {
    pub slot: u32,
    pub resource: BindingResource,
}

impl Binding {
    pub fn new(slot: u32, resource: BindingResource) -> Self {
        Self { slot, resource }
    }

    pub fn buffer(&self) -> Option<NativeBuffer> {
        match self.resource {
            BindingResource::Uniform(buffer) => Some(buffer),
            BindingResource::Storage { buffer, .. } => Some(buffer),
            _ => None,
        }
    }

    pub fn texture(&self) -> Option<NativeTexture> {
        match self.resource {
            BindingResource::Texture(texture) => Some(texture),
            BindingResource::StorageTexture { texture, .. } => Some(texture),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComputeDispatch<'a> {
    pub label: &'a str,
    pub shader: NativeShader,
    pub bindings: &'a [Binding],
    /// Workgroup counts, not thread counts
    pub groups: [u32; 3],
}

#[derive(Debug, Clone)]
pub struct VertexInput {
    pub buffer: NativeBuffer,
    /// Bytes per vertex; attributes are consecutive `vec3<f32>`s
    pub stride: u64,
}

#[derive(Debug, Clone)]
pub struct DrawCall<'a> {
    pub label: &'a str,
    pub vertex: NativeShader,
    pub fragment: NativeShader,
    pub bindings: &'a [Binding],
    pub target: NativeTexture,
    pub vertex_input: Option<VertexInput>,
    pub vertex_count: u32,
    pub clear_color: [f32; 4],
}

/// The graphics API calls the engine core is written against
pub trait GpuBackend {
    /// Adapter or backend name for diagnostics
    fn name(&self) -> String;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> EngineResult<NativeBuffer>;
    fn write_buffer(&self, buffer: NativeBuffer, offset: u64, data: &[u8]) -> EngineResult<()>;
    /// Synchronous readback; blocks until the device is idle
    fn read_buffer(&self, buffer: NativeBuffer) -> EngineResult<Vec<u8>>;
    fn destroy_buffer(&self, buffer: NativeBuffer);

    fn create_texture(&self, desc: &TextureDesc) -> EngineResult<NativeTexture>;
    /// Replace the full contents, tightly packed rows
    fn write_texture(&self, texture: NativeTexture, data: &[u8]) -> EngineResult<()>;
    /// Synchronous readback, tightly packed rows
    fn read_texture(&self, texture: NativeTexture) -> EngineResult<Vec<u8>>;
    fn clear_texture(&self, texture: NativeTexture) -> EngineResult<()>;
    fn destroy_texture(&self, texture: NativeTexture);

    /// Compile one stage. The error carries the compiler diagnostic.
    fn compile_shader(
        &self,
        label: &str,
        stage: ShaderStage,
        source: &str,
    ) -> EngineResult<NativeShader>;
    fn destroy_shader(&self, shader: NativeShader);

    fn dispatch(&self, dispatch: &ComputeDispatch<'_>) -> EngineResult<()>;
    fn draw(&self, draw: &DrawCall<'_>) -> EngineResult<()>;
}
