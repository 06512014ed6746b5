use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::shapes::ShapeBuilder;
use crate::config::VolumeConfig;
use crate::error::EngineResult;
use crate::gpu::constants::{sculpt_mode, BRUSH_MASK_SIZE};
use crate::gpu::{Binding, Buffer, GpuBackend, Shader, ShaderStage, Texture3D};
use crate::hot_reload::ShaderManager;
use crate::memory::{GpuResource, Handle};

/// Bind slots shared by the sculpt kernel
pub mod slots {
    pub const PARAMS: u32 = 0;
    pub const VOLUME: u32 = 1;
    pub const SHAPES: u32 = 2;
    pub const MASK: u32 = 3;
    pub const POSITION: u32 = 4;
}

/// What a brush stroke does to the volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SculptMode {
    #[default]
    Add,
    Remove,
}

impl SculptMode {
    pub fn tag(&self) -> u32 {
        match self {
            SculptMode::Add => sculpt_mode::ADD,
            SculptMode::Remove => sculpt_mode::REMOVE,
        }
    }
}

/// Uniform read by the brush fill, brush find and sculpt kernels
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BrushParams {
    pub shape_count: u32,
    pub mask_size: u32,
    pub volume_size: u32,
    pub mode: u32,
    pub strength: f32,
    pub _padding: [u32; 3],
    pub bounds_min: [f32; 4],
    pub bounds_max: [f32; 4],
}

/// Brush editor
///
/// Rasterizes the shape list into a cubic distance mask centred on the
/// brush origin (`fill`) and locates the surface point under the cursor
/// (`find`). The sculpt kernel stamps the mask into the volume at that
/// point.
pub struct BrushEditor {
    shapes: ShapeBuilder,
    params: BrushParams,
    params_buffer: Buffer,
    mask: Buffer,
    /// xyz voxel position of the hit, w is 1 on a hit
    position: Buffer,
    fill_shader: Handle<Shader>,
    find_shader: Handle<Shader>,
}

impl BrushEditor {
    pub fn new(
        gpu: &dyn GpuBackend,
        shaders: &mut ShaderManager,
        volume: &VolumeConfig,
    ) -> EngineResult<Self> {
        let fill_shader = shaders.require(gpu, "brush_fill", ShaderStage::Compute)?;
        let find_shader = shaders.require(gpu, "brush_find", ShaderStage::Compute)?;

        let params = BrushParams {
            shape_count: 0,
            mask_size: BRUSH_MASK_SIZE,
            volume_size: volume.size,
            mode: SculptMode::Add.tag(),
            strength: 1.0,
            _padding: [0; 3],
            bounds_min: Vec3::from(volume.bounds_min).extend(0.0).to_array(),
            bounds_max: Vec3::from(volume.bounds_max).extend(0.0).to_array(),
        };

        let mask_voxels = (BRUSH_MASK_SIZE as u64).pow(3);
        Ok(Self {
            shapes: ShapeBuilder::new(),
            params,
            params_buffer: Buffer::constant(gpu, "brush params", &params)?,
            mask: Buffer::structured::<f32>(gpu, "brush mask", mask_voxels)?,
            position: Buffer::structured::<[f32; 4]>(gpu, "brush position", 1)?,
            fill_shader,
            find_shader,
        })
    }

    pub fn shapes(&self) -> &ShapeBuilder {
        &self.shapes
    }

    pub fn shapes_mut(&mut self) -> &mut ShapeBuilder {
        &mut self.shapes
    }

    /// The mask no longer matches the shape list
    pub fn needs_fill(&self) -> bool {
        self.shapes.is_dirty()
    }

    pub fn params(&self) -> &BrushParams {
        &self.params
    }

    pub fn set_strength(&mut self, strength: f32) {
        self.params.strength = strength.clamp(0.0, 1.0);
    }

    fn upload_params(&mut self, gpu: &dyn GpuBackend) -> EngineResult<()> {
        self.params.shape_count = self.shapes.len() as u32;
        self.params_buffer.update(gpu, &self.params)
    }

    /// Rasterize the shapes into the brush mask
    pub fn fill(&mut self, gpu: &dyn GpuBackend, shaders: &ShaderManager) -> EngineResult<()> {
        let shapes = self.shapes.bind(gpu, 1)?;
        self.upload_params(gpu)?;

        let bindings = [self.params_buffer.binding(0)?, shapes, self.mask.binding(2)?];
        shaders.dispatch(self.fill_shader, gpu, &bindings, [BRUSH_MASK_SIZE; 3])
    }

    /// March the ray under the cursor through `volume` and store the hit
    pub fn find(
        &mut self,
        gpu: &dyn GpuBackend,
        shaders: &ShaderManager,
        volume: &Texture3D,
        camera: &Buffer,
    ) -> EngineResult<()> {
        self.upload_params(gpu)?;

        let bindings = [
            self.params_buffer.binding(0)?,
            camera.binding(1)?,
            volume.binding(2)?,
            self.position.binding(3)?,
        ];
        shaders.dispatch(self.find_shader, gpu, &bindings, [1, 1, 1])
    }

    /// Read back the last `find` result; `None` when the ray missed.
    /// Blocks on the device.
    pub fn hit_position(&self, gpu: &dyn GpuBackend) -> EngineResult<Option<Vec3>> {
        let position: Vec<[f32; 4]> = self.position.read(gpu)?;
        Ok(position
            .first()
            .filter(|p| p[3] > 0.5)
            .map(|p| Vec3::new(p[0], p[1], p[2])))
    }

    /// Everything the sculpt kernel reads from the brush, in its slots.
    /// The caller adds the volume at `slots::VOLUME`.
    pub fn sculpt_bindings(&mut self, gpu: &dyn GpuBackend, mode: SculptMode) -> EngineResult<[Binding; 4]> {
        self.params.mode = mode.tag();
        let shapes = self.shapes.bind(gpu, slots::SHAPES)?;
        self.upload_params(gpu)?;

        Ok([
            self.params_buffer.binding(slots::PARAMS)?,
            shapes,
            self.mask.read_binding(slots::MASK)?,
            self.position.read_binding(slots::POSITION)?,
        ])
    }

    pub fn cleanup(&mut self, gpu: &dyn GpuBackend) {
        self.shapes.cleanup(gpu);
        self.params_buffer.cleanup(gpu);
        self.mask.cleanup(gpu);
        self.position.cleanup(gpu);
    }
}
