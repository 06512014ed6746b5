use std::path::Path;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::accumulator::Accumulator;
use crate::config::RayTraceConfig;
use crate::error::{EngineError, EngineResult};
use crate::gpu::constants::MAX_LIGHTS;
use crate::gpu::{Buffer, GpuBackend, RenderTexture, Shader, ShaderStage, StorageAccess, Texture3D};
use crate::hot_reload::ShaderManager;
use crate::memory::{GpuObjects, GpuResource, Handle};

/// Point light as the kernel reads it
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Light {
    /// World position, w unused
    pub position: [f32; 4],
    /// Linear colour, w is the intensity
    pub colour: [f32; 4],
}

impl Light {
    pub fn new(position: Vec3, colour: Vec3, intensity: f32) -> Self {
        Self {
            position: position.extend(1.0).to_array(),
            colour: colour.extend(intensity).to_array(),
        }
    }
}

/// Key and fill light used until the user places their own
pub fn default_lights() -> Vec<Light> {
    vec![
        Light::new(Vec3::new(2.0, 3.0, 2.0), Vec3::ONE, 1.0),
        Light::new(Vec3::new(-3.0, 1.0, -1.0), Vec3::new(0.6, 0.7, 1.0), 0.4),
    ]
}

/// Ray tracing editor
///
/// Drives the progressive path tracer: one tile dispatch per frame into an
/// accumulation buffer, resolved into `output`. Anything that changes the
/// picture (camera, sculpt, shader reload) must call `reset`. The output
/// target is stored in `GpuObjects`; the scratch buffers are private.
pub struct RayTracingEditor {
    accumulator: Accumulator,
    output: Handle<RenderTexture>,
    accumulation: Buffer,
    params: Buffer,
    lights: Buffer,
    shader: Handle<Shader>,
    /// A tile was scheduled by `update` and not yet dispatched
    tile_pending: bool,
}

impl RayTracingEditor {
    pub fn new(
        gpu: &dyn GpuBackend,
        shaders: &mut ShaderManager,
        objects: &mut GpuObjects,
        config: &RayTraceConfig,
        size: [u32; 2],
    ) -> EngineResult<Self> {
        let shader = shaders.require(gpu, "raytrace", ShaderStage::Compute)?;

        let mut accumulator = Accumulator::new(config, 0);
        accumulator.resize(size[0], size[1]);

        let output = RenderTexture::new(gpu, "raytrace output", size[0], size[1])?;
        let editor = Self {
            output: objects.insert(gpu, output)?,
            accumulation: Self::accumulation_buffer(gpu, size)?,
            params: Buffer::constant(gpu, "raytrace params", accumulator.data())?,
            lights: Buffer::structured::<Light>(gpu, "raytrace lights", MAX_LIGHTS as u64)?,
            accumulator,
            shader,
            tile_pending: false,
        };
        Ok(editor)
    }

    fn accumulation_buffer(gpu: &dyn GpuBackend, size: [u32; 2]) -> EngineResult<Buffer> {
        let pixels = size[0] as u64 * size[1] as u64;
        Buffer::structured::<[f32; 4]>(gpu, "raytrace accumulation", pixels)
    }

    /// Replace the light list; at most `MAX_LIGHTS` are used
    pub fn set_lights(&mut self, gpu: &dyn GpuBackend, lights: &[Light]) -> EngineResult<()> {
        if lights.len() > MAX_LIGHTS as usize {
            log::warn!(
                "[RayTracing] {} lights given, only {} are traced",
                lights.len(),
                MAX_LIGHTS
            );
        }
        let used = &lights[..lights.len().min(MAX_LIGHTS as usize)];
        if !used.is_empty() {
            self.lights.write_slice(gpu, used)?;
        }
        self.accumulator.set_num_lights(used.len() as u32);
        self.accumulator.reset();
        Ok(())
    }

    /// Take new trace settings from a reloaded configuration
    pub fn apply_config(&mut self, config: &RayTraceConfig) {
        if self.accumulator.set_params(config) {
            self.tile_pending = false;
            log::info!(
                "[RayTracing] {} steps, {} bounces, {}px tiles",
                config.max_steps,
                config.max_bounces,
                self.accumulator.tile_size()
            );
        }
    }

    /// Restart accumulation from the first tile
    pub fn reset(&mut self) {
        self.accumulator.reset();
    }

    pub fn set_rendering(&mut self, rendering: bool) {
        self.accumulator.set_rendering(rendering);
    }

    pub fn is_rendering(&self) -> bool {
        self.accumulator.is_rendering()
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    pub fn output(&self) -> Handle<RenderTexture> {
        self.output
    }

    /// Follow the size of the view and schedule this frame's tile. Returns
    /// whether a tile is due; hidden editors do nothing at all.
    pub fn update(
        &mut self,
        gpu: &dyn GpuBackend,
        objects: &mut GpuObjects,
        source_size: [u32; 2],
        visible: bool,
    ) -> EngineResult<bool> {
        if !visible {
            return Ok(false);
        }

        let [width, height] = source_size;
        if width > 0 && height > 0 && self.accumulator.resize(width, height) {
            objects.get_mut(self.output)?.resize(gpu, width, height)?;
            let mut accumulation = Self::accumulation_buffer(gpu, source_size)?;
            std::mem::swap(&mut self.accumulation, &mut accumulation);
            accumulation.cleanup(gpu);
            log::debug!("[RayTracing] Resized to {}x{}", width, height);
        }

        if self.accumulator.next_tile(visible).is_none() {
            self.tile_pending = false;
            return Ok(false);
        }
        self.params.update(gpu, self.accumulator.data())?;
        self.tile_pending = true;
        Ok(true)
    }

    /// Trace the tile scheduled by `update`. `view` carries the volume
    /// bounds shared with the viewport.
    pub fn step(
        &mut self,
        gpu: &dyn GpuBackend,
        shaders: &ShaderManager,
        objects: &GpuObjects,
        volume: Handle<Texture3D>,
        camera: Handle<Buffer>,
        view: Handle<Buffer>,
    ) -> EngineResult<()> {
        if !self.tile_pending {
            return Ok(());
        }
        self.tile_pending = false;

        let bindings = [
            self.params.binding(0)?,
            objects.get(camera)?.binding(1)?,
            objects.get(volume)?.binding(2)?,
            self.accumulation.binding(3)?,
            objects.get(self.output)?.storage_binding(4, StorageAccess::WriteOnly)?,
            self.lights.read_binding(5)?,
            objects.get(view)?.binding(6)?,
        ];
        let tile = self.accumulator.tile_size();
        shaders.dispatch(self.shader, gpu, &bindings, [tile, tile, 1])
    }

    /// Write the current picture as a PNG
    pub fn save_image(&self, gpu: &dyn GpuBackend, objects: &GpuObjects, path: &Path) -> EngineResult<()> {
        if self.accumulator.passes() == 0 {
            return Err(EngineError::SystemError {
                component: "ray tracing".to_string(),
                error: "no complete pass to save yet".to_string(),
            });
        }
        objects.get(self.output)?.save_png(gpu, path)
    }

    pub fn cleanup(&mut self, gpu: &dyn GpuBackend, objects: &mut GpuObjects) {
        objects.remove(gpu, self.output);
        self.accumulation.cleanup(gpu);
        self.params.cleanup(gpu);
        self.lights.cleanup(gpu);
    }
}
