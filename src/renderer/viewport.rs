use std::path::Path;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::camera::CameraUniform;
use crate::config::SculptConfig;
use crate::error::EngineResult;
use crate::gpu::{Buffer, DrawCall, GpuBackend, Mesh, RenderTexture, Shader, ShaderStage, Texture3D};
use crate::hot_reload::ShaderManager;
use crate::memory::{GpuObjects, Handle};

/// Uniform of the ray-march fragment shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ViewParams {
    pub volume_size: u32,
    pub max_steps: u32,
    pub _padding: [u32; 2],
    pub bounds_min: [f32; 4],
    pub bounds_max: [f32; 4],
}

const CLEAR_COLOUR: [f32; 4] = [0.12, 0.12, 0.14, 1.0];

/// Interactive view
///
/// Rasterizes the back faces of the volume's bounding cube and ray-marches
/// the distance field from each fragment. Only redraws when something
/// marked it dirty. The target, the proxy cube and both uniforms live in
/// `GpuObjects`; the camera and view uniforms are shared with the brush
/// and the ray tracer through their handles.
pub struct Viewport {
    target: Handle<RenderTexture>,
    cube: Handle<Mesh>,
    camera: Handle<Buffer>,
    view: Handle<Buffer>,
    params: ViewParams,
    size: [u32; 2],
    vertex_shader: Handle<Shader>,
    fragment_shader: Handle<Shader>,
    needs_redraw: bool,
}

impl Viewport {
    pub fn new(
        gpu: &dyn GpuBackend,
        shaders: &mut ShaderManager,
        objects: &mut GpuObjects,
        config: &SculptConfig,
    ) -> EngineResult<Self> {
        let vertex_shader = shaders.require(gpu, "raymarch", ShaderStage::Vertex)?;
        let fragment_shader = shaders.require(gpu, "raymarch", ShaderStage::Fragment)?;

        let volume = &config.volume;
        let (min, max) = (Vec3::from(volume.bounds_min), Vec3::from(volume.bounds_max));
        let params = ViewParams {
            volume_size: volume.size,
            max_steps: config.raytrace.max_steps,
            _padding: [0; 2],
            bounds_min: min.extend(0.0).to_array(),
            bounds_max: max.extend(0.0).to_array(),
        };

        let display = &config.display;
        let target = RenderTexture::new(gpu, "viewport", display.width, display.height)?;
        let size = target.size();
        let target = objects.insert(gpu, target)?;
        let cube = objects.insert(gpu, Mesh::cube(gpu, "volume bounds", min, max)?)?;
        let camera = objects.insert(gpu, Buffer::constant(gpu, "camera", &CameraUniform::zeroed())?)?;
        let view = objects.insert(gpu, Buffer::constant(gpu, "view params", &params)?)?;

        Ok(Self {
            target,
            cube,
            camera,
            view,
            params,
            size,
            vertex_shader,
            fragment_shader,
            needs_redraw: true,
        })
    }

    /// Camera uniform shared with the brush and the ray tracer
    pub fn camera_buffer(&self) -> Handle<Buffer> {
        self.camera
    }

    /// Upload the camera. The cursor lives in the same uniform, so this
    /// runs every frame; callers flag a redraw when the view itself moved.
    pub fn update_camera(
        &self,
        gpu: &dyn GpuBackend,
        objects: &GpuObjects,
        camera: &CameraUniform,
    ) -> EngineResult<()> {
        objects.get(self.camera)?.update(gpu, camera)
    }

    /// Volume bounds and march settings
    pub fn view_buffer(&self) -> Handle<Buffer> {
        self.view
    }

    pub fn view_params(&self) -> &ViewParams {
        &self.params
    }

    /// Change the march step limit. Returns true when the uniform was
    /// uploaded again.
    pub fn set_max_steps(
        &mut self,
        gpu: &dyn GpuBackend,
        objects: &GpuObjects,
        max_steps: u32,
    ) -> EngineResult<bool> {
        if self.params.max_steps == max_steps {
            return Ok(false);
        }
        self.params.max_steps = max_steps;
        objects.get(self.view)?.update(gpu, &self.params)?;
        self.needs_redraw = true;
        Ok(true)
    }

    pub fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    pub fn target(&self) -> Handle<RenderTexture> {
        self.target
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    /// Follow the window size. Returns true when the target was replaced.
    pub fn resize(
        &mut self,
        gpu: &dyn GpuBackend,
        objects: &mut GpuObjects,
        width: u32,
        height: u32,
    ) -> EngineResult<bool> {
        if width == 0 || height == 0 {
            return Ok(false);
        }
        let target = objects.get_mut(self.target)?;
        let resized = target.resize(gpu, width, height)?;
        if resized {
            self.size = target.size();
            log::debug!("[Viewport] Resized to {}x{}", width, height);
            self.needs_redraw = true;
        }
        Ok(resized)
    }

    pub fn draw(
        &mut self,
        gpu: &dyn GpuBackend,
        shaders: &ShaderManager,
        objects: &GpuObjects,
        volume: Handle<Texture3D>,
    ) -> EngineResult<()> {
        let cube = objects.get(self.cube)?;
        let bindings = [
            objects.get(self.camera)?.binding(0)?,
            objects.get(volume)?.binding(1)?,
            objects.get(self.view)?.binding(2)?,
        ];
        gpu.draw(&DrawCall {
            label: "viewport",
            vertex: shaders.native(self.vertex_shader)?,
            fragment: shaders.native(self.fragment_shader)?,
            bindings: &bindings,
            target: objects.get(self.target)?.native()?,
            vertex_input: Some(cube.vertex_input()?),
            vertex_count: cube.vertex_count(),
            clear_color: CLEAR_COLOUR,
        })?;
        self.needs_redraw = false;
        Ok(())
    }

    /// Synchronous readback of the last drawn frame into a PNG
    pub fn screenshot(&self, gpu: &dyn GpuBackend, objects: &GpuObjects, path: &Path) -> EngineResult<()> {
        objects.get(self.target)?.save_png(gpu, path)
    }

    pub fn cleanup(&mut self, gpu: &dyn GpuBackend, objects: &mut GpuObjects) {
        objects.remove(gpu, self.target);
        objects.remove(gpu, self.cube);
        objects.remove(gpu, self.camera);
        objects.remove(gpu, self.view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCommand, RecordingBackend, TextureFormat};
    use crate::hot_reload::{HotReloadConfig, ManualSource};

    struct Scene {
        dir: tempfile::TempDir,
        gpu: RecordingBackend,
        shaders: ShaderManager,
        objects: GpuObjects,
        config: SculptConfig,
    }

    impl Scene {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("raymarch.vert.wgsl"), "fn main() {}\n").unwrap();
            std::fs::write(dir.path().join("raymarch.frag.wgsl"), "fn main() {}\n").unwrap();
            let hot_reload = HotReloadConfig {
                shader_dir: dir.path().to_path_buf(),
                ..Default::default()
            };

            let mut config = SculptConfig::default();
            config.display.width = 64;
            config.display.height = 32;

            Self {
                dir,
                gpu: RecordingBackend::new(),
                shaders: ShaderManager::with_source(&hot_reload, Box::new(ManualSource::new())),
                objects: GpuObjects::new(),
                config,
            }
        }

        fn viewport(&mut self) -> Viewport {
            Viewport::new(&self.gpu, &mut self.shaders, &mut self.objects, &self.config).unwrap()
        }
    }

    impl Drop for Scene {
        fn drop(&mut self) {
            self.objects.cleanup(&self.gpu);
            self.shaders.cleanup(&self.gpu);
        }
    }

    #[test]
    fn test_draw_uses_both_stages_and_clears_flag() {
        let mut scene = Scene::new();
        let mut viewport = scene.viewport();
        let volume = Texture3D::new(&scene.gpu, "volume", [4; 3], TextureFormat::R32Float).unwrap();
        let volume = scene.objects.insert(&scene.gpu, volume).unwrap();
        assert!(viewport.needs_redraw());

        viewport.draw(&scene.gpu, &scene.shaders, &scene.objects, volume).unwrap();
        assert!(!viewport.needs_redraw());

        let draws: Vec<u32> = scene
            .gpu
            .commands()
            .into_iter()
            .filter_map(|command| match command {
                GpuCommand::Draw { vertex_count, .. } => Some(vertex_count),
                _ => None,
            })
            .collect();
        assert_eq!(draws, vec![36]);

        assert!(!viewport.resize(&scene.gpu, &mut scene.objects, 64, 32).unwrap());
        assert!(!viewport.needs_redraw());
        assert!(viewport.resize(&scene.gpu, &mut scene.objects, 128, 64).unwrap());
        assert!(viewport.needs_redraw());
        assert_eq!(viewport.size(), [128, 64]);

        let shot = scene.dir.path().join("shot.png");
        viewport.screenshot(&scene.gpu, &scene.objects, &shot).unwrap();
        assert!(shot.exists());

        viewport.cleanup(&scene.gpu, &mut scene.objects);
        scene.objects.remove(&scene.gpu, volume);
        assert!(scene.objects.is_empty());
        assert_eq!(scene.gpu.live_objects().0, 0);
        assert_eq!(scene.gpu.live_objects().1, 0);
    }

    #[test]
    fn test_max_steps_change_uploads_view_params() {
        let mut scene = Scene::new();
        let mut viewport = scene.viewport();
        let volume = Texture3D::new(&scene.gpu, "volume", [4; 3], TextureFormat::R32Float).unwrap();
        let volume = scene.objects.insert(&scene.gpu, volume).unwrap();
        viewport.draw(&scene.gpu, &scene.shaders, &scene.objects, volume).unwrap();

        assert!(!viewport
            .set_max_steps(&scene.gpu, &scene.objects, scene.config.raytrace.max_steps)
            .unwrap());
        assert!(!viewport.needs_redraw());

        assert!(viewport.set_max_steps(&scene.gpu, &scene.objects, 32).unwrap());
        assert!(viewport.needs_redraw());
        let uploaded: Vec<ViewParams> = scene
            .objects
            .get(viewport.view_buffer())
            .unwrap()
            .read(&scene.gpu)
            .unwrap();
        assert_eq!(uploaded[0].max_steps, 32);
        assert_eq!(uploaded[0].volume_size, scene.config.volume.size);
    }
}
