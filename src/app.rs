//! Sculptor application
//!
//! `SculptApp::frame` is the whole per-frame pipeline: configuration and
//! shader reload, camera, brush, sculpting, saving, the viewport and the
//! ray tracer. Input arrives as a `FrameInput` value so the loop runs the
//! same with a window or headless. The app owns `GpuObjects`, the shared
//! registries behind every long-lived texture, buffer and mesh handle.

use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};

use crate::camera::{self, transform, CameraData};
use crate::config::SculptConfig;
use crate::error::EngineResult;
use crate::gpu::GpuBackend;
use crate::hot_reload::{ConfigReloader, ShaderManager};
use crate::memory::GpuObjects;
use crate::raytrace::{default_lights, RayTracingEditor};
use crate::renderer::Viewport;
use crate::sculpt::{Alteration, BrushEditor, Operation, SaveRequest, SculptMode, Sculpture, UnsavedPrompt};
use crate::ui::{MessageQueue, ViewFlags};

/// Radius of the brush a new session starts with, in voxels
const DEFAULT_BRUSH_RADIUS: f32 = 8.0;

/// Everything the user did since the previous frame
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    /// Seconds since the previous frame
    pub dt: f32,
    /// Cursor position in viewport pixels
    pub cursor: Vec2,
    /// Mouse movement in pixels while the orbit button is held
    pub orbit: Vec2,
    /// Scroll steps, positive towards the target
    pub scroll: f32,
    /// Apply the brush at the cursor
    pub sculpt: Option<SculptMode>,
    pub resize: Option<[u32; 2]>,
    pub save: bool,
    pub save_as: Option<PathBuf>,
    pub load: Option<PathBuf>,
    pub new_sculpture: bool,
    pub screenshot: Option<PathBuf>,
    pub render_image: Option<PathBuf>,
    pub toggle_ray_tracing: bool,
}

const SCRIPT_ORBIT: Vec2 = Vec2::new(2.0, 0.0);

/// Canned input for offscreen sessions
///
/// Loads on the first frame and stamps the brush on the second. The camera
/// orbits during the first quarter of the run and then holds still; ray
/// tracing starts once it settles so its passes can complete. Captures are
/// written on the last frame.
#[derive(Debug, Clone, Default)]
pub struct SessionScript {
    pub frames: u32,
    pub load: Option<PathBuf>,
    pub screenshot: Option<PathBuf>,
    pub render: Option<PathBuf>,
}

impl SessionScript {
    /// Frames spent orbiting before the camera settles
    pub fn orbit_frames(&self) -> u32 {
        self.frames / 4
    }

    pub fn input(&self, frame: u32, dt: f32, cursor: Vec2) -> FrameInput {
        let orbiting = frame < self.orbit_frames();
        let last = frame + 1 == self.frames;
        FrameInput {
            dt,
            cursor,
            orbit: if orbiting { SCRIPT_ORBIT } else { Vec2::ZERO },
            load: if frame == 0 { self.load.clone() } else { None },
            sculpt: (frame == 1).then_some(SculptMode::Add),
            toggle_ray_tracing: self.render.is_some() && frame == self.orbit_frames(),
            screenshot: if last { self.screenshot.clone() } else { None },
            render_image: if last { self.render.clone() } else { None },
            ..Default::default()
        }
    }
}

pub struct SculptApp {
    config: SculptConfig,
    config_reloader: Option<ConfigReloader>,
    shaders: ShaderManager,
    objects: GpuObjects,
    camera: CameraData,
    viewport: Viewport,
    brush: BrushEditor,
    sculpture: Sculpture,
    ray_tracing: RayTracingEditor,
    views: ViewFlags,
    messages: MessageQueue,
    frame_count: u64,
}

impl SculptApp {
    /// Build every component. `config_path` is watched for edits when hot
    /// reload is on.
    pub fn new(
        gpu: &dyn GpuBackend,
        config: SculptConfig,
        config_path: Option<&Path>,
    ) -> EngineResult<Self> {
        config.validate()?;
        log::info!("[SculptApp] Starting on {}", gpu.name());

        let hot_reload = config.hot_reload();
        let mut shaders = ShaderManager::new(&hot_reload);
        let mut objects = GpuObjects::new();

        let parts = (|| -> EngineResult<_> {
            let viewport = Viewport::new(gpu, &mut shaders, &mut objects, &config)?;
            let mut brush = BrushEditor::new(gpu, &mut shaders, &config.volume)?;
            brush.shapes_mut().add_sphere(
                Vec3::ZERO,
                DEFAULT_BRUSH_RADIUS,
                Operation::Union,
                Alteration::NONE,
            );
            let sculpture = Sculpture::new(gpu, &mut shaders, &mut objects, &config)?;
            let mut ray_tracing = RayTracingEditor::new(
                gpu,
                &mut shaders,
                &mut objects,
                &config.raytrace,
                viewport.size(),
            )?;
            ray_tracing.set_lights(gpu, &default_lights())?;
            Ok((viewport, brush, sculpture, ray_tracing))
        })();

        let (viewport, brush, sculpture, ray_tracing) = match parts {
            Ok(parts) => parts,
            Err(e) => {
                objects.cleanup(gpu);
                shaders.cleanup(gpu);
                return Err(e);
            }
        };

        let config_reloader = match config_path {
            Some(path) if hot_reload.config_reload && path.exists() => {
                Some(ConfigReloader::new(path, hot_reload.debounce()))
            }
            _ => None,
        };

        let camera = camera::init_camera(&config.camera, config.display.width, config.display.height);
        Ok(Self {
            config,
            config_reloader,
            shaders,
            objects,
            camera,
            viewport,
            brush,
            sculpture,
            ray_tracing,
            views: ViewFlags::default(),
            messages: MessageQueue::default(),
            frame_count: 0,
        })
    }

    pub fn config(&self) -> &SculptConfig {
        &self.config
    }

    pub fn camera(&self) -> &CameraData {
        &self.camera
    }

    pub fn brush(&self) -> &BrushEditor {
        &self.brush
    }

    pub fn brush_mut(&mut self) -> &mut BrushEditor {
        &mut self.brush
    }

    pub fn sculpture(&self) -> &Sculpture {
        &self.sculpture
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn ray_tracing(&self) -> &RayTracingEditor {
        &self.ray_tracing
    }

    /// Registries behind the volume, render target, uniform and mesh handles
    pub fn objects(&self) -> &GpuObjects {
        &self.objects
    }

    pub fn views(&self) -> ViewFlags {
        self.views
    }

    pub fn messages(&self) -> &MessageQueue {
        &self.messages
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn title(&self) -> String {
        format!("{} - voxel-sculpt", self.sculpture.title())
    }

    /// Something visible changed: redraw and restart accumulation
    fn invalidate(&mut self) {
        self.viewport.request_redraw();
        self.ray_tracing.reset();
    }

    /// Take a new configuration while running. Volume and shader settings
    /// need a restart and are kept; everything else applies now.
    pub fn apply_config(&mut self, gpu: &dyn GpuBackend, config: SculptConfig) -> EngineResult<()> {
        config.validate()?;
        if config.volume != self.config.volume {
            self.messages
                .warn("Volume settings take effect after a restart");
        }
        if config.shaders != self.config.shaders {
            self.messages
                .warn("Shader settings take effect after a restart");
        }

        self.sculpture.set_autosave_interval(config.save.autosave_secs);
        self.sculpture.set_quality(config.save.quality);
        self.camera.fovy_radians = config.camera.fov_degrees.to_radians();
        self.ray_tracing.apply_config(&config.raytrace);
        self.viewport
            .set_max_steps(gpu, &self.objects, config.raytrace.max_steps)?;

        self.config = SculptConfig {
            volume: self.config.volume.clone(),
            shaders: self.config.shaders.clone(),
            ..config
        };
        self.invalidate();
        self.messages.info("Configuration reloaded");
        Ok(())
    }

    pub fn frame(&mut self, gpu: &dyn GpuBackend, input: &FrameInput) -> EngineResult<()> {
        let reloaded = self
            .config_reloader
            .as_mut()
            .and_then(|reloader| reloader.poll(&mut self.messages));
        if let Some(config) = reloaded {
            self.apply_config(gpu, config)?;
        }

        self.shaders.poll(gpu, &mut self.messages);
        if self.shaders.take_changed() {
            self.invalidate();
        }

        self.update_camera(gpu, input)?;

        if self.brush.needs_fill() {
            self.brush.fill(gpu, &self.shaders)?;
        }
        self.brush.find(
            gpu,
            &self.shaders,
            self.objects.get(self.sculpture.volume())?,
            self.objects.get(self.viewport.camera_buffer())?,
        )?;

        if let Some(mode) = input.sculpt {
            self.sculpture
                .run_sculpt(gpu, &self.shaders, &self.objects, &mut self.brush, mode)?;
            self.invalidate();
        }

        self.handle_files(gpu, input);
        self.sculpture
            .update(input.dt, gpu, &self.shaders, &self.objects, &mut self.messages);
        self.messages.update(input.dt);

        if self.views.viewport && self.viewport.needs_redraw() {
            self.viewport
                .draw(gpu, &self.shaders, &self.objects, self.sculpture.volume())?;
        }

        if input.toggle_ray_tracing {
            self.views.ray_tracing = !self.views.ray_tracing;
        }
        let size = self.viewport.size();
        if self
            .ray_tracing
            .update(gpu, &mut self.objects, size, self.views.ray_tracing)?
        {
            self.ray_tracing.step(
                gpu,
                &self.shaders,
                &self.objects,
                self.sculpture.volume(),
                self.viewport.camera_buffer(),
                self.viewport.view_buffer(),
            )?;
        }

        self.handle_captures(gpu, input);
        self.frame_count += 1;
        Ok(())
    }

    fn update_camera(&mut self, gpu: &dyn GpuBackend, input: &FrameInput) -> EngineResult<()> {
        let mut moved = false;

        if let Some([width, height]) = input.resize {
            if self.viewport.resize(gpu, &mut self.objects, width, height)? {
                self.camera = camera::update_aspect_ratio(&self.camera, width, height);
                moved = true;
            }
        }
        if input.orbit != Vec2::ZERO {
            self.camera = transform::orbit(&self.camera, input.orbit, self.config.camera.sensitivity);
            moved = true;
        }
        if input.scroll != 0.0 {
            self.camera = transform::zoom(&self.camera, input.scroll, self.config.camera.zoom_speed);
            moved = true;
        }
        if moved {
            self.invalidate();
        }

        let uniform = camera::build_camera_uniform(&self.camera, self.viewport.size(), input.cursor);
        self.viewport.update_camera(gpu, &self.objects, &uniform)
    }

    /// Save and load requests. Failures are reported, never fatal.
    fn handle_files(&mut self, gpu: &dyn GpuBackend, input: &FrameInput) {
        let quality = self.sculpture.quality();

        if input.new_sculpture {
            match self.sculpture.reset(gpu, &self.objects) {
                Ok(()) => self.invalidate(),
                Err(e) => self.messages.error(format!("New sculpture failed: {}", e)),
            }
        }

        if let Some(path) = &input.load {
            match self.sculpture.load(gpu, &self.shaders, &self.objects, path) {
                Ok(()) => {
                    self.messages.info(format!("Loaded {}", path.display()));
                    self.invalidate();
                }
                Err(e) => self.messages.error(format!("Load failed: {}", e)),
            }
        }

        let request = if let Some(path) = &input.save_as {
            Some(
                self.sculpture
                    .save_as(gpu, &self.shaders, &self.objects, path, quality),
            )
        } else if input.save {
            Some(self.sculpture.save(gpu, &self.shaders, &self.objects, quality))
        } else {
            None
        };

        match request {
            Some(Ok(SaveRequest::NoName)) => self.messages.warn("Choose a file name with Save As"),
            Some(Ok(SaveRequest::Busy)) => self.messages.warn("A save is already running"),
            Some(Ok(SaveRequest::AlreadySaved | SaveRequest::Started)) | None => {}
            Some(Err(e)) => self.messages.error(format!("Save failed: {}", e)),
        }
    }

    fn handle_captures(&mut self, gpu: &dyn GpuBackend, input: &FrameInput) {
        if let Some(path) = &input.screenshot {
            if let Err(e) = self.viewport.screenshot(gpu, &self.objects, path) {
                self.messages.error(format!("Screenshot failed: {}", e));
            }
        }
        if let Some(path) = &input.render_image {
            if let Err(e) = self.ray_tracing.save_image(gpu, &self.objects, path) {
                self.messages.error(format!("Render export failed: {}", e));
            }
        }
    }

    /// Finish pending saves, ask about unsaved edits and release every GPU
    /// object
    pub fn shutdown(mut self, gpu: &dyn GpuBackend, prompt: &mut dyn UnsavedPrompt) -> EngineResult<()> {
        let result = self
            .sculpture
            .shutdown(gpu, &self.shaders, &self.objects, prompt);

        self.ray_tracing.cleanup(gpu, &mut self.objects);
        self.brush.cleanup(gpu);
        self.viewport.cleanup(gpu, &mut self.objects);
        self.sculpture.cleanup(gpu, &mut self.objects);
        if !self.objects.is_empty() {
            log::warn!("[SculptApp] {} GPU objects outlived their owners", self.objects.len());
        }
        self.objects.cleanup(gpu);
        self.shaders.cleanup(gpu);
        log::info!("[SculptApp] Shut down after {} frames", self.frame_count);
        result
    }
}
