use std::fs;

use bytemuck::Zeroable;

use super::*;
use crate::camera::CameraUniform;
use crate::config::RayTraceConfig;
use crate::gpu::{Buffer, GpuCommand, RecordingBackend, Texture3D, TextureFormat};
use crate::hot_reload::{HotReloadConfig, ManualSource, ShaderManager};
use crate::memory::{GpuObjects, Handle};
use crate::renderer::ViewParams;

fn accumulator(width: u32, height: u32) -> Accumulator {
    let mut accumulator = Accumulator::new(&RayTraceConfig::default(), 1);
    assert!(accumulator.resize(width, height));
    accumulator
}

#[test]
fn test_uniform_layout() {
    assert_eq!(std::mem::size_of::<RayTraceData>(), 48);
    assert_eq!(std::mem::size_of::<Light>(), 32);
}

#[test]
fn test_one_pass_visits_every_tile_row_major() {
    let mut accumulator = accumulator(300, 200);

    let tiles: Vec<[u32; 2]> = (0..6).map(|_| accumulator.next_tile(true).unwrap()).collect();
    assert_eq!(
        tiles,
        vec![[0, 0], [128, 0], [256, 0], [0, 128], [128, 128], [256, 128]]
    );
    // The last tile of the first pass is still weighted as pass 0
    assert_eq!(accumulator.data().num_rendered_frames, 0);
    assert_eq!(accumulator.passes(), 1);

    assert_eq!(accumulator.next_tile(true), Some([0, 0]));
    assert_eq!(accumulator.data().num_rendered_frames, 1);
    assert_eq!(accumulator.data().thread_loc, [0, 0]);
}

#[test]
fn test_resize_resets_accumulation() {
    let mut accumulator = accumulator(256, 256);
    for _ in 0..5 {
        accumulator.next_tile(true);
    }
    assert_eq!(accumulator.passes(), 1);

    assert!(!accumulator.resize(256, 256));
    assert_eq!(accumulator.passes(), 1);

    assert!(accumulator.resize(512, 256));
    assert_eq!(accumulator.passes(), 0);
    assert_eq!(accumulator.data().image_size, [512, 256]);
    assert_eq!(accumulator.next_tile(true), Some([0, 0]));
}

#[test]
fn test_pause_finishes_running_pass() {
    let mut accumulator = accumulator(256, 256);
    accumulator.next_tile(true);
    accumulator.set_rendering(false);

    for _ in 0..3 {
        assert!(accumulator.next_tile(true).is_some());
    }
    assert_eq!(accumulator.passes(), 1);
    assert_eq!(accumulator.next_tile(true), None);

    accumulator.set_rendering(true);
    assert_eq!(accumulator.next_tile(true), Some([0, 0]));
}

#[test]
fn test_paused_reset_traces_exactly_one_pass() {
    let mut accumulator = accumulator(256, 256);
    accumulator.set_rendering(false);

    // Four tiles make up the pass, then the paused picture holds
    for _ in 0..4 {
        assert!(accumulator.next_tile(true).is_some());
    }
    assert_eq!(accumulator.passes(), 1);
    assert_eq!(accumulator.next_tile(true), None);

    accumulator.reset();
    let tiles: Vec<[u32; 2]> = std::iter::from_fn(|| accumulator.next_tile(true)).collect();
    assert_eq!(tiles, vec![[0, 0], [128, 0], [0, 128], [128, 128]]);
    assert_eq!(accumulator.passes(), 1);

    assert!(accumulator.resize(128, 128));
    assert_eq!(accumulator.next_tile(true), Some([0, 0]));
    assert_eq!(accumulator.next_tile(true), None);
    assert_eq!(accumulator.passes(), 1);
}

#[test]
fn test_new_settings_restart_accumulation() {
    let mut accumulator = accumulator(256, 256);
    for _ in 0..5 {
        accumulator.next_tile(true);
    }
    assert_eq!(accumulator.passes(), 1);

    assert!(!accumulator.set_params(&RayTraceConfig::default()));
    assert_eq!(accumulator.passes(), 1);

    let config = RayTraceConfig {
        max_steps: 64,
        tile_size: 64,
        ..Default::default()
    };
    assert!(accumulator.set_params(&config));
    assert_eq!(accumulator.passes(), 0);
    assert_eq!(accumulator.data().max_steps, 64);
    assert_eq!(accumulator.tile_size(), 64);
    assert_eq!(accumulator.data().image_size, [256, 256]);

    let tiles: Vec<[u32; 2]> = (0..5).map(|_| accumulator.next_tile(true).unwrap()).collect();
    assert_eq!(tiles, vec![[0, 0], [64, 0], [128, 0], [192, 0], [0, 64]]);
}

#[test]
fn test_hidden_view_does_not_advance() {
    let mut accumulator = accumulator(256, 256);
    accumulator.next_tile(true);
    assert_eq!(accumulator.next_tile(false), None);
    assert_eq!(accumulator.next_tile(true), Some([128, 0]));
}

#[test]
fn test_empty_image_has_no_tiles() {
    let mut accumulator = Accumulator::new(&RayTraceConfig::default(), 0);
    assert_eq!(accumulator.next_tile(true), None);
}

struct Scene {
    _dir: tempfile::TempDir,
    gpu: RecordingBackend,
    shaders: ShaderManager,
    objects: GpuObjects,
    volume: Handle<Texture3D>,
    camera: Handle<Buffer>,
    view: Handle<Buffer>,
}

impl Scene {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("raytrace.comp.wgsl"),
            "@compute @workgroup_size(8, 8, 1)\nfn main() {}\n",
        )
        .unwrap();
        let config = HotReloadConfig {
            shader_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let gpu = RecordingBackend::new();
        let shaders = ShaderManager::with_source(&config, Box::new(ManualSource::new()));
        let mut objects = GpuObjects::new();

        let volume = Texture3D::new(&gpu, "volume", [8; 3], TextureFormat::R32Float).unwrap();
        let volume = objects.insert(&gpu, volume).unwrap();
        let camera = Buffer::constant(&gpu, "camera", &CameraUniform::zeroed()).unwrap();
        let camera = objects.insert(&gpu, camera).unwrap();
        let view = Buffer::constant(&gpu, "view params", &ViewParams::zeroed()).unwrap();
        let view = objects.insert(&gpu, view).unwrap();
        Self {
            _dir: dir,
            gpu,
            shaders,
            objects,
            volume,
            camera,
            view,
        }
    }

    fn editor(&mut self, size: [u32; 2]) -> RayTracingEditor {
        RayTracingEditor::new(
            &self.gpu,
            &mut self.shaders,
            &mut self.objects,
            &RayTraceConfig::default(),
            size,
        )
        .unwrap()
    }

    fn step(&self, editor: &mut RayTracingEditor) {
        editor
            .step(&self.gpu, &self.shaders, &self.objects, self.volume, self.camera, self.view)
            .unwrap();
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        self.objects.cleanup(&self.gpu);
        self.shaders.cleanup(&self.gpu);
    }
}

fn raytrace_groups(gpu: &RecordingBackend) -> Vec<[u32; 3]> {
    gpu.commands()
        .into_iter()
        .filter_map(|command| match command {
            GpuCommand::Dispatch { label, groups, .. } if label == "raytrace" => Some(groups),
            _ => None,
        })
        .collect()
}

#[test]
fn test_editor_dispatches_one_tile_per_update() {
    let mut scene = Scene::new();
    let mut editor = scene.editor([256, 128]);
    editor.set_lights(&scene.gpu, &default_lights()).unwrap();

    scene.gpu.clear_commands();
    assert!(editor.update(&scene.gpu, &mut scene.objects, [256, 128], true).unwrap());
    scene.step(&mut editor);
    // Nothing new scheduled, nothing dispatched
    scene.step(&mut editor);
    assert_eq!(raytrace_groups(&scene.gpu), vec![[16, 16, 1]]);

    // Hidden: no scheduling and no accumulation progress
    assert!(!editor.update(&scene.gpu, &mut scene.objects, [256, 128], false).unwrap());
    assert_eq!(editor.accumulator().data().thread_loc, [0, 0]);

    editor.cleanup(&scene.gpu, &mut scene.objects);
}

#[test]
fn test_editor_resize_replaces_targets() {
    let mut scene = Scene::new();
    let mut editor = scene.editor([128, 128]);
    let output = editor.output();
    let before = scene.objects.get(output).unwrap().native().unwrap();
    let live = scene.gpu.live_objects();

    editor.update(&scene.gpu, &mut scene.objects, [128, 128], true).unwrap();
    editor.update(&scene.gpu, &mut scene.objects, [256, 256], true).unwrap();

    // Same handle, new native texture behind it
    assert_eq!(editor.output(), output);
    let target = scene.objects.get(output).unwrap();
    assert_ne!(target.native().unwrap(), before);
    assert_eq!(target.size(), [256, 256]);
    assert_eq!(editor.accumulator().passes(), 0);
    assert_eq!(scene.gpu.live_objects(), live);

    editor.cleanup(&scene.gpu, &mut scene.objects);
    assert!(!scene.objects.is_valid(output));
}

#[test]
fn test_new_settings_change_dispatch_size() {
    let mut scene = Scene::new();
    let mut editor = scene.editor([128, 128]);
    editor.update(&scene.gpu, &mut scene.objects, [128, 128], true).unwrap();

    let config = RayTraceConfig {
        tile_size: 64,
        max_bounces: 1,
        ..Default::default()
    };
    editor.apply_config(&config);
    assert_eq!(editor.accumulator().passes(), 0);

    // The tile scheduled with the old settings is dropped
    scene.gpu.clear_commands();
    scene.step(&mut editor);
    assert!(raytrace_groups(&scene.gpu).is_empty());

    editor.update(&scene.gpu, &mut scene.objects, [128, 128], true).unwrap();
    scene.step(&mut editor);
    assert_eq!(raytrace_groups(&scene.gpu), vec![[8, 8, 1]]);
    assert_eq!(editor.accumulator().data().max_bounces, 1);

    editor.cleanup(&scene.gpu, &mut scene.objects);
}

#[test]
fn test_save_image_after_a_pass() {
    let mut scene = Scene::new();
    let mut editor = scene.editor([128, 128]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("render.png");

    assert!(editor.save_image(&scene.gpu, &scene.objects, &path).is_err());

    editor.update(&scene.gpu, &mut scene.objects, [128, 128], true).unwrap();
    scene.step(&mut editor);
    editor.save_image(&scene.gpu, &scene.objects, &path).unwrap();
    assert!(path.exists());

    editor.cleanup(&scene.gpu, &mut scene.objects);
}

#[test]
fn test_paused_editor_renders_after_reset() {
    let mut scene = Scene::new();
    let mut editor = scene.editor([128, 128]);
    editor.set_rendering(false);
    editor.reset();

    scene.gpu.clear_commands();
    assert!(editor.update(&scene.gpu, &mut scene.objects, [128, 128], true).unwrap());
    scene.step(&mut editor);
    assert_eq!(editor.accumulator().passes(), 1);
    assert!(!editor.update(&scene.gpu, &mut scene.objects, [128, 128], true).unwrap());
    assert_eq!(raytrace_groups(&scene.gpu).len(), 1);

    editor.cleanup(&scene.gpu, &mut scene.objects);
}
