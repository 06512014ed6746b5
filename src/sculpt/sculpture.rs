use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};

use super::brush::{slots, BrushEditor, SculptMode};
use super::volume_file;
use crate::config::SculptConfig;
use crate::error::{EngineError, EngineResult};
use crate::gpu::constants::EMPTY_DISTANCE;
use crate::gpu::{Buffer, GpuBackend, Shader, ShaderStage, StorageAccess, Texture3D, TextureFormat};
use crate::hot_reload::ShaderManager;
use crate::memory::{GpuObjects, GpuResource, Handle};
use crate::task::Promise;
use crate::ui::MessageQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    /// The volume has edits that are not on disk
    Unsaved,
    /// A snapshot is being written by a worker thread
    Saving,
    Saved,
}

/// Outcome of a save request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveRequest {
    /// Nothing to do
    AlreadySaved,
    /// A save is still in flight; the request was dropped
    Busy,
    /// The sculpture has no file name yet; use `save_as`
    NoName,
    Started,
}

/// Answer to the "save before quitting?" question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptAnswer {
    Save,
    SaveAs(PathBuf),
    Discard,
}

/// Asks the user what to do with unsaved edits
pub trait UnsavedPrompt {
    fn ask(&mut self, title: &str) -> PromptAnswer;
}

/// Uniform of the `scale` kernel
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct ScaleParams {
    src_size: u32,
    dst_size: u32,
    _padding: [u32; 2],
}

type SaveTask = Promise<EngineResult<PathBuf>>;

/// Sculpture
///
/// Holds the signed distance volume (stored in `GpuObjects`) and drives
/// everything that writes it: sculpt dispatches, loads and asynchronous
/// saves. Saving snapshots the volume
/// on the frame thread and hands the bytes to a worker, so only one save is
/// ever in flight.
pub struct Sculpture {
    volume: Handle<Texture3D>,
    size: u32,
    sculpt_shader: Handle<Shader>,
    scale_shader: Handle<Shader>,
    state: SaveState,
    /// Set when the volume changed after the in-flight snapshot was taken
    edited_while_saving: bool,
    name: Option<PathBuf>,
    pending: Option<SaveTask>,
    autosave_interval: f32,
    autosave_timer: f32,
    quality: u32,
}

impl Sculpture {
    /// Empty sculpture. A new sculpture counts as saved.
    pub fn new(
        gpu: &dyn GpuBackend,
        shaders: &mut ShaderManager,
        objects: &mut GpuObjects,
        config: &SculptConfig,
    ) -> EngineResult<Self> {
        let sculpt_shader = shaders.require(gpu, "sculpt", ShaderStage::Compute)?;
        let scale_shader = shaders.require(gpu, "scale", ShaderStage::Compute)?;

        let size = config.volume.size;
        let volume = Texture3D::new(gpu, "sculpture volume", [size; 3], TextureFormat::R32Float)?;
        let volume = objects.insert(gpu, volume)?;

        let sculpture = Self {
            volume,
            size,
            sculpt_shader,
            scale_shader,
            state: SaveState::Saved,
            edited_while_saving: false,
            name: None,
            pending: None,
            autosave_interval: config.save.autosave_secs,
            autosave_timer: 0.0,
            quality: config.save.quality,
        };
        if let Err(e) = sculpture.fill_empty(gpu, objects) {
            objects.remove(gpu, volume);
            return Err(e);
        }

        log::info!("[Sculpture] Created {}^3 volume", size);
        Ok(sculpture)
    }

    fn fill_empty(&self, gpu: &dyn GpuBackend, objects: &GpuObjects) -> EngineResult<()> {
        let voxels = vec![EMPTY_DISTANCE; (self.size as usize).pow(3)];
        objects.get(self.volume)?.upload(gpu, bytemuck::cast_slice(&voxels))
    }

    /// Start over with an empty, unnamed volume
    pub fn reset(&mut self, gpu: &dyn GpuBackend, objects: &GpuObjects) -> EngineResult<()> {
        self.wait_for_save()?;
        self.fill_empty(gpu, objects)?;
        self.name = None;
        self.state = SaveState::Saved;
        self.autosave_timer = 0.0;
        Ok(())
    }

    pub fn volume(&self) -> Handle<Texture3D> {
        self.volume
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn name(&self) -> Option<&Path> {
        self.name.as_deref()
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    pub fn set_quality(&mut self, quality: u32) {
        self.quality = quality;
    }

    pub fn set_autosave_interval(&mut self, seconds: f32) {
        self.autosave_interval = seconds.max(0.0);
    }

    /// Stamp the brush into the volume at the brush position
    pub fn run_sculpt(
        &mut self,
        gpu: &dyn GpuBackend,
        shaders: &ShaderManager,
        objects: &GpuObjects,
        brush: &mut BrushEditor,
        mode: SculptMode,
    ) -> EngineResult<()> {
        let [params, shapes, mask, position] = brush.sculpt_bindings(gpu, mode)?;
        let bindings = [
            params,
            objects.get(self.volume)?.storage_binding(slots::VOLUME, StorageAccess::ReadWrite)?,
            shapes,
            mask,
            position,
        ];
        shaders.dispatch(self.sculpt_shader, gpu, &bindings, [self.size; 3])?;

        match self.state {
            SaveState::Saving => self.edited_while_saving = true,
            _ => self.state = SaveState::Unsaved,
        }
        Ok(())
    }

    /// Write the volume to its file at `quality` voxels per edge
    pub fn save(
        &mut self,
        gpu: &dyn GpuBackend,
        shaders: &ShaderManager,
        objects: &GpuObjects,
        quality: u32,
    ) -> EngineResult<SaveRequest> {
        match self.state {
            SaveState::Saved => return Ok(SaveRequest::AlreadySaved),
            SaveState::Saving => return Ok(SaveRequest::Busy),
            SaveState::Unsaved => {}
        }
        let Some(path) = self.name.clone() else {
            return Ok(SaveRequest::NoName);
        };

        let voxels = self.snapshot(gpu, shaders, objects, quality)?;
        let size = [quality; 3];
        let task = Promise::spawn("sculpture-save", move || {
            volume_file::write(&path, size, &voxels).map(|()| path)
        })?;

        self.pending = Some(task);
        self.state = SaveState::Saving;
        self.edited_while_saving = false;
        self.autosave_timer = 0.0;
        log::info!("[Sculpture] Saving at {}^3", quality);
        Ok(SaveRequest::Started)
    }

    /// Rename the sculpture and save it, even when nothing changed. The new
    /// name only sticks once the save has started.
    pub fn save_as(
        &mut self,
        gpu: &dyn GpuBackend,
        shaders: &ShaderManager,
        objects: &GpuObjects,
        path: impl Into<PathBuf>,
        quality: u32,
    ) -> EngineResult<SaveRequest> {
        if self.state == SaveState::Saving {
            return Ok(SaveRequest::Busy);
        }
        let previous_name = self.name.replace(path.into());
        let previous_state = std::mem::replace(&mut self.state, SaveState::Unsaved);

        let request = self.save(gpu, shaders, objects, quality);
        if !matches!(request, Ok(SaveRequest::Started)) {
            self.name = previous_name;
            self.state = previous_state;
        }
        request
    }

    /// Volume contents at `quality` voxels per edge, read back synchronously
    fn snapshot(
        &self,
        gpu: &dyn GpuBackend,
        shaders: &ShaderManager,
        objects: &GpuObjects,
        quality: u32,
    ) -> EngineResult<Vec<u8>> {
        let volume = objects.get(self.volume)?;
        if quality == self.size {
            return volume.read_back(gpu);
        }

        let mut scratch =
            Texture3D::new(gpu, "save scratch", [quality; 3], TextureFormat::R32Float)?;
        let result = self
            .scale(gpu, shaders, volume, &scratch)
            .and_then(|()| scratch.read_back(gpu));
        scratch.cleanup(gpu);
        result
    }

    /// Resample `src` into `dst`
    fn scale(
        &self,
        gpu: &dyn GpuBackend,
        shaders: &ShaderManager,
        src: &Texture3D,
        dst: &Texture3D,
    ) -> EngineResult<()> {
        let dst_size = dst.size()[0];
        let params = ScaleParams {
            src_size: src.size()[0],
            dst_size,
            _padding: [0; 2],
        };
        let mut params_buffer = Buffer::constant(gpu, "scale params", &params)?;

        let result = (|| -> EngineResult<()> {
            let bindings = [
                params_buffer.binding(0)?,
                src.binding(1)?,
                dst.storage_binding(2, StorageAccess::WriteOnly)?,
            ];
            shaders.dispatch(self.scale_shader, gpu, &bindings, [dst_size; 3])
        })();
        params_buffer.cleanup(gpu);
        result
    }

    /// Replace the volume with a sculpture file, resampling it when its
    /// resolution differs
    pub fn load(
        &mut self,
        gpu: &dyn GpuBackend,
        shaders: &ShaderManager,
        objects: &GpuObjects,
        path: &Path,
    ) -> EngineResult<()> {
        if let Err(e) = self.wait_for_save() {
            log::warn!("[Sculpture] Save before load failed: {}", e);
        }

        let data = volume_file::read(path)?;
        let [width, height, depth] = data.size;
        if width != height || width != depth {
            return Err(EngineError::CorruptedData(format!(
                "{}: volume {:?} is not cubic",
                path.display(),
                data.size
            )));
        }

        let volume = objects.get(self.volume)?;
        if width == self.size {
            volume.upload(gpu, &data.voxels)?;
        } else {
            log::info!("[Sculpture] Resampling {}^3 file to {}^3", width, self.size);
            let mut scratch =
                Texture3D::new(gpu, "load scratch", data.size, TextureFormat::R32Float)?;
            let result = scratch
                .upload(gpu, &data.voxels)
                .and_then(|()| self.scale(gpu, shaders, &scratch, volume));
            scratch.cleanup(gpu);
            result?;
        }

        self.name = Some(path.to_path_buf());
        self.state = SaveState::Saved;
        self.autosave_timer = 0.0;
        log::info!("[Sculpture] Loaded {}", path.display());
        Ok(())
    }

    fn finish_save(&mut self, outcome: Option<EngineResult<PathBuf>>) -> EngineResult<PathBuf> {
        let result = outcome.unwrap_or_else(|| {
            Err(EngineError::SystemError {
                component: "sculpture".to_string(),
                error: "save worker panicked".to_string(),
            })
        });

        self.state = match &result {
            Ok(_) if !self.edited_while_saving => SaveState::Saved,
            _ => SaveState::Unsaved,
        };
        self.edited_while_saving = false;
        result
    }

    /// Block until an in-flight save finished and apply its outcome
    pub fn wait_for_save(&mut self) -> EngineResult<()> {
        match self.pending.take() {
            Some(task) => self.finish_save(task.join()).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Per frame: pick up a finished save and run the autosave timer
    pub fn update(
        &mut self,
        dt: f32,
        gpu: &dyn GpuBackend,
        shaders: &ShaderManager,
        objects: &GpuObjects,
        messages: &mut MessageQueue,
    ) {
        if self.pending.as_ref().is_some_and(SaveTask::is_finished) {
            let outcome = self.pending.take().and_then(Promise::join);
            match self.finish_save(outcome) {
                Ok(path) => messages.info(format!("Saved {}", path.display())),
                Err(e) => messages.error(format!("Save failed: {}", e)),
            }
        }

        if self.autosave_interval <= 0.0 {
            return;
        }
        self.autosave_timer += dt;
        if self.autosave_timer < self.autosave_interval {
            return;
        }
        self.autosave_timer = 0.0;

        if self.state == SaveState::Unsaved && self.name.is_some() {
            match self.save(gpu, shaders, objects, self.quality) {
                Ok(SaveRequest::Started) => messages.info("Autosaving"),
                Ok(_) => {}
                Err(e) => messages.warn(format!("Autosave failed: {}", e)),
            }
        }
    }

    /// Window title, with a trailing `*` while edits are not on disk
    pub fn title(&self) -> String {
        let name = self
            .name
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string());

        match self.state {
            SaveState::Saved => name,
            _ => format!("{}*", name),
        }
    }

    /// Finish pending work before exit. Unsaved edits go through `prompt`.
    pub fn shutdown(
        &mut self,
        gpu: &dyn GpuBackend,
        shaders: &ShaderManager,
        objects: &GpuObjects,
        prompt: &mut dyn UnsavedPrompt,
    ) -> EngineResult<()> {
        if let Err(e) = self.wait_for_save() {
            log::error!("[Sculpture] {}", e);
        }
        if self.state != SaveState::Unsaved {
            return Ok(());
        }

        let request = match prompt.ask(&self.title()) {
            PromptAnswer::Discard => {
                log::info!("[Sculpture] Discarding unsaved edits");
                return Ok(());
            }
            PromptAnswer::Save => self.save(gpu, shaders, objects, self.quality)?,
            PromptAnswer::SaveAs(path) => {
                self.save_as(gpu, shaders, objects, path, self.quality)?
            }
        };

        if request == SaveRequest::NoName {
            log::warn!("[Sculpture] No file name; edits were not saved");
            return Ok(());
        }
        self.wait_for_save()
    }

    /// Release the volume
    pub fn cleanup(&mut self, gpu: &dyn GpuBackend, objects: &mut GpuObjects) {
        if !self.volume.is_null() {
            objects.remove(gpu, self.volume);
            self.volume = Handle::INVALID;
        }
    }
}

impl Drop for Sculpture {
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            log::warn!("[Sculpture] Waiting for an in-flight save");
            if let Some(Err(e)) = task.join() {
                log::error!("[Sculpture] Save failed: {}", e);
            }
        }
    }
}
