use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::source::ChangeSource;
use super::watcher::FileWatcher;
use super::{shader_reload_error, HotReloadConfig, HotReloadResult};
use crate::error::{EngineError, EngineResult};
use crate::gpu::constants::{generate_wgsl_constants, CONSTANTS_INCLUDE};
use crate::gpu::{Binding, GpuBackend, NativeShader, Shader, ShaderStage, WgslPreprocessor};
use crate::memory::{Handle, Registry, DEFAULT_REGISTRY_CAPACITY};
use crate::ui::MessageQueue;

/// Shader hot-reload manager
///
/// Owns every compiled shader. Sources live in one directory as
/// `<name>.<comp|vert|frag>.wgsl`; each source is registered with the file
/// watcher tagged with its shader handle. A recompile after an edit swaps
/// the native program inside the same registry slot, so handles held by
/// the rest of the engine stay valid. A failed recompile keeps the old
/// program.
///
/// Shared `#include` files are watched too, tagged with `Handle::INVALID`;
/// an edit to one recompiles every shader that pulled it in.
pub struct ShaderManager {
    shader_dir: PathBuf,
    shaders: Registry<Shader>,
    watcher: FileWatcher<Handle<Shader>>,
    /// Shaders built from each watched include, by watched name
    dependents: HashMap<String, Vec<Handle<Shader>>>,
    constants: String,
    changed: bool,
}

impl ShaderManager {
    /// Manager watching `config.shader_dir` with the platform notifier when
    /// shader reload is enabled
    pub fn new(config: &HotReloadConfig) -> Self {
        let watcher = if config.shader_reload {
            FileWatcher::new(&config.shader_dir, config.debounce())
        } else {
            FileWatcher::inert(&config.shader_dir, config.debounce())
        };
        if !watcher.is_active() {
            log::warn!("[ShaderManager] Hot reload disabled; shaders compile once");
        }
        Self::from_watcher(config, watcher)
    }

    /// Manager fed by an explicit change source
    pub fn with_source(config: &HotReloadConfig, source: Box<dyn ChangeSource>) -> Self {
        let watcher = FileWatcher::with_source(&config.shader_dir, config.debounce(), source);
        Self::from_watcher(config, watcher)
    }

    fn from_watcher(config: &HotReloadConfig, watcher: FileWatcher<Handle<Shader>>) -> Self {
        Self {
            shader_dir: config.shader_dir.clone(),
            shaders: Registry::new("shader", DEFAULT_REGISTRY_CAPACITY),
            watcher,
            dependents: HashMap::new(),
            constants: generate_wgsl_constants(),
            changed: false,
        }
    }

    /// Source file name for a shader
    pub fn source_name(name: &str, stage: ShaderStage) -> String {
        format!("{}.{}.wgsl", name, stage.suffix())
    }

    /// Compile `name` for `stage` and start watching its source. Returns
    /// `Handle::INVALID` when it does not compile; whether that is fatal is
    /// up to the caller.
    pub fn add(&mut self, gpu: &dyn GpuBackend, name: &str, stage: ShaderStage) -> Handle<Shader> {
        match self.try_add(gpu, name, stage) {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("[ShaderManager] {}", e);
                Handle::INVALID
            }
        }
    }

    /// `add` for shaders the engine cannot run without
    pub fn require(
        &mut self,
        gpu: &dyn GpuBackend,
        name: &str,
        stage: ShaderStage,
    ) -> EngineResult<Handle<Shader>> {
        self.try_add(gpu, name, stage)
    }

    fn try_add(
        &mut self,
        gpu: &dyn GpuBackend,
        name: &str,
        stage: ShaderStage,
    ) -> EngineResult<Handle<Shader>> {
        let file_name = Self::source_name(name, stage);
        let path = self.shader_dir.join(&file_name);

        let handle = self.shaders.get_new(Shader::pending(name, stage, &path))?;
        let compiled = self
            .load_source(&path)
            .and_then(|(source, includes)| match self.shaders.get_mut(handle) {
                Some(shader) => shader.recompile(gpu, &source).map(|()| includes),
                None => Err(EngineError::ResourceNotFound {
                    resource_type: "shader".to_string(),
                    id: name.to_string(),
                }),
            });

        let includes = match compiled {
            Ok(includes) => includes,
            Err(e) => {
                // Nothing was allocated in between, so the slot can be undone
                self.shaders.pop_last();
                return Err(e);
            }
        };

        self.watcher.watch_file(&file_name, handle);
        self.track_includes(handle, &includes);
        log::info!("[ShaderManager] Loaded {}", file_name);
        Ok(handle)
    }

    /// Preprocessed source of one shader file and the include files it
    /// was built from
    fn load_source(&self, path: &Path) -> HotReloadResult<(String, Vec<PathBuf>)> {
        let mut preprocessor = WgslPreprocessor::new();
        preprocessor.add_include_dir(&self.shader_dir);
        preprocessor.add_virtual_file(CONSTANTS_INCLUDE, self.constants.clone());
        let source = preprocessor.process_file(path)?;
        Ok((source, preprocessor.dependencies().to_vec()))
    }

    /// Watch the include files `handle` was built from
    fn track_includes(&mut self, handle: Handle<Shader>, includes: &[PathBuf]) {
        for include in includes {
            let Ok(relative) = include.strip_prefix(&self.shader_dir) else {
                log::debug!(
                    "[ShaderManager] {} is outside {}; not watched",
                    include.display(),
                    self.shader_dir.display()
                );
                continue;
            };
            let name = relative.to_string_lossy().replace('\\', "/");
            self.watcher.watch_file(&name, Handle::INVALID);

            let dependents = self.dependents.entry(name).or_default();
            if !dependents.contains(&handle) {
                dependents.push(handle);
            }
        }
    }

    /// Recompile one shader from its source file
    fn reload(&mut self, gpu: &dyn GpuBackend, handle: Handle<Shader>, trigger: &str) -> HotReloadResult<()> {
        let path = self
            .shaders
            .get(handle)
            .map(|shader| shader.source_path().to_path_buf())
            .ok_or_else(|| shader_reload_error(trigger, "shader was removed"))?;

        let (source, includes) = self.load_source(&path)?;
        self.shaders
            .get_mut(handle)
            .ok_or_else(|| shader_reload_error(trigger, "shader was removed"))?
            .recompile(gpu, &source)?;
        self.track_includes(handle, &includes);
        Ok(())
    }

    /// Recompile every shader whose source changed. Returns the number of
    /// programs swapped.
    pub fn poll(&mut self, gpu: &dyn GpuBackend, messages: &mut MessageQueue) -> usize {
        self.poll_at(gpu, messages, Instant::now())
    }

    /// `poll` with an explicit clock
    pub fn poll_at(
        &mut self,
        gpu: &dyn GpuBackend,
        messages: &mut MessageQueue,
        now: Instant,
    ) -> usize {
        self.watcher.update_at(now);

        let mut swapped = 0;
        while let Some(file) = self.watcher.take_changed() {
            let targets = if file.user_data.is_null() {
                self.dependents.get(&file.name).cloned().unwrap_or_default()
            } else {
                vec![file.user_data]
            };

            for handle in targets {
                match self.reload(gpu, handle, &file.name) {
                    Ok(()) => {
                        let name = self.shaders.get(handle).map(Shader::name).unwrap_or_default();
                        log::info!("[ShaderManager] Reloaded {} after {} changed", name, file.name);
                        swapped += 1;
                        self.changed = true;
                    }
                    Err(e) => {
                        messages.error(format!("Shader reload failed: {}", e));
                    }
                }
            }
        }
        swapped
    }

    /// True once after any successful reload
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    pub fn get(&self, handle: Handle<Shader>) -> Option<&Shader> {
        self.shaders.get(handle)
    }

    pub fn is_valid(&self, handle: Handle<Shader>) -> bool {
        self.shaders.is_valid(handle)
    }

    /// Native program for draws
    pub fn native(&self, handle: Handle<Shader>) -> EngineResult<NativeShader> {
        self.shader(handle)?.native()
    }

    /// Dispatch a compute shader over `threads` invocations
    pub fn dispatch(
        &self,
        handle: Handle<Shader>,
        gpu: &dyn GpuBackend,
        bindings: &[Binding],
        threads: [u32; 3],
    ) -> EngineResult<()> {
        self.shader(handle)?.dispatch(gpu, bindings, threads)
    }

    fn shader(&self, handle: Handle<Shader>) -> EngineResult<&Shader> {
        self.shaders
            .get(handle)
            .ok_or_else(|| EngineError::ResourceNotFound {
                resource_type: "shader".to_string(),
                id: format!("{:?}", handle),
            })
    }

    /// Destroy one shader and stop using its handle
    pub fn remove(&mut self, gpu: &dyn GpuBackend, handle: Handle<Shader>) -> bool {
        for dependents in self.dependents.values_mut() {
            dependents.retain(|&dependent| dependent != handle);
        }
        self.shaders.remove(handle, gpu)
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_active()
    }

    pub fn shader_dir(&self) -> &Path {
        &self.shader_dir
    }

    pub fn cleanup(&mut self, gpu: &dyn GpuBackend) {
        self.dependents.clear();
        self.shaders.cleanup(gpu);
    }
}
