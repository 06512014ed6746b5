/// Hot-Reload System
///
/// Picks up edits to shader sources and to the configuration file while the
/// sculptor keeps running.
///
/// Key features:
/// - Debounced per-file change detection over a pluggable change source
/// - Shader recompilation with in-place program swap
/// - Configuration reload

pub mod config_reload;
pub mod error;
pub mod shader_reload;
pub mod source;
pub mod watcher;

pub use config_reload::ConfigReloader;
pub use error::{shader_reload_error, watch_error, HotReloadErrorContext, HotReloadResult};
pub use shader_reload::ShaderManager;
#[cfg(feature = "native")]
pub use source::NotifySource;
pub use source::{ChangeSource, ManualSource};
pub use watcher::{FileWatcher, WatchedFile};

use std::path::PathBuf;
use std::time::Duration;

/// Hot-reload configuration
#[derive(Debug, Clone)]
pub struct HotReloadConfig {
    /// Directory holding the shader sources
    pub shader_dir: PathBuf,

    /// Enable shader hot-reload
    pub shader_reload: bool,

    /// Enable config hot-reload
    pub config_reload: bool,

    /// Debounce time in milliseconds
    pub debounce_ms: u64,
}

impl HotReloadConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            shader_dir: PathBuf::from("shaders"),
            shader_reload: true,
            config_reload: true,
            debounce_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests;
