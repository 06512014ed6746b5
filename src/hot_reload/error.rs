//! Hot reload error handling
//!
//! Type alias and helpers that map watcher and recompile failures onto
//! `EngineError`.

use crate::error::{EngineError, EngineResult};

/// Type alias for hot reload results
pub type HotReloadResult<T> = EngineResult<T>;

/// Helper trait for hot reload error contexts
pub trait HotReloadErrorContext<T> {
    fn hot_reload_context(self, path: &str) -> HotReloadResult<T>
    where
        Self: Sized;
}

impl<T, E> HotReloadErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn hot_reload_context(self, path: &str) -> HotReloadResult<T> {
        self.map_err(|e| watch_error(path, e))
    }
}

/// Create a watch error
pub fn watch_error(path: &str, error: impl std::fmt::Display) -> EngineError {
    EngineError::AssetWatchError {
        path: path.to_string(),
        error: error.to_string(),
    }
}

/// Create a shader reload error
pub fn shader_reload_error(shader: &str, error: impl std::fmt::Display) -> EngineError {
    EngineError::ShaderReloadFailed {
        name: shader.to_string(),
        error: error.to_string(),
    }
}
