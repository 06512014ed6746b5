//! Engine-wide error type
//!
//! Every subsystem returns `EngineResult<T>`. Context helpers in the
//! subsystems (`hot_reload_context`, `EngineError::io`) map foreign
//! errors onto these variants.

use thiserror::Error;

/// Result alias used across the crate
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Allocation of {size} bytes failed: {reason}")]
    AllocationFailed { size: usize, reason: String },

    #[error("Out of memory: requested {requested}, available {available}")]
    OutOfMemory { requested: usize, available: usize },

    #[error("IO error at {path}: {error}")]
    IoError { path: String, error: String },

    #[error("{resource_type} not found: {id}")]
    ResourceNotFound { resource_type: String, id: String },

    #[error("Shader '{name}' failed to compile: {error}")]
    ShaderCompileFailed { name: String, error: String },

    #[error("Shader '{name}' failed to reload: {error}")]
    ShaderReloadFailed { name: String, error: String },

    #[error("Watch error for {path}: {error}")]
    AssetWatchError { path: String, error: String },

    #[error("GPU operation '{operation}' failed: {error}")]
    GpuOperationFailed { operation: String, error: String },

    #[error("Buffer error: {0}")]
    BufferError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("{component} error: {error}")]
    SystemError { component: String, error: String },
}

impl EngineError {
    /// Wrap an `std::io::Error` together with the path it concerns
    pub fn io(path: impl AsRef<std::path::Path>, error: std::io::Error) -> Self {
        EngineError::IoError {
            path: path.as_ref().display().to_string(),
            error: error.to_string(),
        }
    }

    /// Shorthand for a GPU failure
    pub fn gpu(operation: &str, error: impl std::fmt::Display) -> Self {
        EngineError::GpuOperationFailed {
            operation: operation.to_string(),
            error: error.to_string(),
        }
    }
}
