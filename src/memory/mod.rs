/// GPU Object Storage
///
/// Bump arenas and the handle-addressed registries built on top of them.
/// Every GPU object the engine creates lives in exactly one registry and is
/// released explicitly through it.

pub mod arena;
pub mod objects;
pub mod registry;

pub use arena::{Arena, ArenaMark};
pub use objects::{GpuObjects, Stored};
pub use registry::{GpuResource, Handle, Registry, RegistryIter};

use crate::error::{EngineError, EngineResult};

/// Type alias for memory operation results
pub type MemoryResult<T> = EngineResult<T>;

/// Default slot count for a registry arena
pub const DEFAULT_REGISTRY_CAPACITY: usize = 256;

/// Create an out of memory error
pub fn out_of_memory_error(requested: usize, available: usize) -> EngineError {
    EngineError::OutOfMemory {
        requested,
        available,
    }
}

/// Create an allocation error
pub fn allocation_error(size: usize, reason: impl std::fmt::Display) -> EngineError {
    EngineError::AllocationFailed {
        size,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests;
