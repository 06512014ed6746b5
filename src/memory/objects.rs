/// Shared GPU Objects
///
/// One registry per long-lived object type. Subsystems keep handles to the
/// sculpture volume, the render targets, the shared uniforms and the proxy
/// meshes; the frame loop resolves them here and `cleanup` releases them
/// all at shutdown. Short-lived scratch objects stay with the code that
/// creates them.

use super::{out_of_memory_error, GpuResource, Handle, MemoryResult, Registry, DEFAULT_REGISTRY_CAPACITY};
use crate::error::{EngineError, EngineResult};
use crate::gpu::{Buffer, GpuBackend, Mesh, RenderTexture, Texture3D};

/// Object type with a registry in `GpuObjects`
pub trait Stored: GpuResource + Sized {
    const KIND: &'static str;

    fn registry(objects: &GpuObjects) -> &Registry<Self>;
    fn registry_mut(objects: &mut GpuObjects) -> &mut Registry<Self>;
}

pub struct GpuObjects {
    volumes: Registry<Texture3D>,
    targets: Registry<RenderTexture>,
    buffers: Registry<Buffer>,
    meshes: Registry<Mesh>,
}

impl GpuObjects {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REGISTRY_CAPACITY)
    }

    /// Registries with `capacity` slots each
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            volumes: Registry::new("volumes", capacity),
            targets: Registry::new("render targets", capacity),
            buffers: Registry::new("buffers", capacity),
            meshes: Registry::new("meshes", capacity),
        }
    }

    /// Take ownership of `value`. When its registry is full the object is
    /// released again and an out of memory error is returned.
    pub fn insert<T: Stored>(&mut self, gpu: &dyn GpuBackend, mut value: T) -> MemoryResult<Handle<T>> {
        let registry = T::registry_mut(self);
        if registry.slot_count() >= registry.capacity() {
            value.cleanup(gpu);
            return Err(out_of_memory_error(registry.slot_count() + 1, registry.capacity()));
        }
        registry.get_new(value)
    }

    pub fn get<T: Stored>(&self, handle: Handle<T>) -> EngineResult<&T> {
        T::registry(self).get(handle).ok_or_else(|| not_found::<T>(handle))
    }

    pub fn get_mut<T: Stored>(&mut self, handle: Handle<T>) -> EngineResult<&mut T> {
        T::registry_mut(self)
            .get_mut(handle)
            .ok_or_else(|| not_found::<T>(handle))
    }

    pub fn is_valid<T: Stored>(&self, handle: Handle<T>) -> bool {
        T::registry(self).is_valid(handle)
    }

    /// Release one object. False when the handle is stale.
    pub fn remove<T: Stored>(&mut self, gpu: &dyn GpuBackend, handle: Handle<T>) -> bool {
        T::registry_mut(self).remove(handle, gpu)
    }

    pub fn registry<T: Stored>(&self) -> &Registry<T> {
        T::registry(self)
    }

    /// Live objects across all registries
    pub fn len(&self) -> usize {
        self.volumes.len() + self.targets.len() + self.buffers.len() + self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release everything. Must run before the registries are dropped.
    pub fn cleanup(&mut self, gpu: &dyn GpuBackend) {
        self.volumes.cleanup(gpu);
        self.targets.cleanup(gpu);
        self.buffers.cleanup(gpu);
        self.meshes.cleanup(gpu);
    }
}

impl Default for GpuObjects {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found<T: Stored>(handle: Handle<T>) -> EngineError {
    EngineError::ResourceNotFound {
        resource_type: T::KIND.to_string(),
        id: format!("{:?}", handle),
    }
}

macro_rules! stored {
    ($type:ty, $field:ident, $kind:literal) => {
        impl Stored for $type {
            const KIND: &'static str = $kind;

            fn registry(objects: &GpuObjects) -> &Registry<Self> {
                &objects.$field
            }

            fn registry_mut(objects: &mut GpuObjects) -> &mut Registry<Self> {
                &mut objects.$field
            }
        }
    };
}

stored!(Texture3D, volumes, "volume");
stored!(RenderTexture, targets, "render target");
stored!(Buffer, buffers, "buffer");
stored!(Mesh, meshes, "mesh");
