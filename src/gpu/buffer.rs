//! Type-safe GPU buffer wrapper

use bytemuck::Pod;

use super::backend::*;
use crate::error::{EngineError, EngineResult};
use crate::memory::{allocation_error, GpuResource};

/// How a buffer is bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// One `T`, bound as a uniform
    Constant,
    /// `capacity` elements of `stride` bytes, bound as a storage buffer
    Structured { stride: u64, capacity: u64 },
    /// Mesh vertices
    Vertex { stride: u64 },
}

/// Owns one native buffer. Not `Clone`: the registry or the owning struct
/// is the only place the native id lives.
#[derive(Debug)]
pub struct Buffer {
    label: String,
    native: Option<NativeBuffer>,
    size: u64,
    kind: BufferKind,
}

impl Buffer {
    /// Constant buffer initialised with `value`
    pub fn constant<T: Pod>(gpu: &dyn GpuBackend, label: &str, value: &T) -> EngineResult<Self> {
        let bytes = bytemuck::bytes_of(value);
        let buffer = Self::create(gpu, label, bytes.len() as u64, BufferKind::Constant)?;
        buffer.write_bytes(gpu, 0, bytes)?;
        Ok(buffer)
    }

    /// Zeroed structured buffer with room for `capacity` elements of `T`
    pub fn structured<T: Pod>(
        gpu: &dyn GpuBackend,
        label: &str,
        capacity: u64,
    ) -> EngineResult<Self> {
        let stride = std::mem::size_of::<T>() as u64;
        Self::create(
            gpu,
            label,
            stride * capacity.max(1),
            BufferKind::Structured {
                stride,
                capacity: capacity.max(1),
            },
        )
    }

    /// Vertex buffer holding `vertices`
    pub fn vertices<T: Pod>(gpu: &dyn GpuBackend, label: &str, vertices: &[T]) -> EngineResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let stride = std::mem::size_of::<T>() as u64;
        let buffer = Self::create(gpu, label, bytes.len() as u64, BufferKind::Vertex { stride })?;
        buffer.write_bytes(gpu, 0, bytes)?;
        Ok(buffer)
    }

    fn create(gpu: &dyn GpuBackend, label: &str, size: u64, kind: BufferKind) -> EngineResult<Self> {
        if size == 0 {
            return Err(allocation_error(0, format!("buffer '{}' has zero size", label)));
        }

        let usage = match kind {
            BufferKind::Constant => BufferUsage::Uniform,
            BufferKind::Structured { .. } => BufferUsage::Storage,
            BufferKind::Vertex { .. } => BufferUsage::Vertex,
        };

        log::debug!("[Buffer] Creating '{}' ({:?}, {} bytes)", label, kind, size);
        let native = gpu.create_buffer(&BufferDesc { label, size, usage })?;

        Ok(Self {
            label: label.to_string(),
            native: Some(native),
            size,
            kind,
        })
    }

    /// Overwrite a constant buffer with `value`
    pub fn update<T: Pod>(&self, gpu: &dyn GpuBackend, value: &T) -> EngineResult<()> {
        let bytes = bytemuck::bytes_of(value);
        if bytes.len() as u64 != self.size {
            return Err(EngineError::BufferError(format!(
                "'{}' size mismatch: expected {} bytes, got {}",
                self.label,
                self.size,
                bytes.len()
            )));
        }
        self.write_bytes(gpu, 0, bytes)
    }

    /// Copy `elements` to the start of a structured buffer
    pub fn write_slice<T: Pod>(&self, gpu: &dyn GpuBackend, elements: &[T]) -> EngineResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(elements);
        if bytes.len() as u64 > self.size {
            return Err(EngineError::BufferError(format!(
                "'{}' holds {} bytes, {} requested",
                self.label,
                self.size,
                bytes.len()
            )));
        }
        self.write_bytes(gpu, 0, bytes)
    }

    pub fn write_bytes(&self, gpu: &dyn GpuBackend, offset: u64, bytes: &[u8]) -> EngineResult<()> {
        gpu.write_buffer(self.native()?, offset, bytes)
    }

    /// Synchronous readback of the whole buffer
    pub fn read<T: Pod>(&self, gpu: &dyn GpuBackend) -> EngineResult<Vec<T>> {
        let bytes = gpu.read_buffer(self.native()?)?;
        let stride = std::mem::size_of::<T>();
        let len = (self.size as usize).min(bytes.len());
        Ok(bytes[..len]
            .chunks_exact(stride)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    pub fn native(&self) -> EngineResult<NativeBuffer> {
        self.native.ok_or_else(|| {
            EngineError::BufferError(format!("buffer '{}' used after cleanup", self.label))
        })
    }

    /// Binding for slot `slot` matching the buffer kind
    pub fn binding(&self, slot: u32) -> EngineResult<Binding> {
        let buffer = self.native()?;
        let resource = match self.kind {
            BufferKind::Constant => BindingResource::Uniform(buffer),
            BufferKind::Structured { .. } | BufferKind::Vertex { .. } => BindingResource::Storage {
                buffer,
                read_only: false,
            },
        };
        Ok(Binding::new(slot, resource))
    }

    /// Read-only storage binding
    pub fn read_binding(&self, slot: u32) -> EngineResult<Binding> {
        Ok(Binding::new(
            slot,
            BindingResource::Storage {
                buffer: self.native()?,
                read_only: true,
            },
        ))
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Element capacity of a structured buffer
    pub fn capacity(&self) -> u64 {
        match self.kind {
            BufferKind::Structured { capacity, .. } => capacity,
            BufferKind::Vertex { stride } => self.size / stride,
            BufferKind::Constant => 1,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl GpuResource for Buffer {
    fn cleanup(&mut self, gpu: &dyn GpuBackend) {
        if let Some(native) = self.native.take() {
            gpu.destroy_buffer(native);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::RecordingBackend;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Params {
        a: u32,
        b: f32,
    }

    #[test]
    fn test_constant_roundtrip_and_size_check() {
        let gpu = RecordingBackend::new();
        let mut buffer = Buffer::constant(&gpu, "params", &Params { a: 3, b: 0.5 }).unwrap();

        buffer.update(&gpu, &Params { a: 7, b: 1.5 }).unwrap();
        assert_eq!(buffer.read::<Params>(&gpu).unwrap(), vec![Params { a: 7, b: 1.5 }]);

        // A different type does not fit a constant buffer
        assert!(buffer.update(&gpu, &[0u32; 4]).is_err());

        buffer.cleanup(&gpu);
        assert!(buffer.native().is_err());
        assert_eq!(gpu.live_objects().0, 0);
    }

    #[test]
    fn test_structured_capacity() {
        let gpu = RecordingBackend::new();
        let mut buffer = Buffer::structured::<[f32; 4]>(&gpu, "points", 8).unwrap();
        assert_eq!(buffer.size(), 128);
        assert_eq!(buffer.capacity(), 8);
        assert!(buffer.write_slice(&gpu, &[[0.0f32; 4]; 9]).is_err());
        assert!(matches!(
            buffer.binding(2).unwrap().resource,
            BindingResource::Storage { read_only: false, .. }
        ));
        buffer.cleanup(&gpu);
    }
}
