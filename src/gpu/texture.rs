//! Texture wrappers
//!
//! `Texture2D`, `Texture3D` and `RenderTexture` each own one native
//! texture. They share `TextureStorage` for the bookkeeping and differ in
//! dimensionality and in what they can be used for.

use std::path::Path;

use image::{ImageBuffer, Rgba};

use super::backend::*;
use crate::error::{EngineError, EngineResult};
use crate::memory::GpuResource;

#[derive(Debug)]
struct TextureStorage {
    native: Option<NativeTexture>,
    desc: TextureDesc,
}

impl TextureStorage {
    fn create(gpu: &dyn GpuBackend, desc: TextureDesc) -> EngineResult<Self> {
        if desc.size.iter().any(|&extent| extent == 0) {
            return Err(EngineError::gpu(
                "create_texture",
                format!("'{}' has a zero extent {:?}", desc.label, desc.size),
            ));
        }
        log::debug!(
            "[Texture] Creating '{}' {:?} {:?} ({} bytes)",
            desc.label,
            desc.size,
            desc.format,
            desc.byte_size()
        );
        let native = gpu.create_texture(&desc)?;
        Ok(Self {
            native: Some(native),
            desc,
        })
    }

    fn native(&self) -> EngineResult<NativeTexture> {
        self.native.ok_or_else(|| {
            EngineError::gpu(
                "texture",
                format!("'{}' used after cleanup", self.desc.label),
            )
        })
    }

    fn release(&mut self, gpu: &dyn GpuBackend) {
        if let Some(native) = self.native.take() {
            gpu.destroy_texture(native);
        }
    }
}

macro_rules! texture_common {
    ($type:ty) => {
        impl $type {
            pub fn native(&self) -> EngineResult<NativeTexture> {
                self.storage.native()
            }

            pub fn desc(&self) -> &TextureDesc {
                &self.storage.desc
            }

            pub fn format(&self) -> TextureFormat {
                self.storage.desc.format
            }

            pub fn byte_size(&self) -> u64 {
                self.storage.desc.byte_size()
            }

            /// Replace the whole contents
            pub fn upload(&self, gpu: &dyn GpuBackend, data: &[u8]) -> EngineResult<()> {
                gpu.write_texture(self.native()?, data)
            }

            /// Synchronous readback of the whole contents
            pub fn read_back(&self, gpu: &dyn GpuBackend) -> EngineResult<Vec<u8>> {
                gpu.read_texture(self.native()?)
            }

            pub fn clear(&self, gpu: &dyn GpuBackend) -> EngineResult<()> {
                gpu.clear_texture(self.native()?)
            }

            /// Read through `textureLoad`
            pub fn binding(&self, slot: u32) -> EngineResult<Binding> {
                Ok(Binding::new(slot, BindingResource::Texture(self.native()?)))
            }

            pub fn storage_binding(&self, slot: u32, access: StorageAccess) -> EngineResult<Binding> {
                Ok(Binding::new(
                    slot,
                    BindingResource::StorageTexture {
                        texture: self.native()?,
                        access,
                    },
                ))
            }
        }

        impl GpuResource for $type {
            fn cleanup(&mut self, gpu: &dyn GpuBackend) {
                self.storage.release(gpu);
            }
        }
    };
}

#[derive(Debug)]
pub struct Texture2D {
    storage: TextureStorage,
}

impl Texture2D {
    pub fn new(
        gpu: &dyn GpuBackend,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> EngineResult<Self> {
        let storage = TextureStorage::create(
            gpu,
            TextureDesc {
                label: label.to_string(),
                size: [width, height, 1],
                dimension: TextureDimension::D2,
                format,
                render_target: false,
            },
        )?;
        Ok(Self { storage })
    }

    pub fn size(&self) -> [u32; 2] {
        [self.storage.desc.size[0], self.storage.desc.size[1]]
    }
}

texture_common!(Texture2D);

#[derive(Debug)]
pub struct Texture3D {
    storage: TextureStorage,
}

impl Texture3D {
    pub fn new(
        gpu: &dyn GpuBackend,
        label: &str,
        size: [u32; 3],
        format: TextureFormat,
    ) -> EngineResult<Self> {
        let storage = TextureStorage::create(
            gpu,
            TextureDesc {
                label: label.to_string(),
                size,
                dimension: TextureDimension::D3,
                format,
                render_target: false,
            },
        )?;
        Ok(Self { storage })
    }

    pub fn size(&self) -> [u32; 3] {
        self.storage.desc.size
    }
}

texture_common!(Texture3D);

/// 2D colour target that can be drawn into, written from compute and
/// reallocated at a new size
#[derive(Debug)]
pub struct RenderTexture {
    storage: TextureStorage,
}

impl RenderTexture {
    pub fn new(gpu: &dyn GpuBackend, label: &str, width: u32, height: u32) -> EngineResult<Self> {
        let storage = TextureStorage::create(
            gpu,
            TextureDesc {
                label: label.to_string(),
                size: [width, height, 1],
                dimension: TextureDimension::D2,
                format: TextureFormat::Rgba8Unorm,
                render_target: true,
            },
        )?;
        Ok(Self { storage })
    }

    pub fn size(&self) -> [u32; 2] {
        [self.storage.desc.size[0], self.storage.desc.size[1]]
    }

    /// Reallocate at `width` x `height`; contents are lost. No-op when the
    /// size already matches.
    pub fn resize(&mut self, gpu: &dyn GpuBackend, width: u32, height: u32) -> EngineResult<bool> {
        if self.size() == [width, height] && self.storage.native.is_some() {
            return Ok(false);
        }

        let mut desc = self.storage.desc.clone();
        desc.size = [width, height, 1];
        let replacement = TextureStorage::create(gpu, desc)?;
        self.storage.release(gpu);
        self.storage = replacement;
        Ok(true)
    }

    /// Read the texture back and write it as a PNG
    pub fn save_png(&self, gpu: &dyn GpuBackend, path: impl AsRef<Path>) -> EngineResult<()> {
        let path = path.as_ref();
        let [width, height] = self.size();
        let data = self.read_back(gpu)?;

        let image: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_raw(width, height, data)
            .ok_or_else(|| {
                EngineError::BufferError(format!(
                    "readback of '{}' does not match {}x{}",
                    self.storage.desc.label, width, height
                ))
            })?;

        image.save(path).map_err(|e| EngineError::IoError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        log::info!("[RenderTexture] Saved {}x{} image to {}", width, height, path.display());
        Ok(())
    }
}

texture_common!(RenderTexture);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::RecordingBackend;

    #[test]
    fn test_volume_texture_upload_and_read() {
        let gpu = RecordingBackend::new();
        let mut volume = Texture3D::new(&gpu, "volume", [4, 4, 4], TextureFormat::R32Float).unwrap();
        assert_eq!(volume.byte_size(), 256);

        let data: Vec<u8> = (0..256).map(|i| i as u8).collect();
        volume.upload(&gpu, &data).unwrap();
        assert_eq!(volume.read_back(&gpu).unwrap(), data);

        // Wrong size uploads are rejected
        assert!(volume.upload(&gpu, &data[..128]).is_err());

        volume.cleanup(&gpu);
        assert!(volume.native().is_err());
        assert_eq!(gpu.live_objects().1, 0);
    }

    #[test]
    fn test_zero_extent_is_rejected() {
        let gpu = RecordingBackend::new();
        assert!(Texture2D::new(&gpu, "empty", 0, 4, TextureFormat::Rgba8Unorm).is_err());
    }

    #[test]
    fn test_render_texture_resize_replaces_native() {
        let gpu = RecordingBackend::new();
        let mut target = RenderTexture::new(&gpu, "target", 8, 8).unwrap();
        let before = target.native().unwrap();

        assert!(!target.resize(&gpu, 8, 8).unwrap());
        assert!(target.resize(&gpu, 16, 4).unwrap());
        assert_ne!(target.native().unwrap(), before);
        assert_eq!(target.size(), [16, 4]);
        assert_eq!(gpu.live_objects().1, 1);

        target.cleanup(&gpu);
    }

    #[test]
    fn test_save_png() {
        let gpu = RecordingBackend::new();
        let mut target = RenderTexture::new(&gpu, "target", 2, 2).unwrap();
        target.upload(&gpu, &[255u8; 16]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        target.save_png(&gpu, &path).unwrap();
        assert!(path.exists());

        target.cleanup(&gpu);
    }
}
