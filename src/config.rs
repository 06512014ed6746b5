//! Sculptor configuration
//!
//! Loaded from a TOML file (`sculpt.toml` by default). Every section and
//! field has a default, so a partial file is fine. The configuration is
//! passed by reference to the components that need it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::gpu::constants::{TRACE_GROUP_SIZE, VOLUME_GROUP_SIZE};
use crate::hot_reload::HotReloadConfig;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "sculpt.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Radians of orbit per pixel of mouse movement
    pub sensitivity: f32,
    /// Fraction of the distance per scroll step
    pub zoom_speed: f32,
    pub fov_degrees: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.005,
            zoom_speed: 0.1,
            fov_degrees: 45.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub vsync: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Voxels per edge of the cubic volume
    pub size: u32,
    /// World space box the volume is mapped onto
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            size: 256,
            bounds_min: [-1.0; 3],
            bounds_max: [1.0; 3],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub dir: PathBuf,
    pub hot_reload: bool,
    pub debounce_ms: u64,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("shaders"),
            hot_reload: true,
            debounce_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// Seconds between autosaves; 0 disables autosave
    pub autosave_secs: f32,
    /// Voxels per edge written to disk
    pub quality: u32,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            autosave_secs: 300.0,
            quality: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RayTraceConfig {
    pub max_steps: u32,
    pub max_bounces: u32,
    pub max_rays_per_pixel: u32,
    pub max_trace_distance: f32,
    /// Pixels per tile edge
    pub tile_size: u32,
}

impl Default for RayTraceConfig {
    fn default() -> Self {
        Self {
            max_steps: 256,
            max_bounces: 4,
            max_rays_per_pixel: 1,
            max_trace_distance: 8.0,
            tile_size: 128,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SculptConfig {
    pub camera: CameraConfig,
    pub display: DisplayConfig,
    pub volume: VolumeConfig,
    pub shaders: ShaderConfig,
    pub save: SaveConfig,
    pub raytrace: RayTraceConfig,
}

impl SculptConfig {
    /// Read and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let config = Self::from_toml(&text)?;
        log::debug!("[Config] Loaded {}", path.display());
        Ok(config)
    }

    /// `load`, or the defaults when the file does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("[Config] {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml(text: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> EngineResult<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::InvalidConfig(e.to_string()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_toml()?).map_err(|e| EngineError::io(path, e))
    }

    pub fn validate(&self) -> EngineResult<()> {
        let invalid = |message: String| Err(EngineError::InvalidConfig(message));

        let size = self.volume.size;
        if size == 0 || size % VOLUME_GROUP_SIZE != 0 {
            return invalid(format!(
                "volume.size {} must be a non-zero multiple of {}",
                size, VOLUME_GROUP_SIZE
            ));
        }

        let quality = self.save.quality;
        if quality == 0 || quality % VOLUME_GROUP_SIZE != 0 {
            return invalid(format!(
                "save.quality {} must be a non-zero multiple of {}",
                quality, VOLUME_GROUP_SIZE
            ));
        }

        let tile = self.raytrace.tile_size;
        if tile == 0 || tile % TRACE_GROUP_SIZE != 0 {
            return invalid(format!(
                "raytrace.tile_size {} must be a non-zero multiple of {}",
                tile, TRACE_GROUP_SIZE
            ));
        }

        let (min, max) = (self.volume.bounds_min, self.volume.bounds_max);
        if (0..3).any(|axis| min[axis] >= max[axis]) {
            return invalid(format!("volume bounds {:?}..{:?} are empty", min, max));
        }

        if self.camera.sensitivity <= 0.0 {
            return invalid("camera.sensitivity must be positive".to_string());
        }
        if self.save.autosave_secs < 0.0 {
            return invalid("save.autosave_secs must not be negative".to_string());
        }
        if self.raytrace.max_rays_per_pixel == 0 {
            return invalid("raytrace.max_rays_per_pixel must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn hot_reload(&self) -> HotReloadConfig {
        HotReloadConfig {
            shader_dir: self.shaders.dir.clone(),
            shader_reload: self.shaders.hot_reload,
            config_reload: self.shaders.hot_reload,
            debounce_ms: self.shaders.debounce_ms,
        }
    }
}
