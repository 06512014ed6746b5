//! Compiled shader programs
//!
//! A `Shader` is one compiled stage. Compute shaders carry the workgroup
//! size parsed from their source so callers can think in thread counts.
//! Recompiling swaps the native program in place; the old program is only
//! destroyed once the new one compiled.

use std::path::{Path, PathBuf};

use super::backend::*;
use crate::error::{EngineError, EngineResult};
use crate::memory::GpuResource;

#[derive(Debug)]
pub struct Shader {
    name: String,
    stage: ShaderStage,
    native: Option<NativeShader>,
    workgroup_size: [u32; 3],
    source_path: PathBuf,
}

impl Shader {
    /// Shader that has not been compiled yet. It owns no native program
    /// until the first successful `recompile`.
    pub fn pending(name: &str, stage: ShaderStage, source_path: &Path) -> Self {
        Self {
            name: name.to_string(),
            stage,
            native: None,
            workgroup_size: [1, 1, 1],
            source_path: source_path.to_path_buf(),
        }
    }

    /// Compile `source` for `stage`. `source_path` is kept for reloads and
    /// diagnostics only.
    pub fn compile(
        gpu: &dyn GpuBackend,
        name: &str,
        stage: ShaderStage,
        source_path: &Path,
        source: &str,
    ) -> EngineResult<Self> {
        let mut shader = Self::pending(name, stage, source_path);
        shader.recompile(gpu, source)?;
        Ok(shader)
    }

    /// Compile `source` and replace the current program with it. On failure
    /// the current program stays bound and untouched.
    pub fn recompile(&mut self, gpu: &dyn GpuBackend, source: &str) -> EngineResult<()> {
        let workgroup_size = workgroup_size_for(&self.name, self.stage, source)?;
        let native = gpu.compile_shader(&self.name, self.stage, source)?;

        if let Some(old) = self.native.replace(native) {
            gpu.destroy_shader(old);
        }
        self.workgroup_size = workgroup_size;

        log::debug!(
            "[Shader] Compiled '{}' ({:?}, workgroup {:?})",
            self.name,
            self.stage,
            workgroup_size
        );
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.native.is_some()
    }

    pub fn native(&self) -> EngineResult<NativeShader> {
        self.native.ok_or_else(|| EngineError::ResourceNotFound {
            resource_type: "shader program".to_string(),
            id: self.name.clone(),
        })
    }

    /// Dispatch `threads` invocations. Each thread count must be a multiple
    /// of the declared workgroup size.
    pub fn dispatch(
        &self,
        gpu: &dyn GpuBackend,
        bindings: &[Binding],
        threads: [u32; 3],
    ) -> EngineResult<()> {
        if self.stage != ShaderStage::Compute {
            return Err(EngineError::gpu(
                "dispatch",
                format!("'{}' is a {:?} shader", self.name, self.stage),
            ));
        }

        let groups = group_count(threads, self.workgroup_size).ok_or_else(|| {
            EngineError::gpu(
                "dispatch",
                format!(
                    "'{}': {:?} threads not divisible by workgroup {:?}",
                    self.name, threads, self.workgroup_size
                ),
            )
        })?;

        gpu.dispatch(&ComputeDispatch {
            label: &self.name,
            shader: self.native()?,
            bindings,
            groups,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn workgroup_size(&self) -> [u32; 3] {
        self.workgroup_size
    }
}

impl GpuResource for Shader {
    fn cleanup(&mut self, gpu: &dyn GpuBackend) {
        if let Some(native) = self.native.take() {
            gpu.destroy_shader(native);
        }
    }
}

fn workgroup_size_for(name: &str, stage: ShaderStage, source: &str) -> EngineResult<[u32; 3]> {
    if stage != ShaderStage::Compute {
        return Ok([1, 1, 1]);
    }
    parse_workgroup_size(source).ok_or_else(|| EngineError::ShaderCompileFailed {
        name: name.to_string(),
        error: "missing or malformed @workgroup_size".to_string(),
    })
}

/// Read the literal `@workgroup_size(x, y, z)` of a compute shader.
/// Omitted dimensions default to 1.
pub fn parse_workgroup_size(source: &str) -> Option<[u32; 3]> {
    const ATTRIBUTE: &str = "@workgroup_size(";

    let line = source
        .lines()
        .map(|line| line.split("//").next().unwrap_or(""))
        .find(|line| line.contains(ATTRIBUTE))?;
    let start = line.find(ATTRIBUTE)? + ATTRIBUTE.len();
    let end = start + line[start..].find(')')?;

    let mut size = [1u32; 3];
    let parts: Vec<&str> = line[start..end]
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    for (dim, part) in parts.iter().enumerate() {
        let value: u32 = part
            .trim_end_matches(|c: char| c == 'u' || c == 'i')
            .parse()
            .ok()?;
        if value == 0 {
            return None;
        }
        size[dim] = value;
    }
    Some(size)
}

/// Workgroup counts for `threads`, or `None` when a dimension does not
/// divide evenly
pub fn group_count(threads: [u32; 3], workgroup: [u32; 3]) -> Option<[u32; 3]> {
    let mut groups = [0u32; 3];
    for dim in 0..3 {
        if workgroup[dim] == 0 || threads[dim] % workgroup[dim] != 0 {
            return None;
        }
        groups[dim] = threads[dim] / workgroup[dim];
    }
    Some(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCommand, RecordingBackend};

    const KERNEL: &str = "@compute @workgroup_size(4, 4, 4)\nfn main() {}\n";

    #[test]
    fn test_parse_workgroup_size() {
        assert_eq!(parse_workgroup_size(KERNEL), Some([4, 4, 4]));
        assert_eq!(
            parse_workgroup_size("@compute @workgroup_size(8u, 8u)\nfn main() {}"),
            Some([8, 8, 1])
        );
        assert_eq!(
            parse_workgroup_size("// @workgroup_size(2)\n@workgroup_size(16)\nfn main() {}"),
            Some([16, 1, 1])
        );
        assert_eq!(parse_workgroup_size("fn main() {}"), None);
        assert_eq!(parse_workgroup_size("@workgroup_size(SIZE)"), None);
    }

    #[test]
    fn test_group_count_rejects_remainders() {
        assert_eq!(group_count([64, 64, 64], [4, 4, 4]), Some([16, 16, 16]));
        assert_eq!(group_count([10, 8, 1], [4, 4, 1]), None);
    }

    #[test]
    fn test_dispatch_divides_threads() {
        let gpu = RecordingBackend::new();
        let mut shader =
            Shader::compile(&gpu, "sculpt", ShaderStage::Compute, Path::new("sculpt.comp.wgsl"), KERNEL)
                .unwrap();

        shader.dispatch(&gpu, &[], [64, 32, 16]).unwrap();
        assert!(shader.dispatch(&gpu, &[], [63, 32, 16]).is_err());

        let groups: Vec<[u32; 3]> = gpu
            .commands()
            .into_iter()
            .filter_map(|command| match command {
                GpuCommand::Dispatch { groups, .. } => Some(groups),
                _ => None,
            })
            .collect();
        assert_eq!(groups, vec![[16, 8, 4]]);

        shader.cleanup(&gpu);
    }

    #[test]
    fn test_failed_recompile_keeps_program() {
        let gpu = RecordingBackend::new();
        let mut shader =
            Shader::compile(&gpu, "sculpt", ShaderStage::Compute, Path::new("sculpt.comp.wgsl"), KERNEL)
                .unwrap();
        let before = shader.native().unwrap();

        assert!(shader.recompile(&gpu, "@workgroup_size(4, 4, 4)\nfn main( {").is_err());
        assert_eq!(shader.native().unwrap(), before);

        shader
            .recompile(&gpu, "@compute @workgroup_size(8, 8, 1)\nfn main() {}")
            .unwrap();
        assert_ne!(shader.native().unwrap(), before);
        assert_eq!(shader.workgroup_size(), [8, 8, 1]);
        assert_eq!(gpu.live_objects().2, 1);

        shader.cleanup(&gpu);
    }

    #[test]
    fn test_vertex_shader_cannot_dispatch() {
        let gpu = RecordingBackend::new();
        let mut shader = Shader::compile(
            &gpu,
            "raymarch",
            ShaderStage::Vertex,
            Path::new("raymarch.vert.wgsl"),
            "@vertex\nfn main() {}",
        )
        .unwrap();
        assert!(shader.dispatch(&gpu, &[], [1, 1, 1]).is_err());
        shader.cleanup(&gpu);
    }
}
