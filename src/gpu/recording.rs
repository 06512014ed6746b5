//! Headless backend
//!
//! Keeps buffer and texture contents in CPU memory and records every call in
//! submission order. Compute and draw calls are recorded, not executed.
//! Shader sources get a structural check (non-empty, balanced delimiters,
//! a `main` entry point) so compile failures can be exercised without a
//! device.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::backend::*;
use crate::error::{EngineError, EngineResult};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    CreateBuffer {
        buffer: NativeBuffer,
        label: String,
        size: u64,
        usage: BufferUsage,
    },
    WriteBuffer {
        buffer: NativeBuffer,
        offset: u64,
        len: usize,
    },
    DestroyBuffer(NativeBuffer),
    CreateTexture {
        texture: NativeTexture,
        desc: TextureDesc,
    },
    WriteTexture(NativeTexture),
    ClearTexture(NativeTexture),
    ReadTexture(NativeTexture),
    DestroyTexture(NativeTexture),
    CompileShader {
        shader: NativeShader,
        label: String,
        stage: ShaderStage,
    },
    DestroyShader(NativeShader),
    Dispatch {
        label: String,
        shader: NativeShader,
        groups: [u32; 3],
        bindings: Vec<Binding>,
    },
    Draw {
        label: String,
        vertex: NativeShader,
        fragment: NativeShader,
        target: NativeTexture,
        vertex_count: u32,
    },
}

#[derive(Default)]
struct RecordingState {
    next_id: u64,
    buffers: HashMap<u64, Vec<u8>>,
    textures: HashMap<u64, (TextureDesc, Vec<u8>)>,
    shaders: HashMap<u64, (String, ShaderStage)>,
    commands: Vec<GpuCommand>,
}

impl RecordingState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct RecordingBackend {
    state: Mutex<RecordingState>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call recorded so far
    pub fn commands(&self) -> Vec<GpuCommand> {
        self.state.lock().commands.clone()
    }

    /// Forget the recorded calls, keep the resources
    pub fn clear_commands(&self) {
        self.state.lock().commands.clear();
    }

    /// Recorded compute dispatches as (label, bindings)
    pub fn dispatches(&self) -> Vec<(String, Vec<Binding>)> {
        self.state
            .lock()
            .commands
            .iter()
            .filter_map(|command| match command {
                GpuCommand::Dispatch {
                    label, bindings, ..
                } => Some((label.clone(), bindings.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatches().len()
    }

    pub fn buffer_contents(&self, buffer: NativeBuffer) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&buffer.0).cloned()
    }

    pub fn texture_contents(&self, texture: NativeTexture) -> Option<Vec<u8>> {
        self.state
            .lock()
            .textures
            .get(&texture.0)
            .map(|(_, data)| data.clone())
    }

    /// Number of buffers, textures and shaders still alive
    pub fn live_objects(&self) -> (usize, usize, usize) {
        let state = self.state.lock();
        (state.buffers.len(), state.textures.len(), state.shaders.len())
    }

    fn record(&self, command: GpuCommand) {
        self.state.lock().commands.push(command);
    }
}

/// Structural check standing in for a real compiler
fn check_source(source: &str) -> Result<(), String> {
    if source.trim().is_empty() {
        return Err("empty source".to_string());
    }

    let mut stack = Vec::new();
    for (line_no, line) in source.lines().enumerate() {
        let code = line.split("//").next().unwrap_or("");
        for c in code.chars() {
            match c {
                '(' | '{' | '[' => stack.push(c),
                ')' | '}' | ']' => {
                    let expected = match c {
                        ')' => '(',
                        '}' => '{',
                        _ => '[',
                    };
                    if stack.pop() != Some(expected) {
                        return Err(format!("{}: unexpected '{}'", line_no + 1, c));
                    }
                }
                _ => {}
            }
        }
    }
    if let Some(open) = stack.pop() {
        return Err(format!("unclosed '{}'", open));
    }

    if !source.contains("fn main") {
        return Err("missing entry point 'main'".to_string());
    }
    Ok(())
}

impl GpuBackend for RecordingBackend {
    fn name(&self) -> String {
        "recording".to_string()
    }

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> EngineResult<NativeBuffer> {
        let mut state = self.state.lock();
        let buffer = NativeBuffer(state.next_id());
        state.buffers.insert(buffer.0, vec![0; desc.size as usize]);
        state.commands.push(GpuCommand::CreateBuffer {
            buffer,
            label: desc.label.to_string(),
            size: desc.size,
            usage: desc.usage,
        });
        Ok(buffer)
    }

    fn write_buffer(&self, buffer: NativeBuffer, offset: u64, data: &[u8]) -> EngineResult<()> {
        let mut state = self.state.lock();
        let contents = state
            .buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| EngineError::gpu("write_buffer", format!("unknown {:?}", buffer)))?;

        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            return Err(EngineError::BufferError(format!(
                "write of {} bytes at {} overflows {} byte buffer",
                data.len(),
                offset,
                contents.len()
            )));
        }
        contents[start..end].copy_from_slice(data);
        state.commands.push(GpuCommand::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn read_buffer(&self, buffer: NativeBuffer) -> EngineResult<Vec<u8>> {
        self.buffer_contents(buffer)
            .ok_or_else(|| EngineError::gpu("read_buffer", format!("unknown {:?}", buffer)))
    }

    fn destroy_buffer(&self, buffer: NativeBuffer) {
        let mut state = self.state.lock();
        state.buffers.remove(&buffer.0);
        state.commands.push(GpuCommand::DestroyBuffer(buffer));
    }

    fn create_texture(&self, desc: &TextureDesc) -> EngineResult<NativeTexture> {
        let mut state = self.state.lock();
        let texture = NativeTexture(state.next_id());
        state
            .textures
            .insert(texture.0, (desc.clone(), vec![0; desc.byte_size() as usize]));
        state.commands.push(GpuCommand::CreateTexture {
            texture,
            desc: desc.clone(),
        });
        Ok(texture)
    }

    fn write_texture(&self, texture: NativeTexture, data: &[u8]) -> EngineResult<()> {
        let mut state = self.state.lock();
        let (desc, contents) = state
            .textures
            .get_mut(&texture.0)
            .ok_or_else(|| EngineError::gpu("write_texture", format!("unknown {:?}", texture)))?;
        if data.len() as u64 != desc.byte_size() {
            return Err(EngineError::BufferError(format!(
                "texture '{}' expects {} bytes, got {}",
                desc.label,
                desc.byte_size(),
                data.len()
            )));
        }
        contents.copy_from_slice(data);
        state.commands.push(GpuCommand::WriteTexture(texture));
        Ok(())
    }

    fn read_texture(&self, texture: NativeTexture) -> EngineResult<Vec<u8>> {
        let data = self
            .texture_contents(texture)
            .ok_or_else(|| EngineError::gpu("read_texture", format!("unknown {:?}", texture)))?;
        self.record(GpuCommand::ReadTexture(texture));
        Ok(data)
    }

    fn clear_texture(&self, texture: NativeTexture) -> EngineResult<()> {
        let mut state = self.state.lock();
        let (_, contents) = state
            .textures
            .get_mut(&texture.0)
            .ok_or_else(|| EngineError::gpu("clear_texture", format!("unknown {:?}", texture)))?;
        contents.iter_mut().for_each(|byte| *byte = 0);
        state.commands.push(GpuCommand::ClearTexture(texture));
        Ok(())
    }

    fn destroy_texture(&self, texture: NativeTexture) {
        let mut state = self.state.lock();
        state.textures.remove(&texture.0);
        state.commands.push(GpuCommand::DestroyTexture(texture));
    }

    fn compile_shader(
        &self,
        label: &str,
        stage: ShaderStage,
        source: &str,
    ) -> EngineResult<NativeShader> {
        check_source(source).map_err(|error| EngineError::ShaderCompileFailed {
            name: label.to_string(),
            error,
        })?;

        let mut state = self.state.lock();
        let shader = NativeShader(state.next_id());
        state.shaders.insert(shader.0, (label.to_string(), stage));
        state.commands.push(GpuCommand::CompileShader {
            shader,
            label: label.to_string(),
            stage,
        });
        Ok(shader)
    }

    fn destroy_shader(&self, shader: NativeShader) {
        let mut state = self.state.lock();
        state.shaders.remove(&shader.0);
        state.commands.push(GpuCommand::DestroyShader(shader));
    }

    fn dispatch(&self, dispatch: &ComputeDispatch<'_>) -> EngineResult<()> {
        let mut state = self.state.lock();
        match state.shaders.get(&dispatch.shader.0) {
            Some((_, ShaderStage::Compute)) => {}
            Some((label, stage)) => {
                return Err(EngineError::gpu(
                    "dispatch",
                    format!("'{}' is a {:?} shader", label, stage),
                ))
            }
            None => {
                return Err(EngineError::gpu(
                    "dispatch",
                    format!("unknown {:?}", dispatch.shader),
                ))
            }
        }
        state.commands.push(GpuCommand::Dispatch {
            label: dispatch.label.to_string(),
            shader: dispatch.shader,
            groups: dispatch.groups,
            bindings: dispatch.bindings.to_vec(),
        });
        Ok(())
    }

    fn draw(&self, draw: &DrawCall<'_>) -> EngineResult<()> {
        let mut state = self.state.lock();
        if !state.textures.contains_key(&draw.target.0) {
            return Err(EngineError::gpu("draw", format!("unknown {:?}", draw.target)));
        }
        state.commands.push(GpuCommand::Draw {
            label: draw.label.to_string(),
            vertex: draw.vertex,
            fragment: draw.fragment,
            target: draw.target,
            vertex_count: draw.vertex_count,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_check_accepts_entry_point() {
        assert!(check_source("@compute @workgroup_size(8, 8, 8)\nfn main() {}").is_ok());
    }

    #[test]
    fn test_source_check_rejects_broken_sources() {
        assert!(check_source("").is_err());
        assert!(check_source("fn main( {").is_err());
        assert!(check_source("fn other() {}").is_err());
        // Delimiters inside comments are ignored
        assert!(check_source("fn main() {} // (").is_ok());
    }

    #[test]
    fn test_buffer_write_and_read() {
        let gpu = RecordingBackend::new();
        let buffer = gpu
            .create_buffer(&BufferDesc {
                label: "test",
                size: 8,
                usage: BufferUsage::Storage,
            })
            .unwrap();

        gpu.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(gpu.read_buffer(buffer).unwrap(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
        assert!(gpu.write_buffer(buffer, 6, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_dispatch_requires_compute_stage() {
        let gpu = RecordingBackend::new();
        let vertex = gpu
            .compile_shader("v", ShaderStage::Vertex, "fn main() {}")
            .unwrap();
        let result = gpu.dispatch(&ComputeDispatch {
            label: "bad",
            shader: vertex,
            bindings: &[],
            groups: [1, 1, 1],
        });
        assert!(result.is_err());
        assert_eq!(gpu.dispatch_count(), 0);
    }
}
