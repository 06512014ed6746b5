//! Vertex-only meshes

use glam::Vec3;

use super::backend::{GpuBackend, VertexInput};
use super::buffer::Buffer;
use crate::error::EngineResult;
use crate::memory::GpuResource;

/// Non-indexed triangle list of `vec3<f32>` positions
#[derive(Debug)]
pub struct Mesh {
    vertices: Buffer,
    vertex_count: u32,
}

impl Mesh {
    pub fn new(gpu: &dyn GpuBackend, label: &str, positions: &[[f32; 3]]) -> EngineResult<Self> {
        let vertices = Buffer::vertices(gpu, label, positions)?;
        Ok(Self {
            vertices,
            vertex_count: positions.len() as u32,
        })
    }

    /// Axis aligned cube spanning `min..max`, wound counter-clockwise when
    /// seen from outside
    pub fn cube(gpu: &dyn GpuBackend, label: &str, min: Vec3, max: Vec3) -> EngineResult<Self> {
        Self::new(gpu, label, &cube_positions(min, max))
    }

    pub fn vertex_input(&self) -> EngineResult<VertexInput> {
        Ok(VertexInput {
            buffer: self.vertices.native()?,
            stride: std::mem::size_of::<[f32; 3]>() as u64,
        })
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

impl GpuResource for Mesh {
    fn cleanup(&mut self, gpu: &dyn GpuBackend) {
        self.vertices.cleanup(gpu);
    }
}

fn cube_positions(min: Vec3, max: Vec3) -> Vec<[f32; 3]> {
    let corner = |x: bool, y: bool, z: bool| {
        [
            if x { max.x } else { min.x },
            if y { max.y } else { min.y },
            if z { max.z } else { min.z },
        ]
    };

    // Each face as a quad of corner selectors, counter-clockwise from outside
    let faces: [[(bool, bool, bool); 4]; 6] = [
        [(true, false, false), (true, true, false), (true, true, true), (true, false, true)],
        [(false, false, true), (false, true, true), (false, true, false), (false, false, false)],
        [(false, true, false), (false, true, true), (true, true, true), (true, true, false)],
        [(false, false, true), (false, false, false), (true, false, false), (true, false, true)],
        [(false, false, true), (true, false, true), (true, true, true), (false, true, true)],
        [(true, false, false), (false, false, false), (false, true, false), (true, true, false)],
    ];

    let mut positions = Vec::with_capacity(36);
    for face in faces.iter() {
        let [a, b, c, d] = face.map(|(x, y, z)| corner(x, y, z));
        positions.extend_from_slice(&[a, b, c, a, c, d]);
    }
    positions
}
