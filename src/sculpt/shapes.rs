//! Brush shapes
//!
//! `ShapeBuilder` keeps an ordered list of primitive records and mirrors it
//! into a structured buffer the brush kernels read. The kernels apply the
//! records in insertion order, so a later subtraction carves into an
//! earlier union. The buffer is only recreated when the list outgrows it;
//! its capacity never shrinks.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::error::{EngineError, EngineResult};
use crate::gpu::constants::{alteration, operation, shape_kind};
use crate::gpu::{Binding, Buffer, GpuBackend};
use crate::memory::GpuResource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Sphere,
    Box,
    Cone,
    Cylinder,
    Pyramid,
}

impl ShapeKind {
    pub fn tag(&self) -> u32 {
        match self {
            ShapeKind::Sphere => shape_kind::SPHERE,
            ShapeKind::Box => shape_kind::BOX,
            ShapeKind::Cone => shape_kind::CONE,
            ShapeKind::Cylinder => shape_kind::CYLINDER,
            ShapeKind::Pyramid => shape_kind::PYRAMID,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            shape_kind::SPHERE => Some(ShapeKind::Sphere),
            shape_kind::BOX => Some(ShapeKind::Box),
            shape_kind::CONE => Some(ShapeKind::Cone),
            shape_kind::CYLINDER => Some(ShapeKind::Cylinder),
            shape_kind::PYRAMID => Some(ShapeKind::Pyramid),
            _ => None,
        }
    }
}

/// How a shape combines with the shapes before it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    Union,
    Subtraction,
    /// Union blended over `k` voxels
    SmoothUnion { k: f32 },
    SmoothSubtraction { k: f32 },
}

impl Operation {
    /// Flag bits and smooth factor
    fn encode(&self) -> (u32, f32) {
        match *self {
            Operation::Union => (operation::UNION, 0.0),
            Operation::Subtraction => (operation::SUBTRACTION, 0.0),
            Operation::SmoothUnion { k } => (operation::UNION | operation::SMOOTH, k),
            Operation::SmoothSubtraction { k } => (operation::SUBTRACTION | operation::SMOOTH, k),
        }
    }

    fn decode(flags: u32, smooth_factor: f32) -> Option<Self> {
        let smooth = flags & operation::SMOOTH != 0;
        match (flags & !operation::SMOOTH, smooth) {
            (operation::UNION, false) => Some(Operation::Union),
            (operation::SUBTRACTION, false) => Some(Operation::Subtraction),
            (operation::UNION, true) => Some(Operation::SmoothUnion { k: smooth_factor }),
            (operation::SUBTRACTION, true) => Some(Operation::SmoothSubtraction { k: smooth_factor }),
            _ => None,
        }
    }
}

/// Modifiers applied to a shape's distance field. Rounding and onioning
/// share `amount`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alteration {
    pub flags: u32,
    pub amount: f32,
    pub elongation: Vec3,
}

impl Alteration {
    pub const NONE: Self = Self {
        flags: 0,
        amount: 0.0,
        elongation: Vec3::ZERO,
    };

    pub fn elongated(elongation: Vec3) -> Self {
        Self::NONE.with_elongation(elongation)
    }

    pub fn rounded(radius: f32) -> Self {
        Self {
            flags: alteration::ROUNDED,
            amount: radius,
            elongation: Vec3::ZERO,
        }
    }

    pub fn onioned(thickness: f32) -> Self {
        Self {
            flags: alteration::ONIONED,
            amount: thickness,
            elongation: Vec3::ZERO,
        }
    }

    pub fn with_elongation(self, elongation: Vec3) -> Self {
        Self {
            flags: self.flags | alteration::ELONGATED,
            elongation,
            ..self
        }
    }

    pub fn is_elongated(&self) -> bool {
        self.flags & alteration::ELONGATED != 0
    }
}

impl Default for Alteration {
    fn default() -> Self {
        Self::NONE
    }
}

/// One shape as the kernels read it
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShapeRecord {
    pub centre: [f32; 3],
    pub kind: u32,
    /// Kind specific sizes, see the `add_*` methods
    pub params: [f32; 4],
    pub elongation: [f32; 3],
    pub operation: u32,
    pub alteration: u32,
    pub smooth_factor: f32,
    pub alteration_amount: f32,
    pub _padding: u32,
}

impl ShapeRecord {
    fn new(kind: ShapeKind, centre: Vec3, params: [f32; 4], op: Operation, alt: Alteration) -> Self {
        let (operation, smooth_factor) = op.encode();
        Self {
            centre: centre.to_array(),
            kind: kind.tag(),
            params,
            elongation: alt.elongation.to_array(),
            operation,
            alteration: alt.flags,
            smooth_factor,
            alteration_amount: alt.amount,
            _padding: 0,
        }
    }

    pub fn shape_kind(&self) -> Option<ShapeKind> {
        ShapeKind::from_tag(self.kind)
    }

    pub fn operation(&self) -> Option<Operation> {
        Operation::decode(self.operation, self.smooth_factor)
    }

    pub fn centre(&self) -> Vec3 {
        Vec3::from(self.centre)
    }
}

#[derive(Debug, Default)]
pub struct ShapeBuilder {
    records: Vec<ShapeRecord>,
    buffer: Option<Buffer>,
    dirty: bool,
}

impl ShapeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, record: ShapeRecord) -> &mut Self {
        self.records.push(record);
        self.dirty = true;
        self
    }

    pub fn add_sphere(&mut self, centre: Vec3, radius: f32, op: Operation, alt: Alteration) -> &mut Self {
        self.push(ShapeRecord::new(ShapeKind::Sphere, centre, [radius, 0.0, 0.0, 0.0], op, alt))
    }

    /// `half_extents` along each axis
    pub fn add_box(&mut self, centre: Vec3, half_extents: Vec3, op: Operation, alt: Alteration) -> &mut Self {
        let params = [half_extents.x, half_extents.y, half_extents.z, 0.0];
        self.push(ShapeRecord::new(ShapeKind::Box, centre, params, op, alt))
    }

    /// Cone with its tip at `centre` opening downwards; `angle` is the half
    /// angle in radians
    pub fn add_cone(&mut self, centre: Vec3, angle: f32, height: f32, op: Operation, alt: Alteration) -> &mut Self {
        let (sin, cos) = angle.sin_cos();
        self.push(ShapeRecord::new(ShapeKind::Cone, centre, [sin, cos, height, 0.0], op, alt))
    }

    /// Y aligned cylinder
    pub fn add_cylinder(&mut self, centre: Vec3, radius: f32, half_height: f32, op: Operation, alt: Alteration) -> &mut Self {
        self.push(ShapeRecord::new(ShapeKind::Cylinder, centre, [radius, half_height, 0.0, 0.0], op, alt))
    }

    /// Square based pyramid standing on `centre`
    pub fn add_pyramid(&mut self, centre: Vec3, half_base: f32, height: f32, op: Operation, alt: Alteration) -> &mut Self {
        self.push(ShapeRecord::new(ShapeKind::Pyramid, centre, [half_base, height, 0.0, 0.0], op, alt))
    }

    pub fn clear(&mut self) {
        if !self.records.is_empty() {
            self.records.clear();
            self.dirty = true;
        }
    }

    pub fn records(&self) -> &[ShapeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records changed since the last `bind`
    pub fn is_dirty(&self) -> bool {
        self.dirty || self.buffer.is_none()
    }

    /// Element capacity of the GPU buffer, 0 before the first `bind`
    pub fn capacity(&self) -> u64 {
        self.buffer.as_ref().map(Buffer::capacity).unwrap_or(0)
    }

    pub fn buffer(&self) -> Option<&Buffer> {
        self.buffer.as_ref()
    }

    /// Bring the GPU buffer up to date and bind it read-only at `slot`
    pub fn bind(&mut self, gpu: &dyn GpuBackend, slot: u32) -> EngineResult<Binding> {
        if self.is_dirty() {
            self.materialize(gpu)?;
        }
        match self.buffer.as_ref() {
            Some(buffer) => buffer.read_binding(slot),
            None => Err(EngineError::BufferError("shape buffer missing".to_string())),
        }
    }

    fn materialize(&mut self, gpu: &dyn GpuBackend) -> EngineResult<()> {
        let needed = self.records.len() as u64;

        if needed > self.capacity() || self.buffer.is_none() {
            let capacity = needed.max(1).next_power_of_two().max(self.capacity());
            let buffer = Buffer::structured::<ShapeRecord>(gpu, "brush shapes", capacity)?;
            if let Some(mut old) = self.buffer.replace(buffer) {
                old.cleanup(gpu);
            }
            log::debug!("[ShapeBuilder] Shape buffer grown to {} records", capacity);
        }

        if let Some(buffer) = self.buffer.as_ref() {
            if !self.records.is_empty() {
                buffer.write_slice(gpu, &self.records)?;
            }
        }
        self.dirty = false;
        Ok(())
    }

    /// Records currently in the GPU buffer, trimmed to the live count
    pub fn read_back(&self, gpu: &dyn GpuBackend) -> EngineResult<Vec<ShapeRecord>> {
        let Some(buffer) = self.buffer.as_ref() else {
            return Ok(Vec::new());
        };
        let mut records: Vec<ShapeRecord> = buffer.read(gpu)?;
        records.truncate(self.records.len());
        Ok(records)
    }

    pub fn cleanup(&mut self, gpu: &dyn GpuBackend) {
        if let Some(mut buffer) = self.buffer.take() {
            buffer.cleanup(gpu);
        }
    }
}
