//! GPU constants - Single source of truth for GPU/CPU shared constants
//!
//! The kernels include the generated `constants.wgsl`, so shape tags,
//! operation flags and workgroup sizes can only change here.

/// Shape kind tags stored in `ShapeRecord::kind`
pub mod shape_kind {
    pub const SPHERE: u32 = 0;
    pub const BOX: u32 = 1;
    pub const CONE: u32 = 2;
    pub const CYLINDER: u32 = 3;
    pub const PYRAMID: u32 = 4;
}

/// Boolean operation flags stored in `ShapeRecord::operation`
pub mod operation {
    pub const UNION: u32 = 1 << 0;
    pub const SUBTRACTION: u32 = 1 << 1;
    pub const SMOOTH: u32 = 1 << 2;
}

/// Shape alteration flags stored in `ShapeRecord::alteration`
pub mod alteration {
    pub const ELONGATED: u32 = 1 << 0;
    pub const ROUNDED: u32 = 1 << 1;
    pub const ONIONED: u32 = 1 << 2;
}

/// Sculpt modes passed to the sculpt kernel
pub mod sculpt_mode {
    pub const ADD: u32 = 0;
    pub const REMOVE: u32 = 1;
}

/// Edge length of the cubic brush mask grid
pub const BRUSH_MASK_SIZE: u32 = 64;

/// Workgroup edge of the 3D kernels (sculpt, scale, brush fill)
pub const VOLUME_GROUP_SIZE: u32 = 4;

/// Workgroup edge of the ray tracing kernel
pub const TRACE_GROUP_SIZE: u32 = 8;

/// Light slots in the ray tracing light buffer
pub const MAX_LIGHTS: u32 = 4;

/// Distance written into empty voxels
pub const EMPTY_DISTANCE: f32 = 1.0e4;

/// Name under which the generated constants can be included
pub const CONSTANTS_INCLUDE: &str = "constants.wgsl";

/// Generate WGSL constants file content
pub fn generate_wgsl_constants() -> String {
    format!(
        r#"// AUTO-GENERATED GPU CONSTANTS - DO NOT EDIT
// Generated from src/gpu/constants.rs

// Shape kinds
const SHAPE_SPHERE: u32 = {}u;
const SHAPE_BOX: u32 = {}u;
const SHAPE_CONE: u32 = {}u;
const SHAPE_CYLINDER: u32 = {}u;
const SHAPE_PYRAMID: u32 = {}u;

// Operation flags
const OP_UNION: u32 = {}u;
const OP_SUBTRACTION: u32 = {}u;
const OP_SMOOTH: u32 = {}u;

// Alteration flags
const ALT_ELONGATED: u32 = {}u;
const ALT_ROUNDED: u32 = {}u;
const ALT_ONIONED: u32 = {}u;

// Sculpt modes
const MODE_ADD: u32 = {}u;
const MODE_REMOVE: u32 = {}u;

const BRUSH_MASK_SIZE: u32 = {}u;
const MAX_LIGHTS: u32 = {}u;
const EMPTY_DISTANCE: f32 = {:.1};
"#,
        shape_kind::SPHERE,
        shape_kind::BOX,
        shape_kind::CONE,
        shape_kind::CYLINDER,
        shape_kind::PYRAMID,
        operation::UNION,
        operation::SUBTRACTION,
        operation::SMOOTH,
        alteration::ELONGATED,
        alteration::ROUNDED,
        alteration::ONIONED,
        sculpt_mode::ADD,
        sculpt_mode::REMOVE,
        BRUSH_MASK_SIZE,
        MAX_LIGHTS,
        EMPTY_DISTANCE,
    )
}
