//! GPU uniform blocks for the grass kernels and their name → offset tables.
//!
//! Each pipeline component owns one uniform buffer. The Rust structs here
//! must match the WGSL structs in `shaders/` exactly; the field tables let a
//! [`ParamBinding`](super::binding::ParamBinding) resolve a parameter name to
//! a byte offset once, at initialization.

use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};

use crate::core::error::Error;

/// Semantic type of a device parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Float,
    Int,
    Float2,
    Int2,
}

impl ParamKind {
    /// Size in bytes of a value of this kind
    pub const fn size(self) -> u64 {
        match self {
            ParamKind::Float | ParamKind::Int => 4,
            ParamKind::Float2 | ParamKind::Int2 => 8,
        }
    }
}

/// One named member of a uniform block
#[derive(Clone, Copy, Debug)]
pub struct UniformField {
    pub name: &'static str,
    pub kind: ParamKind,
    pub offset: u64,
}

impl UniformField {
    const fn new(name: &'static str, kind: ParamKind, offset: usize) -> Self {
        Self { name, kind, offset: offset as u64 }
    }
}

/// Name → offset table for one uniform block
#[derive(Clone, Copy, Debug)]
pub struct UniformLayout {
    pub label: &'static str,
    pub size: u64,
    pub fields: &'static [UniformField],
}

impl UniformLayout {
    /// Look up a field, failing fast on names the block does not declare.
    pub fn field(&self, name: &str) -> Result<&UniformField, Error> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::UnknownParameter {
                name: format!("{}.{}", self.label, name),
            })
    }
}

/// Uniforms of the `uniform_grid_sampler` kernel (32 bytes).
/// Must match `GenerationParams` in grass_points.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct GenerationUniforms {
    pub grid_dimensions: [i32; 2],
    pub grid_world_size: [f32; 2],
    pub center_point: [f32; 2],
    pub density: f32,
    pub offset_multiplier: f32,
}

pub const GENERATION_LAYOUT: UniformLayout = UniformLayout {
    label: "generation",
    size: size_of::<GenerationUniforms>() as u64,
    fields: &[
        UniformField::new("grid_dimensions", ParamKind::Int2, offset_of!(GenerationUniforms, grid_dimensions)),
        UniformField::new("grid_world_size", ParamKind::Float2, offset_of!(GenerationUniforms, grid_world_size)),
        UniformField::new("center_point", ParamKind::Float2, offset_of!(GenerationUniforms, center_point)),
        UniformField::new("density", ParamKind::Float, offset_of!(GenerationUniforms, density)),
        UniformField::new("offset_multiplier", ParamKind::Float, offset_of!(GenerationUniforms, offset_multiplier)),
    ],
};

/// Uniforms of the `update_physical_model` kernel (64 bytes).
/// Must match `PhysicsParams` in grass_physics.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct PhysicsUniforms {
    pub world_pos: [f32; 2],
    pub texels_per_meter: [f32; 2],
    // -- 16 bytes --
    pub wind_direction: [f32; 2],
    pub movement_offset: [f32; 2],
    // -- 16 bytes --
    pub dt: f32,
    pub k: f32,
    pub damping: f32,
    pub wind_time: f32,
    // -- 16 bytes --
    pub wind_force: f32,
    pub impulse_force: f32,
    pub density: f32,
    pub wind_enabled: i32,
    // -- 16 bytes --
}

pub const PHYSICS_LAYOUT: UniformLayout = UniformLayout {
    label: "physics",
    size: size_of::<PhysicsUniforms>() as u64,
    fields: &[
        UniformField::new("world_pos", ParamKind::Float2, offset_of!(PhysicsUniforms, world_pos)),
        UniformField::new("texels_per_meter", ParamKind::Float2, offset_of!(PhysicsUniforms, texels_per_meter)),
        UniformField::new("wind_direction", ParamKind::Float2, offset_of!(PhysicsUniforms, wind_direction)),
        UniformField::new("movement_offset", ParamKind::Float2, offset_of!(PhysicsUniforms, movement_offset)),
        UniformField::new("dt", ParamKind::Float, offset_of!(PhysicsUniforms, dt)),
        UniformField::new("k", ParamKind::Float, offset_of!(PhysicsUniforms, k)),
        UniformField::new("damping", ParamKind::Float, offset_of!(PhysicsUniforms, damping)),
        UniformField::new("wind_time", ParamKind::Float, offset_of!(PhysicsUniforms, wind_time)),
        UniformField::new("wind_force", ParamKind::Float, offset_of!(PhysicsUniforms, wind_force)),
        UniformField::new("impulse_force", ParamKind::Float, offset_of!(PhysicsUniforms, impulse_force)),
        UniformField::new("density", ParamKind::Float, offset_of!(PhysicsUniforms, density)),
        UniformField::new("wind_enabled", ParamKind::Int, offset_of!(PhysicsUniforms, wind_enabled)),
    ],
};

/// Per-stamp-pass uniforms of impulse_stamp.wgsl (16 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct StampUniforms {
    pub field_size: [f32; 2],
    pub kernel_size: [f32; 2],
}

/// Uniforms of the blade draw program (96 bytes).
/// Must match `BladeParams` in grass_blades.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BladeUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub world_offset: [f32; 2],
    pub world_dimensions: [f32; 2],
    pub blade_length: f32,
    pub _pad: [f32; 3],
}

impl Default for BladeUniforms {
    fn default() -> Self {
        Self {
            view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            world_offset: [0.0; 2],
            world_dimensions: [10.0; 2],
            blade_length: 3.0,
            _pad: [0.0; 3],
        }
    }
}
