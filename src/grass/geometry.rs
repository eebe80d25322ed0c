//! Patch placement: host transform → world/texel scale factors.

use glam::{UVec2, Vec2, Vec3};

use crate::math::Ray;

/// World transform of the simulated patch (y up, patch lies in xz).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatchTransform {
    pub position: Vec3,
    pub scale: Vec3,
}

impl Default for PatchTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl PatchTransform {
    /// Planar (x, z) position
    pub fn planar_position(&self) -> Vec2 {
        Vec2::new(self.position.x, self.position.z)
    }

    /// Cast a ray against the patch plane.
    ///
    /// Returns the normalized hit coordinate in [0,1]² (u along +x, v along
    /// +z), or None if the ray misses the patch.
    pub fn raycast(&self, ray: &Ray, unit_size: f32) -> Option<Vec2> {
        let t = ray.intersect_horizontal_plane(self.position.y)?;
        let hit = ray.at(t);
        let size = Vec2::new(self.scale.x, self.scale.z) * unit_size;
        let uv = (Vec2::new(hit.x, hit.z) - self.planar_position()) / size + Vec2::splat(0.5);
        let inside = (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y);
        inside.then_some(uv)
    }
}

/// Derived placement of the grid and field in world space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationGeometry {
    /// Patch centre (x, z)
    pub center: Vec2,
    /// Patch extent in metres (x, z)
    pub world_size: Vec2,
    /// Field texels per metre (x, z)
    pub texels_per_meter: Vec2,
}

impl SimulationGeometry {
    pub fn from_transform(transform: &PatchTransform, unit_size: f32, field_size: UVec2) -> Self {
        let world_size = Vec2::new(transform.scale.x, transform.scale.z) * unit_size;
        Self {
            center: transform.planar_position(),
            world_size,
            texels_per_meter: field_size.as_vec2() / world_size,
        }
    }

    /// Field-texel position of a normalized coordinate
    pub fn uv_to_texel(uv: Vec2, field_size: UVec2) -> Vec2 {
        uv * field_size.as_vec2()
    }
}

/// Splits patch movement into whole field texels.
///
/// The field can only shift by whole texels, so the fractional part of each
/// frame's movement is carried into the next one.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TexelShift {
    remainder: Vec2,
}

impl TexelShift {
    /// Movement to push this frame, in metres, snapped to whole texels.
    pub fn advance(&mut self, movement: Vec2, texels_per_meter: Vec2) -> Vec2 {
        let texels = movement * texels_per_meter + self.remainder;
        let whole = texels.round();
        self.remainder = texels - whole;
        whole / texels_per_meter
    }

    /// Carried fraction, in texels
    pub fn remainder(&self) -> Vec2 {
        self.remainder
    }
}
