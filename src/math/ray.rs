//! Ray type and operations

use crate::core::types::{Mat4, Vec3};

/// A ray defined by origin and direction
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray (direction should be normalized)
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Build a world-space ray through a point in normalized device coordinates.
    ///
    /// `ndc` is in [-1, 1] with +y up; `view_proj_inv` is the inverse of the
    /// camera's view-projection matrix.
    pub fn from_ndc(ndc_x: f32, ndc_y: f32, view_proj_inv: &Mat4) -> Self {
        let near = view_proj_inv.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
        let far = view_proj_inv.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
        Self::new(near, (far - near).normalize())
    }

    /// Get point along ray at parameter t
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Intersect with the horizontal plane `y = height`.
    /// Returns the ray parameter of the hit, or None if parallel or behind.
    pub fn intersect_horizontal_plane(&self, height: f32) -> Option<f32> {
        if self.direction.y.abs() < 1e-6 {
            return None;
        }
        let t = (height - self.origin.y) / self.direction.y;
        (t >= 0.0).then_some(t)
    }
}
