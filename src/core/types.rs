//! Core re-exports

pub use glam::{IVec2, Mat4, UVec2, Vec2, Vec3};
