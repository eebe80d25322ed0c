//! Change-tracked device parameter bindings.
//!
//! A [`ParamBinding`] caches one named uniform value on the host and only
//! writes it to the device when it changed since the last push. Equality is
//! exact (bit pattern), not epsilon-based: the point is to skip redundant
//! uploads, not to smooth values.

use bytemuck::Pod;
use glam::{IVec2, Vec2};

use crate::core::error::Error;
use super::params::{ParamKind, UniformLayout};

/// Host-side value type that maps to a [`ParamKind`]
pub trait ParamValue: Copy + Pod + std::fmt::Debug {
    const KIND: ParamKind;
}

impl ParamValue for f32 {
    const KIND: ParamKind = ParamKind::Float;
}

impl ParamValue for i32 {
    const KIND: ParamKind = ParamKind::Int;
}

impl ParamValue for Vec2 {
    const KIND: ParamKind = ParamKind::Float2;
}

impl ParamValue for IVec2 {
    const KIND: ParamKind = ParamKind::Int2;
}

/// Destination for parameter pushes
pub trait ParamSink {
    /// Write `bytes` at byte `offset` of the parameter block.
    /// `name` is the bound parameter name, for tracing.
    fn write_param(&mut self, name: &str, offset: u64, bytes: &[u8]);
}

/// Writes parameters straight into a uniform buffer through the queue.
pub struct UniformWriter<'a> {
    pub queue: &'a wgpu::Queue,
    pub buffer: &'a wgpu::Buffer,
}

impl ParamSink for UniformWriter<'_> {
    fn write_param(&mut self, name: &str, offset: u64, bytes: &[u8]) {
        log::trace!("push {name} @{offset}");
        self.queue.write_buffer(self.buffer, offset, bytes);
    }
}

/// One change-tracked uniform value bound to a named field of a block
#[derive(Debug)]
pub struct ParamBinding<T: ParamValue> {
    name: &'static str,
    offset: u64,
    value: T,
    dirty: bool,
}

impl<T: ParamValue> ParamBinding<T> {
    /// Bind `name` in `layout`. Starts dirty so the first `apply` uploads
    /// the default value.
    pub fn new(layout: &UniformLayout, name: &'static str, value: T) -> Result<Self, Error> {
        let field = layout.field(name)?;
        if field.kind != T::KIND {
            return Err(Error::ParameterKind {
                name: name.to_string(),
                expected: T::KIND,
                found: field.kind,
            });
        }
        Ok(Self {
            name,
            offset: field.offset,
            value,
            dirty: true,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self) -> T {
        self.value
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Update the cached value; marks dirty only if it actually changed.
    pub fn set(&mut self, value: T) {
        if bytemuck::bytes_of(&value) != bytemuck::bytes_of(&self.value) {
            self.value = value;
            self.dirty = true;
        }
    }

    /// Push the cached value if dirty. Returns whether a push happened.
    pub fn apply(&mut self, sink: &mut impl ParamSink) -> bool {
        if !self.dirty {
            return false;
        }
        sink.write_param(self.name, self.offset, bytemuck::bytes_of(&self.value));
        self.dirty = false;
        true
    }
}

impl ParamBinding<f32> {
    /// Accumulate into the cached value (e.g. wind time).
    pub fn add(&mut self, delta: f32) {
        self.set(self.value + delta);
    }
}

/// Sink that records pushes instead of touching a device.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub writes: Vec<(String, u64, Vec<u8>)>,
}

impl RecordingSink {
    pub fn push_count(&self, name: &str) -> usize {
        self.writes.iter().filter(|(n, _, _)| n == name).count()
    }
}

impl ParamSink for RecordingSink {
    fn write_param(&mut self, name: &str, offset: u64, bytes: &[u8]) {
        self.writes.push((name.to_string(), offset, bytes.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grass::params::{GENERATION_LAYOUT, PHYSICS_LAYOUT};

    fn applied<T: ParamValue>(name: &'static str, value: T) -> (ParamBinding<T>, RecordingSink) {
        let layout = if GENERATION_LAYOUT.field(name).is_ok() { GENERATION_LAYOUT } else { PHYSICS_LAYOUT };
        let mut binding = ParamBinding::new(&layout, name, value).unwrap();
        let mut sink = RecordingSink::default();
        assert!(binding.apply(&mut sink));
        (binding, sink)
    }

    #[test]
    fn test_starts_dirty() {
        let binding = ParamBinding::new(&PHYSICS_LAYOUT, "k", 144.0f32).unwrap();
        assert!(binding.is_dirty());
    }

    #[test]
    fn test_set_apply_apply_pushes_once() {
        let (mut density, _) = applied("density", 0.15f32);
        let (mut enabled, _) = applied("wind_enabled", 1i32);
        let (mut dir, _) = applied("wind_direction", Vec2::ONE.normalize());
        let (mut dims, _) = applied("grid_dimensions", IVec2::new(1024, 1024));

        let mut sink = RecordingSink::default();
        density.set(0.5);
        enabled.set(0);
        dir.set(Vec2::X);
        dims.set(IVec2::new(512, 256));
        for _ in 0..2 {
            density.apply(&mut sink);
            enabled.apply(&mut sink);
            dir.apply(&mut sink);
            dims.apply(&mut sink);
        }

        assert_eq!(sink.push_count("density"), 1);
        assert_eq!(sink.push_count("wind_enabled"), 1);
        assert_eq!(sink.push_count("wind_direction"), 1);
        assert_eq!(sink.push_count("grid_dimensions"), 1);
    }

    #[test]
    fn test_unchanged_set_stays_clean() {
        for v in [0.0f32, -1.0, f32::MAX, f32::MIN, f32::MIN_POSITIVE, f32::INFINITY] {
            let (mut b, _) = applied("dt", v);
            b.set(v);
            assert!(!b.is_dirty(), "{v}");
        }
        for v in [0i32, -1, i32::MAX, i32::MIN] {
            let (mut b, _) = applied("wind_enabled", v);
            b.set(v);
            assert!(!b.is_dirty(), "{v}");
        }
        for v in [Vec2::ZERO, Vec2::splat(-3.5), Vec2::splat(f32::MAX)] {
            let (mut b, _) = applied("movement_offset", v);
            b.set(v);
            assert!(!b.is_dirty(), "{v}");
        }
        for v in [IVec2::ZERO, IVec2::splat(-7), IVec2::new(i32::MAX, i32::MIN)] {
            let (mut b, _) = applied("grid_dimensions", v);
            b.set(v);
            assert!(!b.is_dirty(), "{v}");
        }
    }

    #[test]
    fn test_nan_with_same_bits_is_not_a_change() {
        let (mut b, _) = applied("wind_time", f32::NAN);
        b.set(f32::NAN);
        assert!(!b.is_dirty());
    }

    #[test]
    fn test_signed_zero_is_a_change() {
        let (mut b, _) = applied("k", 0.0f32);
        b.set(-0.0);
        assert!(b.is_dirty());
    }

    #[test]
    fn test_set_never_pushes() {
        let (mut b, mut sink) = applied("damping", 16.0f32);
        b.set(20.0);
        b.set(21.0);
        assert_eq!(sink.writes.len(), 1);
        b.apply(&mut sink);
        assert_eq!(sink.writes.len(), 2);
        assert_eq!(sink.writes[1].2, 21.0f32.to_ne_bytes().to_vec());
    }

    #[test]
    fn test_push_targets_field_offset() {
        let (_, sink) = applied("wind_enabled", 1i32);
        assert_eq!(sink.writes[0].1, 60);
        assert_eq!(sink.writes[0].2.len(), 4);
    }

    #[test]
    fn test_add_accumulates() {
        let (mut t, _) = applied("wind_time", 0.0f32);
        t.add(0.5);
        t.add(0.25);
        assert_eq!(t.get(), 0.75);
        assert!(t.is_dirty());
    }

    #[test]
    fn test_unknown_name_fails_fast() {
        let err = ParamBinding::new(&PHYSICS_LAYOUT, "stiffness", 1.0f32).unwrap_err();
        assert!(matches!(err, Error::UnknownParameter { .. }));
    }

    #[test]
    fn test_kind_mismatch_fails_fast() {
        let err = ParamBinding::new(&GENERATION_LAYOUT, "grid_dimensions", Vec2::ONE).unwrap_err();
        assert!(matches!(
            err,
            Error::ParameterKind { expected: ParamKind::Float2, found: ParamKind::Int2, .. }
        ));
    }
}
