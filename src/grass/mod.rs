//! GPU grass field.
//!
//! Blades are generated on the GPU every frame from a uniform grid, drawn
//! indirectly with the count the generator appended, and displaced by a
//! ping-pong height-field simulation that responds to wind and to impulses
//! stamped in from pointer interaction.
//!
//! Frame order (one encoder, one submit):
//! counter clear → sampler → count copy → impulse stamps → physics step →
//! forces clear. The draw reads the state current after the step.

pub mod binding;
pub mod config;
pub mod draw;
pub mod geometry;
pub mod impulse;
pub mod params;
pub mod physics;
pub mod pingpong;
pub mod points;
pub mod sampling;
pub mod tuning;

pub use config::GrassConfig;
pub use draw::{BladeRenderer, DrawResources};
pub use geometry::{PatchTransform, SimulationGeometry, TexelShift};
pub use impulse::ImpulseInjector;
pub use physics::HeightFieldSimulator;
pub use points::PointGenerator;
pub use tuning::TuningParams;

use glam::Vec2;

use crate::core::error::Error;

/// Summary of one simulated frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Time step actually applied (after the stability clamp)
    pub dt: f32,
    /// Parameter pushes issued this frame
    pub param_pushes: usize,
    /// Impulse stamps drawn this frame
    pub stamps: u32,
    /// Live blade count, when diagnostics readback is enabled
    pub point_count: Option<u32>,
}

/// Owns every GPU resource of one grass patch.
pub struct GrassSystem {
    config: GrassConfig,
    transform: PatchTransform,
    last_position: Vec2,
    shift: TexelShift,
    tuning: TuningParams,
    points: PointGenerator,
    physics: HeightFieldSimulator,
    impulses: ImpulseInjector,
    point_count: Option<u32>,
    frames: u64,
}

impl GrassSystem {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: GrassConfig,
        transform: PatchTransform,
    ) -> Result<Self, Error> {
        config.validate()?;
        let tuning = clamp_tuning(config.tuning);
        let geometry = SimulationGeometry::from_transform(&transform, config.unit_size, config.field());

        let points = PointGenerator::new(
            device,
            config.grid(),
            &geometry,
            &tuning,
            config.diagnostics.read_point_count,
        )?;
        let physics = HeightFieldSimulator::new(device, config.field(), &geometry, &tuning, config.wind_direction())?;
        let impulses = ImpulseInjector::new(
            device,
            queue,
            &config.impulse,
            config.field(),
            config.max_impulses_per_frame,
        )?;

        log::info!(
            "Grass system: {}x{} grid, {}x{} field, {:.1}x{:.1} m patch at ({:.1}, {:.1})",
            config.grid_size[0],
            config.grid_size[1],
            config.field_size[0],
            config.field_size[1],
            geometry.world_size.x,
            geometry.world_size.y,
            geometry.center.x,
            geometry.center.y,
        );

        Ok(Self {
            last_position: transform.planar_position(),
            shift: TexelShift::default(),
            config,
            transform,
            tuning,
            points,
            physics,
            impulses,
            point_count: None,
            frames: 0,
        })
    }

    /// Move or rescale the patch. The field follows at the next frame.
    pub fn set_transform(&mut self, transform: PatchTransform) {
        self.transform = transform;
    }

    pub fn transform(&self) -> &PatchTransform {
        &self.transform
    }

    /// Replace the tuning values, clamped to their tested ranges.
    /// Returns the values that will be applied.
    pub fn set_tuning(&mut self, tuning: TuningParams) -> TuningParams {
        self.tuning = clamp_tuning(tuning);
        self.tuning
    }

    pub fn tuning(&self) -> &TuningParams {
        &self.tuning
    }

    pub fn set_wind_direction(&mut self, direction: Vec2) {
        self.physics.set_wind_direction(direction.normalize_or_zero());
    }

    /// Pointer press on the patch: `hit` is the normalized coordinate from
    /// [`PatchTransform::raycast`]. A miss does nothing.
    /// Returns whether an impulse was queued.
    pub fn on_pointer_press(&mut self, hit: Option<Vec2>) -> bool {
        match hit {
            Some(uv) => {
                self.queue_impulse(uv);
                true
            }
            None => false,
        }
    }

    /// Queue an impulse stamp at normalized coordinate `uv` for the next frame.
    pub fn queue_impulse(&mut self, uv: Vec2) {
        self.impulses.queue_impulse(uv);
    }

    /// Simulate one frame: generate points, inject impulses, step physics.
    pub fn frame(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, dt: f32) -> Result<FrameStats, Error> {
        let geometry = self.geometry();
        let movement = self
            .shift
            .advance(geometry.center - self.last_position, geometry.texels_per_meter);
        self.last_position = geometry.center;

        self.points.update(&geometry, &self.tuning);
        let dt = self.physics.update(dt, &geometry, movement, &self.tuning);
        let param_pushes = self.points.apply_params(queue) + self.physics.apply_params(queue);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("grass_frame_encoder"),
        });
        self.points.encode(&mut encoder);
        let stamps = self.impulses.encode(queue, &mut encoder, self.physics.forces_view());
        self.physics.encode_step(&mut encoder);
        queue.submit(std::iter::once(encoder.finish()));

        self.point_count = self.points.read_count_blocking(device)?;
        self.frames += 1;

        log::debug!(
            "Grass frame {}: dt {:.4}, {} pushes, {} stamps, count {:?}",
            self.frames, dt, param_pushes, stamps, self.point_count
        );

        Ok(FrameStats {
            dt,
            param_pushes,
            stamps,
            point_count: self.point_count,
        })
    }

    /// Everything an external renderer binds to draw the current state.
    pub fn draw_resources(&self) -> DrawResources<'_> {
        DrawResources {
            points: self.points.point_buffer(),
            indirect: self.points.indirect_buffer(),
            displacement_slots: [self.physics.displacement_slot(0), self.physics.displacement_slot(1)],
            slot: self.physics.current_index(),
        }
    }

    /// Build the reference blade pipeline bound to this system's buffers,
    /// with the configured blade length.
    pub fn create_blade_renderer(&self, device: &wgpu::Device, target_format: wgpu::TextureFormat) -> BladeRenderer {
        BladeRenderer::new(device, target_format, &self.draw_resources(), self.config.blade_length)
    }

    /// Live blade count read after the last frame. None unless
    /// `diagnostics.read_point_count` is enabled.
    pub fn point_count(&self) -> Option<u32> {
        self.point_count
    }

    pub fn geometry(&self) -> SimulationGeometry {
        SimulationGeometry::from_transform(&self.transform, self.config.unit_size, self.config.field())
    }

    pub fn config(&self) -> &GrassConfig {
        &self.config
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn points(&self) -> &PointGenerator {
        &self.points
    }

    pub fn physics(&self) -> &HeightFieldSimulator {
        &self.physics
    }

    pub fn impulses(&self) -> &ImpulseInjector {
        &self.impulses
    }
}

fn clamp_tuning(mut tuning: TuningParams) -> TuningParams {
    for name in tuning.clamp_to_tested() {
        log::warn!("Tuning value `{}` outside its tested range, clamped", name);
    }
    tuning
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_tuning_keeps_valid_values() {
        let t = TuningParams::default();
        assert_eq!(clamp_tuning(t), t);
    }

    #[test]
    fn test_clamp_tuning_limits_values() {
        let t = clamp_tuning(TuningParams {
            wind_force: 80.0,
            offset_multiplier: -0.5,
            ..Default::default()
        });
        assert_eq!(t.wind_force, 50.0);
        assert_eq!(t.offset_multiplier, 0.0);
        assert!(t.wind_enabled);
    }
}
