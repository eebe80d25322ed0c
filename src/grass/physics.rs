//! Ping-pong height-field integrator.
//!
//! Displacement and velocity each live in two `Rgba16Float` textures; the
//! external forces field is a single render-target texture. One dispatch of
//! `update_physical_model` reads the current slots plus the forces and writes
//! the next slots; the host then swaps roles and clears the forces field.

use glam::{UVec2, Vec2};

use crate::core::error::Error;
use super::binding::{ParamBinding, UniformWriter};
use super::geometry::SimulationGeometry;
use super::impulse::FORCE_FORMAT;
use super::params::{PhysicsUniforms, PHYSICS_LAYOUT};
use super::pingpong::PingPong;
use super::tuning::TuningParams;

/// Format of the displacement and velocity fields
pub const FIELD_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Workgroup of `update_physical_model`; must match grass_physics.wgsl
pub const PHYSICS_WORKGROUP_SIZE: (u32, u32) = (8, 8);

/// Largest dt the semi-implicit integrator tolerates for these coefficients.
///
/// Per texel mode the step `v += (-w² d - c v) dt; d += v dt` has
/// characteristic polynomial `λ² - (2 - c dt - w² dt²) λ + (1 - c dt)`.
/// Both roots stay inside the unit circle while `c dt < 2` and
/// `w² dt² + 2 c dt < 4`; the second bound is the tighter one. The stiffest
/// mode of `k * (lap/4 - d)` on the texel grid has `w² = 3k`. A 0.9 margin is
/// kept below the root of the quadratic.
pub fn max_stable_time_step(k: f32, damping: f32) -> f32 {
    let w2 = 3.0 * k.max(0.0);
    let c = damping.max(0.0);
    // 4 / (c + sqrt(c² + 4w²)) is the positive root without cancellation
    0.9 * 4.0 / (c + (c * c + 4.0 * w2).sqrt())
}

/// One simulated field: two slots plus the views bound for reading/writing
struct FieldSlot {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

fn create_field(device: &wgpu::Device, label: &str, size: UVec2, usage: wgpu::TextureUsages) -> FieldSlot {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FIELD_FORMAT,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    FieldSlot { texture, view }
}

/// Height-field physics pipeline
pub struct HeightFieldSimulator {
    pipeline: wgpu::ComputePipeline,
    params_bind_group: wgpu::BindGroup,
    /// Field bind group per parity: `[i]` reads slot i and writes slot 1-i
    field_bind_groups: [wgpu::BindGroup; 2],
    uniforms_buffer: wgpu::Buffer,
    displacement: PingPong<FieldSlot>,
    velocity: PingPong<FieldSlot>,
    forces: FieldSlot,
    size: UVec2,
    steps: u64,

    dt: ParamBinding<f32>,
    k: ParamBinding<f32>,
    damping: ParamBinding<f32>,
    wind_direction: ParamBinding<Vec2>,
    wind_time: ParamBinding<f32>,
    wind_force: ParamBinding<f32>,
    impulse_force: ParamBinding<f32>,
    density: ParamBinding<f32>,
    movement_offset: ParamBinding<Vec2>,
    world_pos: ParamBinding<Vec2>,
    texels_per_meter: ParamBinding<Vec2>,
    wind_enabled: ParamBinding<i32>,
}

impl HeightFieldSimulator {
    pub fn new(
        device: &wgpu::Device,
        size: UVec2,
        geometry: &SimulationGeometry,
        tuning: &TuningParams,
        wind_direction: Vec2,
    ) -> Result<Self, Error> {
        let max_dim = device.limits().max_texture_dimension_2d;
        if size.x > max_dim || size.y > max_dim {
            return Err(Error::Resource(format!(
                "field {}x{} exceeds max texture dimension {}",
                size.x, size.y, max_dim
            )));
        }

        let dt = ParamBinding::new(&PHYSICS_LAYOUT, "dt", 0.0)?;
        let k = ParamBinding::new(&PHYSICS_LAYOUT, "k", tuning.k)?;
        let damping = ParamBinding::new(&PHYSICS_LAYOUT, "damping", tuning.damping)?;
        let wind_direction = ParamBinding::new(&PHYSICS_LAYOUT, "wind_direction", wind_direction)?;
        let wind_time = ParamBinding::new(&PHYSICS_LAYOUT, "wind_time", 0.0)?;
        let wind_force = ParamBinding::new(&PHYSICS_LAYOUT, "wind_force", tuning.wind_force)?;
        let impulse_force = ParamBinding::new(&PHYSICS_LAYOUT, "impulse_force", tuning.impulse_force)?;
        let density = ParamBinding::new(&PHYSICS_LAYOUT, "density", tuning.density)?;
        let movement_offset = ParamBinding::new(&PHYSICS_LAYOUT, "movement_offset", Vec2::ZERO)?;
        let world_pos = ParamBinding::new(&PHYSICS_LAYOUT, "world_pos", geometry.center)?;
        let texels_per_meter =
            ParamBinding::new(&PHYSICS_LAYOUT, "texels_per_meter", geometry.texels_per_meter)?;
        let wind_enabled = ParamBinding::new(&PHYSICS_LAYOUT, "wind_enabled", i32::from(tuning.wind_enabled))?;

        let field_usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::COPY_SRC;
        let displacement = PingPong::new(
            create_field(device, "grass_displacement_0", size, field_usage),
            create_field(device, "grass_displacement_1", size, field_usage),
        );
        let velocity = PingPong::new(
            create_field(device, "grass_velocity_0", size, field_usage),
            create_field(device, "grass_velocity_1", size, field_usage),
        );
        let forces = create_field(
            device,
            "grass_external_forces",
            size,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC,
        );
        debug_assert_eq!(FORCE_FORMAT, FIELD_FORMAT);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grass_physics_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/grass_physics.wgsl").into()),
        });

        let uniforms_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_physics_uniforms"),
            size: std::mem::size_of::<PhysicsUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Bind group 0: physics params
        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_physics_params_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_physics_params_bind_group"),
            layout: &params_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms_buffer.as_entire_binding(),
            }],
        });

        // Bind group 1: displacement/velocity in, forces in, displacement/velocity out
        let sampled = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let storage = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: FIELD_FORMAT,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        };
        let fields_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_physics_fields_layout"),
            entries: &[sampled(0), sampled(1), sampled(2), storage(3), storage(4)],
        });

        let field_bind_group = |read: usize, label: &str| {
            let write = 1 - read;
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &fields_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&displacement.get(read).view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&velocity.get(read).view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&forces.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&displacement.get(write).view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(&velocity.get(write).view),
                    },
                ],
            })
        };
        let field_bind_groups = [
            field_bind_group(0, "grass_physics_fields_0_to_1"),
            field_bind_group(1, "grass_physics_fields_1_to_0"),
        ];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grass_physics_pipeline_layout"),
            bind_group_layouts: &[&params_layout, &fields_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("grass_physics_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("update_physical_model"),
            compilation_options: Default::default(),
            cache: None,
        });

        log::info!(
            "Height field: {}x{} texels, {:.1} texels/m",
            size.x, size.y, geometry.texels_per_meter.x
        );

        Ok(Self {
            pipeline,
            params_bind_group,
            field_bind_groups,
            uniforms_buffer,
            displacement,
            velocity,
            forces,
            size,
            steps: 0,
            dt,
            k,
            damping,
            wind_direction,
            wind_time,
            wind_force,
            impulse_force,
            density,
            movement_offset,
            world_pos,
            texels_per_meter,
            wind_enabled,
        })
    }

    /// Stage this frame's physics parameters.
    ///
    /// `dt` is clamped to [`max_stable_time_step`]; the applied value is
    /// returned. Wind time accumulates the applied dt.
    pub fn update(
        &mut self,
        dt: f32,
        geometry: &SimulationGeometry,
        movement: Vec2,
        tuning: &TuningParams,
    ) -> f32 {
        let limit = max_stable_time_step(tuning.k, tuning.damping);
        let dt = if dt > limit {
            log::debug!("Clamping dt {:.4} to stability limit {:.4}", dt, limit);
            limit
        } else {
            dt.max(0.0)
        };

        self.dt.set(dt);
        self.wind_time.add(dt);
        self.k.set(tuning.k);
        self.damping.set(tuning.damping);
        self.wind_force.set(tuning.wind_force);
        self.impulse_force.set(tuning.impulse_force);
        self.density.set(tuning.density);
        self.wind_enabled.set(i32::from(tuning.wind_enabled));
        self.movement_offset.set(movement);
        self.world_pos.set(geometry.center);
        self.texels_per_meter.set(geometry.texels_per_meter);
        dt
    }

    pub fn set_wind_direction(&mut self, direction: Vec2) {
        self.wind_direction.set(direction);
    }

    /// Push changed physics parameters. Returns the number of pushes.
    pub fn apply_params(&mut self, queue: &wgpu::Queue) -> usize {
        let mut sink = UniformWriter {
            queue,
            buffer: &self.uniforms_buffer,
        };
        [
            self.world_pos.apply(&mut sink),
            self.movement_offset.apply(&mut sink),
            self.wind_time.apply(&mut sink),
            self.damping.apply(&mut sink),
            self.wind_force.apply(&mut sink),
            self.impulse_force.apply(&mut sink),
            self.k.apply(&mut sink),
            self.wind_direction.apply(&mut sink),
            self.density.apply(&mut sink),
            self.dt.apply(&mut sink),
            self.texels_per_meter.apply(&mut sink),
            self.wind_enabled.apply(&mut sink),
        ]
        .into_iter()
        .filter(|&pushed| pushed)
        .count()
    }

    /// Thread groups covering the field
    pub fn workgroups(&self) -> (u32, u32) {
        (
            self.size.x.div_ceil(PHYSICS_WORKGROUP_SIZE.0),
            self.size.y.div_ceil(PHYSICS_WORKGROUP_SIZE.1),
        )
    }

    pub fn workgroup_size(&self) -> (u32, u32) {
        PHYSICS_WORKGROUP_SIZE
    }

    /// Record one integration step: dispatch current → next, swap roles,
    /// then clear the forces field it consumed.
    pub fn encode_step(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let read = self.displacement.current_index();
        debug_assert_eq!(read, self.velocity.current_index());

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("grass_physics_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.params_bind_group, &[]);
            pass.set_bind_group(1, &self.field_bind_groups[read], &[]);
            let (groups_x, groups_y) = self.workgroups();
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        self.displacement.swap();
        self.velocity.swap();
        self.steps += 1;

        self.encode_clear_forces(encoder);
    }

    /// Record a clear of the forces field to zero.
    pub fn encode_clear_forces(&self, encoder: &mut wgpu::CommandEncoder) {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("grass_forces_clear_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.forces.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    /// Slot index currently holding the resolved state
    pub fn current_index(&self) -> usize {
        self.displacement.current_index()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn wind_time(&self) -> f32 {
        self.wind_time.get()
    }

    pub fn displacement(&self) -> &wgpu::Texture {
        &self.displacement.current().texture
    }

    /// Displacement slot by index, regardless of role
    pub fn displacement_slot(&self, index: usize) -> &wgpu::TextureView {
        &self.displacement.get(index).view
    }

    pub fn displacement_slot_texture(&self, index: usize) -> &wgpu::Texture {
        &self.displacement.get(index).texture
    }

    pub fn velocity(&self) -> &wgpu::Texture {
        &self.velocity.current().texture
    }

    pub fn forces(&self) -> &wgpu::Texture {
        &self.forces.texture
    }

    pub fn forces_view(&self) -> &wgpu::TextureView {
        &self.forces.view
    }
}
