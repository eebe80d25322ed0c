//! GPU point generation with a live append count.
//!
//! Each frame the append counter is cleared, `uniform_grid_sampler` appends
//! every accepted grid cell into the point buffer, and the counter is copied
//! GPU→GPU into the `vertex_count` of the indirect draw arguments. The host
//! never enumerates blades; an optional blocking readback of the count
//! exists for diagnostics only.

use glam::{IVec2, UVec2, Vec2};
use wgpu::util::DeviceExt;

use crate::core::error::Error;
use crate::render::readback;
use super::binding::{ParamBinding, UniformWriter};
use super::geometry::SimulationGeometry;
use super::params::{GenerationUniforms, GENERATION_LAYOUT};
use super::tuning::TuningParams;

/// Workgroup edge of `uniform_grid_sampler` (16×16 = 256 invocations)
pub const SAMPLER_WORKGROUP_SIZE: u32 = 16;

/// Size of one appended point: position (vec2<f32>), seed (u32), padding
pub const POINT_STRIDE: u64 = 16;

/// Size of the append counter and of `DrawIndirectArgs::vertex_count`
const COUNT_BYTES: u64 = 4;

/// One blade base as written by the sampler
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GrassPoint {
    pub position: [f32; 2],
    pub seed: u32,
    pub _pad: u32,
}

/// Point generation pipeline and its buffers
pub struct PointGenerator {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    uniforms_buffer: wgpu::Buffer,
    point_buffer: wgpu::Buffer,
    counter_buffer: wgpu::Buffer,
    indirect_buffer: wgpu::Buffer,
    count_readback: Option<wgpu::Buffer>,
    grid: UVec2,

    density: ParamBinding<f32>,
    offset_multiplier: ParamBinding<f32>,
    grid_dimensions: ParamBinding<IVec2>,
    grid_world_size: ParamBinding<Vec2>,
    center_point: ParamBinding<Vec2>,
}

impl PointGenerator {
    /// Create the sampler pipeline and allocate a point buffer with room for
    /// one point per grid cell.
    pub fn new(
        device: &wgpu::Device,
        grid: UVec2,
        geometry: &SimulationGeometry,
        tuning: &TuningParams,
        diagnostics: bool,
    ) -> Result<Self, Error> {
        let capacity = grid.x as u64 * grid.y as u64;
        let point_bytes = capacity * POINT_STRIDE;
        let limits = device.limits();
        if point_bytes > limits.max_storage_buffer_binding_size as u64 || point_bytes > limits.max_buffer_size {
            return Err(Error::Resource(format!(
                "point buffer for a {}x{} grid needs {} bytes, device allows {}",
                grid.x, grid.y, point_bytes, limits.max_storage_buffer_binding_size
            )));
        }
        if grid.x > i32::MAX as u32 || grid.y > i32::MAX as u32 {
            return Err(Error::Resource(format!("grid {}x{} overflows i32 dimensions", grid.x, grid.y)));
        }

        let density = ParamBinding::new(&GENERATION_LAYOUT, "density", tuning.density)?;
        let offset_multiplier =
            ParamBinding::new(&GENERATION_LAYOUT, "offset_multiplier", tuning.offset_multiplier)?;
        let grid_dimensions = ParamBinding::new(&GENERATION_LAYOUT, "grid_dimensions", grid.as_ivec2())?;
        let grid_world_size = ParamBinding::new(&GENERATION_LAYOUT, "grid_world_size", geometry.world_size)?;
        let center_point = ParamBinding::new(&GENERATION_LAYOUT, "center_point", geometry.center)?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grass_points_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/grass_points.wgsl").into()),
        });

        let uniforms_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_generation_uniforms"),
            size: std::mem::size_of::<GenerationUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let point_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_points"),
            size: point_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let counter_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_point_counter"),
            size: COUNT_BYTES,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let initial_args = wgpu::util::DrawIndirectArgs {
            vertex_count: 0,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
        };
        let indirect_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grass_indirect_args"),
            contents: initial_args.as_bytes(),
            usage: wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        });

        let count_readback = diagnostics.then(|| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("grass_point_count_readback"),
                size: COUNT_BYTES,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_points_layout"),
            entries: &[
                // Generation params
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Append output
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Append counter
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_points_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: point_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: counter_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grass_points_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("grass_points_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("uniform_grid_sampler"),
            compilation_options: Default::default(),
            cache: None,
        });

        log::info!(
            "Point generator: {}x{} grid, {:.1}MB point buffer",
            grid.x, grid.y, point_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok(Self {
            pipeline,
            bind_group,
            uniforms_buffer,
            point_buffer,
            counter_buffer,
            indirect_buffer,
            count_readback,
            grid,
            density,
            offset_multiplier,
            grid_dimensions,
            grid_world_size,
            center_point,
        })
    }

    /// Track the current patch placement and tuning.
    pub fn update(&mut self, geometry: &SimulationGeometry, tuning: &TuningParams) {
        self.center_point.set(geometry.center);
        self.grid_world_size.set(geometry.world_size);
        self.density.set(tuning.density);
        self.offset_multiplier.set(tuning.offset_multiplier);
    }

    /// Push changed generation parameters. Returns the number of pushes.
    pub fn apply_params(&mut self, queue: &wgpu::Queue) -> usize {
        let mut sink = UniformWriter {
            queue,
            buffer: &self.uniforms_buffer,
        };
        [
            self.density.apply(&mut sink),
            self.offset_multiplier.apply(&mut sink),
            self.grid_world_size.apply(&mut sink),
            self.grid_dimensions.apply(&mut sink),
            self.center_point.apply(&mut sink),
        ]
        .into_iter()
        .filter(|&pushed| pushed)
        .count()
    }

    /// Thread groups covering the grid (rounded up; the kernel bounds-checks)
    pub fn workgroups(&self) -> (u32, u32) {
        (
            self.grid.x.div_ceil(SAMPLER_WORKGROUP_SIZE),
            self.grid.y.div_ceil(SAMPLER_WORKGROUP_SIZE),
        )
    }

    /// Record: reset counter → sample → copy count into the indirect args
    /// (→ copy count to the diagnostics staging buffer, if enabled).
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(&self.counter_buffer, 0, None);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("grass_points_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            let (groups_x, groups_y) = self.workgroups();
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        // vertex_count is the first field of the indirect args
        encoder.copy_buffer_to_buffer(&self.counter_buffer, 0, &self.indirect_buffer, 0, COUNT_BYTES);

        if let Some(readback) = &self.count_readback {
            encoder.copy_buffer_to_buffer(&self.counter_buffer, 0, readback, 0, COUNT_BYTES);
        }
    }

    /// Blocking read of the count copied by the last submitted `encode`.
    /// Returns None when diagnostics are disabled.
    pub fn read_count_blocking(&self, device: &wgpu::Device) -> Result<Option<u32>, Error> {
        let Some(buffer) = &self.count_readback else {
            return Ok(None);
        };
        let bytes = readback::map_read(device, buffer)?;
        Ok(Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])))
    }

    pub fn point_buffer(&self) -> &wgpu::Buffer {
        &self.point_buffer
    }

    pub fn indirect_buffer(&self) -> &wgpu::Buffer {
        &self.indirect_buffer
    }

    pub fn grid(&self) -> UVec2 {
        self.grid
    }

    pub fn capacity(&self) -> u64 {
        self.grid.x as u64 * self.grid.y as u64
    }
}
