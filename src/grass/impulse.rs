//! Impulse injection into the external forces field.
//!
//! A radial Gaussian force profile is computed once on the host and uploaded
//! as a read-only texture. Each interaction queues a stamp; at frame time all
//! queued stamps are drawn into the forces field in one instanced pass with
//! additive blending, so overlapping stamps sum instead of overwriting.
//! Stamps partly or fully outside the field are clipped by the viewport.

use glam::{UVec2, Vec2};
use rayon::prelude::*;

use crate::core::error::Error;
use crate::render::readback::encode_rgba16f;
use super::config::ImpulseConfig;
use super::geometry::SimulationGeometry;
use super::params::StampUniforms;

/// Format shared by the forces field and the stamp image
pub const FORCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Host-side impulse stamp image (RGBA, xy = force, zw unused)
pub struct ImpulseKernel {
    size: u32,
    texels: Vec<[f32; 4]>,
}

impl ImpulseKernel {
    /// Evaluate the profile for every texel.
    ///
    /// `f(r) = peak * exp(-(r - center)^2 / (2 width^2))` inside the unit
    /// disk, pointing away from the stamp centre; zero outside.
    pub fn generate(config: &ImpulseConfig) -> Self {
        let size = config.size;
        let half = size as f32 / 2.0;
        let mut texels = vec![[0.0f32; 4]; size as usize * size as usize];

        texels
            .par_chunks_mut(size as usize)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, texel) in row.iter_mut().enumerate() {
                    let p = Vec2::new((x as f32 - half) / half, (y as f32 - half) / half);
                    let r = p.length();
                    if r >= 1.0 {
                        continue;
                    }
                    let d = r - config.center;
                    let f = config.peak * (-(d * d) / (2.0 * config.width * config.width)).exp();
                    let force = p.normalize_or_zero() * f;
                    *texel = [force.x, force.y, 0.0, 0.0];
                }
            });

        Self { size, texels }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        self.texels[y as usize * self.size as usize + x as usize]
    }

    pub fn texels(&self) -> &[[f32; 4]] {
        &self.texels
    }

    /// Top-left field texel of a stamp centred on `uv`
    pub fn stamp_origin(&self, uv: Vec2, field_size: UVec2) -> Vec2 {
        SimulationGeometry::uv_to_texel(uv, field_size).floor() - Vec2::splat((self.size / 2) as f32)
    }
}

/// GPU side of impulse injection: stamp texture, pipeline and the frame's queue
pub struct ImpulseInjector {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    instance_buffer: wgpu::Buffer,
    kernel: ImpulseKernel,
    field_size: UVec2,
    capacity: usize,
    pending: Vec<Vec2>,
}

impl ImpulseInjector {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &ImpulseConfig,
        field_size: UVec2,
        max_stamps_per_frame: u32,
    ) -> Result<Self, Error> {
        let max_dim = device.limits().max_texture_dimension_2d;
        if config.size > max_dim {
            return Err(Error::Resource(format!(
                "impulse stamp {}x{} exceeds max texture dimension {}",
                config.size, config.size, max_dim
            )));
        }

        let kernel = ImpulseKernel::generate(config);
        let size = kernel.size();

        let kernel_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("impulse_kernel"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FORCE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &kernel_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &encode_rgba16f(kernel.texels()),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size * 8),
                rows_per_image: Some(size),
            },
            wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
        );
        let kernel_view = kernel_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let uniforms = StampUniforms {
            field_size: field_size.as_vec2().to_array(),
            kernel_size: [size as f32; 2],
        };
        let uniforms_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("impulse_stamp_uniforms"),
            size: std::mem::size_of::<StampUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&uniforms_buffer, 0, bytemuck::bytes_of(&uniforms));

        let capacity = max_stamps_per_frame.max(1) as usize;
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("impulse_stamp_instances"),
            size: (capacity * std::mem::size_of::<[f32; 2]>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("impulse_stamp_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/impulse_stamp.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("impulse_stamp_layout"),
            entries: &[
                // Stamp uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Kernel image, read with textureLoad
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("impulse_stamp_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&kernel_view),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("impulse_stamp_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("impulse_stamp_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("stamp_vs"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                }],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("stamp_fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: FORCE_FORMAT,
                    blend: Some(wgpu::BlendState {
                        color: additive,
                        alpha: additive,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview_mask: None,
            cache: None,
        });

        log::info!("Impulse kernel: {}x{} texels, peak {}", size, size, config.peak);

        Ok(Self {
            pipeline,
            bind_group,
            instance_buffer,
            kernel,
            field_size,
            capacity,
            pending: Vec::with_capacity(capacity),
        })
    }

    pub fn kernel(&self) -> &ImpulseKernel {
        &self.kernel
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Queue a stamp centred on normalized coordinate `uv`.
    /// Coordinates outside [0,1]² are accepted and clipped when drawn.
    pub fn queue_impulse(&mut self, uv: Vec2) {
        if self.pending.len() >= self.capacity {
            log::warn!("Impulse queue full ({} stamps), dropping stamp at {}", self.capacity, uv);
            return;
        }
        self.pending.push(self.kernel.stamp_origin(uv, self.field_size));
    }

    /// Draw all queued stamps into `forces_view` and clear the queue.
    /// Returns the number of stamps drawn.
    pub fn encode(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        forces_view: &wgpu::TextureView,
    ) -> u32 {
        if self.pending.is_empty() {
            return 0;
        }
        let origins: Vec<[f32; 2]> = self.pending.drain(..).map(|o| o.to_array()).collect();
        queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&origins));

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("impulse_stamp_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: forces_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.instance_buffer.slice(..));
        pass.draw(0..6, 0..origins.len() as u32);

        log::debug!("Stamped {} impulses", origins.len());
        origins.len() as u32
    }
}
