//! Indirect draw of the generated blades.
//!
//! The consumer contract is small: bind the point buffer, bind the current
//! displacement field (`displacement_slots[slot]`), and `draw_indirect` from
//! the args the generator filled in. [`BladeRenderer`] is the reference
//! pipeline for it.

use glam::{Mat4, Vec2};
use wgpu::util::DeviceExt;

use super::params::BladeUniforms;

/// What a renderer needs from the grass system for one frame
pub struct DrawResources<'a> {
    pub points: &'a wgpu::Buffer,
    pub indirect: &'a wgpu::Buffer,
    /// Both displacement views, in slot order
    pub displacement_slots: [&'a wgpu::TextureView; 2],
    /// Ping-pong slot holding the current displacement
    pub slot: usize,
}

/// Point-list blade pipeline reading blades by `vertex_index`
pub struct BladeRenderer {
    pipeline: wgpu::RenderPipeline,
    /// One per displacement slot
    bind_groups: [wgpu::BindGroup; 2],
    uniforms_buffer: wgpu::Buffer,
    uniforms: BladeUniforms,
}

impl BladeRenderer {
    /// Binds the point buffer and both displacement slots of `resources`.
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
        resources: &DrawResources<'_>,
        blade_length: f32,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grass_blades_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/grass_blades.wgsl").into()),
        });

        let uniforms = BladeUniforms {
            blade_length,
            ..Default::default()
        };
        let uniforms_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grass_blade_uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_blades_layout"),
            entries: &[
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
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let bind_groups = resources.displacement_slots.map(|view| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("grass_blades_bind_group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniforms_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: resources.points.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                ],
            })
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grass_blades_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("grass_blades_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("blade_vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::PointList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("blade_fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview_mask: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_groups,
            uniforms_buffer,
            uniforms,
        }
    }

    /// Update camera and patch placement; uploads only on change.
    pub fn update(&mut self, queue: &wgpu::Queue, view_proj: Mat4, world_offset: Vec2, world_dimensions: Vec2) {
        let uniforms = BladeUniforms {
            view_proj: view_proj.to_cols_array_2d(),
            world_offset: world_offset.to_array(),
            world_dimensions: world_dimensions.to_array(),
            ..self.uniforms
        };
        if bytemuck::bytes_of(&uniforms) != bytemuck::bytes_of(&self.uniforms) {
            self.uniforms = uniforms;
            queue.write_buffer(&self.uniforms_buffer, 0, bytemuck::bytes_of(&self.uniforms));
        }
    }

    pub fn blade_length(&self) -> f32 {
        self.uniforms.blade_length
    }

    /// Record the indirect draw into an open render pass.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, resources: &DrawResources<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_groups[resources.slot], &[]);
        pass.draw_indirect(resources.indirect, 0);
    }
}
