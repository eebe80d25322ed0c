//! Headless GPU tests for the grass pipeline.
//!
//! Every test skips (passes with a note) when no adapter is available.

use glam::{Mat4, UVec2, Vec2, Vec3};

use grassfield::grass::config::{DiagnosticsConfig, ImpulseConfig};
use grassfield::grass::impulse::{ImpulseInjector, ImpulseKernel, FORCE_FORMAT};
use grassfield::grass::points::POINT_STRIDE;
use grassfield::grass::sampling::{accepted_cell_count, accepts, blade_position, cell_seed};
use grassfield::core::Error;
use grassfield::grass::{GrassConfig, GrassSystem, PatchTransform, TuningParams};
use grassfield::render::{readback, GpuContext};

const DT: f32 = 1.0 / 60.0;

fn gpu() -> Option<GpuContext> {
    match GpuContext::new_headless_blocking() {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            println!("SKIP: no GPU adapter available ({e})");
            None
        }
    }
}

fn small_config() -> GrassConfig {
    GrassConfig {
        grid_size: [128, 96],
        field_size: [64, 64],
        impulse: ImpulseConfig {
            size: 32,
            ..Default::default()
        },
        diagnostics: DiagnosticsConfig { read_point_count: true },
        ..Default::default()
    }
}

fn calm(tuning: TuningParams) -> TuningParams {
    TuningParams {
        wind_enabled: false,
        ..tuning
    }
}

fn max_abs(texels: &[[f32; 4]]) -> f32 {
    texels
        .iter()
        .flat_map(|t| t.iter().copied())
        .fold(0.0f32, |m, c| m.max(c.abs()))
}

#[test]
fn test_point_count_matches_reference() {
    let Some(ctx) = gpu() else { return };
    let config = small_config();
    let density = config.tuning.density;
    let mut grass = GrassSystem::new(&ctx.device, &ctx.queue, config, PatchTransform::default()).unwrap();

    let stats = grass.frame(&ctx.device, &ctx.queue, DT).unwrap();
    let expected = accepted_cell_count([128, 96], density);
    assert!(expected > 0);
    assert_eq!(stats.point_count, Some(expected));
    assert_eq!(grass.point_count(), Some(expected));

    // Count is reset every frame, not accumulated
    grass.frame(&ctx.device, &ctx.queue, DT).unwrap();
    assert_eq!(grass.point_count(), Some(expected));
}

#[test]
fn test_oversized_stamp_is_a_resource_error() {
    let Some(ctx) = gpu() else { return };
    let mut config = small_config();
    config.impulse.size = ctx.device.limits().max_texture_dimension_2d + 1;
    let result = GrassSystem::new(&ctx.device, &ctx.queue, config, PatchTransform::default());
    assert!(matches!(result, Err(Error::Resource(_))));
}

#[test]
fn test_indirect_args_carry_count() {
    let Some(ctx) = gpu() else { return };
    let mut grass = GrassSystem::new(&ctx.device, &ctx.queue, small_config(), PatchTransform::default()).unwrap();
    grass.frame(&ctx.device, &ctx.queue, DT).unwrap();

    let args = readback::read_u32s(&ctx.device, &ctx.queue, grass.draw_resources().indirect, 0, 4).unwrap();
    assert_eq!(args, vec![grass.point_count().unwrap(), 1, 0, 0]);
}

#[test]
fn test_points_match_host_positions() {
    let Some(ctx) = gpu() else { return };
    let config = small_config();
    let tuning = config.tuning;
    let mut grass = GrassSystem::new(&ctx.device, &ctx.queue, config, PatchTransform::default()).unwrap();
    grass.frame(&ctx.device, &ctx.queue, DT).unwrap();
    let count = grass.point_count().unwrap() as usize;

    let words = readback::read_u32s(&ctx.device, &ctx.queue, grass.points().point_buffer(), 0, count * 4).unwrap();
    assert_eq!(words.len() as u64 * 4, count as u64 * POINT_STRIDE);
    let mut gpu_points: Vec<(u32, Vec2)> = words
        .chunks_exact(4)
        .map(|w| (w[2], Vec2::new(f32::from_bits(w[0]), f32::from_bits(w[1]))))
        .collect();

    let geometry = grass.geometry();
    let mut host_points = Vec::new();
    for y in 0..96 {
        for x in 0..128 {
            if accepts(x, y, tuning.density) {
                let p = blade_position(x, y, [128, 96], geometry.world_size, geometry.center, tuning.offset_multiplier);
                host_points.push((cell_seed(x, y), p));
            }
        }
    }

    let key = |p: &(u32, Vec2)| (p.0, p.1.x.to_bits(), p.1.y.to_bits());
    gpu_points.sort_by_key(key);
    host_points.sort_by_key(key);
    assert_eq!(gpu_points.len(), host_points.len());
    for (g, h) in gpu_points.iter().zip(&host_points) {
        assert_eq!(g.0, h.0);
        assert!((g.1 - h.1).length() < 1e-4, "gpu {:?} host {:?}", g.1, h.1);
    }
}

#[test]
fn test_density_change_reaches_next_frame() {
    let Some(ctx) = gpu() else { return };
    let mut grass = GrassSystem::new(&ctx.device, &ctx.queue, small_config(), PatchTransform::default()).unwrap();
    grass.frame(&ctx.device, &ctx.queue, DT).unwrap();

    let applied = grass.set_tuning(TuningParams {
        density: 0.5,
        ..*grass.tuning()
    });
    assert_eq!(applied.density, 0.5);
    grass.frame(&ctx.device, &ctx.queue, DT).unwrap();
    assert_eq!(grass.point_count(), Some(accepted_cell_count([128, 96], 0.5)));
}

#[test]
fn test_only_changed_params_are_pushed() {
    let Some(ctx) = gpu() else { return };
    let mut grass = GrassSystem::new(&ctx.device, &ctx.queue, small_config(), PatchTransform::default()).unwrap();

    let first = grass.frame(&ctx.device, &ctx.queue, DT).unwrap();
    // 5 generation + 12 physics values, all dirty initially
    assert_eq!(first.param_pushes, 17);

    // Same dt, same tuning, no movement: only the wind clock advances
    let second = grass.frame(&ctx.device, &ctx.queue, DT).unwrap();
    assert_eq!(second.param_pushes, 1);
}

#[test]
fn test_calm_field_stays_exactly_zero() {
    let Some(ctx) = gpu() else { return };
    let config = GrassConfig {
        grid_size: [1024, 1024],
        field_size: [1024, 1024],
        tuning: TuningParams {
            k: 144.0,
            damping: 16.0,
            density: 0.15,
            offset_multiplier: 0.0,
            wind_enabled: false,
            ..Default::default()
        },
        diagnostics: DiagnosticsConfig { read_point_count: true },
        ..Default::default()
    };
    let mut grass = GrassSystem::new(&ctx.device, &ctx.queue, config, PatchTransform::default()).unwrap();

    for _ in 0..4 {
        grass.frame(&ctx.device, &ctx.queue, DT).unwrap();
    }

    assert_eq!(grass.point_count(), Some(accepted_cell_count([1024, 1024], 0.15)));
    let displacement = readback::read_rgba16f_texture(&ctx.device, &ctx.queue, grass.physics().displacement()).unwrap();
    assert_eq!(displacement.len(), 1024 * 1024);
    assert!(displacement.iter().all(|t| *t == [0.0; 4]));
}

#[test]
fn test_roles_swap_each_frame() {
    let Some(ctx) = gpu() else { return };
    let mut config = small_config();
    config.tuning = calm(config.tuning);
    let mut grass = GrassSystem::new(&ctx.device, &ctx.queue, config, PatchTransform::default()).unwrap();
    assert_eq!(grass.physics().current_index(), 0);

    grass.queue_impulse(Vec2::splat(0.5));
    grass.frame(&ctx.device, &ctx.queue, DT).unwrap();
    assert_eq!(grass.physics().current_index(), 1);
    assert_eq!(grass.draw_resources().slot, 1);

    let slot = |grass: &GrassSystem, i: usize| {
        readback::read_rgba16f_texture(&ctx.device, &ctx.queue, grass.physics().displacement_slot_texture(i)).unwrap()
    };
    let after_first = slot(&grass, 1);
    assert!(max_abs(&after_first) > 0.0, "impulse produced no displacement");
    assert_eq!(max_abs(&slot(&grass, 0)), 0.0);

    grass.frame(&ctx.device, &ctx.queue, DT).unwrap();
    assert_eq!(grass.physics().current_index(), 0);
    assert_eq!(grass.physics().steps(), 2);

    // The previous state is the input of this step, never written by it
    assert_eq!(slot(&grass, 1), after_first);
    assert_ne!(slot(&grass, 0), after_first);
}

#[test]
fn test_forces_cleared_after_step() {
    let Some(ctx) = gpu() else { return };
    let mut grass = GrassSystem::new(&ctx.device, &ctx.queue, small_config(), PatchTransform::default()).unwrap();

    assert!(grass.on_pointer_press(Some(Vec2::new(0.3, 0.6))));
    assert!(!grass.on_pointer_press(None));
    let stats = grass.frame(&ctx.device, &ctx.queue, DT).unwrap();
    assert_eq!(stats.stamps, 1);
    assert_eq!(grass.impulses().pending(), 0);

    let forces = readback::read_rgba16f_texture(&ctx.device, &ctx.queue, grass.physics().forces()).unwrap();
    assert_eq!(max_abs(&forces), 0.0);
}

/// Compare the on-field part of a stamp against `scale` times the stamp image.
fn assert_stamp(texels: &[[f32; 4]], field: UVec2, origin: (i32, i32), kernel: &ImpulseKernel, scale: f32) {
    let mut visible = 0;
    for ky in 0..kernel.size() {
        for kx in 0..kernel.size() {
            let (x, y) = (origin.0 + kx as i32, origin.1 + ky as i32);
            if x < 0 || y < 0 || x >= field.x as i32 || y >= field.y as i32 {
                continue;
            }
            visible += 1;
            let k = kernel.texel(kx, ky);
            let t = texels[(y as u32 * field.x + x as u32) as usize];
            for c in 0..2 {
                let expected = scale * k[c];
                let tolerance = (expected.abs() * 0.01).max(0.05);
                assert!(
                    (t[c] - expected).abs() <= tolerance,
                    "texel ({kx},{ky}) channel {c}: {} vs {}",
                    t[c],
                    expected
                );
            }
        }
    }
    assert!(visible > 0, "stamp at {origin:?} entirely off-field");
}

#[test]
fn test_overlapping_stamps_sum() {
    let Some(ctx) = gpu() else { return };
    let field = UVec2::splat(128);
    let config = ImpulseConfig {
        size: 32,
        ..Default::default()
    };
    let mut injector = ImpulseInjector::new(&ctx.device, &ctx.queue, &config, field, 8).unwrap();

    let forces = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("test_forces"),
        size: wgpu::Extent3d {
            width: field.x,
            height: field.y,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORCE_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = forces.create_view(&wgpu::TextureViewDescriptor::default());

    // Two stamps on the same spot, one elsewhere, one hanging off the top-right corner
    injector.queue_impulse(Vec2::splat(0.5));
    injector.queue_impulse(Vec2::splat(0.5));
    injector.queue_impulse(Vec2::splat(0.125));
    injector.queue_impulse(Vec2::new(0.95, 0.0));
    assert_eq!(injector.pending(), 4);

    let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    assert_eq!(injector.encode(&ctx.queue, &mut encoder, &view), 4);
    assert_eq!(injector.pending(), 0);
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let texels = readback::read_rgba16f_texture(&ctx.device, &ctx.queue, &forces).unwrap();
    // Origins: floor(uv * 128) - 16
    assert_stamp(&texels, field, (48, 48), injector.kernel(), 2.0);
    assert_stamp(&texels, field, (0, 0), injector.kernel(), 1.0);

    // Clipped stamp: kernel columns 0..23 and rows 16..32 land on-field,
    // including the stamp centre
    assert_stamp(&texels, field, (105, -16), injector.kernel(), 1.0);
    let visible_peak = (0..16u32)
        .flat_map(|y| (105..128u32).map(move |x| (x, y)))
        .map(|(x, y)| {
            let t = texels[(y * field.x + x) as usize];
            t[0].abs().max(t[1].abs())
        })
        .fold(0.0f32, f32::max);
    assert!(visible_peak > 100.0, "clipped stamp peak {visible_peak}");

    // Clipped rows do not wrap to the bottom edge
    for y in 112..128u32 {
        for x in 96..128u32 {
            assert_eq!(texels[(y * field.x + x) as usize], [0.0; 4], "wrapped texel ({x},{y})");
        }
    }
}

#[test]
fn test_field_follows_patch_movement() {
    let Some(ctx) = gpu() else { return };
    let mut config = small_config();
    // No restoring force or drag: the step is a pure shifted advection
    config.tuning = calm(TuningParams {
        k: 0.0,
        damping: 0.0,
        ..config.tuning
    });
    let mut grass = GrassSystem::new(&ctx.device, &ctx.queue, config, PatchTransform::default()).unwrap();

    grass.queue_impulse(Vec2::splat(0.5));
    grass.frame(&ctx.device, &ctx.queue, DT).unwrap();
    let d1 = readback::read_rgba16f_texture(&ctx.device, &ctx.queue, grass.physics().displacement()).unwrap();
    let v1 = readback::read_rgba16f_texture(&ctx.device, &ctx.queue, grass.physics().velocity()).unwrap();

    // 64 texels over 10 m: 1.25 m is 8 texels
    grass.set_transform(PatchTransform {
        position: Vec3::new(1.25, 0.0, 0.0),
        ..Default::default()
    });
    grass.frame(&ctx.device, &ctx.queue, DT).unwrap();
    let d2 = readback::read_rgba16f_texture(&ctx.device, &ctx.queue, grass.physics().displacement()).unwrap();

    for y in 0..64usize {
        for x in 0..64usize {
            let expected = if x + 8 < 64 {
                let i = y * 64 + x + 8;
                [d1[i][0] + v1[i][0] * DT, d1[i][1] + v1[i][1] * DT]
            } else {
                [0.0, 0.0]
            };
            let got = d2[y * 64 + x];
            for c in 0..2 {
                let tolerance = expected[c].abs().max(1.0) * 1e-2;
                assert!((got[c] - expected[c]).abs() <= tolerance, "({x},{y}): {} vs {}", got[c], expected[c]);
            }
        }
    }
}

#[test]
fn test_slow_movement_shifts_whole_texels() {
    let Some(ctx) = gpu() else { return };
    let mut config = small_config();
    config.tuning = calm(TuningParams {
        k: 0.0,
        damping: 0.0,
        ..config.tuning
    });
    let mut grass = GrassSystem::new(&ctx.device, &ctx.queue, config, PatchTransform::default()).unwrap();

    grass.queue_impulse(Vec2::splat(0.5));
    grass.frame(&ctx.device, &ctx.queue, DT).unwrap();
    let d1 = readback::read_rgba16f_texture(&ctx.device, &ctx.queue, grass.physics().displacement()).unwrap();
    let v1 = readback::read_rgba16f_texture(&ctx.device, &ctx.queue, grass.physics().velocity()).unwrap();

    // 64 texels over 10 m: 0.0625 m is 0.4 texel per frame, 2 texels after 5 frames
    for i in 1..=5 {
        grass.set_transform(PatchTransform {
            position: Vec3::new(0.0625 * i as f32, 0.0, 0.0),
            ..Default::default()
        });
        grass.frame(&ctx.device, &ctx.queue, DT).unwrap();
    }
    let d6 = readback::read_rgba16f_texture(&ctx.device, &ctx.queue, grass.physics().displacement()).unwrap();
    assert!(max_abs(&d6) > 1.0);

    for y in 0..64usize {
        for x in 0..64usize {
            let expected = if x + 2 < 64 {
                let i = y * 64 + x + 2;
                [d1[i][0] + v1[i][0] * 5.0 * DT, d1[i][1] + v1[i][1] * 5.0 * DT]
            } else {
                [0.0, 0.0]
            };
            let got = d6[y * 64 + x];
            for c in 0..2 {
                let tolerance = expected[c].abs().max(1.0) * 1e-2;
                assert!((got[c] - expected[c]).abs() <= tolerance, "({x},{y}): {} vs {}", got[c], expected[c]);
            }
        }
    }
}

#[test]
fn test_blade_renderer_draws_points() {
    let Some(ctx) = gpu() else { return };
    let mut grass = GrassSystem::new(&ctx.device, &ctx.queue, small_config(), PatchTransform::default()).unwrap();
    grass.frame(&ctx.device, &ctx.queue, DT).unwrap();

    let format = wgpu::TextureFormat::Rgba16Float;
    let target = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("test_blade_target"),
        size: wgpu::Extent3d {
            width: 64,
            height: 64,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let mut renderer = grass.create_blade_renderer(&ctx.device, format);
    assert_eq!(renderer.blade_length(), grass.config().blade_length);
    let geometry = grass.geometry();
    let view_proj = Mat4::orthographic_rh(-5.0, 5.0, -5.0, 5.0, 0.1, 100.0)
        * Mat4::look_at_rh(Vec3::new(0.0, 50.0, 0.0), Vec3::ZERO, Vec3::Z);
    renderer.update(&ctx.queue, view_proj, geometry.center, geometry.world_size);

    let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("test_blade_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        renderer.draw(&mut pass, &grass.draw_resources());
    }
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let pixels = readback::read_rgba16f_texture(&ctx.device, &ctx.queue, &target).unwrap();
    let lit = pixels.iter().filter(|p| p[1] > 0.1).count();
    assert!(lit > 0, "no blades rasterized");
}
