//! Host mirror of the grid sampler's per-cell acceptance test.
//!
//! `uniform_grid_sampler` in grass_points.wgsl uses exactly these integer
//! hashes and the same power-of-two float conversion, so the host can
//! predict the GPU point count bit-for-bit.

use glam::Vec2;

/// PCG-style integer hash (wrapping u32 arithmetic, matches `pcg` in WGSL)
#[inline]
pub fn pcg(v: u32) -> u32 {
    let state = v.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Hash to [0, 1) using the top 24 bits (exact in f32)
#[inline]
pub fn unit_float(h: u32) -> f32 {
    (h >> 8) as f32 / 16_777_216.0
}

/// Per-cell seed
#[inline]
pub fn cell_seed(x: u32, y: u32) -> u32 {
    pcg(x.wrapping_add(pcg(y)))
}

/// Whether the cell spawns a blade at this density
#[inline]
pub fn accepts(x: u32, y: u32, density: f32) -> bool {
    unit_float(cell_seed(x, y)) < density
}

/// Jitter of an accepted cell, in cell units, before `offset_multiplier`.
/// Each component is in [-0.5, 0.5).
pub fn cell_jitter(seed: u32) -> Vec2 {
    let a = pcg(seed);
    let b = pcg(a);
    Vec2::new(unit_float(a), unit_float(b)) - Vec2::splat(0.5)
}

/// World-space position of a blade in cell (x, y)
pub fn blade_position(
    x: u32,
    y: u32,
    grid: [u32; 2],
    world_size: Vec2,
    center: Vec2,
    offset_multiplier: f32,
) -> Vec2 {
    let seed = cell_seed(x, y);
    let cell_size = world_size / Vec2::new(grid[0] as f32, grid[1] as f32);
    let local = (Vec2::new(x as f32, y as f32) + Vec2::splat(0.5) + cell_jitter(seed) * offset_multiplier)
        * cell_size;
    center - world_size * 0.5 + local
}

/// Number of accepted cells over a `grid[0] × grid[1]` grid
pub fn accepted_cell_count(grid: [u32; 2], density: f32) -> u32 {
    let mut count = 0;
    for y in 0..grid[1] {
        for x in 0..grid[0] {
            if accepts(x, y, density) {
                count += 1;
            }
        }
    }
    count
}
