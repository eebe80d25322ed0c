//! Blocking GPU → host readback.
//!
//! Every call here stalls until the queue drains. Used for diagnostics,
//! offline dumps and tests, never on the steady-state frame path.

use crate::core::error::Error;

/// Bytes per texel of an `Rgba16Float` texture
pub const RGBA16F_TEXEL_BYTES: u32 = 8;

/// Map a `MAP_READ` buffer and copy its contents out.
pub fn map_read(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Result<Vec<u8>, Error> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });

    device
        .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
        .map_err(|e| Error::Gpu(format!("device poll failed: {e}")))?;

    rx.recv()
        .map_err(|_| Error::Gpu("map callback dropped".to_string()))?
        .map_err(|e| Error::Gpu(format!("buffer map failed: {e}")))?;

    let bytes = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(bytes)
}

/// Copy `size` bytes at `offset` of `source` (needs `COPY_SRC`) to the host.
pub fn read_buffer(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &wgpu::Buffer,
    offset: u64,
    size: u64,
) -> Result<Vec<u8>, Error> {
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback_staging"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback_encoder"),
    });
    encoder.copy_buffer_to_buffer(source, offset, &staging, 0, size);
    queue.submit(std::iter::once(encoder.finish()));

    map_read(device, &staging)
}

/// Read a buffer as a `u32` array.
pub fn read_u32s(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &wgpu::Buffer,
    offset: u64,
    count: usize,
) -> Result<Vec<u32>, Error> {
    let bytes = read_buffer(device, queue, source, offset, (count * 4) as u64)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Read a 2D `Rgba16Float` texture (needs `COPY_SRC`) as row-major RGBA f32.
///
/// The texture width must keep rows aligned to
/// `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT` (multiples of 32 texels).
pub fn read_rgba16f_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<Vec<[f32; 4]>, Error> {
    let width = texture.width();
    let height = texture.height();
    let bytes_per_row = width * RGBA16F_TEXEL_BYTES;
    if bytes_per_row % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT != 0 {
        return Err(Error::Resource(format!(
            "texture width {width} is not readable without row padding"
        )));
    }

    let size = bytes_per_row as u64 * height as u64;
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("texture_readback_staging"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("texture_readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let bytes = map_read(device, &staging)?;
    let halves = decode_u16s(&bytes);
    Ok(halves
        .chunks_exact(4)
        .map(|t| {
            [
                half::f16::from_bits(t[0]).to_f32(),
                half::f16::from_bits(t[1]).to_f32(),
                half::f16::from_bits(t[2]).to_f32(),
                half::f16::from_bits(t[3]).to_f32(),
            ]
        })
        .collect())
}

fn decode_u16s(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// Encode RGBA f32 texels as `Rgba16Float` bytes for upload.
pub fn encode_rgba16f(texels: &[[f32; 4]]) -> Vec<u8> {
    let halves: Vec<u16> = texels
        .iter()
        .flat_map(|t| t.iter().map(|&c| half::f16::from_f32(c).to_bits()))
        .collect();
    bytemuck::cast_slice(&halves).to_vec()
}
