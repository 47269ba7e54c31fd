// Atlas textures, the off-screen HDR target and its depth buffer.

use bytemuck::Pod;
use vela_atlas::{AtlasGeometry, TileUpload};
use vela_core::Size;

/// Linear off-screen color target every quad pipeline renders into.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub const IMAGE_ATLAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const GLYPH_ATLAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// A 2D-array texture holding one atlas; each layer is a grid of pages.
pub struct AtlasTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    extent: (u32, u32, u32),
    bytes_per_texel: u32,
}

impl AtlasTexture {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        geometry: &AtlasGeometry,
        format: wgpu::TextureFormat,
    ) -> Self {
        let (width, height, layers) = geometry.extent();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });
        Self {
            texture,
            view,
            extent: (width, height, layers),
            bytes_per_texel: format.block_copy_size(None).unwrap_or(4),
        }
    }

    pub fn extent(&self) -> (u32, u32, u32) {
        self.extent
    }

    /// Record copies of `uploads` into `encoder`, ahead of the frame's draw
    /// commands. Returns the number of tiles copied.
    pub fn copy_tiles<P: Pod>(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        uploads: &[TileUpload<P>],
    ) -> usize {
        use wgpu::util::DeviceExt;
        if uploads.is_empty() {
            return 0;
        }
        let mut staging = Vec::new();
        let mut placed = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let bytes: &[u8] = bytemuck::cast_slice(&upload.texels);
            let row_bytes = (upload.size * self.bytes_per_texel) as usize;
            let (padded, stride) = pad_rows(bytes, row_bytes, upload.size as usize);
            placed.push((staging.len() as u64, stride, upload));
            staging.extend_from_slice(&padded);
        }
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("atlas_staging"),
            contents: &staging,
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        for (offset, stride, upload) in &placed {
            let (x, y, layer) = upload.origin;
            encoder.copy_buffer_to_texture(
                wgpu::ImageCopyBuffer {
                    buffer: &buffer,
                    layout: wgpu::ImageDataLayout {
                        offset: *offset,
                        bytes_per_row: Some(*stride),
                        rows_per_image: Some(upload.size),
                    },
                },
                wgpu::ImageCopyTexture {
                    texture: &self.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d { x, y, z: layer },
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::Extent3d {
                    width: upload.size,
                    height: upload.size,
                    depth_or_array_layers: 1,
                },
            );
        }
        placed.len()
    }
}

/// Copy `rows` rows of `row_bytes` each into rows padded to the buffer copy
/// alignment. Returns the data and the padded stride.
pub fn pad_rows(data: &[u8], row_bytes: usize, rows: usize) -> (Vec<u8>, u32) {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    let stride = row_bytes.div_ceil(align) * align;
    let mut out = vec![0u8; stride * rows];
    for (dst, src) in out.chunks_exact_mut(stride).zip(data.chunks(row_bytes)) {
        dst[..src.len()].copy_from_slice(src);
    }
    (out, stride as u32)
}

/// HDR color and depth targets sized to the window.
pub struct RenderTargets {
    pub hdr_view: wgpu::TextureView,
    pub depth_view: wgpu::TextureView,
    pub tonemap_bind_group: wgpu::BindGroup,
}

impl RenderTargets {
    pub fn new(device: &wgpu::Device, tonemap_layout: &wgpu::BindGroupLayout, extent: Size) -> Self {
        let width = (extent.width.round() as u32).max(1);
        let height = (extent.height.round() as u32).max(1);
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let hdr = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("hdr_target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: HDR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let hdr_view = hdr.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        let tonemap_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tonemap_bg"),
            layout: tonemap_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&hdr_view),
            }],
        });
        Self {
            hdr_view,
            depth_view,
            tonemap_bind_group,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        // A 66-texel bordered tile of Rgba16Float: 528 bytes per row.
        let row = 66 * 8;
        let data: Vec<u8> = (0..row * 3).map(|i| (i % 251) as u8).collect();
        let (padded, stride) = pad_rows(&data, row, 3);
        assert_eq!(stride, 768);
        assert_eq!(padded.len(), 768 * 3);
        for r in 0..3 {
            let start = r * stride as usize;
            assert_eq!(&padded[start..start + row], &data[r * row..(r + 1) * row]);
            assert!(padded[start + row..start + stride as usize].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn aligned_rows_are_unchanged() {
        let data = vec![7u8; 512 * 2];
        let (padded, stride) = pad_rows(&data, 512, 2);
        assert_eq!(stride, 512);
        assert_eq!(padded, data);
    }
}
