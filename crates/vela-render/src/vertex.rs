// GPU vertex types for the flat, image and SDF pipelines, and the shared
// frame constants block.

use bytemuck::{Pod, Zeroable};

/// Solid-color quad corner. Positions are window pixels, `z` is depth.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FlatVertex {
    pub position: [f32; 3],
    /// Linear RGBA as binary16.
    pub color: [u16; 4],
    /// Window-pixel clip rectangle: min x, min y, max x, max y.
    pub clip: [f32; 4],
}

impl FlatVertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<FlatVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float16x4,
            },
            wgpu::VertexAttribute {
                offset: 20,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x4,
            },
        ],
    };
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ImageVertex {
    pub position: [f32; 3],
    /// Atlas u, v and array layer.
    pub tex: [f32; 3],
    pub clip: [f32; 4],
    /// Multiplies the sampled texel; 0 for the transparent fallback.
    pub alpha: f32,
}

impl ImageVertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<ImageVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x4,
            },
            wgpu::VertexAttribute {
                offset: 40,
                shader_location: 3,
                format: wgpu::VertexFormat::Float32,
            },
        ],
    };
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SdfVertex {
    pub position: [f32; 3],
    pub tex: [f32; 3],
    pub color: [u16; 4],
    pub clip: [f32; 4],
    /// Turns `median - 0.5` into a distance in window pixels.
    pub range: f32,
}

impl SdfVertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<SdfVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float16x4,
            },
            wgpu::VertexAttribute {
                offset: 32,
                shader_location: 3,
                format: wgpu::VertexFormat::Float32x4,
            },
            wgpu::VertexAttribute {
                offset: 48,
                shader_location: 4,
                format: wgpu::VertexFormat::Float32,
            },
        ],
    };
}

/// Uniform block shared by every pipeline, rewritten once per frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameConstants {
    pub window_extent: [f32; 2],
    /// Pixels to clip space: (2 / width, -2 / height).
    pub viewport_scale: [f32; 2],
    /// Glyph atlas texture extent in texels.
    pub atlas_extent: [f32; 2],
    /// One glyph atlas texel in uv units.
    pub atlas_scale: [f32; 2],
    /// Sub-pixel sampling mode of the SDF pipeline, see
    /// `SubpixelOrientation::shader_mode`.
    pub subpixel_mode: u32,
    pub _pad: [u32; 3],
}

impl FrameConstants {
    pub fn new(window: vela_core::Size, glyph_atlas: (u32, u32), subpixel_mode: u32) -> Self {
        let w = window.width.max(1.0);
        let h = window.height.max(1.0);
        let aw = glyph_atlas.0.max(1) as f32;
        let ah = glyph_atlas.1.max(1) as f32;
        Self {
            window_extent: [window.width, window.height],
            viewport_scale: [2.0 / w, -2.0 / h],
            atlas_extent: [aw, ah],
            atlas_scale: [1.0 / aw, 1.0 / ah],
            subpixel_mode,
            _pad: [0; 3],
        }
    }
}

/// Index pattern of one quad whose corners are emitted TL, TR, BL, BR.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 1, 3];

/// Static index data for `quads` quads.
pub fn quad_indices(quads: usize) -> Vec<u32> {
    (0..quads as u32)
        .flat_map(|q| QUAD_INDICES.map(|i| q * 4 + i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_match_struct_sizes() {
        assert_eq!(std::mem::size_of::<FlatVertex>(), 36);
        assert_eq!(std::mem::size_of::<ImageVertex>(), 44);
        assert_eq!(std::mem::size_of::<SdfVertex>(), 52);
        assert_eq!(std::mem::size_of::<FrameConstants>(), 48);
    }

    #[test]
    fn indices_repeat_per_quad() {
        assert_eq!(quad_indices(2), vec![0, 1, 2, 2, 1, 3, 4, 5, 6, 6, 5, 7]);
    }
}
