// Atlas geometry: page addressing and the texture rectangles handed to the
// vertex stream.

use vela_core::Config;

/// Linear page index: `layer * tiles_per_layer^2 + y * tiles_per_layer + x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

/// Page address as a tile triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageCoord {
    pub x: u32,
    pub y: u32,
    pub layer: u32,
}

/// Fixed dimensions of one atlas texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasGeometry {
    pub tiles_per_layer: u32,
    pub layers: u32,
    pub tile_pixels: u32,
    pub border: u32,
}

impl AtlasGeometry {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tiles_per_layer: config.atlas_tiles_per_layer,
            layers: config.atlas_layers,
            tile_pixels: config.tile_pixels,
            border: config.tile_border,
        }
    }

    /// Limit the texture to what the device can allocate.
    pub fn clamped_to(mut self, max_texture_dimension: u32, max_layers: u32) -> Self {
        let max_tiles = (max_texture_dimension / self.padded_tile()).max(1);
        if self.tiles_per_layer > max_tiles {
            log::info!(
                "atlas clamped from {} to {} tiles per side",
                self.tiles_per_layer,
                max_tiles
            );
            self.tiles_per_layer = max_tiles;
        }
        self.layers = self.layers.clamp(1, max_layers.max(1));
        self
    }

    pub fn padded_tile(&self) -> u32 {
        self.tile_pixels + 2 * self.border
    }

    pub fn page_count(&self) -> u32 {
        self.tiles_per_layer * self.tiles_per_layer * self.layers
    }

    /// Texture size in texels: (width, height, layers).
    pub fn extent(&self) -> (u32, u32, u32) {
        let side = self.tiles_per_layer * self.padded_tile();
        (side, side, self.layers)
    }

    pub fn coord(&self, page: PageId) -> PageCoord {
        let per_layer = self.tiles_per_layer * self.tiles_per_layer;
        let layer = page.0 / per_layer;
        let rest = page.0 % per_layer;
        PageCoord {
            x: rest % self.tiles_per_layer,
            y: rest / self.tiles_per_layer,
            layer,
        }
    }

    /// Texel origin of the padded tile (border included).
    pub fn padded_origin(&self, page: PageId) -> (u32, u32, u32) {
        let c = self.coord(page);
        let step = self.padded_tile();
        (c.x * step, c.y * step, c.layer)
    }
}

/// Where one cached entity lives: its page, the used pixel extent inside
/// the tile, and precomputed normalized texture corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasRect {
    pub page: PageId,
    pub coord: PageCoord,
    pub width: u32,
    pub height: u32,
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
}

impl AtlasRect {
    pub fn new(geometry: &AtlasGeometry, page: PageId, width: u32, height: u32) -> Self {
        let (ox, oy, _) = geometry.padded_origin(page);
        let (tex_w, tex_h, _) = geometry.extent();
        let x0 = ox + geometry.border;
        let y0 = oy + geometry.border;
        let width = width.min(geometry.tile_pixels);
        let height = height.min(geometry.tile_pixels);
        Self {
            page,
            coord: geometry.coord(page),
            width,
            height,
            uv_min: [x0 as f32 / tex_w as f32, y0 as f32 / tex_h as f32],
            uv_max: [
                (x0 + width) as f32 / tex_w as f32,
                (y0 + height) as f32 / tex_h as f32,
            ],
        }
    }

    pub fn layer(&self) -> f32 {
        self.coord.layer as f32
    }

    /// Corners in quad order: top-left, top-right, bottom-left, bottom-right.
    pub fn uv_corners(&self) -> [[f32; 2]; 4] {
        [
            self.uv_min,
            [self.uv_max[0], self.uv_min[1]],
            [self.uv_min[0], self.uv_max[1]],
            self.uv_max,
        ]
    }

    /// Texture coordinate of a point given as a fraction of the rect.
    pub fn uv_at(&self, fx: f32, fy: f32) -> [f32; 2] {
        [
            self.uv_min[0] + (self.uv_max[0] - self.uv_min[0]) * fx,
            self.uv_min[1] + (self.uv_max[1] - self.uv_min[1]) * fy,
        ]
    }
}
