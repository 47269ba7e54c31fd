// Vela atlas: page allocation, image tiling and SDF glyph caching.
// CPU only; the renderer copies the staged tiles into its textures.

mod font;
mod glyph;
mod image;
mod page;
mod pool;
mod rect;
pub mod sdf;
mod staging;

pub use font::{system_font_candidates, TtfFace};
pub use glyph::{rasterize_glyph, GlyphAtlas, GlyphDescriptor, GlyphTexel, RasterizedGlyph};
pub use image::{ImageAtlas, ImageDescriptor, ImageLoader, ImageTexel};
pub use page::PageAllocator;
pub use rect::{AtlasGeometry, AtlasRect, PageCoord, PageId};
pub use staging::{pad_tile, StagingQueue, TileUpload};

/// Residency of an image or glyph descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtlasState {
    NotLoaded,
    /// Tiles staged or in flight; draws substitute the transparent page.
    Uploading,
    Ready,
    /// Pages reclaimed; the next request uploads again.
    Evicted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AtlasStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}
