// SDF glyph atlas: one distance-field tile per (font, glyph), rasterized on
// first use and shared by every size the glyph is drawn at.

use std::collections::HashMap;

use vela_core::{FontBook, FontFace, FontGlyph, GlyphId, Rect, RenderError, Vec2};

use crate::pool::TilePool;
use crate::rect::{AtlasGeometry, AtlasRect};
use crate::sdf::{generate_msdf, SdfField};
use crate::staging::{pad_tile, TileUpload};
use crate::{AtlasState, AtlasStats};

/// Texel format of the glyph atlas: quantized MSDF, alpha = true SDF.
pub type GlyphTexel = [u8; 4];

/// Flattening tolerance in tile texels.
const FLATTEN_TOLERANCE: f32 = 0.05;

#[derive(Debug, Clone)]
pub struct GlyphDescriptor {
    pub key: FontGlyph,
    /// None for glyphs without an outline, which draw nothing.
    pub rect: Option<AtlasRect>,
    /// Glyph bounds in em units, relative to the em square (y down,
    /// baseline at 1). Independent of the rasterization scale.
    pub em_box: Option<Rect>,
    /// Tile texels per em the field was rasterized at.
    pub sdf_scale: f32,
    pub state: AtlasState,
    upload_frame: Option<u64>,
}

impl GlyphDescriptor {
    pub fn is_drawable(&self) -> bool {
        self.state == AtlasState::Ready && self.rect.is_some()
    }

    /// Destination quad covering the whole tile when the em square is drawn
    /// at `em_square`.
    pub fn quad_for(&self, em_square: Rect, tile_pixels: u32) -> Rect {
        let em = em_square.width();
        let half = tile_pixels as f32 * 0.5 / self.sdf_scale * em;
        let cx = (em_square.min.x + em_square.max.x) * 0.5;
        let cy = (em_square.min.y + em_square.max.y) * 0.5;
        Rect::from_min_max(Vec2::new(cx - half, cy - half), Vec2::new(cx + half, cy + half))
    }

    /// Factor turning `sampled - 0.5` into a signed distance in destination
    /// pixels for an em of `dst_em_pixels`.
    pub fn distance_scale(&self, dst_em_pixels: f32, range: f32) -> f32 {
        2.0 * range * dst_em_pixels / self.sdf_scale
    }
}

/// A glyph rendered to a distance field, before it is placed in a page.
#[derive(Debug, Clone)]
pub struct RasterizedGlyph {
    pub field: SdfField,
    pub em_box: Rect,
    pub sdf_scale: f32,
}

/// Rasterize `glyph` into a `tile_pixels` square field centered on the em
/// square. Glyphs that would overflow the tile at `em_pixels` are
/// rasterized at a smaller scale. Returns None for empty glyphs.
pub fn rasterize_glyph(
    face: &dyn FontFace,
    glyph: GlyphId,
    tile_pixels: u32,
    em_pixels: f32,
    range: f32,
) -> Option<RasterizedGlyph> {
    let outline = face.outline(glyph)?;
    let bbox = face.bounding_box(glyph).or_else(|| outline.bounds())?;
    let upem = face.units_per_em().max(1.0);
    let em_box = Rect::from_min_max(
        Vec2::new(bbox.min.x / upem, 1.0 - bbox.max.y / upem),
        Vec2::new(bbox.max.x / upem, 1.0 - bbox.min.y / upem),
    );

    let reach = [em_box.min.x, em_box.max.x, em_box.min.y, em_box.max.y]
        .iter()
        .map(|v| (v - 0.5).abs())
        .fold(0.0f32, f32::max);
    let half_tile = tile_pixels as f32 * 0.5;
    let mut scale = em_pixels;
    if reach > 0.0 {
        let fit = (half_tile - range) / reach;
        if fit < scale {
            log::debug!("glyph {:?} rasterized at {:.1} px/em to fit its tile", glyph, fit);
            scale = fit.max(1.0);
        }
    }

    let path = outline.map_points(|p| {
        Vec2::new(
            half_tile + (p.x / upem - 0.5) * scale,
            half_tile + ((1.0 - p.y / upem) - 0.5) * scale,
        )
    });
    let field = generate_msdf(&path, tile_pixels, tile_pixels, range, FLATTEN_TOLERANCE);
    Some(RasterizedGlyph {
        field,
        em_box,
        sdf_scale: scale,
    })
}

pub struct GlyphAtlas {
    pool: TilePool<FontGlyph, GlyphTexel>,
    descriptors: HashMap<FontGlyph, GlyphDescriptor>,
    fonts: FontBook,
    em_pixels: f32,
    range: f32,
}

impl GlyphAtlas {
    pub fn new(
        geometry: AtlasGeometry,
        frames_in_flight: u32,
        em_pixels: f32,
        range: f32,
        fonts: FontBook,
    ) -> Result<Self, RenderError> {
        Ok(Self {
            pool: TilePool::new(geometry, frames_in_flight, [0; 4])?,
            descriptors: HashMap::new(),
            fonts,
            em_pixels,
            range,
        })
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    pub fn fonts_mut(&mut self) -> &mut FontBook {
        &mut self.fonts
    }

    pub fn geometry(&self) -> AtlasGeometry {
        self.pool.geometry()
    }

    pub fn range(&self) -> f32 {
        self.range
    }

    pub fn transparent(&self) -> AtlasRect {
        self.pool.transparent()
    }

    pub fn stats(&self) -> AtlasStats {
        self.pool.stats
    }

    pub fn allocator(&self) -> &crate::PageAllocator {
        &self.pool.allocator
    }

    pub fn begin_frame(&mut self, frame: u64) {
        self.pool.begin_frame(frame);
    }

    pub fn descriptor(&self, key: FontGlyph) -> Option<&GlyphDescriptor> {
        self.descriptors.get(&key)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn count_in_state(&self, state: AtlasState) -> usize {
        self.descriptors.values().filter(|d| d.state == state).count()
    }

    /// Look up a glyph, rasterizing it on first use or after eviction.
    pub fn get_or_rasterize(&mut self, key: FontGlyph) -> &GlyphDescriptor {
        let resident = self
            .descriptors
            .get(&key)
            .is_some_and(|d| matches!(d.state, AtlasState::Uploading | AtlasState::Ready));
        if resident {
            self.pool.stats.hits += 1;
            self.pool.touch_owner(&key);
        } else {
            self.pool.stats.misses += 1;
            self.rasterize(key);
        }
        self.sync_evictions();
        &self.descriptors[&key]
    }

    fn rasterize(&mut self, key: FontGlyph) {
        let geometry = self.pool.geometry();
        let mut descriptor = GlyphDescriptor {
            key,
            rect: None,
            em_box: None,
            sdf_scale: self.em_pixels,
            state: AtlasState::Ready,
            upload_frame: None,
        };

        let Some(face) = self.fonts.get(key.font).cloned() else {
            log::warn!("glyph {:?} requested from unknown font", key);
            self.descriptors.insert(key, descriptor);
            return;
        };
        let Some(glyph) = rasterize_glyph(
            face.as_ref(),
            key.glyph,
            geometry.tile_pixels,
            self.em_pixels,
            self.range,
        ) else {
            self.descriptors.insert(key, descriptor);
            return;
        };
        descriptor.em_box = Some(glyph.em_box);
        descriptor.sdf_scale = glyph.sdf_scale;

        let page = match self.pool.allocate(key, 1) {
            Ok(pages) => pages[0],
            Err(e) => {
                log::warn!("glyph {:?} not uploaded: {}", key, e);
                descriptor.state = AtlasState::Evicted;
                self.descriptors.insert(key, descriptor);
                return;
            }
        };

        let texels = glyph.field.quantize();
        let size = geometry.tile_pixels;
        let padded = pad_tile(&geometry, size, size, |x, y| texels[(y * size + x) as usize]);
        self.pool.staging.push(&geometry, page, padded);
        descriptor.rect = Some(AtlasRect::new(&geometry, page, size, size));
        descriptor.state = AtlasState::Uploading;
        self.descriptors.insert(key, descriptor);
    }

    fn sync_evictions(&mut self) {
        for key in self.pool.take_evicted() {
            if let Some(d) = self.descriptors.get_mut(&key) {
                d.rect = None;
                d.state = AtlasState::Evicted;
                d.upload_frame = None;
            }
        }
    }

    pub fn has_pending_uploads(&self) -> bool {
        !self.pool.staging.is_empty()
    }

    pub fn take_uploads(&mut self, frame: u64) -> Vec<TileUpload<GlyphTexel>> {
        for d in self.descriptors.values_mut() {
            if d.state == AtlasState::Uploading && d.upload_frame.is_none() {
                d.upload_frame = Some(frame);
            }
        }
        self.pool.staging.take()
    }

    pub fn retire(&mut self, frame: u64) {
        for d in self.descriptors.values_mut() {
            if d.state == AtlasState::Uploading && d.upload_frame.is_some_and(|f| f <= frame) {
                d.state = AtlasState::Ready;
            }
        }
    }

    pub fn rects(&self) -> impl Iterator<Item = &AtlasRect> {
        self.descriptors.values().filter_map(|d| d.rect.as_ref())
    }
}
