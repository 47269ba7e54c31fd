// CPU side of recording a frame: the atlases, shape cache and vertex
// streams, and the painter that turns canvas calls into quads.

use std::sync::Arc;

use vela_atlas::{AtlasGeometry, AtlasRect, AtlasState, GlyphAtlas, ImageAtlas};
use vela_core::{
    BezierPath, Canvas, Color, Config, DrawContext, FontBook, FontFace, FontGlyph, FontId, Mat4,
    PixelBuffer, Rect, RenderError, Vec2,
};
use vela_frame::RecordStats;

use crate::stream::{VertexStream, INITIAL_QUADS};
use crate::tessellate::ShapeCache;
use crate::vertex::{FlatVertex, ImageVertex, SdfVertex};

/// Depth of the first primitive of a frame; each later one is nearer.
const DEPTH_START: f32 = 1.0;
const DEPTH_STEP: f32 = 1.0 / (1 << 20) as f32;

/// Everything a frame records into, owned by the render thread.
pub struct FrameResources {
    pub images: ImageAtlas,
    pub glyphs: GlyphAtlas,
    pub shapes: ShapeCache,
    pub flat: VertexStream<FlatVertex>,
    pub image: VertexStream<ImageVertex>,
    pub sdf: VertexStream<SdfVertex>,
}

impl FrameResources {
    pub fn new(config: &Config, fonts: FontBook) -> Result<Self, RenderError> {
        let geometry = AtlasGeometry::from_config(config);
        Self::with_geometry(config, geometry, fonts)
    }

    /// Like `new`, with the atlas geometry already fitted to the device.
    pub fn with_geometry(
        config: &Config,
        geometry: AtlasGeometry,
        fonts: FontBook,
    ) -> Result<Self, RenderError> {
        let slots = config.frames_in_flight.max(1);
        Ok(Self {
            images: ImageAtlas::new(geometry, slots)?,
            glyphs: GlyphAtlas::new(
                geometry,
                slots,
                config.sdf_em_pixels as f32,
                config.sdf_range_pixels,
                fonts,
            )?,
            shapes: ShapeCache::new(),
            flat: VertexStream::new("flat_vertices", slots as usize, INITIAL_QUADS),
            image: VertexStream::new("image_vertices", slots as usize, INITIAL_QUADS),
            sdf: VertexStream::new("sdf_vertices", slots as usize, INITIAL_QUADS),
        })
    }

    /// Reset the streams for `slot` and stage images handed in by workers.
    pub fn begin_frame(&mut self, frame: u64, slot: usize) {
        self.images.begin_frame(frame);
        self.glyphs.begin_frame(frame);
        let loaded = self.images.drain_loader();
        if !loaded.is_empty() {
            log::debug!("staged {} worker images", loaded.len());
        }
        self.flat.begin(slot);
        self.image.begin(slot);
        self.sdf.begin(slot);
    }

    pub fn painter(&mut self) -> FramePainter<'_> {
        FramePainter {
            res: self,
            depth: DEPTH_START,
            overflowed: false,
        }
    }

    /// Grow whichever streams overflowed. Returns true if any did.
    pub fn grow(&mut self) -> bool {
        let flat = self.flat.grow();
        let image = self.image.grow();
        let sdf = self.sdf.grow();
        flat || image || sdf
    }

    pub fn retire(&mut self, frame: u64) {
        self.images.retire(frame);
        self.glyphs.retire(frame);
    }

    pub fn has_pending_uploads(&self) -> bool {
        self.images.has_pending_uploads()
            || self.glyphs.has_pending_uploads()
            || self.glyphs.count_in_state(AtlasState::Uploading) > 0
            || self.images.count_in_state(AtlasState::Uploading) > 0
    }

    pub fn max_quads(&self) -> usize {
        self.flat
            .quads_per_slot()
            .max(self.image.quads_per_slot())
            .max(self.sdf.quads_per_slot())
    }

    pub fn stats(&self) -> RecordStats {
        RecordStats {
            flat_quads: self.flat.quads() as u32,
            image_quads: self.image.quads() as u32,
            sdf_quads: self.sdf.quads() as u32,
        }
    }
}

/// The `Canvas` handed to the widget tree for one frame.
///
/// Primitives are written in call order with strictly decreasing depth, so
/// the depth test resolves overlap both within and across pipelines.
pub struct FramePainter<'a> {
    res: &'a mut FrameResources,
    depth: f32,
    overflowed: bool,
}

impl FramePainter<'_> {
    /// Quads written so far, or `FrameTooLarge` if any stream overflowed.
    pub fn finish(self) -> Result<RecordStats, RenderError> {
        if self.overflowed {
            return Err(RenderError::FrameTooLarge);
        }
        Ok(self.res.stats())
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    fn next_depth(&mut self) -> f32 {
        self.depth = (self.depth - DEPTH_STEP).max(0.0);
        self.depth
    }

    fn place<V: bytemuck::Pod>(
        stream: &mut VertexStream<V>,
        overflowed: &mut bool,
        quad: [V; 4],
    ) {
        // Keep placing after an overflow so every stream that ran out is
        // flagged and a single grow covers the retry.
        let already = stream.overflowed();
        if stream.place(quad).is_err() {
            if !already {
                log::debug!("{} stream overflowed", stream.label());
            }
            *overflowed = true;
        }
    }

    fn push_flat(&mut self, corners: [Vec2; 4], z: f32, color: [u16; 4], clip: [f32; 4]) {
        let quad = corners.map(|p| FlatVertex {
            position: [p.x, p.y, z],
            color,
            clip,
        });
        Self::place(&mut self.res.flat, &mut self.overflowed, quad);
    }

    fn push_image(&mut self, corners: [Vec2; 4], rect: &AtlasRect, uvs: [[f32; 2]; 4], alpha: f32, clip: [f32; 4]) {
        let z = self.next_depth();
        let layer = rect.layer();
        let mut quad = [ImageVertex {
            position: [0.0; 3],
            tex: [0.0; 3],
            clip,
            alpha,
        }; 4];
        for (v, (p, uv)) in quad.iter_mut().zip(corners.iter().zip(uvs)) {
            v.position = [p.x, p.y, z];
            v.tex = [uv[0], uv[1], layer];
        }
        Self::place(&mut self.res.image, &mut self.overflowed, quad);
    }
}

/// Corners TL, TR, BL, BR of `rect` mapped through `m`.
fn corners(m: &Mat4, rect: &Rect) -> [Vec2; 4] {
    [
        m.transform_point(rect.min),
        m.transform_point(Vec2::new(rect.max.x, rect.min.y)),
        m.transform_point(Vec2::new(rect.min.x, rect.max.y)),
        m.transform_point(rect.max),
    ]
}

/// Length of the transformed unit x vector.
fn linear_scale(m: &Mat4) -> f32 {
    (m.transform_point(Vec2::new(1.0, 0.0)) - m.transform_point(Vec2::ZERO)).length()
}

fn visible(ctx: &DrawContext, rect: &Rect) -> bool {
    !rect.is_empty() && ctx.transform.transform_rect_bounds(rect).intersects(&ctx.clip)
}

impl Canvas for FramePainter<'_> {
    fn draw_quad(&mut self, ctx: &DrawContext, rect: Rect, color: Color) {
        if color.a <= 0.0 || !visible(ctx, &rect) {
            return;
        }
        let z = self.next_depth();
        self.push_flat(corners(&ctx.transform, &rect), z, color.to_vec4h(), ctx.clip.as_array());
    }

    fn draw_image(&mut self, ctx: &DrawContext, image: &PixelBuffer, src: Rect, dst: Rect) {
        let bounds = Rect::new(0.0, 0.0, image.width() as f32, image.height() as f32);
        let src = src.intersect(&bounds);
        if src.is_empty() || !visible(ctx, &dst) {
            return;
        }
        let clip = ctx.clip.as_array();
        let tile = self.res.images.geometry().tile_pixels;
        let descriptor = self.res.images.get_or_upload(image).clone();

        if !descriptor.is_drawable() {
            let fallback = self.res.images.transparent();
            let uvs = fallback.uv_corners();
            self.push_image(corners(&ctx.transform, &dst), &fallback, uvs, 0.0, clip);
            return;
        }

        let sx = dst.width() / src.width();
        let sy = dst.height() / src.height();
        let tile_f = tile as f32;
        let col0 = (src.min.x / tile_f).floor() as u32;
        let row0 = (src.min.y / tile_f).floor() as u32;
        let col1 = ((src.max.x / tile_f).ceil() as u32).min(descriptor.cols);
        let row1 = ((src.max.y / tile_f).ceil() as u32).min(descriptor.rows);

        for row in row0..row1 {
            for col in col0..col1 {
                let Some(rect) = descriptor.tile(col, row) else {
                    continue;
                };
                let tb = descriptor.tile_bounds(col, row, tile);
                let part = src.intersect(&tb);
                if part.is_empty() {
                    continue;
                }
                let fx0 = (part.min.x - tb.min.x) / tb.width();
                let fy0 = (part.min.y - tb.min.y) / tb.height();
                let fx1 = (part.max.x - tb.min.x) / tb.width();
                let fy1 = (part.max.y - tb.min.y) / tb.height();
                let uvs = [
                    rect.uv_at(fx0, fy0),
                    rect.uv_at(fx1, fy0),
                    rect.uv_at(fx0, fy1),
                    rect.uv_at(fx1, fy1),
                ];
                let piece = Rect::from_min_max(
                    Vec2::new(
                        dst.min.x + (part.min.x - src.min.x) * sx,
                        dst.min.y + (part.min.y - src.min.y) * sy,
                    ),
                    Vec2::new(
                        dst.min.x + (part.max.x - src.min.x) * sx,
                        dst.min.y + (part.max.y - src.min.y) * sy,
                    ),
                );
                if !visible(ctx, &piece) {
                    continue;
                }
                let rect = *rect;
                self.push_image(corners(&ctx.transform, &piece), &rect, uvs, 1.0, clip);
            }
        }
    }

    fn draw_glyph(&mut self, ctx: &DrawContext, glyph: FontGlyph, dst: Rect, color: Color) {
        if color.a <= 0.0 || dst.is_empty() {
            return;
        }
        let tile = self.res.glyphs.geometry().tile_pixels;
        let range = self.res.glyphs.range();
        let descriptor = self.res.glyphs.get_or_rasterize(glyph).clone();
        if descriptor.state == AtlasState::Ready && descriptor.rect.is_none() {
            // No outline.
            return;
        }
        let quad = descriptor.quad_for(dst, tile);
        if !visible(ctx, &quad) {
            return;
        }
        let rect = match descriptor.rect {
            Some(rect) if descriptor.is_drawable() => rect,
            _ => self.res.glyphs.transparent(),
        };
        let em_pixels = dst.width() * linear_scale(&ctx.transform);
        let range = descriptor.distance_scale(em_pixels, range);
        let z = self.next_depth();
        let color = color.to_vec4h();
        let clip = ctx.clip.as_array();
        let layer = rect.layer();
        let uvs = rect.uv_corners();
        let points = corners(&ctx.transform, &quad);
        let mut vertices = [SdfVertex {
            position: [0.0; 3],
            tex: [0.0; 3],
            color,
            clip,
            range,
        }; 4];
        for (v, (p, uv)) in vertices.iter_mut().zip(points.iter().zip(uvs)) {
            v.position = [p.x, p.y, z];
            v.tex = [uv[0], uv[1], layer];
        }
        Self::place(&mut self.res.sdf, &mut self.overflowed, vertices);
    }

    fn draw_filled_shape(&mut self, ctx: &DrawContext, path: &BezierPath, color: Color) {
        if color.a <= 0.0 {
            return;
        }
        let Some(bounds) = path.bounds() else {
            return;
        };
        if !visible(ctx, &bounds) {
            return;
        }
        let traps = self.res.shapes.get_or_tessellate(path);
        let z = self.next_depth();
        let color = color.to_vec4h();
        let clip = ctx.clip.as_array();
        for trap in traps.iter() {
            let points = trap.corners().map(|p| ctx.transform.transform_point(p));
            self.push_flat(points, z, color, clip);
        }
    }

    fn font(&self, id: FontId) -> Option<Arc<dyn FontFace>> {
        self.res.glyphs.fonts().get(id).cloned()
    }
}
