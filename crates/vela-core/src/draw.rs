// Draw context and the canvas the widget tree paints into.

use std::sync::Arc;

use crate::font::layout_line;
use crate::{BezierPath, Color, FontFace, FontGlyph, FontId, Mat4, PixelBuffer, Rect, Size, Vec2};

/// Transform and clip state carried down the widget tree by value.
///
/// `transform` maps widget coordinates to window pixels; `clip` is in window
/// pixels and is emitted per vertex, so nesting costs nothing on the GPU.
/// A child's clip is always a subset of its parent's.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawContext {
    pub transform: Mat4,
    pub clip: Rect,
}

impl DrawContext {
    /// Root context covering the whole window.
    pub fn root(window_extent: Size) -> Self {
        Self {
            transform: Mat4::IDENTITY,
            clip: Rect::from_size(window_extent),
        }
    }

    /// Context for a child occupying `rect` in this context's coordinates.
    pub fn child(&self, rect: Rect) -> Self {
        let bounds = self.transform.transform_rect_bounds(&rect);
        Self {
            transform: self.transform,
            clip: self.clip.intersect(&bounds),
        }
    }

    /// Context whose coordinates are offset by `offset`; clip unchanged.
    pub fn offset(&self, offset: Vec2) -> Self {
        self.transformed(Mat4::translation(offset.x, offset.y, 0.0))
    }

    pub fn transformed(&self, m: Mat4) -> Self {
        Self {
            transform: self.transform * m,
            clip: self.clip,
        }
    }

    /// Narrow the clip without changing coordinates.
    pub fn clipped(&self, clip: Rect) -> Self {
        let bounds = self.transform.transform_rect_bounds(&clip);
        Self {
            transform: self.transform,
            clip: self.clip.intersect(&bounds),
        }
    }
}

/// Sink for the four primitive kinds. The GPU painter routes each call to
/// its pipeline; depth ordering follows call order.
pub trait Canvas {
    /// Solid quad on the flat pipeline.
    fn draw_quad(&mut self, ctx: &DrawContext, rect: Rect, color: Color);

    /// `src` is in image pixels, `dst` in context coordinates.
    fn draw_image(&mut self, ctx: &DrawContext, image: &PixelBuffer, src: Rect, dst: Rect);

    /// `dst` is the glyph's em square.
    fn draw_glyph(&mut self, ctx: &DrawContext, glyph: FontGlyph, dst: Rect, color: Color);

    /// Tessellated once per distinct path and cached.
    fn draw_filled_shape(&mut self, ctx: &DrawContext, path: &BezierPath, color: Color);

    fn font(&self, id: FontId) -> Option<Arc<dyn FontFace>>;

    /// Lay out `text` along the baseline at `origin` and draw one glyph per
    /// visible character. Returns the advance width.
    fn draw_text(
        &mut self,
        ctx: &DrawContext,
        font: FontId,
        text: &str,
        origin: Vec2,
        em_pixels: f32,
        color: Color,
    ) -> f32 {
        let Some(face) = self.font(font) else {
            log::debug!("draw_text: unknown font {:?}", font);
            return 0.0;
        };
        let scale = em_pixels / face.units_per_em().max(1.0);
        let mut width = 0.0;
        for (glyph, x) in layout_line(face.as_ref(), text, em_pixels) {
            width = x + face.advance(glyph) * scale;
            if face.bounding_box(glyph).is_none() {
                continue;
            }
            let dst = Rect::from_min_max(
                Vec2::new(origin.x + x, origin.y - em_pixels),
                Vec2::new(origin.x + x + em_pixels, origin.y),
            );
            self.draw_glyph(ctx, FontGlyph::new(font, glyph), dst, color);
        }
        width
    }
}
