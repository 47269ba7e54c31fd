// TrueType/OpenType faces parsed with ttf-parser.

use std::path::Path;
use std::sync::Arc;

use ttf_parser::{Face, FaceParsingError, OutlineBuilder};
use vela_core::{BezierPath, FontFace, GlyphId, Rect, Vec2};

/// Owns the font bytes; the table directory is re-parsed per query,
/// which is cheap next to outline extraction.
pub struct TtfFace {
    data: Arc<[u8]>,
    index: u32,
    units_per_em: f32,
    ascender: f32,
    descender: f32,
}

impl TtfFace {
    pub fn from_bytes(data: Vec<u8>, index: u32) -> Result<Self, FaceParsingError> {
        let data: Arc<[u8]> = data.into();
        let face = Face::parse(&data, index)?;
        let units_per_em = face.units_per_em() as f32;
        let ascender = face.ascender() as f32;
        let descender = face.descender() as f32;
        Ok(Self {
            data,
            index,
            units_per_em,
            ascender,
            descender,
        })
    }

    pub fn from_file(path: &Path) -> Option<Self> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("Failed to read font {}: {}", path.display(), e);
                return None;
            }
        };
        match Self::from_bytes(bytes, 0) {
            Ok(face) => Some(face),
            Err(e) => {
                log::warn!("Failed to parse font {}: {}", path.display(), e);
                None
            }
        }
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.index).ok()
    }
}

impl FontFace for TtfFace {
    fn units_per_em(&self) -> f32 {
        self.units_per_em
    }

    fn glyph_index(&self, ch: char) -> Option<GlyphId> {
        self.face()?.glyph_index(ch).map(|g| GlyphId(g.0))
    }

    fn advance(&self, glyph: GlyphId) -> f32 {
        self.face()
            .and_then(|f| f.glyph_hor_advance(ttf_parser::GlyphId(glyph.0)))
            .unwrap_or(0) as f32
    }

    fn bounding_box(&self, glyph: GlyphId) -> Option<Rect> {
        let r = self.face()?.glyph_bounding_box(ttf_parser::GlyphId(glyph.0))?;
        Some(Rect::from_min_max(
            Vec2::new(r.x_min as f32, r.y_min as f32),
            Vec2::new(r.x_max as f32, r.y_max as f32),
        ))
    }

    fn outline(&self, glyph: GlyphId) -> Option<BezierPath> {
        let mut builder = PathBuilder(BezierPath::new());
        self.face()?
            .outline_glyph(ttf_parser::GlyphId(glyph.0), &mut builder)?;
        Some(builder.0)
    }

    fn ascender(&self) -> f32 {
        self.ascender
    }

    fn descender(&self) -> f32 {
        self.descender
    }
}

struct PathBuilder(BezierPath);

impl OutlineBuilder for PathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(Vec2::new(x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(Vec2::new(x, y));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(Vec2::new(x1, y1), Vec2::new(x, y));
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0
            .cubic_to(Vec2::new(x1, y1), Vec2::new(x2, y2), Vec2::new(x, y));
    }

    fn close(&mut self) {
        self.0.close();
    }
}

/// Common system font locations, tried in order by the host.
pub fn system_font_candidates() -> &'static [&'static str] {
    &[
        "/System/Library/Fonts/SFNSMono.ttf",
        "/System/Library/Fonts/Menlo.ttc",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "C:\\Windows\\Fonts\\segoeui.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ]
}
