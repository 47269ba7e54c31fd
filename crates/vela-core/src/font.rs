// Font identities and the face abstraction the glyph atlas rasterizes from.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{BezierPath, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlyphId(pub u16);

/// Key of a glyph in the SDF atlas. Size is not part of the key: one
/// distance field serves every size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontGlyph {
    pub font: FontId,
    pub glyph: GlyphId,
}

impl FontGlyph {
    pub fn new(font: FontId, glyph: GlyphId) -> Self {
        Self { font, glyph }
    }
}

/// A parsed font face. Outlines are in font units, y up.
pub trait FontFace: Send + Sync {
    fn units_per_em(&self) -> f32;
    fn glyph_index(&self, ch: char) -> Option<GlyphId>;
    fn advance(&self, glyph: GlyphId) -> f32;
    fn bounding_box(&self, glyph: GlyphId) -> Option<Rect>;
    fn outline(&self, glyph: GlyphId) -> Option<BezierPath>;
    fn ascender(&self) -> f32 {
        self.units_per_em() * 0.8
    }
    fn descender(&self) -> f32 {
        -self.units_per_em() * 0.2
    }
}

/// Registry of loaded faces, shared between the draw side and the atlas.
#[derive(Default, Clone)]
pub struct FontBook {
    faces: HashMap<FontId, Arc<dyn FontFace>>,
    next_id: u32,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, face: Arc<dyn FontFace>) -> FontId {
        let id = FontId(self.next_id);
        self.next_id += 1;
        self.faces.insert(id, face);
        id
    }

    pub fn get(&self, id: FontId) -> Option<&Arc<dyn FontFace>> {
        self.faces.get(&id)
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("faces", &self.faces.len())
            .finish()
    }
}

/// Shaping-free layout: one glyph per char, advancing along the baseline.
/// Missing characters are skipped but still advance by half an em.
pub fn layout_line(face: &dyn FontFace, text: &str, font_size: f32) -> Vec<(GlyphId, f32)> {
    let scale = font_size / face.units_per_em().max(1.0);
    let mut pen = 0.0;
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match face.glyph_index(ch) {
            Some(glyph) => {
                out.push((glyph, pen));
                pen += face.advance(glyph) * scale;
            }
            None => pen += font_size * 0.5,
        }
    }
    out
}

/// Synthetic face of axis-aligned squares, one glyph per ASCII letter.
/// Used by tests and benches that must not depend on system fonts.
#[derive(Debug, Clone)]
pub struct BoxFace {
    pub units_per_em: f32,
    /// Fraction of the em square the box covers, centered.
    pub coverage: f32,
}

impl Default for BoxFace {
    fn default() -> Self {
        Self {
            units_per_em: 1000.0,
            coverage: 0.5,
        }
    }
}

impl BoxFace {
    fn box_rect(&self) -> Rect {
        let em = self.units_per_em;
        let side = em * self.coverage;
        let inset = (em - side) * 0.5;
        Rect::new(inset, inset, side, side)
    }
}

impl FontFace for BoxFace {
    fn units_per_em(&self) -> f32 {
        self.units_per_em
    }

    fn glyph_index(&self, ch: char) -> Option<GlyphId> {
        match ch {
            ' ' => Some(GlyphId(0)),
            c if c.is_ascii_graphic() => Some(GlyphId(c as u16)),
            _ => None,
        }
    }

    fn advance(&self, _glyph: GlyphId) -> f32 {
        self.units_per_em * 0.6
    }

    fn bounding_box(&self, glyph: GlyphId) -> Option<Rect> {
        (glyph.0 != 0).then(|| self.box_rect())
    }

    fn outline(&self, glyph: GlyphId) -> Option<BezierPath> {
        (glyph.0 != 0).then(|| BezierPath::rect(self.box_rect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_book_assigns_sequential_ids() {
        let mut book = FontBook::new();
        let a = book.add(Arc::new(BoxFace::default()));
        let b = book.add(Arc::new(BoxFace::default()));
        assert_eq!(a, FontId(0));
        assert_eq!(b, FontId(1));
        assert!(book.get(a).is_some());
        assert!(book.get(FontId(7)).is_none());
    }

    #[test]
    fn layout_advances_per_glyph() {
        let face = BoxFace::default();
        let line = layout_line(&face, "ab c", 10.0);
        let pens: Vec<f32> = line.iter().map(|(_, x)| *x).collect();
        assert_eq!(pens, vec![0.0, 6.0, 12.0, 18.0]);
    }

    #[test]
    fn space_has_no_outline() {
        let face = BoxFace::default();
        let space = face.glyph_index(' ').unwrap();
        assert!(face.outline(space).is_none());
        assert!(face.outline(face.glyph_index('x').unwrap()).is_some());
    }
}
