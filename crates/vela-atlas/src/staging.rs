// Tile uploads waiting for the next frame's command buffer.

use crate::rect::{AtlasGeometry, PageId};

/// One padded tile (border included) destined for `page`.
#[derive(Debug, Clone)]
pub struct TileUpload<P> {
    pub page: PageId,
    /// Texel origin of the padded tile: (x, y, layer).
    pub origin: (u32, u32, u32),
    /// Edge length of the square tile in texels.
    pub size: u32,
    pub texels: Vec<P>,
}

#[derive(Debug)]
pub struct StagingQueue<P> {
    pending: Vec<TileUpload<P>>,
}

impl<P> Default for StagingQueue<P> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<P: Copy> StagingQueue<P> {
    pub fn push(&mut self, geometry: &AtlasGeometry, page: PageId, texels: Vec<P>) {
        let size = geometry.padded_tile();
        debug_assert_eq!(texels.len(), (size * size) as usize);
        self.pending.push(TileUpload {
            page,
            origin: geometry.padded_origin(page),
            size,
            texels,
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn take(&mut self) -> Vec<TileUpload<P>> {
        std::mem::take(&mut self.pending)
    }
}

/// Pad a `w`×`h` block of texels to a full bordered tile by clamping
/// coordinates, so the border duplicates the nearest edge texel.
pub fn pad_tile<P: Copy>(
    geometry: &AtlasGeometry,
    w: u32,
    h: u32,
    sample: impl Fn(u32, u32) -> P,
) -> Vec<P> {
    let size = geometry.padded_tile();
    let border = geometry.border as i64;
    let mut out = Vec::with_capacity((size * size) as usize);
    for py in 0..size as i64 {
        let y = (py - border).clamp(0, h.max(1) as i64 - 1) as u32;
        for px in 0..size as i64 {
            let x = (px - border).clamp(0, w.max(1) as i64 - 1) as u32;
            out.push(sample(x, y));
        }
    }
    out
}
