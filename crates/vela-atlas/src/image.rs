// Image atlas: tiles source images into pages and tracks their upload state.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

use vela_core::{ImageKey, PixelBuffer, Rect, RenderError};

use crate::pool::TilePool;
use crate::rect::{AtlasGeometry, AtlasRect};
use crate::staging::{pad_tile, TileUpload};
use crate::{AtlasState, AtlasStats};

/// Texel format of the image atlas: linear RGBA binary16.
pub type ImageTexel = [u16; 4];

#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    pub key: ImageKey,
    pub width: u32,
    pub height: u32,
    pub cols: u32,
    pub rows: u32,
    /// One per tile, row-major. Empty unless `Uploading` or `Ready`.
    pub rects: Vec<AtlasRect>,
    pub state: AtlasState,
    upload_frame: Option<u64>,
}

impl ImageDescriptor {
    pub fn is_drawable(&self) -> bool {
        self.state == AtlasState::Ready
    }

    pub fn tile(&self, col: u32, row: u32) -> Option<&AtlasRect> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.rects.get((row * self.cols + col) as usize)
    }

    /// Image-pixel bounds of the tile at (col, row).
    pub fn tile_bounds(&self, col: u32, row: u32, tile_pixels: u32) -> Rect {
        let x = col * tile_pixels;
        let y = row * tile_pixels;
        let w = tile_pixels.min(self.width - x);
        let h = tile_pixels.min(self.height - y);
        Rect::new(x as f32, y as f32, w as f32, h as f32)
    }
}

/// Handle worker threads use to pass decoded images to the render thread.
#[derive(Clone)]
pub struct ImageLoader {
    tx: Sender<PixelBuffer>,
}

impl ImageLoader {
    /// Returns false once the atlas has been dropped.
    pub fn submit(&self, pixels: PixelBuffer) -> bool {
        self.tx.send(pixels).is_ok()
    }
}

pub struct ImageAtlas {
    pool: TilePool<ImageKey, ImageTexel>,
    descriptors: HashMap<ImageKey, ImageDescriptor>,
    loader_tx: Sender<PixelBuffer>,
    loader_rx: Receiver<PixelBuffer>,
}

impl ImageAtlas {
    pub fn new(geometry: AtlasGeometry, frames_in_flight: u32) -> Result<Self, RenderError> {
        let (loader_tx, loader_rx) = mpsc::channel();
        Ok(Self {
            pool: TilePool::new(geometry, frames_in_flight, [0; 4])?,
            descriptors: HashMap::new(),
            loader_tx,
            loader_rx,
        })
    }

    pub fn geometry(&self) -> AtlasGeometry {
        self.pool.geometry()
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

    pub fn loader(&self) -> ImageLoader {
        ImageLoader {
            tx: self.loader_tx.clone(),
        }
    }

    /// Stage every image handed over by workers since the last call.
    pub fn drain_loader(&mut self) -> Vec<ImageKey> {
        let mut keys = Vec::new();
        while let Ok(pixels) = self.loader_rx.try_recv() {
            keys.push(self.get_or_upload(&pixels).key);
        }
        keys
    }

    pub fn descriptor(&self, key: ImageKey) -> Option<&ImageDescriptor> {
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

    /// Look up an image by content, uploading it on first use or after
    /// eviction. Repeated calls for the same key return the same descriptor
    /// and stage nothing further. The result is only drawable when `Ready`.
    pub fn get_or_upload(&mut self, pixels: &PixelBuffer) -> &ImageDescriptor {
        let key = pixels.key();
        let resident = self
            .descriptors
            .get(&key)
            .is_some_and(|d| matches!(d.state, AtlasState::Uploading | AtlasState::Ready));
        if resident {
            self.pool.stats.hits += 1;
            self.pool.touch_owner(&key);
        } else {
            self.pool.stats.misses += 1;
            self.upload(pixels);
        }
        self.sync_evictions();
        &self.descriptors[&key]
    }

    fn upload(&mut self, pixels: &PixelBuffer) {
        let key = pixels.key();
        let geometry = self.pool.geometry();
        let tile = geometry.tile_pixels;
        let cols = pixels.width().div_ceil(tile);
        let rows = pixels.height().div_ceil(tile);
        let mut descriptor = ImageDescriptor {
            key,
            width: pixels.width(),
            height: pixels.height(),
            cols,
            rows,
            rects: Vec::new(),
            state: AtlasState::NotLoaded,
            upload_frame: None,
        };

        if cols * rows == 0 {
            descriptor.state = AtlasState::Ready;
            self.descriptors.insert(key, descriptor);
            return;
        }

        let pages = match self.pool.allocate(key, (cols * rows) as usize) {
            Ok(pages) => pages,
            Err(e) => {
                log::warn!("image {:?} not uploaded: {}", key, e);
                descriptor.state = AtlasState::Evicted;
                self.descriptors.insert(key, descriptor);
                return;
            }
        };

        for (i, page) in pages.iter().enumerate() {
            let col = i as u32 % cols;
            let row = i as u32 / cols;
            let bounds = descriptor.tile_bounds(col, row, tile);
            let (x0, y0) = (bounds.min.x as i64, bounds.min.y as i64);
            let (w, h) = (bounds.width() as u32, bounds.height() as u32);
            let texels = pad_tile(&geometry, w, h, |x, y| {
                pixels.pixel_clamped(x0 + x as i64, y0 + y as i64)
            });
            self.pool.staging.push(&geometry, *page, texels);
            descriptor.rects.push(AtlasRect::new(&geometry, *page, w, h));
        }
        descriptor.state = AtlasState::Uploading;
        self.descriptors.insert(key, descriptor);
    }

    fn sync_evictions(&mut self) {
        for key in self.pool.take_evicted() {
            if let Some(d) = self.descriptors.get_mut(&key) {
                d.rects.clear();
                d.state = AtlasState::Evicted;
                d.upload_frame = None;
            }
        }
    }

    pub fn has_pending_uploads(&self) -> bool {
        !self.pool.staging.is_empty()
    }

    /// Hand the staged tiles to `frame`'s command buffer.
    pub fn take_uploads(&mut self, frame: u64) -> Vec<TileUpload<ImageTexel>> {
        for d in self.descriptors.values_mut() {
            if d.state == AtlasState::Uploading && d.upload_frame.is_none() {
                d.upload_frame = Some(frame);
            }
        }
        self.pool.staging.take()
    }

    /// `frame`'s fence signalled: its uploads are resident.
    pub fn retire(&mut self, frame: u64) {
        for d in self.descriptors.values_mut() {
            if d.state == AtlasState::Uploading && d.upload_frame.is_some_and(|f| f <= frame) {
                d.state = AtlasState::Ready;
            }
        }
    }

    /// Drop an image and release its pages.
    pub fn remove(&mut self, key: ImageKey) {
        if self.descriptors.remove(&key).is_some() {
            self.pool.release_owner(&key);
        }
    }

    /// Every rect of every live descriptor.
    pub fn rects(&self) -> impl Iterator<Item = &AtlasRect> {
        self.descriptors.values().flat_map(|d| d.rects.iter())
    }
}
