// Page ownership shared by the image and glyph atlases: which descriptor
// owns which pages, eviction with owner bookkeeping, and the shared
// transparent page.

use std::collections::HashMap;
use std::hash::Hash;

use vela_core::RenderError;

use crate::page::PageAllocator;
use crate::rect::{AtlasGeometry, AtlasRect, PageId};
use crate::staging::{pad_tile, StagingQueue};
use crate::AtlasStats;

pub(crate) struct TilePool<K, P> {
    pub allocator: PageAllocator,
    pub staging: StagingQueue<P>,
    pub stats: AtlasStats,
    transparent: AtlasRect,
    owners: HashMap<PageId, K>,
    owned: HashMap<K, Vec<PageId>>,
    evicted: Vec<K>,
    frame: u64,
}

impl<K: Copy + Eq + Hash + std::fmt::Debug, P: Copy> TilePool<K, P> {
    /// Reserves page 0 as the shared, all-zero transparent page.
    pub fn new(geometry: AtlasGeometry, frames_in_flight: u32, zero: P) -> Result<Self, RenderError> {
        let mut allocator = PageAllocator::new(geometry, frames_in_flight);
        let page = allocator.allocate_pinned()?;
        let transparent = AtlasRect::new(&geometry, page, geometry.tile_pixels, geometry.tile_pixels);
        let mut staging = StagingQueue::default();
        staging.push(&geometry, page, pad_tile(&geometry, 1, 1, |_, _| zero));
        Ok(Self {
            allocator,
            staging,
            stats: AtlasStats::default(),
            transparent,
            owners: HashMap::new(),
            owned: HashMap::new(),
            evicted: Vec::new(),
            frame: 0,
        })
    }

    pub fn geometry(&self) -> AtlasGeometry {
        *self.allocator.geometry()
    }

    pub fn transparent(&self) -> AtlasRect {
        self.transparent
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn begin_frame(&mut self, frame: u64) {
        self.frame = self.frame.max(frame);
        self.allocator.begin_frame(frame as u32);
    }

    /// Allocate `n` pages for `owner`, evicting least recently used pages
    /// while that makes progress. All-or-nothing.
    pub fn allocate(&mut self, owner: K, n: usize) -> Result<Vec<PageId>, RenderError> {
        let mut pages = Vec::with_capacity(n);
        while pages.len() < n {
            match self.allocator.allocate() {
                Ok(page) => pages.push(page),
                Err(RenderError::AtlasFull) => {
                    let freed = self.allocator.evict_until(n - pages.len(), self.frame as u32);
                    if freed.is_empty() {
                        for page in pages {
                            self.allocator.free(page);
                        }
                        return Err(RenderError::AtlasFull);
                    }
                    self.on_evicted(&freed);
                }
                Err(e) => return Err(e),
            }
        }
        for page in &pages {
            self.owners.insert(*page, owner);
        }
        self.owned.insert(owner, pages.clone());
        Ok(pages)
    }

    fn on_evicted(&mut self, freed: &[PageId]) {
        for page in freed {
            let Some(owner) = self.owners.remove(page) else {
                continue;
            };
            if let Some(pages) = self.owned.remove(&owner) {
                for other in pages.iter().filter(|p| *p != page) {
                    self.owners.remove(other);
                    self.allocator.release(*other);
                }
            }
            self.stats.evictions += 1;
            self.evicted.push(owner);
        }
    }

    /// Owners whose pages were evicted since the last call.
    pub fn take_evicted(&mut self) -> Vec<K> {
        std::mem::take(&mut self.evicted)
    }

    pub fn touch_owner(&mut self, owner: &K) {
        let frame = self.frame as u32;
        if let Some(pages) = self.owned.get(owner) {
            for page in pages {
                self.allocator.touch(*page, frame);
            }
        }
    }

    pub fn release_owner(&mut self, owner: &K) {
        if let Some(pages) = self.owned.remove(owner) {
            for page in pages {
                self.owners.remove(&page);
                self.allocator.release(page);
            }
        }
    }

    pub fn owner_of(&self, page: PageId) -> Option<K> {
        self.owners.get(&page).copied()
    }
}
