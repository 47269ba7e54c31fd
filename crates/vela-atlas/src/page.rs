// Page allocator: fixed-size tiles of a layered atlas texture.
//
// Free pages sit on a stack. Allocated, unpinned pages are threaded on an
// index-linked LRU list, least recently used at the head. Each atlas owns
// its allocator and both live on the render thread, so no lock is taken.

use vela_core::RenderError;

use crate::rect::{AtlasGeometry, PageId};

const NIL: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct PageState {
    refcount: u32,
    last_used: u32,
    pinned: bool,
    free: bool,
    prev: u32,
    next: u32,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            refcount: 0,
            last_used: 0,
            pinned: false,
            free: true,
            prev: NIL,
            next: NIL,
        }
    }
}

pub struct PageAllocator {
    geometry: AtlasGeometry,
    frames_in_flight: u32,
    pages: Vec<PageState>,
    free: Vec<PageId>,
    lru_head: u32,
    lru_tail: u32,
    /// Latest frame seen by `touch` or `begin_frame`.
    frame: u32,
}

impl PageAllocator {
    pub fn new(geometry: AtlasGeometry, frames_in_flight: u32) -> Self {
        let count = geometry.page_count();
        let pages = vec![PageState::default(); count as usize];
        // Reverse so page 0 is handed out first.
        let free = (0..count).rev().map(PageId).collect();
        Self {
            geometry,
            frames_in_flight: frames_in_flight.max(1),
            pages,
            free,
            lru_head: NIL,
            lru_tail: NIL,
            frame: 0,
        }
    }

    pub fn geometry(&self) -> &AtlasGeometry {
        &self.geometry
    }

    pub fn capacity(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn free_count(&self) -> u32 {
        self.free.len() as u32
    }

    pub fn live_count(&self) -> u32 {
        self.pages.iter().filter(|p| !p.free).count() as u32
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn begin_frame(&mut self, frame: u32) {
        self.frame = self.frame.max(frame);
    }

    /// Take a free page with refcount 1, marked used in the current frame.
    pub fn allocate(&mut self) -> Result<PageId, RenderError> {
        let page = self.free.pop().ok_or(RenderError::AtlasFull)?;
        let frame = self.frame;
        let state = &mut self.pages[page.0 as usize];
        state.free = false;
        state.refcount = 1;
        state.last_used = frame;
        self.lru_push_back(page.0);
        Ok(page)
    }

    /// Allocate a page that is never evicted nor freed.
    pub fn allocate_pinned(&mut self) -> Result<PageId, RenderError> {
        let page = self.allocate()?;
        self.lru_unlink(page.0);
        self.pages[page.0 as usize].pinned = true;
        Ok(page)
    }

    /// Return a page to the free list regardless of its refcount.
    pub fn free(&mut self, page: PageId) {
        let Some(state) = self.pages.get(page.0 as usize) else {
            log::warn!("free of unknown page {:?}", page);
            return;
        };
        if state.pinned {
            log::warn!("free of pinned page {:?} ignored", page);
            return;
        }
        if state.free {
            log::debug!("double free of page {:?} ignored", page);
            return;
        }
        self.lru_unlink(page.0);
        let state = &mut self.pages[page.0 as usize];
        state.free = true;
        state.refcount = 0;
        self.free.push(page);
    }

    /// One more descriptor references `page`.
    pub fn retain(&mut self, page: PageId) {
        if let Some(state) = self.pages.get_mut(page.0 as usize) {
            if !state.free {
                state.refcount += 1;
            }
        }
    }

    /// One fewer descriptor references `page`; frees it at zero.
    pub fn release(&mut self, page: PageId) {
        let Some(state) = self.pages.get_mut(page.0 as usize) else {
            return;
        };
        if state.free || state.pinned {
            return;
        }
        state.refcount = state.refcount.saturating_sub(1);
        if state.refcount == 0 {
            self.free(page);
        }
    }

    pub fn refcount(&self, page: PageId) -> u32 {
        self.pages.get(page.0 as usize).map_or(0, |p| p.refcount)
    }

    pub fn is_allocated(&self, page: PageId) -> bool {
        self.pages.get(page.0 as usize).is_some_and(|p| !p.free)
    }

    pub fn last_used(&self, page: PageId) -> u32 {
        self.pages.get(page.0 as usize).map_or(0, |p| p.last_used)
    }

    /// Mark `page` as used by `frame` and move it to the LRU tail.
    pub fn touch(&mut self, page: PageId, frame: u32) {
        self.frame = self.frame.max(frame);
        let Some(state) = self.pages.get_mut(page.0 as usize) else {
            return;
        };
        if state.free {
            return;
        }
        state.last_used = state.last_used.max(frame);
        if !state.pinned {
            self.lru_unlink(page.0);
            self.lru_push_back(page.0);
        }
    }

    /// Free up to `k` least recently used pages that no in-flight frame can
    /// still reference (`last_used + frames_in_flight < current_frame`).
    /// Returns the freed pages so their owners can drop their descriptors.
    pub fn evict_until(&mut self, k: usize, current_frame: u32) -> Vec<PageId> {
        let mut evicted = Vec::new();
        let mut cursor = self.lru_head;
        while cursor != NIL && evicted.len() < k {
            let state = self.pages[cursor as usize];
            let next = state.next;
            let safe = (state.last_used as u64 + self.frames_in_flight as u64) < current_frame as u64;
            if safe {
                let page = PageId(cursor);
                self.free(page);
                evicted.push(page);
            }
            cursor = next;
        }
        if !evicted.is_empty() {
            log::debug!(
                "evicted {} page(s) at frame {}, {} free",
                evicted.len(),
                current_frame,
                self.free.len()
            );
        }
        evicted
    }

    fn lru_push_back(&mut self, index: u32) {
        {
            let state = &mut self.pages[index as usize];
            state.prev = self.lru_tail;
            state.next = NIL;
        }
        if self.lru_tail != NIL {
            self.pages[self.lru_tail as usize].next = index;
        } else {
            self.lru_head = index;
        }
        self.lru_tail = index;
    }

    fn lru_unlink(&mut self, index: u32) {
        let PageState { prev, next, .. } = self.pages[index as usize];
        let linked = prev != NIL || next != NIL || self.lru_head == index;
        if !linked {
            return;
        }
        if prev != NIL {
            self.pages[prev as usize].next = next;
        } else {
            self.lru_head = next;
        }
        if next != NIL {
            self.pages[next as usize].prev = prev;
        } else {
            self.lru_tail = prev;
        }
        let state = &mut self.pages[index as usize];
        state.prev = NIL;
        state.next = NIL;
    }

    #[cfg(test)]
    pub(crate) fn lru_order(&self) -> Vec<PageId> {
        let mut out = Vec::new();
        let mut cursor = self.lru_head;
        while cursor != NIL {
            out.push(PageId(cursor));
            cursor = self.pages[cursor as usize].next;
        }
        out
    }
}
