// Widget tree contract: the node interface the dispatcher, the layout driver
// and the painter consume. Parents own their children; every operation has a
// default so leaf widgets implement only what they support.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bitflags::bitflags;

use crate::{
    Canvas, Clipboard, Command, DrawContext, HitBoxKind, KeyboardEvent, MouseEvent, Rect,
    RenderError, Size, TextEvent, Vec2,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub u64);

impl WidgetId {
    /// Process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        WidgetId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        const ACCEPTS_TEXT = 1 << 0;
        const IS_SCROLLABLE = 1 << 1;
        const WANTS_VSYNC_UPDATES = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DirtyFlags: u32 {
        const LAYOUT = 1 << 0;
        const REDRAW = 1 << 1;
    }
}

/// Minimum, preferred and maximum size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeHints {
    pub min: Size,
    pub preferred: Size,
    pub max: Size,
}

impl SizeHints {
    pub fn fixed(size: Size) -> Self {
        Self {
            min: size,
            preferred: size,
            max: size,
        }
    }
}

impl Default for SizeHints {
    fn default() -> Self {
        Self {
            min: Size::new(0.0, 0.0),
            preferred: Size::new(0.0, 0.0),
            max: Size::new(f32::INFINITY, f32::INFINITY),
        }
    }
}

/// Result of a hit test: what the pointer is over and how deep in the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitBox {
    pub kind: HitBoxKind,
    /// Tree depth of the widget; larger is deeper.
    pub depth: u32,
    pub widget: WidgetId,
}

pub trait Widget {
    fn id(&self) -> WidgetId;

    /// Rectangle assigned by the last successful layout, in window pixels.
    fn rect(&self) -> Rect;

    /// Overwrites the rectangle without laying out. Used to roll back a
    /// layout pass that ran out of time.
    fn set_rect(&mut self, rect: Rect);

    fn preferred_size(&self) -> SizeHints {
        SizeHints::default()
    }

    /// Called when the parent assigns a rectangle. Containers lay out their
    /// children through `cx.layout_child` so the deadline is honoured.
    fn layout(&mut self, rect: Rect, cx: &mut LayoutContext) -> Result<(), RenderError>;

    fn draw(&self, ctx: DrawContext, canvas: &mut dyn Canvas, display_time_ns: u64);

    /// Hit test of this widget alone; children are visited by `hit_test`.
    fn hit_box_test(&self, position: Vec2, depth: u32) -> Option<HitBox> {
        self.rect().contains(position).then(|| HitBox {
            kind: HitBoxKind::Interior,
            depth,
            widget: self.id(),
        })
    }

    fn handle_mouse_event(&mut self, _event: &MouseEvent) -> bool {
        false
    }

    fn handle_keyboard_event(&mut self, _event: &KeyboardEvent) -> bool {
        false
    }

    /// Only delivered to widgets with `Capabilities::ACCEPTS_TEXT`.
    fn handle_text_event(&mut self, _event: &TextEvent) -> bool {
        false
    }

    fn handle_command(&mut self, _command: Command, _clipboard: &mut dyn Clipboard) -> bool {
        false
    }

    fn accepts_focus(&self) -> bool {
        false
    }

    fn set_focused(&mut self, _focused: bool) {}

    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    fn dirty(&self) -> DirtyFlags {
        DirtyFlags::empty()
    }

    fn clear_dirty(&mut self) {}

    fn children(&self) -> &[Box<dyn Widget>] {
        &[]
    }

    fn children_mut(&mut self) -> &mut [Box<dyn Widget>] {
        &mut []
    }
}

// ──────────────────────────────────────────────
// Layout driver context
// ──────────────────────────────────────────────

/// Carries the display time and the layout deadline down the tree.
pub struct LayoutContext {
    display_time_ns: u64,
    deadline: Instant,
    visited: usize,
}

impl LayoutContext {
    pub fn new(display_time_ns: u64, deadline: Instant) -> Self {
        Self {
            display_time_ns,
            deadline,
            visited: 0,
        }
    }

    pub fn display_time_ns(&self) -> u64 {
        self.display_time_ns
    }

    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn check_deadline(&self) -> Result<(), RenderError> {
        if Instant::now() > self.deadline {
            Err(RenderError::LayoutTimeout)
        } else {
            Ok(())
        }
    }

    pub fn layout_child(&mut self, child: &mut dyn Widget, rect: Rect) -> Result<(), RenderError> {
        self.check_deadline()?;
        self.visited += 1;
        child.layout(rect, self)
    }
}

/// Lays out `root` as one transaction: if any widget in the tree fails
/// (typically with `LayoutTimeout`), every rectangle is put back to what the
/// previous successful layout left, so the tree is never half moved.
pub fn layout_tree(
    root: &mut dyn Widget,
    rect: Rect,
    cx: &mut LayoutContext,
) -> Result<(), RenderError> {
    let mut saved = Vec::new();
    snapshot_rects(root, &mut saved);
    let result = root.layout(rect, cx);
    if result.is_err() {
        let mut rest = saved.as_slice();
        restore_rects(root, &mut rest);
    }
    result
}

fn snapshot_rects(widget: &dyn Widget, out: &mut Vec<(WidgetId, Rect)>) {
    out.push((widget.id(), widget.rect()));
    for child in widget.children() {
        snapshot_rects(child.as_ref(), out);
    }
}

// Walks in the snapshot's order; a widget added or removed during the failed
// pass ends the walk for its parent and keeps whatever rect it has.
fn restore_rects(widget: &mut dyn Widget, saved: &mut &[(WidgetId, Rect)]) -> bool {
    match saved.split_first() {
        Some((&(id, rect), rest)) if id == widget.id() => {
            widget.set_rect(rect);
            *saved = rest;
        }
        _ => return false,
    }
    for child in widget.children_mut() {
        if !restore_rects(child.as_mut(), saved) {
            return false;
        }
    }
    true
}

// ──────────────────────────────────────────────
// Tree helpers
// ──────────────────────────────────────────────

/// Deepest hit under `position`. Later siblings win over earlier ones at
/// equal depth since they draw on top.
pub fn hit_test(widget: &dyn Widget, position: Vec2) -> Option<HitBox> {
    hit_test_at(widget, position, 0)
}

fn hit_test_at(widget: &dyn Widget, position: Vec2, depth: u32) -> Option<HitBox> {
    let mut best = widget.hit_box_test(position, depth);
    for child in widget.children() {
        if let Some(hit) = hit_test_at(child.as_ref(), position, depth + 1) {
            if best.map_or(true, |b| hit.depth >= b.depth) {
                best = Some(hit);
            }
        }
    }
    best
}

pub fn find<'a>(widget: &'a dyn Widget, id: WidgetId) -> Option<&'a dyn Widget> {
    if widget.id() == id {
        return Some(widget);
    }
    widget.children().iter().find_map(|c| find(c.as_ref(), id))
}

pub fn find_mut<'a>(widget: &'a mut dyn Widget, id: WidgetId) -> Option<&'a mut dyn Widget> {
    if widget.id() == id {
        return Some(widget);
    }
    for child in widget.children_mut() {
        if let Some(found) = find_mut(child.as_mut(), id) {
            return Some(found);
        }
    }
    None
}

/// Focusable widgets in depth-first order; the Tab traversal order.
pub fn focus_order(widget: &dyn Widget) -> Vec<WidgetId> {
    let mut out = Vec::new();
    collect_focusable(widget, &mut out);
    out
}

fn collect_focusable(widget: &dyn Widget, out: &mut Vec<WidgetId>) {
    if widget.accepts_focus() {
        out.push(widget.id());
    }
    for child in widget.children() {
        collect_focusable(child.as_ref(), out);
    }
}

/// Union of the dirty flags of the whole subtree.
pub fn tree_dirty(widget: &dyn Widget) -> DirtyFlags {
    widget
        .children()
        .iter()
        .fold(widget.dirty(), |acc, c| acc | tree_dirty(c.as_ref()))
}

pub fn clear_tree_dirty(widget: &mut dyn Widget) {
    widget.clear_dirty();
    for child in widget.children_mut() {
        clear_tree_dirty(child.as_mut());
    }
}

/// Union of the capabilities of the whole subtree.
pub fn tree_capabilities(widget: &dyn Widget) -> Capabilities {
    widget
        .children()
        .iter()
        .fold(widget.capabilities(), |acc, c| acc | tree_capabilities(c.as_ref()))
}

/// Draw `child` with a context clipped to its rectangle.
pub fn draw_child(ctx: &DrawContext, canvas: &mut dyn Canvas, child: &dyn Widget, display_time_ns: u64) {
    let child_ctx = ctx.child(child.rect());
    if child_ctx.clip.is_empty() {
        return;
    }
    child.draw(child_ctx, canvas, display_time_ns);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Leaf {
        id: WidgetId,
        rect: Rect,
        focusable: bool,
        dirty: DirtyFlags,
        slow: bool,
    }

    impl Leaf {
        fn new(rect: Rect, focusable: bool) -> Self {
            Self {
                id: WidgetId::next(),
                rect,
                focusable,
                dirty: DirtyFlags::empty(),
                slow: false,
            }
        }
    }

    impl Widget for Leaf {
        fn id(&self) -> WidgetId {
            self.id
        }
        fn rect(&self) -> Rect {
            self.rect
        }
        fn set_rect(&mut self, rect: Rect) {
            self.rect = rect;
        }
        fn layout(&mut self, rect: Rect, cx: &mut LayoutContext) -> Result<(), RenderError> {
            if self.slow {
                std::thread::sleep(Duration::from_millis(5));
                cx.check_deadline()?;
            }
            self.rect = rect;
            Ok(())
        }
        fn draw(&self, _ctx: DrawContext, _canvas: &mut dyn Canvas, _t: u64) {}
        fn accepts_focus(&self) -> bool {
            self.focusable
        }
        fn dirty(&self) -> DirtyFlags {
            self.dirty
        }
        fn clear_dirty(&mut self) {
            self.dirty = DirtyFlags::empty();
        }
    }

    struct Stack {
        id: WidgetId,
        rect: Rect,
        children: Vec<Box<dyn Widget>>,
    }

    impl Widget for Stack {
        fn id(&self) -> WidgetId {
            self.id
        }
        fn rect(&self) -> Rect {
            self.rect
        }
        fn set_rect(&mut self, rect: Rect) {
            self.rect = rect;
        }
        fn layout(&mut self, rect: Rect, cx: &mut LayoutContext) -> Result<(), RenderError> {
            self.rect = rect;
            let h = rect.height() / self.children.len().max(1) as f32;
            for (i, child) in self.children.iter_mut().enumerate() {
                let r = Rect::new(rect.min.x, rect.min.y + h * i as f32, rect.width(), h);
                cx.layout_child(child.as_mut(), r)?;
            }
            Ok(())
        }
        fn draw(&self, _ctx: DrawContext, _canvas: &mut dyn Canvas, _t: u64) {}
        fn children(&self) -> &[Box<dyn Widget>] {
            &self.children
        }
        fn children_mut(&mut self) -> &mut [Box<dyn Widget>] {
            &mut self.children
        }
    }

    fn stack() -> Stack {
        Stack {
            id: WidgetId::next(),
            rect: Rect::new(0.0, 0.0, 100.0, 100.0),
            children: vec![
                Box::new(Leaf::new(Rect::new(0.0, 0.0, 100.0, 50.0), true)),
                Box::new(Leaf::new(Rect::new(0.0, 50.0, 100.0, 50.0), false)),
            ],
        }
    }

    #[test]
    fn hit_test_prefers_deepest() {
        let root = stack();
        let hit = hit_test(&root, Vec2::new(10.0, 10.0)).unwrap();
        assert_eq!(hit.widget, root.children[0].id());
        assert_eq!(hit.depth, 1);
        assert!(hit_test(&root, Vec2::new(500.0, 10.0)).is_none());
    }

    #[test]
    fn find_mut_reaches_children() {
        let mut root = stack();
        let id = root.children[1].id();
        assert!(find_mut(&mut root, id).is_some());
        assert!(find(&root, WidgetId(u64::MAX)).is_none());
    }

    #[test]
    fn focus_order_skips_unfocusable() {
        let root = stack();
        assert_eq!(focus_order(&root), vec![root.children[0].id()]);
    }

    #[test]
    fn dirty_flags_bubble_up() {
        let mut root = stack();
        assert!(tree_dirty(&root).is_empty());
        let mut leaf = Leaf::new(Rect::EMPTY, false);
        leaf.dirty = DirtyFlags::LAYOUT;
        root.children.push(Box::new(leaf));
        assert!(tree_dirty(&root).contains(DirtyFlags::LAYOUT));
        clear_tree_dirty(&mut root);
        assert!(tree_dirty(&root).is_empty());
    }

    #[test]
    fn layout_splits_rect_and_counts_children() {
        let mut root = stack();
        let mut cx = LayoutContext::new(0, Instant::now() + Duration::from_secs(5));
        root.layout(Rect::new(0.0, 0.0, 200.0, 400.0), &mut cx).unwrap();
        assert_eq!(cx.visited(), 2);
        assert_eq!(root.children[1].rect(), Rect::new(0.0, 200.0, 200.0, 200.0));
    }

    #[test]
    fn expired_deadline_aborts_layout() {
        let mut root = stack();
        let past = Instant::now();
        std::thread::sleep(Duration::from_millis(2));
        let mut cx = LayoutContext::new(0, past);
        let result = root.layout(Rect::new(0.0, 0.0, 10.0, 10.0), &mut cx);
        assert_eq!(result, Err(RenderError::LayoutTimeout));
    }

    #[test]
    fn timed_out_tree_layout_restores_every_rect() {
        let mut root = stack();
        let mut slow = Leaf::new(Rect::EMPTY, false);
        slow.slow = true;
        root.children.push(Box::new(slow));
        let mut cx = LayoutContext::new(0, Instant::now() + Duration::from_secs(5));
        layout_tree(&mut root, Rect::new(0.0, 0.0, 300.0, 300.0), &mut cx).unwrap();
        let before: Vec<Rect> = root.children.iter().map(|c| c.rect()).collect();
        assert_eq!(before[1], Rect::new(0.0, 100.0, 300.0, 100.0));

        let mut cx = LayoutContext::new(0, Instant::now() + Duration::from_millis(1));
        let result = layout_tree(&mut root, Rect::new(0.0, 0.0, 90.0, 60.0), &mut cx);
        assert_eq!(result, Err(RenderError::LayoutTimeout));
        assert_eq!(root.rect, Rect::new(0.0, 0.0, 300.0, 300.0));
        let after: Vec<Rect> = root.children.iter().map(|c| c.rect()).collect();
        assert_eq!(after, before);
    }

    #[test]
    fn successful_tree_layout_keeps_new_rects() {
        let mut root = stack();
        let mut cx = LayoutContext::new(0, Instant::now() + Duration::from_secs(5));
        layout_tree(&mut root, Rect::new(0.0, 0.0, 50.0, 80.0), &mut cx).unwrap();
        assert_eq!(root.rect, Rect::new(0.0, 0.0, 50.0, 80.0));
        assert_eq!(root.children[1].rect(), Rect::new(0.0, 40.0, 50.0, 40.0));
    }
}
