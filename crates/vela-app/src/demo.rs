// Demo widget tree: a title strip, a label, two text fields, a spinning
// shape and a generated image. Exercises every primitive kind and the
// focus, text and window-chrome paths of the dispatcher.

use std::f32::consts::TAU;

use vela_core::{
    draw_child, BezierPath, Canvas, Capabilities, Clipboard, Color, Command, DirtyFlags,
    DrawContext, FontId, HitBox, HitBoxKind, Key, KeyboardEvent, LayoutContext, Mat4, MouseEvent,
    MouseEventKind, PixelBuffer, Rect, RenderError, Size, SizeHints, TextEvent, ThemeMode, Vec2,
    Widget, WidgetId,
};

const TITLE_HEIGHT: f32 = 32.0;
const PADDING: f32 = 16.0;
const GAP: f32 = 12.0;
/// Width of the invisible window-resize band along the root's edges.
const RESIZE_BORDER: f32 = 6.0;
const EM: f32 = 18.0;
const CARET_BLINK_NS: u64 = 530_000_000;

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub text: Color,
    pub muted: Color,
    pub chrome: Color,
    pub field: Color,
    pub accent: Color,
}

impl Palette {
    pub fn for_theme(theme: ThemeMode) -> Self {
        let text = theme.foreground();
        match theme {
            ThemeMode::Light | ThemeMode::LightAccessible => Self {
                text,
                muted: text.with_alpha(0.5),
                chrome: Color::from_srgb8(0xe2, 0xe2, 0xe0, 0xff),
                field: Color::WHITE,
                accent: Color::from_srgb8(0x2f, 0x6f, 0xeb, 0xff),
            },
            ThemeMode::Dark | ThemeMode::DarkAccessible => Self {
                text,
                muted: text.with_alpha(0.5),
                chrome: Color::from_srgb8(0x2b, 0x2d, 0x31, 0xff),
                field: Color::from_srgb8(0x14, 0x15, 0x17, 0xff),
                accent: Color::from_srgb8(0x5a, 0x9b, 0xff, 0xff),
            },
        }
    }
}

/// 300x200 sRGB gradient; wide enough to span several atlas tiles.
pub fn gradient_image() -> Option<PixelBuffer> {
    let (w, h) = (300u32, 200u32);
    let mut bytes = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            let checker = ((x / 25) + (y / 25)) % 2 == 0;
            bytes.extend_from_slice(&[
                (x * 255 / (w - 1)) as u8,
                (y * 255 / (h - 1)) as u8,
                if checker { 200 } else { 120 },
                0xff,
            ]);
        }
    }
    PixelBuffer::from_srgba8(w, h, &bytes)
}

pub fn build(font: FontId, palette: Palette, image: Option<PixelBuffer>) -> Root {
    let mut children: Vec<Box<dyn Widget>> = vec![
        Box::new(TitleBar::new("Vela", font, palette)),
        Box::new(Label::new(
            "Type into the fields; Tab moves focus.",
            font,
            palette.text,
        )),
        Box::new(TextField::new("name", font, palette)),
        Box::new(TextField::new("comment", font, palette)),
        Box::new(Spinner::new(palette.accent)),
    ];
    if let Some(pixels) = image {
        children.push(Box::new(ImageTile::new(pixels)));
    }
    Root {
        id: WidgetId::next(),
        rect: Rect::EMPTY,
        children,
    }
}

// ──────────────────────────────────────────────
// Root
// ──────────────────────────────────────────────

/// Title strip on top, remaining children stacked below it.
pub struct Root {
    id: WidgetId,
    rect: Rect,
    children: Vec<Box<dyn Widget>>,
}

impl Widget for Root {
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
        let mut y = rect.min.y;
        for (i, child) in self.children.iter_mut().enumerate() {
            if i == 0 {
                cx.layout_child(child.as_mut(), Rect::new(rect.min.x, y, rect.width(), TITLE_HEIGHT))?;
                y += TITLE_HEIGHT + PADDING;
                continue;
            }
            let hints = child.preferred_size().preferred;
            let available = (rect.width() - 2.0 * PADDING).max(0.0);
            let width = if hints.width > 0.0 {
                hints.width.min(available)
            } else {
                available
            };
            cx.layout_child(child.as_mut(), Rect::new(rect.min.x + PADDING, y, width, hints.height))?;
            y += hints.height + GAP;
        }
        Ok(())
    }

    fn draw(&self, ctx: DrawContext, canvas: &mut dyn Canvas, display_time_ns: u64) {
        for child in &self.children {
            draw_child(&ctx, canvas, child.as_ref(), display_time_ns);
        }
    }

    fn hit_box_test(&self, position: Vec2, depth: u32) -> Option<HitBox> {
        if !self.rect.contains(position) {
            return None;
        }
        let top = position.y - self.rect.min.y < RESIZE_BORDER;
        let bottom = self.rect.max.y - position.y < RESIZE_BORDER;
        let left = position.x - self.rect.min.x < RESIZE_BORDER;
        let right = self.rect.max.x - position.x < RESIZE_BORDER;
        let kind = match (top, bottom, left, right) {
            (true, _, true, _) => HitBoxKind::TopLeftResizeCorner,
            (true, _, _, true) => HitBoxKind::TopRightResizeCorner,
            (_, true, true, _) => HitBoxKind::BottomLeftResizeCorner,
            (_, true, _, true) => HitBoxKind::BottomRightResizeCorner,
            (true, ..) => HitBoxKind::TopResizeBorder,
            (_, true, ..) => HitBoxKind::BottomResizeBorder,
            (.., true, _) => HitBoxKind::LeftResizeBorder,
            (.., true) => HitBoxKind::RightResizeBorder,
            _ => HitBoxKind::Interior,
        };
        // Borders sit above every child.
        let depth = if kind == HitBoxKind::Interior { depth } else { u32::MAX };
        Some(HitBox {
            kind,
            depth,
            widget: self.id,
        })
    }

    fn children(&self) -> &[Box<dyn Widget>] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut [Box<dyn Widget>] {
        &mut self.children
    }
}

// ──────────────────────────────────────────────
// Title strip
// ──────────────────────────────────────────────

pub struct TitleBar {
    id: WidgetId,
    rect: Rect,
    title: String,
    font: FontId,
    palette: Palette,
}

impl TitleBar {
    pub fn new(title: &str, font: FontId, palette: Palette) -> Self {
        Self {
            id: WidgetId::next(),
            rect: Rect::EMPTY,
            title: title.to_string(),
            font,
            palette,
        }
    }

    fn icon_rect(&self) -> Rect {
        let inset = (TITLE_HEIGHT - 20.0) / 2.0;
        Rect::new(self.rect.min.x + inset, self.rect.min.y + inset, 20.0, 20.0)
    }
}

impl Widget for TitleBar {
    fn id(&self) -> WidgetId {
        self.id
    }

    fn rect(&self) -> Rect {
        self.rect
    }

    fn set_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    fn layout(&mut self, rect: Rect, _cx: &mut LayoutContext) -> Result<(), RenderError> {
        self.rect = rect;
        Ok(())
    }

    fn draw(&self, ctx: DrawContext, canvas: &mut dyn Canvas, _display_time_ns: u64) {
        canvas.draw_quad(&ctx, self.rect, self.palette.chrome);
        canvas.draw_quad(&ctx, self.icon_rect(), self.palette.accent);
        let baseline = Vec2::new(
            self.icon_rect().max.x + 10.0,
            self.rect.min.y + (TITLE_HEIGHT + EM * 0.7) / 2.0,
        );
        canvas.draw_text(&ctx, self.font, &self.title, baseline, EM, self.palette.text);
    }

    fn hit_box_test(&self, position: Vec2, depth: u32) -> Option<HitBox> {
        if !self.rect.contains(position) {
            return None;
        }
        let kind = if self.icon_rect().contains(position) {
            HitBoxKind::ApplicationIcon
        } else {
            HitBoxKind::MoveArea
        };
        Some(HitBox {
            kind,
            depth,
            widget: self.id,
        })
    }
}

// ──────────────────────────────────────────────
// Label
// ──────────────────────────────────────────────

pub struct Label {
    id: WidgetId,
    rect: Rect,
    text: String,
    font: FontId,
    color: Color,
}

impl Label {
    pub fn new(text: &str, font: FontId, color: Color) -> Self {
        Self {
            id: WidgetId::next(),
            rect: Rect::EMPTY,
            text: text.to_string(),
            font,
            color,
        }
    }
}

impl Widget for Label {
    fn id(&self) -> WidgetId {
        self.id
    }

    fn rect(&self) -> Rect {
        self.rect
    }

    fn set_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    fn preferred_size(&self) -> SizeHints {
        SizeHints::fixed(Size::new(0.0, EM * 1.5))
    }

    fn layout(&mut self, rect: Rect, _cx: &mut LayoutContext) -> Result<(), RenderError> {
        self.rect = rect;
        Ok(())
    }

    fn draw(&self, ctx: DrawContext, canvas: &mut dyn Canvas, _display_time_ns: u64) {
        let baseline = Vec2::new(self.rect.min.x, self.rect.min.y + EM * 1.1);
        canvas.draw_text(&ctx, self.font, &self.text, baseline, EM, self.color);
    }
}

// ──────────────────────────────────────────────
// Text field
// ──────────────────────────────────────────────

/// Single-line text entry. The caret sits at the end of the text; IME
/// preedit is shown after it until committed.
pub struct TextField {
    id: WidgetId,
    rect: Rect,
    placeholder: String,
    text: String,
    preedit: String,
    focused: bool,
    dirty: DirtyFlags,
    font: FontId,
    palette: Palette,
}

impl TextField {
    pub fn new(placeholder: &str, font: FontId, palette: Palette) -> Self {
        Self {
            id: WidgetId::next(),
            rect: Rect::EMPTY,
            placeholder: placeholder.to_string(),
            text: String::new(),
            preedit: String::new(),
            focused: false,
            dirty: DirtyFlags::empty(),
            font,
            palette,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn edited(&mut self) {
        self.dirty |= DirtyFlags::REDRAW;
    }
}

impl Widget for TextField {
    fn id(&self) -> WidgetId {
        self.id
    }

    fn rect(&self) -> Rect {
        self.rect
    }

    fn set_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    fn preferred_size(&self) -> SizeHints {
        SizeHints::fixed(Size::new(360.0, EM * 2.0))
    }

    fn layout(&mut self, rect: Rect, _cx: &mut LayoutContext) -> Result<(), RenderError> {
        self.rect = rect;
        Ok(())
    }

    fn draw(&self, ctx: DrawContext, canvas: &mut dyn Canvas, display_time_ns: u64) {
        let border = if self.focused {
            self.palette.accent
        } else {
            self.palette.muted
        };
        canvas.draw_quad(&ctx, self.rect, border);
        let inner = Rect::from_min_max(
            Vec2::new(self.rect.min.x + 1.0, self.rect.min.y + 1.0),
            Vec2::new(self.rect.max.x - 1.0, self.rect.max.y - 1.0),
        );
        canvas.draw_quad(&ctx, inner, self.palette.field);

        let ctx = ctx.clipped(inner);
        let origin = Vec2::new(inner.min.x + 8.0, inner.min.y + EM * 1.3);
        if self.text.is_empty() && self.preedit.is_empty() {
            canvas.draw_text(&ctx, self.font, &self.placeholder, origin, EM, self.palette.muted);
        }
        let mut x = origin.x;
        x += canvas.draw_text(&ctx, self.font, &self.text, Vec2::new(x, origin.y), EM, self.palette.text);
        x += canvas.draw_text(&ctx, self.font, &self.preedit, Vec2::new(x, origin.y), EM, self.palette.muted);

        let caret_on = (display_time_ns / CARET_BLINK_NS) % 2 == 0;
        if self.focused && caret_on {
            let caret = Rect::new(x + 1.0, origin.y - EM, 2.0, EM * 1.2);
            canvas.draw_quad(&ctx, caret, self.palette.accent);
        }
    }

    fn handle_mouse_event(&mut self, event: &MouseEvent) -> bool {
        matches!(event.kind, MouseEventKind::Down(_) | MouseEventKind::Up(_))
    }

    fn handle_keyboard_event(&mut self, event: &KeyboardEvent) -> bool {
        if !event.is_down() {
            return false;
        }
        match event.key {
            Key::Backspace => {
                if self.text.pop().is_some() {
                    self.edited();
                }
                true
            }
            // Printable keys arrive as text events.
            Key::Char(_) => !event.modifiers.ctrl && !event.modifiers.meta,
            _ => false,
        }
    }

    fn handle_text_event(&mut self, event: &TextEvent) -> bool {
        if event.composing {
            self.preedit = event.text.clone();
        } else {
            self.preedit.clear();
            self.text.extend(event.text.chars().filter(|c| !c.is_control()));
        }
        self.edited();
        true
    }

    fn handle_command(&mut self, command: Command, clipboard: &mut dyn Clipboard) -> bool {
        match command {
            Command::Copy => clipboard.set_text(&self.text),
            Command::Cut => {
                clipboard.set_text(&self.text);
                self.text.clear();
                self.edited();
            }
            Command::Paste => {
                let Some(pasted) = clipboard.get_text() else {
                    return true;
                };
                self.text.extend(pasted.chars().filter(|c| !c.is_control()));
                self.edited();
            }
            _ => return false,
        }
        true
    }

    fn accepts_focus(&self) -> bool {
        true
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        if !focused {
            self.preedit.clear();
        }
        self.edited();
    }

    fn capabilities(&self) -> Capabilities {
        if self.focused {
            Capabilities::ACCEPTS_TEXT | Capabilities::WANTS_VSYNC_UPDATES
        } else {
            Capabilities::ACCEPTS_TEXT
        }
    }

    fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = DirtyFlags::empty();
    }
}

// ──────────────────────────────────────────────
// Spinner
// ──────────────────────────────────────────────

/// Curved three-pointed shape rotating at half a turn per second. The path
/// never changes, so it is tessellated once.
pub struct Spinner {
    id: WidgetId,
    rect: Rect,
    path: BezierPath,
    color: Color,
}

impl Spinner {
    const RADIUS: f32 = 36.0;

    pub fn new(color: Color) -> Self {
        let polar = |r: f32, a: f32| Vec2::new(r * a.cos(), r * a.sin());
        let step = TAU / 3.0;
        let mut path = BezierPath::new();
        path.move_to(polar(Self::RADIUS, 0.0));
        for k in 0..3 {
            let a = k as f32 * step;
            path.quad_to(polar(Self::RADIUS * 0.2, a + step / 2.0), polar(Self::RADIUS, a + step));
        }
        path.close();
        Self {
            id: WidgetId::next(),
            rect: Rect::EMPTY,
            path,
            color,
        }
    }

    fn angle(display_time_ns: u64) -> f32 {
        let turns = (display_time_ns % 2_000_000_000) as f32 / 2_000_000_000.0;
        turns * TAU
    }
}

impl Widget for Spinner {
    fn id(&self) -> WidgetId {
        self.id
    }

    fn rect(&self) -> Rect {
        self.rect
    }

    fn set_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    fn preferred_size(&self) -> SizeHints {
        SizeHints::fixed(Size::new(Self::RADIUS * 2.0, Self::RADIUS * 2.0))
    }

    fn layout(&mut self, rect: Rect, _cx: &mut LayoutContext) -> Result<(), RenderError> {
        self.rect = rect;
        Ok(())
    }

    fn draw(&self, ctx: DrawContext, canvas: &mut dyn Canvas, display_time_ns: u64) {
        let center = Vec2::new(
            (self.rect.min.x + self.rect.max.x) / 2.0,
            (self.rect.min.y + self.rect.max.y) / 2.0,
        );
        let m = Mat4::translation(center.x, center.y, 0.0) * Mat4::rotation(Self::angle(display_time_ns));
        canvas.draw_filled_shape(&ctx.transformed(m), &self.path, self.color);
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::WANTS_VSYNC_UPDATES
    }
}

// ──────────────────────────────────────────────
// Image tile
// ──────────────────────────────────────────────

pub struct ImageTile {
    id: WidgetId,
    rect: Rect,
    pixels: PixelBuffer,
}

impl ImageTile {
    pub fn new(pixels: PixelBuffer) -> Self {
        Self {
            id: WidgetId::next(),
            rect: Rect::EMPTY,
            pixels,
        }
    }
}

impl Widget for ImageTile {
    fn id(&self) -> WidgetId {
        self.id
    }

    fn rect(&self) -> Rect {
        self.rect
    }

    fn set_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    fn preferred_size(&self) -> SizeHints {
        SizeHints::fixed(Size::new(self.pixels.width() as f32, self.pixels.height() as f32))
    }

    fn layout(&mut self, rect: Rect, _cx: &mut LayoutContext) -> Result<(), RenderError> {
        self.rect = rect;
        Ok(())
    }

    fn draw(&self, ctx: DrawContext, canvas: &mut dyn Canvas, _display_time_ns: u64) {
        let src = Rect::new(0.0, 0.0, self.pixels.width() as f32, self.pixels.height() as f32);
        canvas.draw_image(&ctx, &self.pixels, src, self.rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use vela_core::{hit_test, MemoryClipboard, Modifiers};

    fn laid_out() -> Root {
        let mut root = build(FontId(0), Palette::for_theme(ThemeMode::Dark), gradient_image());
        let mut cx = LayoutContext::new(0, Instant::now() + Duration::from_secs(5));
        root.layout(Rect::new(0.0, 0.0, 800.0, 600.0), &mut cx).unwrap();
        root
    }

    // ── Layout and chrome ──

    #[test]
    fn children_stack_below_the_title() {
        let root = laid_out();
        let rects: Vec<Rect> = root.children().iter().map(|c| c.rect()).collect();
        assert_eq!(rects[0], Rect::new(0.0, 0.0, 800.0, TITLE_HEIGHT));
        for pair in rects[1..].windows(2) {
            assert!(pair[1].min.y >= pair[0].max.y);
        }
        assert_eq!(rects.len(), 6);
    }

    #[test]
    fn edges_resize_and_title_moves() {
        let root = laid_out();
        let corner = hit_test(&root, Vec2::new(798.0, 598.0)).unwrap();
        assert_eq!(corner.kind, HitBoxKind::BottomRightResizeCorner);
        let title = hit_test(&root, Vec2::new(400.0, 16.0)).unwrap();
        assert_eq!(title.kind, HitBoxKind::MoveArea);
        let icon = hit_test(&root, Vec2::new(16.0, 16.0)).unwrap();
        assert_eq!(icon.kind, HitBoxKind::ApplicationIcon);
        let top = hit_test(&root, Vec2::new(400.0, 2.0)).unwrap();
        assert_eq!(top.kind, HitBoxKind::TopResizeBorder);
    }

    #[test]
    fn gradient_spans_several_tiles() {
        let image = gradient_image().unwrap();
        assert_eq!((image.width(), image.height()), (300, 200));
    }

    // ── Text field ──

    #[test]
    fn preedit_is_replaced_by_commit() {
        let palette = Palette::for_theme(ThemeMode::Light);
        let mut field = TextField::new("x", FontId(0), palette);
        field.handle_text_event(&TextEvent {
            text: "ka".into(),
            composing: true,
        });
        assert_eq!(field.text(), "");
        field.handle_text_event(&TextEvent {
            text: "か".into(),
            composing: false,
        });
        assert_eq!(field.text(), "か");
        assert!(field.preedit.is_empty());
        assert!(field.dirty().contains(DirtyFlags::REDRAW));
    }

    #[test]
    fn backspace_and_clipboard_commands() {
        let palette = Palette::for_theme(ThemeMode::Dark);
        let mut field = TextField::new("x", FontId(0), palette);
        let mut clipboard = MemoryClipboard::default();
        field.handle_text_event(&TextEvent {
            text: "abc".into(),
            composing: false,
        });
        assert!(field.handle_keyboard_event(&KeyboardEvent::down(Key::Backspace, Modifiers::NONE)));
        assert_eq!(field.text(), "ab");

        assert!(field.handle_command(Command::Cut, &mut clipboard));
        assert_eq!(field.text(), "");
        assert!(field.handle_command(Command::Paste, &mut clipboard));
        assert!(field.handle_command(Command::Paste, &mut clipboard));
        assert_eq!(field.text(), "abab");
        assert!(!field.handle_command(Command::SelectAll, &mut clipboard));
    }

    #[test]
    fn focus_requests_vsync_for_the_caret() {
        let palette = Palette::for_theme(ThemeMode::Dark);
        let mut field = TextField::new("x", FontId(0), palette);
        assert!(!field.capabilities().contains(Capabilities::WANTS_VSYNC_UPDATES));
        field.set_focused(true);
        assert!(field
            .capabilities()
            .contains(Capabilities::ACCEPTS_TEXT | Capabilities::WANTS_VSYNC_UPDATES));
    }
}
