#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    use crate::{path_to, Dispatcher, HostRequest, Outcome};
    use vela_core::{
        Canvas, Capabilities, Clipboard, Command, Config, CursorIcon, DrawContext, HitBox,
        HitBoxKind, Key, KeyBindingOverride, KeyboardEvent, LayoutContext, MemoryClipboard,
        Modifiers, MouseButton, MouseEvent, MouseEventKind, Rect, RenderError, TextEvent, Vec2,
        Widget, WidgetId,
    };

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Mouse(MouseEventKind, u32),
        Key(Key, bool),
        Text(String, bool),
        Command(Command),
        Focus(bool),
    }

    type Log = Rc<RefCell<Vec<(WidgetId, Seen)>>>;

    /// Test widget that records everything it receives.
    struct Target {
        id: WidgetId,
        rect: Rect,
        focusable: bool,
        caps: Capabilities,
        claims: bool,
        kind: HitBoxKind,
        log: Log,
        children: Vec<Box<dyn Widget>>,
    }

    impl Target {
        fn new(log: &Log, rect: Rect) -> Self {
            Self {
                id: WidgetId::next(),
                rect,
                focusable: false,
                caps: Capabilities::empty(),
                claims: true,
                kind: HitBoxKind::Interior,
                log: log.clone(),
                children: Vec::new(),
            }
        }

        /// Focusable text field.
        fn field(log: &Log, rect: Rect) -> Self {
            let mut p = Self::new(log, rect);
            p.focusable = true;
            p.caps = Capabilities::ACCEPTS_TEXT;
            p
        }

        fn passive(mut self) -> Self {
            self.claims = false;
            self
        }

        fn kind(mut self, kind: HitBoxKind) -> Self {
            self.kind = kind;
            self
        }

        fn with(mut self, child: Target) -> Self {
            self.children.push(Box::new(child));
            self
        }

        fn record(&self, seen: Seen) {
            self.log.borrow_mut().push((self.id, seen));
        }
    }

    impl Widget for Target {
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
        fn draw(&self, _ctx: DrawContext, _canvas: &mut dyn Canvas, _t: u64) {}
        fn hit_box_test(&self, position: Vec2, depth: u32) -> Option<HitBox> {
            self.rect.contains(position).then(|| HitBox {
                kind: self.kind,
                depth,
                widget: self.id,
            })
        }
        fn handle_mouse_event(&mut self, event: &MouseEvent) -> bool {
            self.record(Seen::Mouse(event.kind, event.click_count));
            self.claims
        }
        fn handle_keyboard_event(&mut self, event: &KeyboardEvent) -> bool {
            self.record(Seen::Key(event.key, event.repeat));
            self.claims
        }
        fn handle_text_event(&mut self, event: &TextEvent) -> bool {
            self.record(Seen::Text(event.text.clone(), event.composing));
            self.claims
        }
        fn handle_command(&mut self, command: Command, clipboard: &mut dyn Clipboard) -> bool {
            self.record(Seen::Command(command));
            if command == Command::Copy {
                clipboard.set_text("copied");
            }
            self.claims
        }
        fn accepts_focus(&self) -> bool {
            self.focusable
        }
        fn set_focused(&mut self, focused: bool) {
            self.record(Seen::Focus(focused));
        }
        fn capabilities(&self) -> Capabilities {
            self.caps
        }
        fn children(&self) -> &[Box<dyn Widget>] {
            &self.children
        }
        fn children_mut(&mut self) -> &mut [Box<dyn Widget>] {
            &mut self.children
        }
    }

    fn new_log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn seen_by(log: &Log, id: WidgetId) -> Vec<Seen> {
        log.borrow()
            .iter()
            .filter(|(w, _)| *w == id)
            .map(|(_, s)| s.clone())
            .collect()
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(&Config::default())
    }

    fn mouse(kind: MouseEventKind, x: f32, y: f32) -> MouseEvent {
        MouseEvent::new(kind, Vec2::new(x, y))
    }

    fn press(x: f32, y: f32) -> MouseEvent {
        mouse(MouseEventKind::Down(MouseButton::Left), x, y)
    }

    fn release(x: f32, y: f32) -> MouseEvent {
        mouse(MouseEventKind::Up(MouseButton::Left), x, y)
    }

    fn text(s: &str) -> TextEvent {
        TextEvent {
            text: s.to_string(),
            composing: false,
        }
    }

    /// Root container holding two stacked text fields; returns (root, a, b).
    fn two_fields(log: &Log) -> (Target, WidgetId, WidgetId) {
        let a = Target::field(log, Rect::new(0.0, 0.0, 200.0, 40.0));
        let b = Target::field(log, Rect::new(0.0, 50.0, 200.0, 40.0));
        let (a_id, b_id) = (a.id, b.id);
        let root = Target::new(log, Rect::new(0.0, 0.0, 400.0, 400.0))
            .passive()
            .with(a)
            .with(b);
        (root, a_id, b_id)
    }

    // ── Click focus ─────────────────────────────

    #[test]
    fn click_focuses_field_and_text_follows() {
        let log = new_log();
        let (mut root, a, b) = two_fields(&log);
        let mut d = dispatcher();
        let now = Instant::now();

        d.mouse(&mut root, press(100.0, 70.0), now);
        d.mouse(&mut root, release(100.0, 70.0), now);
        assert_eq!(d.focus(), Some(b));

        let outcome = d.text(&mut root, text("x"));
        assert_eq!(outcome, Outcome::Delivered(b));
        assert!(seen_by(&log, b).contains(&Seen::Text("x".into(), false)));
        assert!(seen_by(&log, b).contains(&Seen::Focus(true)));
        assert!(seen_by(&log, a).is_empty());
    }

    #[test]
    fn click_on_non_focusable_keeps_focus() {
        let log = new_log();
        let (mut root, a, _) = two_fields(&log);
        let mut d = dispatcher();
        let now = Instant::now();
        d.mouse(&mut root, press(10.0, 10.0), now);
        d.mouse(&mut root, release(10.0, 10.0), now);
        d.mouse(&mut root, press(300.0, 300.0), now);
        assert_eq!(d.focus(), Some(a));
    }

    #[test]
    fn press_on_child_focuses_focusable_ancestor() {
        let log = new_log();
        let label = Target::new(&log, Rect::new(10.0, 10.0, 20.0, 20.0)).passive();
        let field = Target::field(&log, Rect::new(0.0, 0.0, 100.0, 40.0)).with(label);
        let field_id = field.id;
        let mut root = Target::new(&log, Rect::new(0.0, 0.0, 200.0, 200.0))
            .passive()
            .with(field);
        let mut d = dispatcher();
        let outcome = d.mouse(&mut root, press(15.0, 15.0), Instant::now());
        assert_eq!(d.focus(), Some(field_id));
        assert_eq!(outcome, Outcome::Delivered(field_id));
    }

    // ── Drag capture ────────────────────────────

    #[test]
    fn drag_stays_with_pressed_widget() {
        let log = new_log();
        let a = Target::new(&log, Rect::new(0.0, 0.0, 100.0, 100.0));
        let a_id = a.id;
        let mut root = Target::new(&log, Rect::new(0.0, 0.0, 400.0, 400.0))
            .passive()
            .with(a);
        let root_id = root.id;
        let mut d = dispatcher();
        let now = Instant::now();

        assert_eq!(d.mouse(&mut root, press(50.0, 50.0), now), Outcome::Delivered(a_id));
        assert_eq!(d.capture(), Some(a_id));
        for (x, y) in [(150.0, 150.0), (300.0, 10.0)] {
            let outcome = d.mouse(&mut root, mouse(MouseEventKind::Move, x, y), now);
            assert_eq!(outcome, Outcome::Delivered(a_id));
            assert_eq!(d.hover(), Some(a_id));
        }
        assert_eq!(d.mouse(&mut root, release(300.0, 10.0), now), Outcome::Delivered(a_id));
        assert_eq!(d.capture(), None);
        assert_eq!(d.hover(), Some(root_id));

        let kinds: Vec<MouseEventKind> = seen_by(&log, a_id)
            .into_iter()
            .filter_map(|s| match s {
                Seen::Mouse(k, _) => Some(k),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                MouseEventKind::Enter,
                MouseEventKind::Down(MouseButton::Left),
                MouseEventKind::Move,
                MouseEventKind::Move,
                MouseEventKind::Up(MouseButton::Left),
                MouseEventKind::Exit,
            ]
        );
        assert!(seen_by(&log, root_id).contains(&Seen::Mouse(MouseEventKind::Enter, 0)));
    }

    // ── Hover ───────────────────────────────────

    #[test]
    fn moving_between_widgets_synthesises_exit_then_enter() {
        let log = new_log();
        let (mut root, a, b) = two_fields(&log);
        let mut d = dispatcher();
        let now = Instant::now();
        d.mouse(&mut root, mouse(MouseEventKind::Move, 10.0, 10.0), now);
        log.borrow_mut().clear();
        d.mouse(&mut root, mouse(MouseEventKind::Move, 10.0, 60.0), now);
        let order: Vec<(WidgetId, Seen)> = log.borrow().clone();
        assert_eq!(order[0], (a, Seen::Mouse(MouseEventKind::Exit, 0)));
        assert_eq!(order[1], (b, Seen::Mouse(MouseEventKind::Enter, 0)));
        assert_eq!(order[2], (b, Seen::Mouse(MouseEventKind::Move, 0)));
    }

    #[test]
    fn pointer_leaving_window_exits_hover() {
        let log = new_log();
        let (mut root, a, _) = two_fields(&log);
        let mut d = dispatcher();
        d.mouse(&mut root, mouse(MouseEventKind::Move, 10.0, 10.0), Instant::now());
        d.pointer_left(&mut root);
        assert_eq!(d.hover(), None);
        assert_eq!(seen_by(&log, a).last(), Some(&Seen::Mouse(MouseEventKind::Exit, 0)));
    }

    #[test]
    fn text_widgets_request_text_cursor() {
        let log = new_log();
        let (mut root, _, _) = two_fields(&log);
        let mut d = dispatcher();
        d.mouse(&mut root, mouse(MouseEventKind::Move, 10.0, 10.0), Instant::now());
        assert_eq!(d.cursor(), CursorIcon::Text);
        d.mouse(&mut root, mouse(MouseEventKind::Move, 300.0, 300.0), Instant::now());
        assert_eq!(d.cursor(), CursorIcon::Default);
        assert_eq!(
            d.take_requests(),
            vec![
                HostRequest::SetCursor(CursorIcon::Text),
                HostRequest::SetCursor(CursorIcon::Default)
            ]
        );
    }

    // ── Window frame regions ────────────────────

    #[test]
    fn frame_regions_are_taken_from_widgets() {
        let log = new_log();
        let title = Target::new(&log, Rect::new(0.0, 0.0, 400.0, 30.0)).kind(HitBoxKind::MoveArea);
        let title_id = title.id;
        let corner = Target::new(&log, Rect::new(390.0, 390.0, 10.0, 10.0))
            .kind(HitBoxKind::BottomRightResizeCorner);
        let mut root = Target::new(&log, Rect::new(0.0, 0.0, 400.0, 400.0))
            .passive()
            .with(title)
            .with(corner);
        let mut d = dispatcher();
        let now = Instant::now();

        let outcome = d.mouse(&mut root, press(100.0, 10.0), now);
        assert_eq!(outcome, Outcome::WindowFrame(HitBoxKind::MoveArea));
        assert_eq!(d.capture(), None);
        assert!(!seen_by(&log, title_id)
            .iter()
            .any(|s| matches!(s, Seen::Mouse(MouseEventKind::Down(_), _))));

        d.mouse(&mut root, press(395.0, 395.0), now);
        assert_eq!(d.hover_kind(), HitBoxKind::BottomRightResizeCorner);
        assert_eq!(d.cursor(), CursorIcon::ResizeNWSE);
        let requests = d.take_requests();
        assert!(requests.contains(&HostRequest::DragWindow));
        assert!(requests.contains(&HostRequest::ResizeWindow(
            HitBoxKind::BottomRightResizeCorner
        )));
    }

    // ── Clicks ──────────────────────────────────

    #[test]
    fn double_click_carries_count_two() {
        let log = new_log();
        let (mut root, a, _) = two_fields(&log);
        let mut d = dispatcher();
        let t0 = Instant::now();
        d.mouse(&mut root, press(10.0, 10.0), t0);
        d.mouse(&mut root, release(10.0, 10.0), t0);
        d.mouse(&mut root, press(11.0, 10.0), t0 + Duration::from_millis(120));
        let downs: Vec<u32> = seen_by(&log, a)
            .into_iter()
            .filter_map(|s| match s {
                Seen::Mouse(MouseEventKind::Down(_), n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(downs, vec![1, 2]);
    }

    // ── Keyboard ────────────────────────────────

    #[test]
    fn tab_cycles_focus_in_tree_order() {
        let log = new_log();
        let (mut root, a, b) = two_fields(&log);
        let mut d = dispatcher();
        let mut clip = MemoryClipboard::default();
        let now = Instant::now();
        let tab = KeyboardEvent::down(Key::Tab, Modifiers::NONE);
        let back = KeyboardEvent::down(Key::Tab, Modifiers::SHIFT);

        assert_eq!(d.key(&mut root, tab, now, &mut clip), Outcome::Command(Command::FocusNext));
        assert_eq!(d.focus(), Some(a));
        d.key(&mut root, tab, now, &mut clip);
        assert_eq!(d.focus(), Some(b));
        d.key(&mut root, tab, now, &mut clip);
        assert_eq!(d.focus(), Some(a));
        d.key(&mut root, back, now, &mut clip);
        assert_eq!(d.focus(), Some(b));
        assert_eq!(seen_by(&log, a), vec![Seen::Focus(true), Seen::Focus(false), Seen::Focus(true), Seen::Focus(false)]);
    }

    #[test]
    fn keys_go_to_focus_and_bubble_to_parent() {
        let log = new_log();
        let inner = Target::field(&log, Rect::new(0.0, 0.0, 50.0, 50.0)).passive();
        let inner_id = inner.id;
        let outer = Target::new(&log, Rect::new(0.0, 0.0, 100.0, 100.0)).with(inner);
        let outer_id = outer.id;
        let mut root = Target::new(&log, Rect::new(0.0, 0.0, 200.0, 200.0))
            .passive()
            .with(outer);
        let mut d = dispatcher();
        let mut clip = MemoryClipboard::default();
        assert!(d.set_focus(&mut root, Some(inner_id)));

        let down = KeyboardEvent::down(Key::Char('q'), Modifiers::NONE);
        assert_eq!(
            d.key(&mut root, down, Instant::now(), &mut clip),
            Outcome::Delivered(outer_id)
        );
        assert!(seen_by(&log, inner_id).contains(&Seen::Key(Key::Char('q'), false)));
    }

    #[test]
    fn unclaimed_events_are_discarded() {
        let log = new_log();
        let mut root = Target::new(&log, Rect::new(0.0, 0.0, 100.0, 100.0)).passive();
        let mut d = dispatcher();
        let mut clip = MemoryClipboard::default();
        let now = Instant::now();
        assert_eq!(d.mouse(&mut root, press(10.0, 10.0), now), Outcome::Discarded);
        assert_eq!(d.mouse(&mut root, press(500.0, 10.0), now), Outcome::Discarded);
        let key = KeyboardEvent::down(Key::Enter, Modifiers::NONE);
        assert_eq!(d.key(&mut root, key, now, &mut clip), Outcome::Discarded);
        assert_eq!(d.text(&mut root, text("z")), Outcome::Discarded);
    }

    #[test]
    fn held_key_repeats_on_tick() {
        let log = new_log();
        let (mut root, a, _) = two_fields(&log);
        let mut d = dispatcher();
        let mut clip = MemoryClipboard::default();
        d.set_focus(&mut root, Some(a));
        let t0 = Instant::now();
        let down = KeyboardEvent::down(Key::Backspace, Modifiers::NONE);
        d.key(&mut root, down, t0, &mut clip);

        assert_eq!(d.tick(&mut root, t0 + Duration::from_millis(100), &mut clip), None);
        assert_eq!(
            d.tick(&mut root, t0 + Duration::from_millis(500), &mut clip),
            Some(Outcome::Delivered(a))
        );
        assert!(seen_by(&log, a).contains(&Seen::Key(Key::Backspace, true)));

        let up = KeyboardEvent::up(Key::Backspace, Modifiers::NONE);
        d.key(&mut root, up, t0 + Duration::from_millis(510), &mut clip);
        assert_eq!(d.next_wakeup(), None);
        assert_eq!(d.tick(&mut root, t0 + Duration::from_secs(5), &mut clip), None);
    }

    // ── Commands and clipboard ──────────────────

    #[test]
    fn clipboard_commands_reach_focus() {
        let log = new_log();
        let (mut root, a, _) = two_fields(&log);
        let mut d = dispatcher();
        let mut clip = MemoryClipboard::default();
        d.set_focus(&mut root, Some(a));
        let copy = KeyboardEvent::down(Key::Char('c'), Modifiers::primary());
        assert_eq!(
            d.key(&mut root, copy, Instant::now(), &mut clip),
            Outcome::Command(Command::Copy)
        );
        assert_eq!(clip.get_text().as_deref(), Some("copied"));
        assert!(seen_by(&log, a).contains(&Seen::Command(Command::Copy)));
    }

    #[test]
    fn configured_binding_overrides_default() {
        let config = Config {
            keybindings: vec![KeyBindingOverride {
                command: Command::FocusNext,
                key: Key::F(6),
                modifiers: Modifiers::NONE,
            }],
            ..Config::default()
        };
        let log = new_log();
        let (mut root, a, _) = two_fields(&log);
        let mut d = Dispatcher::new(&config);
        let mut clip = MemoryClipboard::default();
        let now = Instant::now();
        let tab = KeyboardEvent::down(Key::Tab, Modifiers::NONE);
        assert_eq!(d.key(&mut root, tab, now, &mut clip), Outcome::Discarded);
        let f6 = KeyboardEvent::down(Key::F(6), Modifiers::NONE);
        d.key(&mut root, f6, now, &mut clip);
        assert_eq!(d.focus(), Some(a));
    }

    // ── Text ────────────────────────────────────

    #[test]
    fn text_needs_accepts_text_capability() {
        let log = new_log();
        let mut button = Target::new(&log, Rect::new(0.0, 0.0, 50.0, 20.0));
        button.focusable = true;
        let button_id = button.id;
        let mut root = Target::new(&log, Rect::new(0.0, 0.0, 100.0, 100.0))
            .passive()
            .with(button);
        let mut d = dispatcher();
        assert!(d.set_focus(&mut root, Some(button_id)));
        assert_eq!(d.text(&mut root, text("x")), Outcome::Discarded);
        assert!(!seen_by(&log, button_id)
            .iter()
            .any(|s| matches!(s, Seen::Text(..))));
    }

    #[test]
    fn composition_is_hidden_when_focus_moves() {
        let log = new_log();
        let (mut root, a, b) = two_fields(&log);
        let mut d = dispatcher();
        d.set_focus(&mut root, Some(a));
        d.text(
            &mut root,
            TextEvent {
                text: "ka".into(),
                composing: true,
            },
        );
        assert_eq!(d.composition(), Some((a, "ka")));
        d.set_focus(&mut root, Some(b));
        assert_eq!(d.composition(), None);
        assert!(seen_by(&log, a).contains(&Seen::Text(String::new(), true)));
    }

    #[test]
    fn composition_is_buffered_per_target_and_restored_on_return() {
        let log = new_log();
        let (mut root, a, b) = two_fields(&log);
        let mut d = dispatcher();
        let preedit = |s: &str| TextEvent {
            text: s.to_string(),
            composing: true,
        };
        d.set_focus(&mut root, Some(a));
        d.text(&mut root, preedit("ka"));
        d.set_focus(&mut root, Some(b));
        d.text(&mut root, preedit("n"));
        assert_eq!(d.composition(), Some((b, "n")));
        assert_eq!(d.pending_composition(a), Some("ka"));

        d.set_focus(&mut root, Some(a));
        assert_eq!(d.composition(), Some((a, "ka")));
        assert_eq!(seen_by(&log, a).last(), Some(&Seen::Text("ka".into(), true)));
        assert_eq!(d.pending_composition(b), Some("n"));

        d.text(&mut root, text("か"));
        assert_eq!(d.composition(), None);
        assert_eq!(d.pending_composition(a), None);
        assert_eq!(d.pending_composition(b), Some("n"));
    }

    #[test]
    fn programmatic_focus_rejects_unfocusable_and_unknown() {
        let log = new_log();
        let (mut root, _, _) = two_fields(&log);
        let root_id = root.id;
        let mut d = dispatcher();
        assert!(!d.set_focus(&mut root, Some(root_id)));
        assert!(!d.set_focus(&mut root, Some(WidgetId(u64::MAX))));
        assert_eq!(d.focus(), None);
    }

    #[test]
    fn path_runs_root_to_target() {
        let log = new_log();
        let (root, _, b) = two_fields(&log);
        assert_eq!(path_to(&root, b), Some(vec![root.id, b]));
        assert_eq!(path_to(&root, WidgetId(u64::MAX)), None);
    }
}
