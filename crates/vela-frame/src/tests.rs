#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use quickcheck::quickcheck;

    use crate::{
        host_channel, Clock, FrameBackend, FrameInfo, FramePhase, HostMessage, HostSender,
        RecordStats, Scheduler,
    };
    use vela_core::{
        draw_child, BezierPath, Canvas, Capabilities, Color, Config, DrawContext, FontFace,
        FontGlyph, FontId, LayoutContext, MemoryClipboard, MouseEvent, MouseEventKind, PixelBuffer,
        Rect, RenderError, Severity, Size, Vec2, Widget, WidgetId,
    };

    // ── Mock backend ────────────────────────────

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Resize(Size),
        Acquire(u64, usize, Size),
        Record(u64),
        Grow,
        Uploads(u64),
        Draw(u64),
        Present(u64),
        WaitFence(u64),
        Retire(u64),
        Abandon(u64),
    }

    struct MockBackend {
        n: usize,
        calls: Vec<Call>,
        signaled: HashSet<u64>,
        slot_owner: Vec<Option<u64>>,
        /// Acquires of a slot whose previous frame had not signaled.
        violations: usize,
        out_of_date: u32,
        too_large: u32,
        fatal_draw: Option<RenderError>,
        auto_signal: bool,
    }

    impl MockBackend {
        fn new(n: usize) -> Self {
            Self {
                n,
                calls: Vec::new(),
                signaled: HashSet::new(),
                slot_owner: vec![None; n],
                violations: 0,
                out_of_date: 0,
                too_large: 0,
                fatal_draw: None,
                auto_signal: false,
            }
        }

        fn signal_all(&mut self) {
            for owner in self.slot_owner.iter().flatten() {
                self.signaled.insert(*owner);
            }
        }
    }

    struct CountingCanvas {
        quads: u32,
    }

    impl Canvas for CountingCanvas {
        fn draw_quad(&mut self, _ctx: &DrawContext, _rect: Rect, _color: Color) {
            self.quads += 1;
        }
        fn draw_image(&mut self, _ctx: &DrawContext, _image: &PixelBuffer, _src: Rect, _dst: Rect) {}
        fn draw_glyph(&mut self, _ctx: &DrawContext, _glyph: FontGlyph, _dst: Rect, _color: Color) {}
        fn draw_filled_shape(&mut self, _ctx: &DrawContext, _path: &BezierPath, _color: Color) {}
        fn font(&self, _id: FontId) -> Option<Arc<dyn FontFace>> {
            None
        }
    }

    impl FrameBackend for MockBackend {
        fn frames_in_flight(&self) -> usize {
            self.n
        }
        fn resize(&mut self, extent: Size) -> Result<(), RenderError> {
            self.calls.push(Call::Resize(extent));
            Ok(())
        }
        fn acquire(&mut self, frame: &FrameInfo) -> Result<(), RenderError> {
            self.calls
                .push(Call::Acquire(frame.number, frame.slot, frame.window_extent));
            if let Some(prev) = self.slot_owner[frame.slot] {
                if !self.signaled.contains(&prev) {
                    self.violations += 1;
                }
            }
            if self.out_of_date > 0 {
                self.out_of_date -= 1;
                return Err(RenderError::SwapChainOutOfDate);
            }
            Ok(())
        }
        fn record(
            &mut self,
            frame: &FrameInfo,
            draw: &mut dyn FnMut(DrawContext, &mut dyn Canvas),
        ) -> Result<RecordStats, RenderError> {
            self.calls.push(Call::Record(frame.number));
            let mut canvas = CountingCanvas { quads: 0 };
            draw(DrawContext::root(frame.window_extent), &mut canvas);
            if self.too_large > 0 {
                self.too_large -= 1;
                return Err(RenderError::FrameTooLarge);
            }
            Ok(RecordStats {
                flat_quads: canvas.quads,
                ..RecordStats::default()
            })
        }
        fn grow_vertex_buffers(&mut self) {
            self.calls.push(Call::Grow);
        }
        fn submit_uploads(&mut self, frame: &FrameInfo) -> Result<(), RenderError> {
            self.calls.push(Call::Uploads(frame.number));
            Ok(())
        }
        fn submit_draw(&mut self, frame: &FrameInfo) -> Result<(), RenderError> {
            self.calls.push(Call::Draw(frame.number));
            match self.fatal_draw.take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
        fn present(&mut self, frame: &FrameInfo) {
            self.calls.push(Call::Present(frame.number));
            self.slot_owner[frame.slot] = Some(frame.number);
            if self.auto_signal {
                self.signaled.insert(frame.number);
            }
        }
        fn fence_signaled(&mut self, frame: u64) -> bool {
            self.signaled.contains(&frame)
        }
        fn wait_fence(&mut self, frame: u64) -> Result<(), RenderError> {
            self.calls.push(Call::WaitFence(frame));
            self.signaled.insert(frame);
            Ok(())
        }
        fn retire(&mut self, frame: u64) {
            assert!(self.signaled.contains(&frame), "retired frame {frame} before its fence");
            self.calls.push(Call::Retire(frame));
        }
        fn abandon(&mut self, frame: &FrameInfo) {
            self.calls.push(Call::Abandon(frame.number));
        }
    }

    // ── Test widget ─────────────────────────────

    struct Pane {
        id: WidgetId,
        rect: Rect,
        moves: Vec<Vec2>,
        layouts: usize,
        slow: bool,
        animating: bool,
    }

    impl Pane {
        fn new() -> Self {
            Self {
                id: WidgetId::next(),
                rect: Rect::new(0.0, 0.0, 800.0, 600.0),
                moves: Vec::new(),
                layouts: 0,
                slow: false,
                animating: false,
            }
        }
    }

    impl Widget for Pane {
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
            self.layouts += 1;
            if self.slow {
                std::thread::sleep(Duration::from_millis(5));
                cx.check_deadline()?;
            }
            self.rect = rect;
            Ok(())
        }
        fn draw(&self, ctx: DrawContext, canvas: &mut dyn Canvas, _t: u64) {
            canvas.draw_quad(&ctx, self.rect, Color::WHITE);
            canvas.draw_quad(&ctx, Rect::new(0.0, 0.0, 10.0, 10.0), Color::BLACK);
        }
        fn handle_mouse_event(&mut self, event: &MouseEvent) -> bool {
            if event.kind == MouseEventKind::Move {
                self.moves.push(event.position);
            }
            true
        }
        fn capabilities(&self) -> Capabilities {
            if self.animating {
                Capabilities::WANTS_VSYNC_UPDATES
            } else {
                Capabilities::empty()
            }
        }
    }

    /// Splits its rect into equal rows, one per child.
    struct Column {
        id: WidgetId,
        rect: Rect,
        children: Vec<Box<dyn Widget>>,
    }

    impl Column {
        fn of(panes: Vec<Pane>) -> Self {
            Self {
                id: WidgetId::next(),
                rect: Rect::EMPTY,
                children: panes.into_iter().map(|p| Box::new(p) as Box<dyn Widget>).collect(),
            }
        }

        fn rects(&self) -> Vec<Rect> {
            std::iter::once(self.rect)
                .chain(self.children.iter().map(|c| c.rect()))
                .collect()
        }
    }

    impl Widget for Column {
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
                let row = Rect::new(rect.min.x, rect.min.y + h * i as f32, rect.width(), h);
                cx.layout_child(child.as_mut(), row)?;
            }
            Ok(())
        }
        fn draw(&self, ctx: DrawContext, canvas: &mut dyn Canvas, t: u64) {
            for child in &self.children {
                draw_child(&ctx, canvas, child.as_ref(), t);
            }
        }
        fn children(&self) -> &[Box<dyn Widget>] {
            &self.children
        }
        fn children_mut(&mut self) -> &mut [Box<dyn Widget>] {
            &mut self.children
        }
    }

    // ── Helpers ─────────────────────────────────

    fn scheduler_with(backend: MockBackend, config: &Config) -> (Scheduler<MockBackend>, HostSender) {
        let clock = Clock::new();
        let (tx, rx) = host_channel(64, clock);
        let scheduler = Scheduler::new(
            backend,
            config,
            rx,
            clock,
            Size::new(800.0, 600.0),
            Box::new(MemoryClipboard::default()),
        );
        (scheduler, tx)
    }

    fn scheduler(n: usize) -> (Scheduler<MockBackend>, HostSender) {
        scheduler_with(MockBackend::new(n), &Config::default())
    }

    fn move_to(x: f32, y: f32) -> HostMessage {
        HostMessage::Mouse(MouseEvent::new(MouseEventKind::Move, Vec2::new(x, y)))
    }

    fn calls_since(s: &Scheduler<MockBackend>, start: usize) -> Vec<Call> {
        s.backend().calls[start..].to_vec()
    }

    // ── Phase order ─────────────────────────────

    #[test]
    fn frame_runs_phases_in_order() {
        let (mut s, _tx) = scheduler(2);
        let mut pane = Pane::new();
        let report = s.frame(&mut pane, 1_000).unwrap();
        assert!(report.presented);
        assert_eq!(report.record.flat_quads, 2);
        assert_eq!(
            s.backend().calls,
            vec![
                Call::Acquire(0, 0, Size::new(800.0, 600.0)),
                Call::Record(0),
                Call::Uploads(0),
                Call::Draw(0),
                Call::Present(0),
            ]
        );
        assert_eq!(s.phase(), FramePhase::Idle);
        assert_eq!(pane.layouts, 1);

        // Nothing dirty: the second frame reuses the layout.
        let report = s.frame(&mut pane, 2_000).unwrap();
        assert_eq!(report.info.number, 1);
        assert_eq!(report.info.slot, 1);
        assert_eq!(pane.layouts, 1);
        assert!(!report.needs_redraw);
    }

    #[test]
    fn animating_widgets_keep_frames_coming() {
        let (mut s, _tx) = scheduler(2);
        let mut pane = Pane::new();
        pane.animating = true;
        assert!(s.frame(&mut pane, 1_000).unwrap().needs_redraw);
    }

    // ── Event-frame ordering ────────────────────

    #[test]
    fn input_applies_only_before_display_time() {
        let (mut s, tx) = scheduler(2);
        let mut pane = Pane::new();
        tx.send_at(100, move_to(1.0, 1.0));
        tx.send_at(300, move_to(2.0, 2.0));

        let report = s.frame(&mut pane, 200).unwrap();
        assert_eq!(report.events_applied, 1);
        assert_eq!(pane.moves, vec![Vec2::new(1.0, 1.0)]);
        assert!(report.needs_redraw);

        let report = s.frame(&mut pane, 400).unwrap();
        assert_eq!(report.events_applied, 1);
        assert_eq!(pane.moves, vec![Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0)]);
    }

    #[test]
    fn event_one_period_early_is_seen() {
        let (mut s, tx) = scheduler(2);
        let mut pane = Pane::new();
        let period = s.vsync_period_ns();
        let t = 5_000_000;
        tx.send_at(t, move_to(7.0, 7.0));
        s.frame(&mut pane, t + period).unwrap();
        assert_eq!(pane.moves, vec![Vec2::new(7.0, 7.0)]);
    }

    // ── Resize ──────────────────────────────────

    #[test]
    fn resize_between_frames_recreates_swap_chain() {
        let (mut s, tx) = scheduler(2);
        let mut pane = Pane::new();
        s.frame(&mut pane, 1_000).unwrap();
        let mark = s.backend().calls.len();

        tx.send(HostMessage::Resize(Size::new(1024.0, 512.0)));
        let report = s.frame(&mut pane, 2_000).unwrap();

        let extent = Size::new(1024.0, 512.0);
        assert!(report.presented);
        assert_eq!(report.info.window_extent, extent);
        assert_eq!(
            calls_since(&s, mark)[..2],
            [Call::Resize(extent), Call::Acquire(1, 1, extent)]
        );
        assert_eq!(pane.rect, Rect::new(0.0, 0.0, 1024.0, 512.0));
        assert!(!s.backend().calls.iter().any(|c| matches!(c, Call::Abandon(_))));
        assert_eq!(s.stats().frames_presented, 2);
    }

    #[test]
    fn out_of_date_swap_chain_restarts_frame() {
        let mut backend = MockBackend::new(2);
        backend.out_of_date = 1;
        let (mut s, _tx) = scheduler_with(backend, &Config::default());
        let mut pane = Pane::new();
        let report = s.frame(&mut pane, 1_000).unwrap();
        assert!(report.presented);
        let extent = Size::new(800.0, 600.0);
        assert_eq!(
            s.backend().calls[..3],
            [
                Call::Acquire(0, 0, extent),
                Call::Resize(extent),
                Call::Acquire(0, 0, extent)
            ]
        );
        assert_eq!(s.stats().swap_chain_recreations, 1);
    }

    #[test]
    fn persistent_out_of_date_is_reported() {
        let mut backend = MockBackend::new(2);
        backend.out_of_date = 10;
        let (mut s, _tx) = scheduler_with(backend, &Config::default());
        let err = s.frame(&mut Pane::new(), 1_000).unwrap_err();
        assert_eq!(err.cause, RenderError::SwapChainOutOfDate);
    }

    // ── Frame-scoped errors ─────────────────────

    #[test]
    fn oversized_frame_grows_buffers_and_is_dropped() {
        let mut backend = MockBackend::new(2);
        backend.too_large = 1;
        let (mut s, _tx) = scheduler_with(backend, &Config::default());
        let mut pane = Pane::new();

        let report = s.frame(&mut pane, 1_000).unwrap();
        assert!(!report.presented);
        assert_eq!(report.dropped, Some(RenderError::FrameTooLarge));
        assert!(report.needs_redraw);
        assert!(s.backend().calls.contains(&Call::Grow));
        assert!(s.backend().calls.contains(&Call::Abandon(0)));
        assert!(!s.backend().calls.contains(&Call::Uploads(0)));
        assert_eq!(s.next_frame_number(), 0);

        let report = s.frame(&mut pane, 2_000).unwrap();
        assert!(report.presented);
        assert_eq!(report.info.number, 0);
        assert_eq!(s.stats().frames_dropped, 1);
    }

    #[test]
    fn layout_timeout_keeps_previous_layout() {
        let config = Config {
            layout_budget_ms: 1,
            ..Config::default()
        };
        let (mut s, tx) = scheduler_with(MockBackend::new(2), &config);
        let mut pane = Pane::new();
        s.frame(&mut pane, 1_000).unwrap();
        let before = pane.rect;

        pane.slow = true;
        tx.send(HostMessage::Resize(Size::new(640.0, 480.0)));
        let report = s.frame(&mut pane, 2_000).unwrap();
        assert_eq!(report.dropped, Some(RenderError::LayoutTimeout));
        assert!(report.needs_redraw);
        assert_eq!(pane.rect, before);
        assert_eq!(s.stats().layout_timeouts, 1);

        pane.slow = false;
        let report = s.frame(&mut pane, 3_000).unwrap();
        assert!(report.presented);
        assert_eq!(pane.rect, Rect::new(0.0, 0.0, 640.0, 480.0));
    }

    #[test]
    fn layout_timeout_in_last_child_rolls_back_whole_column() {
        let config = Config {
            layout_budget_ms: 1,
            ..Config::default()
        };
        let (mut s, tx) = scheduler_with(MockBackend::new(2), &config);
        let mut column = Column::of(vec![Pane::new(), Pane::new()]);
        assert!(s.frame(&mut column, 1_000).unwrap().presented);

        let mut slow = Pane::new();
        slow.slow = true;
        column.children.push(Box::new(slow));
        let before = column.rects();
        assert_eq!(before[2], Rect::new(0.0, 300.0, 800.0, 300.0));
        assert_eq!(before[3], Rect::new(0.0, 0.0, 800.0, 600.0));

        tx.send(HostMessage::Resize(Size::new(300.0, 900.0)));
        let report = s.frame(&mut column, 2_000).unwrap();
        assert_eq!(report.dropped, Some(RenderError::LayoutTimeout));
        assert_eq!(s.stats().layout_timeouts, 1);
        assert_eq!(column.rects(), before);

        column.children.pop();
        let report = s.frame(&mut column, 3_000).unwrap();
        assert!(report.presented);
        assert_eq!(column.rects()[2], Rect::new(0.0, 450.0, 300.0, 450.0));
    }

    #[test]
    fn fatal_errors_surface_with_location() {
        let mut backend = MockBackend::new(2);
        backend.fatal_draw = Some(RenderError::DeviceLost("reset".into()));
        let (mut s, _tx) = scheduler_with(backend, &Config::default());
        let err = s.frame(&mut Pane::new(), 1_000).unwrap_err();
        assert_eq!(err.severity(), Severity::Fatal);
        assert_eq!(err.resource_tag, "draw submit");
        assert!(err.location.file().ends_with("scheduler.rs"));
        assert!(s.backend().calls.contains(&Call::Abandon(0)));
    }

    // ── Fences ──────────────────────────────────

    #[test]
    fn slot_reuse_waits_for_its_fence() {
        let (mut s, _tx) = scheduler(2);
        let mut pane = Pane::new();
        s.frame(&mut pane, 1_000).unwrap();
        s.frame(&mut pane, 2_000).unwrap();
        let mark = s.backend().calls.len();
        s.frame(&mut pane, 3_000).unwrap();
        assert_eq!(
            calls_since(&s, mark)[..3],
            [
                Call::WaitFence(0),
                Call::Retire(0),
                Call::Acquire(2, 0, Size::new(800.0, 600.0))
            ]
        );
        assert_eq!(s.backend().violations, 0);
    }

    #[test]
    fn signaled_frames_retire_without_waiting() {
        let mut backend = MockBackend::new(2);
        backend.auto_signal = true;
        let (mut s, _tx) = scheduler_with(backend, &Config::default());
        let mut pane = Pane::new();
        for t in 1..=4 {
            s.frame(&mut pane, t * 1_000).unwrap();
        }
        let calls = &s.backend().calls;
        assert!(!calls.iter().any(|c| matches!(c, Call::WaitFence(_))));
        for f in 0..3 {
            assert!(calls.contains(&Call::Retire(f)));
        }
    }

    fn fences_guard_slot_reuse(signals: Vec<bool>, n: u8) -> bool {
        let n = 1 + (n % 3) as usize;
        let (mut s, _tx) = scheduler(n);
        let mut pane = Pane::new();
        for (i, signal) in signals.iter().enumerate() {
            if *signal {
                s.backend_mut().signal_all();
            }
            if s.frame(&mut pane, (i as u64 + 1) * 1_000).is_err() {
                return false;
            }
        }
        s.backend().violations == 0 && s.frames_in_flight() <= n
    }

    quickcheck! {
        fn prop_fence_safety(signals: Vec<bool>, n: u8) -> bool {
            fences_guard_slot_reuse(signals, n)
        }
    }

    // ── Shutdown ────────────────────────────────

    #[test]
    fn close_drains_in_flight_frames() {
        let (mut s, _tx) = scheduler(2);
        let mut pane = Pane::new();
        s.frame(&mut pane, 1_000).unwrap();
        s.frame(&mut pane, 2_000).unwrap();
        let mark = s.backend().calls.len();
        s.close().unwrap();
        assert_eq!(
            calls_since(&s, mark),
            vec![
                Call::WaitFence(0),
                Call::Retire(0),
                Call::WaitFence(1),
                Call::Retire(1)
            ]
        );
        assert!(s.is_closed());
        assert_eq!(s.frames_in_flight(), 0);
        let report = s.frame(&mut pane, 3_000).unwrap();
        assert!(!report.presented);
    }

    #[test]
    fn close_message_ends_run_loop() {
        let (mut s, tx) = scheduler(2);
        let mut pane = Pane::new();
        let display = tx.clock().now_ns() + 1_000_000;
        tx.send(move_to(3.0, 3.0));
        tx.send(HostMessage::Vsync {
            display_time_ns: display,
        });
        let report = s.run_frame(&mut pane).unwrap().unwrap();
        assert_eq!(report.info.display_time_ns, display);
        assert_eq!(pane.moves, vec![Vec2::new(3.0, 3.0)]);

        tx.send(HostMessage::Close);
        assert_eq!(s.run_frame(&mut pane).unwrap(), None);
        assert!(s.is_closed());
        assert!(s.backend().calls.contains(&Call::Retire(0)));
    }

    #[test]
    fn dropped_sender_closes() {
        let (mut s, tx) = scheduler(2);
        drop(tx);
        assert_eq!(s.run_frame(&mut Pane::new()).unwrap(), None);
    }
}
