// Render-thread frame loop: latch vsync, apply input that arrived before the
// frame's display time, acquire, lay out, record, submit, present.

use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use vela_core::{
    clear_tree_dirty, layout_tree, tree_capabilities, tree_dirty, Capabilities, Clipboard, Config,
    DirtyFlags, ErrorInfo, LayoutContext, Rect, RenderError, ResultExt, Severity, Size, Widget,
};
use vela_input::{Dispatcher, HostRequest};

use crate::backend::{FrameBackend, FrameInfo, RecordStats};
use crate::message::{Clock, Envelope, HostMessage};
use crate::vsync::VsyncLatch;

/// Attempts at acquiring a swap image before giving up on a frame.
const ACQUIRE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePhase {
    Idle,
    WaitVsync,
    AcquireSwapImage,
    UpdateLayout,
    RecordDraw,
    SubmitUpload,
    SubmitDraw,
    Present,
    Closed,
}

/// What happened to one scheduled frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub info: FrameInfo,
    pub presented: bool,
    /// Frame-scoped error that dropped the frame.
    pub dropped: Option<RenderError>,
    pub record: RecordStats,
    pub events_applied: usize,
    /// Another frame should be scheduled even without new input.
    pub needs_redraw: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub frames_presented: u64,
    pub frames_dropped: u64,
    pub layout_timeouts: u64,
    pub swap_chain_recreations: u64,
}

pub struct Scheduler<B: FrameBackend> {
    backend: B,
    dispatcher: Dispatcher,
    clipboard: Box<dyn Clipboard>,
    clock: Clock,
    receiver: Receiver<Envelope>,
    pending: VecDeque<Envelope>,
    vsync: VsyncLatch,
    phase: FramePhase,
    next_number: u64,
    /// Frame last submitted from each slot and not yet retired.
    slots: Vec<Option<u64>>,
    extent: Size,
    resize_pending: bool,
    needs_layout: bool,
    layout_budget: Duration,
    closing: bool,
    stats: SchedulerStats,
}

impl<B: FrameBackend> Scheduler<B> {
    pub fn new(
        backend: B,
        config: &Config,
        receiver: Receiver<Envelope>,
        clock: Clock,
        extent: Size,
        clipboard: Box<dyn Clipboard>,
    ) -> Self {
        let n = backend.frames_in_flight().max(1);
        Self {
            backend,
            dispatcher: Dispatcher::new(config),
            clipboard,
            clock,
            receiver,
            pending: VecDeque::new(),
            vsync: VsyncLatch::new(Duration::from_nanos(16_666_667)),
            phase: FramePhase::Idle,
            next_number: 0,
            slots: vec![None; n],
            extent,
            resize_pending: false,
            needs_layout: true,
            layout_budget: Duration::from_millis(config.layout_budget_ms),
            closing: false,
            stats: SchedulerStats::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn extent(&self) -> Size {
        self.extent
    }

    pub fn next_frame_number(&self) -> u64 {
        self.next_number
    }

    pub fn is_closed(&self) -> bool {
        self.phase == FramePhase::Closed
    }

    pub fn vsync_period_ns(&self) -> u64 {
        self.vsync.period_ns()
    }

    /// Frames submitted but not yet retired.
    pub fn frames_in_flight(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Cursor, window drag and resize requests for the host.
    pub fn take_host_requests(&mut self) -> Vec<HostRequest> {
        self.dispatcher.take_requests()
    }

    fn enter(&mut self, phase: FramePhase) {
        log::trace!("frame {}: {:?} -> {:?}", self.next_number, self.phase, phase);
        self.phase = phase;
    }

    // ── Host queue ──────────────────────────────

    /// Pull everything queued without blocking.
    fn drain_queue(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) => self.accept(envelope),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closing = true;
                    break;
                }
            }
        }
    }

    /// Window state takes effect at once; input waits for its frame.
    fn accept(&mut self, envelope: Envelope) {
        match envelope.message {
            HostMessage::Vsync { display_time_ns } => self.vsync.latch(display_time_ns),
            HostMessage::Resize(extent) => {
                if extent != self.extent {
                    log::debug!("resize to {}x{}", extent.width, extent.height);
                    self.extent = extent;
                    self.resize_pending = true;
                }
            }
            HostMessage::Close => self.closing = true,
            _ => self.pending.push_back(envelope),
        }
    }

    /// Block until a vsync is latched. Returns None once the window closes.
    pub fn wait_vsync(&mut self) -> Option<u64> {
        if self.is_closed() {
            return None;
        }
        self.enter(FramePhase::WaitVsync);
        self.drain_queue();
        while !self.vsync.is_latched() && !self.closing {
            match self.receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(envelope) => self.accept(envelope),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.closing = true,
            }
        }
        self.drain_queue();
        if self.closing {
            return None;
        }
        self.vsync.take()
    }

    /// Wait for vsync and build one frame. Ok(None) once closed and drained.
    pub fn run_frame(&mut self, root: &mut dyn Widget) -> Result<Option<FrameReport>, ErrorInfo> {
        match self.wait_vsync() {
            Some(display_time_ns) => self.frame(root, display_time_ns).map(Some),
            None => {
                self.close()?;
                Ok(None)
            }
        }
    }

    // ── One frame ───────────────────────────────

    /// Build the frame displayed at `display_time_ns`. Transient and
    /// frame-scoped errors are handled here; only fatal ones are returned.
    pub fn frame(
        &mut self,
        root: &mut dyn Widget,
        display_time_ns: u64,
    ) -> Result<FrameReport, ErrorInfo> {
        self.drain_queue();
        let info = FrameInfo::new(
            self.next_number,
            display_time_ns,
            self.slots.len(),
            self.extent,
        );
        let mut report = FrameReport {
            info,
            presented: false,
            dropped: None,
            record: RecordStats::default(),
            events_applied: 0,
            needs_redraw: false,
        };
        if self.closing {
            self.close()?;
            return Ok(report);
        }

        self.retire_signaled();
        report.events_applied = self.apply_input(root, display_time_ns);

        // AcquireSwapImage
        self.enter(FramePhase::AcquireSwapImage);
        if let Some(previous) = self.slots[info.slot] {
            self.backend.wait_fence(previous).tagged("frame fence")?;
            self.backend.retire(previous);
            self.slots[info.slot] = None;
        }
        let info = self.acquire(info)?;
        report.info = info;

        // UpdateLayout
        self.enter(FramePhase::UpdateLayout);
        if let Err(e) = self.update_layout(root, &info) {
            return self.drop_frame(report, e);
        }

        // RecordDraw
        self.enter(FramePhase::RecordDraw);
        let recorded = self.backend.record(&info, &mut |ctx, canvas| {
            root.draw(ctx, canvas, display_time_ns);
        });
        report.record = match recorded {
            Ok(stats) => stats,
            Err(RenderError::FrameTooLarge) => {
                self.backend.grow_vertex_buffers();
                return self.drop_frame(report, RenderError::FrameTooLarge);
            }
            Err(e) => return Err(self.fail(&info, e, "record")),
        };

        // SubmitUpload, SubmitDraw
        self.enter(FramePhase::SubmitUpload);
        if let Err(e) = self.backend.submit_uploads(&info) {
            return Err(self.fail(&info, e, "upload submit"));
        }
        self.enter(FramePhase::SubmitDraw);
        if let Err(e) = self.backend.submit_draw(&info) {
            return Err(self.fail(&info, e, "draw submit"));
        }

        // Present
        self.enter(FramePhase::Present);
        self.backend.present(&info);
        self.slots[info.slot] = Some(info.number);
        self.next_number += 1;
        self.stats.frames_presented += 1;
        report.presented = true;
        clear_tree_dirty(root);

        report.needs_redraw = self.needs_redraw(root);
        self.enter(FramePhase::Idle);
        Ok(report)
    }

    fn acquire(&mut self, mut info: FrameInfo) -> Result<FrameInfo, ErrorInfo> {
        for _ in 0..ACQUIRE_ATTEMPTS {
            if self.resize_pending {
                self.backend.resize(self.extent).tagged("swap chain")?;
                self.resize_pending = false;
                self.needs_layout = true;
                info.window_extent = self.extent;
            }
            match self.backend.acquire(&info) {
                Ok(()) => return Ok(info),
                Err(RenderError::SwapChainOutOfDate) => {
                    log::info!("swap chain out of date; recreating");
                    self.stats.swap_chain_recreations += 1;
                    self.resize_pending = true;
                }
                Err(e) => return Err(ErrorInfo::new(e, "swap image")),
            }
        }
        Err(ErrorInfo::new(RenderError::SwapChainOutOfDate, "swap image"))
    }

    fn update_layout(&mut self, root: &mut dyn Widget, info: &FrameInfo) -> Result<(), RenderError> {
        let dirty = tree_dirty(root).contains(DirtyFlags::LAYOUT);
        if !(self.needs_layout || dirty) {
            return Ok(());
        }
        let window = Rect::from_size(info.window_extent);
        let mut cx = LayoutContext::new(info.display_time_ns, Instant::now() + self.layout_budget);
        match layout_tree(root, window, &mut cx) {
            Ok(()) => {
                log::trace!("layout visited {} widgets", cx.visited());
                self.needs_layout = false;
                Ok(())
            }
            Err(RenderError::LayoutTimeout) => {
                self.stats.layout_timeouts += 1;
                self.needs_layout = true;
                Err(RenderError::LayoutTimeout)
            }
            Err(e) => Err(e),
        }
    }

    fn drop_frame(&mut self, mut report: FrameReport, cause: RenderError) -> Result<FrameReport, ErrorInfo> {
        if cause.severity() != Severity::FrameScoped {
            return Err(self.fail(&report.info, cause, "frame"));
        }
        log::warn!("frame {} dropped: {}", report.info.number, cause);
        self.backend.abandon(&report.info);
        self.stats.frames_dropped += 1;
        report.dropped = Some(cause);
        report.needs_redraw = true;
        self.enter(FramePhase::Idle);
        Ok(report)
    }

    #[track_caller]
    fn fail(&mut self, info: &FrameInfo, cause: RenderError, tag: &str) -> ErrorInfo {
        let error = ErrorInfo::new(cause, tag);
        log::error!("frame {}: {}", info.number, error);
        self.backend.abandon(info);
        self.enter(FramePhase::Idle);
        error
    }

    /// Apply input that arrived before `display_time_ns`, in arrival order.
    fn apply_input(&mut self, root: &mut dyn Widget, display_time_ns: u64) -> usize {
        let mut applied = 0;
        while self
            .pending
            .front()
            .is_some_and(|e| e.arrival_ns < display_time_ns)
        {
            let Some(envelope) = self.pending.pop_front() else {
                break;
            };
            let now = self.clock.instant_at(envelope.arrival_ns);
            let clipboard = &mut *self.clipboard;
            match envelope.message {
                HostMessage::Mouse(event) => {
                    self.dispatcher.mouse(root, event, now);
                }
                HostMessage::Key(event) => {
                    self.dispatcher.key(root, event, now, clipboard);
                }
                HostMessage::Text(event) => {
                    self.dispatcher.text(root, event);
                }
                HostMessage::Modifiers(m) => self.dispatcher.set_modifiers(m),
                HostMessage::PointerLeft => self.dispatcher.pointer_left(root),
                HostMessage::FocusLost => self.dispatcher.keyboard_left(),
                HostMessage::Vsync { .. } | HostMessage::Resize(_) | HostMessage::Close => {}
            }
            applied += 1;
        }
        let now = self.clock.instant_at(display_time_ns);
        while self
            .dispatcher
            .tick(root, now, &mut *self.clipboard)
            .is_some()
        {
            applied += 1;
        }
        applied
    }

    fn retire_signaled(&mut self) {
        for i in 0..self.slots.len() {
            if let Some(frame) = self.slots[i] {
                if self.backend.fence_signaled(frame) {
                    self.backend.retire(frame);
                    self.slots[i] = None;
                }
            }
        }
    }

    fn needs_redraw(&self, root: &dyn Widget) -> bool {
        self.needs_layout
            || !self.pending.is_empty()
            || self.backend.has_pending_uploads()
            || tree_capabilities(root).contains(Capabilities::WANTS_VSYNC_UPDATES)
            || !tree_dirty(root).is_empty()
    }

    // ── Shutdown ────────────────────────────────

    /// Stop scheduling and wait for every in-flight frame.
    pub fn close(&mut self) -> Result<(), ErrorInfo> {
        if self.phase == FramePhase::Closed {
            return Ok(());
        }
        self.closing = true;
        let mut in_flight: Vec<u64> = self.slots.iter_mut().filter_map(|s| s.take()).collect();
        in_flight.sort_unstable();
        log::info!("closing; draining {} frame(s)", in_flight.len());
        for frame in in_flight {
            self.backend.wait_fence(frame).tagged("drain")?;
            self.backend.retire(frame);
        }
        self.pending.clear();
        self.enter(FramePhase::Closed);
        Ok(())
    }
}
