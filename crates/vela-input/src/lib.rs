// Vela input: routes host events to widgets through hit testing and keeps
// hover, focus and capture state between events.

mod bindings;
mod tests;
mod timing;

pub use bindings::KeyBindings;
pub use timing::{ClickCounter, KeyRepeat, CLICK_SLOP};

use std::collections::HashMap;
use std::time::{Duration, Instant};

use vela_core::{
    find, find_mut, focus_order, hit_test, Capabilities, Clipboard, Command, Config, CursorIcon,
    HitBox, HitBoxKind, KeyboardEvent, Modifiers, MouseButton, MouseButtons, MouseEvent,
    MouseEventKind, TextEvent, Vec2, Widget, WidgetId,
};

// ──────────────────────────────────────────────
// Outcomes and host requests
// ──────────────────────────────────────────────

/// What became of one input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// A widget claimed the event.
    Delivered(WidgetId),
    /// A key chord fired a command.
    Command(Command),
    /// The press landed on a window-frame region; the host was asked to act.
    WindowFrame(HitBoxKind),
    /// Nothing claimed the event; it is dropped.
    Discarded,
}

/// Work the dispatcher needs the host windowing layer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRequest {
    SetCursor(CursorIcon),
    DragWindow,
    ResizeWindow(HitBoxKind),
    ShowWindowMenu,
}

// ──────────────────────────────────────────────
// Dispatcher
// ──────────────────────────────────────────────

pub struct Dispatcher {
    hover: Option<WidgetId>,
    hover_kind: HitBoxKind,
    cursor: CursorIcon,
    focus: Option<WidgetId>,
    capture: Option<(WidgetId, MouseButton)>,
    buttons: MouseButtons,
    modifiers: Modifiers,
    pointer: Option<Vec2>,
    bindings: KeyBindings,
    clicks: ClickCounter,
    repeat: KeyRepeat,
    /// Unfinished IME text of each focus target, kept while focus is away.
    compositions: HashMap<WidgetId, String>,
    requests: Vec<HostRequest>,
}

impl Dispatcher {
    pub fn new(config: &Config) -> Self {
        Self {
            hover: None,
            hover_kind: HitBoxKind::Interior,
            cursor: CursorIcon::Default,
            focus: None,
            capture: None,
            buttons: MouseButtons::default(),
            modifiers: Modifiers::NONE,
            pointer: None,
            bindings: KeyBindings::with_overrides(&config.keybindings),
            clicks: ClickCounter::new(Duration::from_millis(config.double_click_interval_ms)),
            repeat: KeyRepeat::new(
                Duration::from_millis(config.key_repeat_delay_ms),
                config.key_repeat_rate_hz,
            ),
            compositions: HashMap::new(),
            requests: Vec::new(),
        }
    }

    pub fn hover(&self) -> Option<WidgetId> {
        self.hover
    }

    pub fn hover_kind(&self) -> HitBoxKind {
        self.hover_kind
    }

    pub fn cursor(&self) -> CursorIcon {
        self.cursor
    }

    pub fn focus(&self) -> Option<WidgetId> {
        self.focus
    }

    pub fn capture(&self) -> Option<WidgetId> {
        self.capture.map(|(id, _)| id)
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn pointer(&self) -> Option<Vec2> {
        self.pointer
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut KeyBindings {
        &mut self.bindings
    }

    /// In-progress IME composition of the focus target.
    pub fn composition(&self) -> Option<(WidgetId, &str)> {
        let focus = self.focus?;
        self.compositions.get(&focus).map(|s| (focus, s.as_str()))
    }

    /// Composition buffered for `target`, focused or not.
    pub fn pending_composition(&self, target: WidgetId) -> Option<&str> {
        self.compositions.get(&target).map(String::as_str)
    }

    /// When the next synthesised key repeat is due.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.repeat.next_due()
    }

    pub fn take_requests(&mut self) -> Vec<HostRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Modifier changes the host reports outside key events.
    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    // ── Focus ───────────────────────────────────

    /// Move focus programmatically. Fails if `target` is not in the tree or
    /// does not accept focus.
    pub fn set_focus(&mut self, root: &mut dyn Widget, target: Option<WidgetId>) -> bool {
        if let Some(id) = target {
            if !find(root, id).is_some_and(|w| w.accepts_focus()) {
                return false;
            }
        }
        if target == self.focus {
            return true;
        }
        // The old target hides its preedit; the buffer keeps it for later.
        if let Some(old) = self.focus {
            if let Some(w) = find_mut(root, old) {
                if self.compositions.contains_key(&old) {
                    w.handle_text_event(&TextEvent {
                        text: String::new(),
                        composing: true,
                    });
                }
                w.set_focused(false);
            }
        }
        if let Some(new) = target {
            if let Some(w) = find_mut(root, new) {
                w.set_focused(true);
                if let Some(text) = self.compositions.get(&new) {
                    w.handle_text_event(&TextEvent {
                        text: text.clone(),
                        composing: true,
                    });
                }
            }
        }
        log::trace!("focus {:?} -> {:?}", self.focus, target);
        self.focus = target;
        true
    }

    fn cycle_focus(&mut self, root: &mut dyn Widget, forward: bool) -> bool {
        let order = focus_order(root);
        let n = order.len();
        if n == 0 {
            return false;
        }
        let current = self.focus.and_then(|f| order.iter().position(|&id| id == f));
        let next = match (current, forward) {
            (Some(i), true) => order[(i + 1) % n],
            (Some(i), false) => order[(i + n - 1) % n],
            (None, true) => order[0],
            (None, false) => order[n - 1],
        };
        self.set_focus(root, Some(next))
    }

    /// Focus the nearest focusable widget on the path to `target`.
    fn focus_on_press(&mut self, root: &mut dyn Widget, target: WidgetId) {
        let Some(path) = path_to(root, target) else {
            return;
        };
        let focusable = path
            .iter()
            .rev()
            .copied()
            .find(|&id| find(root, id).is_some_and(|w| w.accepts_focus()));
        if let Some(id) = focusable {
            self.set_focus(root, Some(id));
        }
    }

    // ── Mouse ───────────────────────────────────

    pub fn mouse(&mut self, root: &mut dyn Widget, mut event: MouseEvent, now: Instant) -> Outcome {
        self.prune(root);
        self.modifiers = event.modifiers;
        match event.kind {
            MouseEventKind::Down(b) => self.buttons = self.buttons.with(b, true),
            MouseEventKind::Up(b) => self.buttons = self.buttons.with(b, false),
            MouseEventKind::Enter | MouseEventKind::Exit => return Outcome::Discarded,
            _ => {}
        }
        event.buttons = self.buttons;
        self.pointer = Some(event.position);

        // A drag keeps its target and its hover until the press ends.
        if let Some((captured, button)) = self.capture {
            if let MouseEventKind::Down(b) = event.kind {
                event.click_count = self.clicks.press(b, event.position, now);
            }
            let outcome = bubble(root, captured, |w| w.handle_mouse_event(&event));
            if event.kind == MouseEventKind::Up(button) {
                self.capture = None;
                self.update_hover(root, event.position, event.modifiers);
            }
            return outcome;
        }

        let hit = self.update_hover(root, event.position, event.modifiers);
        let Some(hit) = hit else {
            log::trace!("{:?} at {:?} hit nothing", event.kind, event.position);
            return Outcome::Discarded;
        };

        if let MouseEventKind::Down(button) = event.kind {
            event.click_count = self.clicks.press(button, event.position, now);
            if hit.kind.is_window_frame() {
                // The OS owns the press from here; its release never reaches us.
                self.buttons = self.buttons.with(button, false);
                self.requests.push(match hit.kind {
                    HitBoxKind::MoveArea => HostRequest::DragWindow,
                    HitBoxKind::ApplicationIcon => HostRequest::ShowWindowMenu,
                    kind => HostRequest::ResizeWindow(kind),
                });
                return Outcome::WindowFrame(hit.kind);
            }
            self.capture = Some((hit.widget, button));
            self.focus_on_press(root, hit.widget);
        }

        let outcome = bubble(root, hit.widget, |w| w.handle_mouse_event(&event));
        if outcome == Outcome::Discarded {
            log::trace!("{:?} unclaimed by {:?}", event.kind, hit.widget);
        }
        outcome
    }

    /// The pointer left the window.
    pub fn pointer_left(&mut self, root: &mut dyn Widget) {
        self.pointer = None;
        if self.capture.is_some() {
            return;
        }
        if let Some(old) = self.hover.take() {
            let event = self.crossing(MouseEventKind::Exit, Vec2::ZERO, self.modifiers);
            if let Some(w) = find_mut(root, old) {
                w.handle_mouse_event(&event);
            }
        }
        self.hover_kind = HitBoxKind::Interior;
    }

    fn crossing(&self, kind: MouseEventKind, position: Vec2, modifiers: Modifiers) -> MouseEvent {
        let mut event = MouseEvent::new(kind, position);
        event.buttons = self.buttons;
        event.modifiers = modifiers;
        event
    }

    /// Re-run the hit test, synthesising Exit/Enter and cursor changes.
    fn update_hover(
        &mut self,
        root: &mut dyn Widget,
        position: Vec2,
        modifiers: Modifiers,
    ) -> Option<HitBox> {
        let hit = hit_test(root, position);
        let new = hit.map(|h| h.widget);
        if new != self.hover {
            if let Some(old) = self.hover {
                let exit = self.crossing(MouseEventKind::Exit, position, modifiers);
                if let Some(w) = find_mut(root, old) {
                    w.handle_mouse_event(&exit);
                }
            }
            if let Some(id) = new {
                let enter = self.crossing(MouseEventKind::Enter, position, modifiers);
                if let Some(w) = find_mut(root, id) {
                    w.handle_mouse_event(&enter);
                }
            }
            self.hover = new;
        }

        self.hover_kind = hit.map_or(HitBoxKind::Interior, |h| h.kind);
        let text_target = hit.is_some_and(|h| {
            h.kind == HitBoxKind::Interior
                && find(root, h.widget)
                    .is_some_and(|w| w.capabilities().contains(Capabilities::ACCEPTS_TEXT))
        });
        let cursor = if text_target {
            CursorIcon::Text
        } else {
            self.hover_kind.cursor()
        };
        if cursor != self.cursor {
            self.cursor = cursor;
            self.requests.push(HostRequest::SetCursor(cursor));
        }
        hit
    }

    // ── Keyboard ────────────────────────────────

    pub fn key(
        &mut self,
        root: &mut dyn Widget,
        event: KeyboardEvent,
        now: Instant,
        clipboard: &mut dyn Clipboard,
    ) -> Outcome {
        self.prune(root);
        self.modifiers = event.modifiers;
        self.repeat.observe(&event, now);
        self.route_key(root, event, clipboard)
    }

    /// Deliver synthesised key repeats that are due at `now`.
    pub fn tick(
        &mut self,
        root: &mut dyn Widget,
        now: Instant,
        clipboard: &mut dyn Clipboard,
    ) -> Option<Outcome> {
        let event = self.repeat.poll(now)?;
        self.prune(root);
        Some(self.route_key(root, event, clipboard))
    }

    /// The window lost keyboard focus; held keys stop repeating.
    pub fn keyboard_left(&mut self) {
        self.repeat.cancel();
        self.modifiers = Modifiers::NONE;
    }

    fn route_key(
        &mut self,
        root: &mut dyn Widget,
        event: KeyboardEvent,
        clipboard: &mut dyn Clipboard,
    ) -> Outcome {
        if event.is_down() {
            if let Some(command) = self.bindings.lookup(event.key, event.modifiers) {
                self.run_command(root, command, clipboard);
                return Outcome::Command(command);
            }
        }
        let Some(focus) = self.focus else {
            return Outcome::Discarded;
        };
        bubble(root, focus, |w| w.handle_keyboard_event(&event))
    }

    /// Execute `command` as if its chord had been pressed. Returns whether
    /// anything acted on it.
    pub fn run_command(
        &mut self,
        root: &mut dyn Widget,
        command: Command,
        clipboard: &mut dyn Clipboard,
    ) -> bool {
        match command {
            Command::FocusNext => self.cycle_focus(root, true),
            Command::FocusPrevious => self.cycle_focus(root, false),
            Command::Copy | Command::Cut | Command::Paste | Command::SelectAll => {
                let Some(focus) = self.focus else {
                    return false;
                };
                bubble(root, focus, |w| w.handle_command(command, clipboard)) != Outcome::Discarded
            }
        }
    }

    // ── Text ────────────────────────────────────

    /// Text goes to the focus target only if it accepts text.
    pub fn text(&mut self, root: &mut dyn Widget, event: TextEvent) -> Outcome {
        self.prune(root);
        let Some(focus) = self.focus else {
            return Outcome::Discarded;
        };
        let accepts = find(root, focus)
            .is_some_and(|w| w.capabilities().contains(Capabilities::ACCEPTS_TEXT));
        if !accepts {
            log::trace!("text dropped: {:?} does not accept text", focus);
            return Outcome::Discarded;
        }
        if event.composing && !event.text.is_empty() {
            self.compositions.insert(focus, event.text.clone());
        } else {
            self.compositions.remove(&focus);
        }
        let handled = find_mut(root, focus).map(|w| w.handle_text_event(&event));
        match handled {
            Some(true) => Outcome::Delivered(focus),
            _ => Outcome::Discarded,
        }
    }

    // ── Bookkeeping ─────────────────────────────

    /// Forget targets that are no longer in the tree.
    fn prune(&mut self, root: &dyn Widget) {
        if self.hover.is_some_and(|id| find(root, id).is_none()) {
            self.hover = None;
        }
        if self.focus.is_some_and(|id| find(root, id).is_none()) {
            self.focus = None;
        }
        self.compositions.retain(|id, _| find(root, *id).is_some());
        if self.capture.is_some_and(|(id, _)| find(root, id).is_none()) {
            self.capture = None;
        }
    }
}

/// Ids from `root` down to `target`, inclusive.
pub fn path_to(root: &dyn Widget, target: WidgetId) -> Option<Vec<WidgetId>> {
    if root.id() == target {
        return Some(vec![target]);
    }
    for child in root.children() {
        if let Some(mut path) = path_to(child.as_ref(), target) {
            path.insert(0, root.id());
            return Some(path);
        }
    }
    None
}

/// Offer an event to `target`, then to each ancestor until one claims it.
fn bubble(
    root: &mut dyn Widget,
    target: WidgetId,
    mut handle: impl FnMut(&mut dyn Widget) -> bool,
) -> Outcome {
    let Some(path) = path_to(root, target) else {
        return Outcome::Discarded;
    };
    for &id in path.iter().rev() {
        if let Some(w) = find_mut(root, id) {
            if handle(w) {
                return Outcome::Delivered(id);
            }
        }
    }
    Outcome::Discarded
}
