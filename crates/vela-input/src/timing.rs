// Time-based input state: multi-click counting and synthesised key repeat.

use std::time::{Duration, Instant};

use vela_core::{Key, KeyboardEvent, Modifiers, MouseButton, Vec2};

/// Maximum pointer travel, in pixels, between presses of one multi-click.
pub const CLICK_SLOP: f32 = 4.0;

#[derive(Debug, Clone)]
pub struct ClickCounter {
    interval: Duration,
    last: Option<(MouseButton, Vec2, Instant)>,
    count: u32,
}

impl ClickCounter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            count: 0,
        }
    }

    /// Register a press and return its click count (1, 2, 3, ...).
    pub fn press(&mut self, button: MouseButton, position: Vec2, now: Instant) -> u32 {
        let continues = self.last.is_some_and(|(b, p, t)| {
            b == button
                && (position - p).length() <= CLICK_SLOP
                && now.saturating_duration_since(t) <= self.interval
        });
        self.count = if continues { self.count + 1 } else { 1 };
        self.last = Some((button, position, now));
        self.count
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.count = 0;
    }
}

/// Synthesises auto-repeat for the most recently pressed key. Turns itself
/// off once the host is seen delivering its own repeats.
#[derive(Debug, Clone)]
pub struct KeyRepeat {
    delay: Duration,
    interval: Option<Duration>,
    held: Option<(Key, Modifiers, Instant)>,
    host_repeats: bool,
}

impl KeyRepeat {
    /// A rate of zero disables synthesis.
    pub fn new(delay: Duration, rate_hz: u32) -> Self {
        Self {
            delay,
            interval: (rate_hz > 0).then(|| Duration::from_secs(1) / rate_hz),
            held: None,
            host_repeats: false,
        }
    }

    pub fn host_repeats(&self) -> bool {
        self.host_repeats
    }

    pub fn observe(&mut self, event: &KeyboardEvent, now: Instant) {
        if event.repeat {
            if !self.host_repeats {
                log::debug!("host delivers key repeats; synthesis off");
            }
            self.host_repeats = true;
            self.held = None;
            return;
        }
        if event.is_down() {
            if !self.host_repeats && self.interval.is_some() {
                self.held = Some((event.key, event.modifiers, now + self.delay));
            }
        } else if self.held.is_some_and(|(k, _, _)| k == event.key) {
            self.held = None;
        }
    }

    /// Drop the held key, e.g. when focus leaves the window.
    pub fn cancel(&mut self) {
        self.held = None;
    }

    /// Next instant a repeat is due, for hosts that sleep between events.
    pub fn next_due(&self) -> Option<Instant> {
        self.held.map(|(_, _, due)| due)
    }

    /// Repeat events due at `now`. Repeats missed by a late tick are
    /// collapsed into one.
    pub fn poll(&mut self, now: Instant) -> Option<KeyboardEvent> {
        let interval = self.interval?;
        let (key, modifiers, due) = self.held?;
        if now < due {
            return None;
        }
        let mut next = due + interval;
        while next <= now {
            next += interval;
        }
        self.held = Some((key, modifiers, next));
        let mut event = KeyboardEvent::down(key, modifiers);
        event.repeat = true;
        Some(event)
    }
}
