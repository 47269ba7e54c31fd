// Host-to-render-thread messages. Every message is stamped with its arrival
// time on the shared clock so the scheduler can order input against frames.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::time::{Duration, Instant};

use vela_core::{KeyboardEvent, Modifiers, MouseEvent, Size, TextEvent};

/// Monotonic nanosecond clock shared by the host and the render thread.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub fn now_ns(&self) -> u64 {
        self.ns_at(Instant::now())
    }

    pub fn ns_at(&self, instant: Instant) -> u64 {
        instant.saturating_duration_since(self.epoch).as_nanos() as u64
    }

    pub fn instant_at(&self, ns: u64) -> Instant {
        self.epoch + Duration::from_nanos(ns)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    /// Next refresh is predicted at `display_time_ns`.
    Vsync { display_time_ns: u64 },
    Mouse(MouseEvent),
    Key(KeyboardEvent),
    Text(TextEvent),
    Modifiers(Modifiers),
    PointerLeft,
    FocusLost,
    Resize(Size),
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub arrival_ns: u64,
    pub message: HostMessage,
}

/// Outcome of `HostSender::try_send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue full; the message was dropped.
    Dropped,
    /// The receiver is gone.
    Disconnected,
}

/// Sending half held by the OS thread and the vsync source.
#[derive(Debug, Clone)]
pub struct HostSender {
    tx: SyncSender<Envelope>,
    clock: Clock,
}

impl HostSender {
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Blocks while the queue is full. False once the render thread is gone.
    pub fn send(&self, message: HostMessage) -> bool {
        self.send_at(self.clock.now_ns(), message)
    }

    pub fn send_at(&self, arrival_ns: u64, message: HostMessage) -> bool {
        self.tx
            .send(Envelope {
                arrival_ns,
                message,
            })
            .is_ok()
    }

    /// Never blocks; a full queue drops the message.
    pub fn try_send(&self, message: HostMessage) -> Delivery {
        let envelope = Envelope {
            arrival_ns: self.clock.now_ns(),
            message,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(e)) => {
                log::debug!("host queue full, dropped {:?}", e.message);
                Delivery::Dropped
            }
            Err(TrySendError::Disconnected(_)) => Delivery::Disconnected,
        }
    }
}

/// Bounded host queue. The receiver belongs to the scheduler.
pub fn host_channel(capacity: usize, clock: Clock) -> (HostSender, Receiver<Envelope>) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (HostSender { tx, clock }, rx)
}
