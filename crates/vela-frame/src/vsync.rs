// Vsync latch and a timer-driven vsync source for hosts without a display
// link.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::message::{Delivery, HostMessage, HostSender};

/// Holds the display time of the next frame. Vsyncs that arrive while a
/// frame is being built collapse into the latest one.
#[derive(Debug, Clone)]
pub struct VsyncLatch {
    latched: Option<u64>,
    last: Option<u64>,
    period_ns: u64,
}

impl VsyncLatch {
    pub fn new(nominal_period: Duration) -> Self {
        Self {
            latched: None,
            last: None,
            period_ns: nominal_period.as_nanos() as u64,
        }
    }

    pub fn latch(&mut self, display_time_ns: u64) {
        if let Some(prev) = self.last {
            if display_time_ns <= prev {
                return;
            }
            let delta = display_time_ns - prev;
            // Skipped refreshes are multiples of the period; keep the nominal one.
            if delta < self.period_ns.saturating_mul(2) {
                self.period_ns = delta;
            }
        }
        self.last = Some(display_time_ns);
        self.latched = Some(display_time_ns);
    }

    pub fn take(&mut self) -> Option<u64> {
        self.latched.take()
    }

    pub fn is_latched(&self) -> bool {
        self.latched.is_some()
    }

    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }
}

/// Thread that sends `Vsync` messages every `period`, predicting display one
/// period ahead. Stops when dropped or when the receiver goes away.
pub struct VsyncTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl VsyncTicker {
    pub fn spawn(sender: HostSender, period: Duration) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = thread::Builder::new()
            .name("vela-vsync".into())
            .spawn(move || {
                let clock = sender.clock();
                let mut next = Instant::now() + period;
                while !flag.load(Ordering::Relaxed) {
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    }
                    let display_time_ns = clock.ns_at(next + period);
                    let delivery = sender.try_send(HostMessage::Vsync { display_time_ns });
                    if delivery == Delivery::Disconnected {
                        break;
                    }
                    next += period;
                    // Fell behind by more than a frame: resynchronise.
                    let now = Instant::now();
                    if now > next + period {
                        next = now + period;
                    }
                }
                log::debug!("vsync ticker stopped");
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// False once the thread has exited, on `stop` or a dropped receiver.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for VsyncTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{host_channel, Clock};

    #[test]
    fn latch_keeps_latest_and_tracks_period() {
        let mut latch = VsyncLatch::new(Duration::from_millis(16));
        latch.latch(1_000);
        latch.latch(9_000);
        assert_eq!(latch.take(), Some(9_000));
        assert_eq!(latch.take(), None);
        assert_eq!(latch.period_ns(), 8_000);
        latch.latch(5_000);
        assert!(!latch.is_latched());
    }

    #[test]
    fn ticker_delivers_increasing_display_times() {
        let (tx, rx) = host_channel(8, Clock::new());
        let mut ticker = VsyncTicker::spawn(tx, Duration::from_millis(2)).unwrap();
        let mut times = Vec::new();
        while times.len() < 3 {
            if let HostMessage::Vsync { display_time_ns } = rx.recv().unwrap().message {
                times.push(display_time_ns);
            }
        }
        ticker.stop();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn ticker_exits_when_receiver_is_dropped() {
        let (tx, rx) = host_channel(8, Clock::new());
        let ticker = VsyncTicker::spawn(tx, Duration::from_millis(1)).unwrap();
        assert!(rx.recv().is_ok());
        drop(rx);
        let deadline = Instant::now() + Duration::from_secs(5);
        while ticker.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!ticker.is_running());
    }
}
