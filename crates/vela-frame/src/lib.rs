// Vela frame: the render-thread scheduler that turns vsync ticks and host
// input into presented frames.

mod backend;
mod message;
mod scheduler;
mod tests;
mod vsync;

pub use backend::{FrameBackend, FrameInfo, RecordStats};
pub use message::{host_channel, Clock, Delivery, Envelope, HostMessage, HostSender};
pub use scheduler::{FramePhase, FrameReport, Scheduler, SchedulerStats};
pub use vsync::{VsyncLatch, VsyncTicker};
