// Per-frame completion tracking on top of wgpu submission indices.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vela_core::RenderError;

struct Fence {
    index: wgpu::SubmissionIndex,
    done: Arc<AtomicBool>,
}

/// Fences of submitted frames that have not been retired yet.
#[derive(Default)]
pub struct FrameFences {
    pending: HashMap<u64, Fence>,
    device_lost: Arc<AtomicBool>,
}

impl FrameFences {
    pub fn new(device_lost: Arc<AtomicBool>) -> Self {
        Self {
            pending: HashMap::new(),
            device_lost,
        }
    }

    /// Track `frame`'s submission. Call right after `Queue::submit`.
    pub fn submitted(&mut self, queue: &wgpu::Queue, frame: u64, index: wgpu::SubmissionIndex) {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        queue.on_submitted_work_done(move || flag.store(true, Ordering::Release));
        self.pending.insert(frame, Fence { index, done });
    }

    /// Non-blocking. Frames never submitted count as signaled.
    pub fn signaled(&self, device: &wgpu::Device, frame: u64) -> bool {
        let Some(fence) = self.pending.get(&frame) else {
            return true;
        };
        device.poll(wgpu::Maintain::Poll);
        fence.done.load(Ordering::Acquire)
    }

    pub fn wait(&self, device: &wgpu::Device, frame: u64) -> Result<(), RenderError> {
        if self.device_lost.load(Ordering::Acquire) {
            return Err(RenderError::DeviceLost(format!("waiting on frame {frame}")));
        }
        let Some(fence) = self.pending.get(&frame) else {
            return Ok(());
        };
        if !fence.done.load(Ordering::Acquire) {
            log::trace!("waiting on fence of frame {}", frame);
            device.poll(wgpu::Maintain::WaitForSubmissionIndex(fence.index.clone()));
        }
        if self.device_lost.load(Ordering::Acquire) {
            return Err(RenderError::DeviceLost(format!("waiting on frame {frame}")));
        }
        Ok(())
    }

    pub fn remove(&mut self, frame: u64) {
        self.pending.remove(&frame);
    }
}
