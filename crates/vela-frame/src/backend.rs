// The GPU side of a frame as the scheduler sees it. The wgpu renderer
// implements this; tests drive the scheduler with a mock.

use vela_core::{Canvas, DrawContext, RenderError, Size};

/// Identity of one frame on its way through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub number: u64,
    /// Predicted time the frame reaches the display, in clock nanoseconds.
    pub display_time_ns: u64,
    /// Frames-in-flight slot, `number % frames_in_flight`.
    pub slot: usize,
    pub window_extent: Size,
}

impl FrameInfo {
    pub fn new(number: u64, display_time_ns: u64, frames_in_flight: usize, window_extent: Size) -> Self {
        Self {
            number,
            display_time_ns,
            slot: (number % frames_in_flight.max(1) as u64) as usize,
            window_extent,
        }
    }
}

/// Quads written per pipeline while recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStats {
    pub flat_quads: u32,
    pub image_quads: u32,
    pub sdf_quads: u32,
}

impl RecordStats {
    pub fn total(&self) -> u32 {
        self.flat_quads + self.image_quads + self.sdf_quads
    }
}

pub trait FrameBackend {
    fn frames_in_flight(&self) -> usize;

    /// Recreate the swap chain for `extent`.
    fn resize(&mut self, extent: Size) -> Result<(), RenderError>;

    /// May fail with `SwapChainOutOfDate`.
    fn acquire(&mut self, frame: &FrameInfo) -> Result<(), RenderError>;

    /// Run `draw` against this frame's canvas. Fails with `FrameTooLarge`
    /// when a vertex stream overflows.
    fn record(
        &mut self,
        frame: &FrameInfo,
        draw: &mut dyn FnMut(DrawContext, &mut dyn Canvas),
    ) -> Result<RecordStats, RenderError>;

    fn grow_vertex_buffers(&mut self);

    fn submit_uploads(&mut self, frame: &FrameInfo) -> Result<(), RenderError>;

    fn submit_draw(&mut self, frame: &FrameInfo) -> Result<(), RenderError>;

    fn present(&mut self, frame: &FrameInfo);

    fn fence_signaled(&mut self, frame: u64) -> bool;

    fn wait_fence(&mut self, frame: u64) -> Result<(), RenderError>;

    /// Everything `frame` uploaded is resident; descriptors become Ready.
    fn retire(&mut self, frame: u64);

    /// Release whatever was acquired for a frame that will not be presented.
    fn abandon(&mut self, frame: &FrameInfo);

    /// Uploads staged, or submitted and not yet retired.
    fn has_pending_uploads(&self) -> bool {
        false
    }
}
