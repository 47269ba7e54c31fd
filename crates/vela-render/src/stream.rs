// Per-pipeline vertex streams. Each stream owns one GPU buffer split into a
// segment per frame-in-flight slot; a frame writes only its own segment, so
// the GPU never reads a range the CPU is rewriting.

use std::marker::PhantomData;
use std::ops::Range;

use bytemuck::Pod;
use vela_core::RenderError;

use crate::vertex::quad_indices;

/// Quads per slot a stream starts with.
pub const INITIAL_QUADS: usize = 4096;

/// CPU side of a stream: the quads recorded for the current frame.
#[derive(Debug)]
pub struct VertexStream<V> {
    label: &'static str,
    slots: usize,
    quads_per_slot: usize,
    slot: usize,
    vertices: Vec<V>,
    overflowed: bool,
}

impl<V: Pod> VertexStream<V> {
    pub fn new(label: &'static str, slots: usize, quads_per_slot: usize) -> Self {
        Self {
            label,
            slots: slots.max(1),
            quads_per_slot: quads_per_slot.max(1),
            slot: 0,
            vertices: Vec::with_capacity(quads_per_slot.max(1) * 4),
            overflowed: false,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Start recording into `slot`'s segment.
    pub fn begin(&mut self, slot: usize) {
        self.slot = slot % self.slots;
        self.vertices.clear();
        self.overflowed = false;
    }

    /// Append one quad, corners TL, TR, BL, BR.
    pub fn place(&mut self, quad: [V; 4]) -> Result<(), RenderError> {
        if self.quads() >= self.quads_per_slot {
            self.overflowed = true;
            return Err(RenderError::FrameTooLarge);
        }
        self.vertices.extend_from_slice(&quad);
        Ok(())
    }

    pub fn quads(&self) -> usize {
        self.vertices.len() / 4
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[V] {
        &self.vertices
    }

    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn quads_per_slot(&self) -> usize {
        self.quads_per_slot
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    fn segment_bytes(&self) -> u64 {
        (self.quads_per_slot * 4 * std::mem::size_of::<V>()) as u64
    }

    /// Byte range of `slot`'s segment in the GPU buffer.
    pub fn segment(&self, slot: usize) -> Range<u64> {
        let start = (slot % self.slots) as u64 * self.segment_bytes();
        start..start + self.segment_bytes()
    }

    /// Bytes written this frame, positioned in the current slot's segment.
    pub fn written(&self) -> Range<u64> {
        let start = self.segment(self.slot).start;
        start..start + self.bytes().len() as u64
    }

    pub fn buffer_size(&self) -> u64 {
        self.segment_bytes() * self.slots as u64
    }

    /// Double the per-slot capacity if the last frame overflowed.
    pub fn grow(&mut self) -> bool {
        if !self.overflowed {
            return false;
        }
        self.quads_per_slot *= 2;
        self.overflowed = false;
        log::info!("{} stream grown to {} quads per frame", self.label, self.quads_per_slot);
        true
    }
}

/// GPU buffer backing one `VertexStream`.
pub struct StreamBuffer<V> {
    pub buffer: wgpu::Buffer,
    size: u64,
    _vertex: PhantomData<V>,
}

impl<V: Pod> StreamBuffer<V> {
    pub fn new(device: &wgpu::Device, stream: &VertexStream<V>) -> Self {
        Self {
            buffer: create_vertex_buffer(device, stream.label(), stream.buffer_size()),
            size: stream.buffer_size(),
            _vertex: PhantomData,
        }
    }

    /// Recreate the buffer after the stream grew. Frames still in flight keep
    /// the old buffer alive until they retire.
    pub fn ensure_capacity(&mut self, device: &wgpu::Device, stream: &VertexStream<V>) {
        if stream.buffer_size() > self.size {
            self.buffer = create_vertex_buffer(device, stream.label(), stream.buffer_size());
            self.size = stream.buffer_size();
        }
    }

    pub fn upload(&self, queue: &wgpu::Queue, stream: &VertexStream<V>) {
        if stream.is_empty() {
            return;
        }
        queue.write_buffer(&self.buffer, stream.written().start, stream.bytes());
    }

    pub fn slice(&self, stream: &VertexStream<V>) -> wgpu::BufferSlice<'_> {
        self.buffer.slice(stream.written())
    }
}

fn create_vertex_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// The shared static index buffer, regrown when any stream outgrows it.
pub struct QuadIndexBuffer {
    pub buffer: wgpu::Buffer,
    quads: usize,
}

impl QuadIndexBuffer {
    pub fn new(device: &wgpu::Device, quads: usize) -> Self {
        use wgpu::util::DeviceExt;
        let quads = quads.next_power_of_two().max(INITIAL_QUADS);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_index_buffer"),
            contents: bytemuck::cast_slice(&quad_indices(quads)),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self { buffer, quads }
    }

    pub fn ensure_capacity(&mut self, device: &wgpu::Device, quads: usize) {
        if quads > self.quads {
            *self = Self::new(device, quads);
        }
    }
}
