// Vela render: wgpu pipelines, per-slot vertex streams and the painter that
// turns widget draw calls into quads.

mod fence;
mod init;
mod painter;
mod shaders;
mod stream;
mod tessellate;
mod textures;
mod vertex;

use std::sync::Arc;

use vela_core::{Canvas, Color, DrawContext, RenderError, Size};
use vela_frame::{FrameBackend, FrameInfo, RecordStats};

use fence::FrameFences;
use stream::{QuadIndexBuffer, StreamBuffer};
use textures::{AtlasTexture, RenderTargets};

pub use painter::{FramePainter, FrameResources};
pub use shaders::{flat_shader, image_shader, sdf_shader, TONEMAP_SHADER};
pub use stream::{VertexStream, INITIAL_QUADS};
pub use tessellate::{tessellate, ShapeCache, Trapezoid, SHAPE_TOLERANCE};
pub use textures::{pad_rows, DEPTH_FORMAT, HDR_FORMAT};
pub use vertex::{quad_indices, FlatVertex, FrameConstants, ImageVertex, SdfVertex, QUAD_INDICES};

pub struct WgpuRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    frames_in_flight: usize,
    subpixel_mode: u32,
    clear_color: Color,

    constants_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    atlas_bind_group: wgpu::BindGroup,
    tonemap_layout: wgpu::BindGroupLayout,

    flat_pipeline: wgpu::RenderPipeline,
    image_pipeline: wgpu::RenderPipeline,
    sdf_pipeline: wgpu::RenderPipeline,
    tonemap_pipeline: wgpu::RenderPipeline,

    image_texture: AtlasTexture,
    glyph_texture: AtlasTexture,
    targets: RenderTargets,

    index_buffer: QuadIndexBuffer,
    flat_buffer: StreamBuffer<FlatVertex>,
    image_buffer: StreamBuffer<ImageVertex>,
    sdf_buffer: StreamBuffer<SdfVertex>,

    resources: FrameResources,
    fences: FrameFences,
    current: Option<wgpu::SurfaceTexture>,
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuRenderer {
    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_config.format
    }

    pub fn extent(&self) -> Size {
        Size::new(self.surface_config.width as f32, self.surface_config.height as f32)
    }

    pub fn resources(&self) -> &FrameResources {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut FrameResources {
        &mut self.resources
    }

    fn draw_stream<V: bytemuck::Pod>(
        pass: &mut wgpu::RenderPass<'_>,
        pipeline: &wgpu::RenderPipeline,
        buffer: &StreamBuffer<V>,
        stream: &VertexStream<V>,
    ) {
        if stream.is_empty() {
            return;
        }
        pass.set_pipeline(pipeline);
        pass.set_vertex_buffer(0, buffer.slice(stream));
        pass.draw_indexed(0..(stream.quads() * 6) as u32, 0, 0..1);
    }
}

impl FrameBackend for WgpuRenderer {
    fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    fn resize(&mut self, extent: Size) -> Result<(), RenderError> {
        self.current = None;
        self.surface_config.width = (extent.width.round() as u32).max(1);
        self.surface_config.height = (extent.height.round() as u32).max(1);
        self.surface.configure(&self.device, &self.surface_config);
        self.targets = RenderTargets::new(&self.device, &self.tonemap_layout, extent);
        log::info!(
            "swap chain recreated at {}x{}",
            self.surface_config.width,
            self.surface_config.height
        );
        Ok(())
    }

    fn acquire(&mut self, frame: &FrameInfo) -> Result<(), RenderError> {
        let texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                return Err(RenderError::SwapChainOutOfDate)
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::debug!("swap image acquire timed out for frame {}", frame.number);
                return Err(RenderError::SwapChainOutOfDate);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(RenderError::OutOfMemory("swap image".into()))
            }
        };
        if texture.suboptimal {
            return Err(RenderError::SwapChainOutOfDate);
        }
        self.current = Some(texture);
        Ok(())
    }

    fn record(
        &mut self,
        frame: &FrameInfo,
        draw: &mut dyn FnMut(DrawContext, &mut dyn Canvas),
    ) -> Result<RecordStats, RenderError> {
        self.resources.begin_frame(frame.number, frame.slot);
        let mut painter = self.resources.painter();
        draw(DrawContext::root(frame.window_extent), &mut painter);
        painter.finish()
    }

    fn grow_vertex_buffers(&mut self) {
        if !self.resources.grow() {
            return;
        }
        self.flat_buffer.ensure_capacity(&self.device, &self.resources.flat);
        self.image_buffer.ensure_capacity(&self.device, &self.resources.image);
        self.sdf_buffer.ensure_capacity(&self.device, &self.resources.sdf);
        self.index_buffer.ensure_capacity(&self.device, self.resources.max_quads());
    }

    fn submit_uploads(&mut self, frame: &FrameInfo) -> Result<(), RenderError> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });
        let images = self.resources.images.take_uploads(frame.number);
        let glyphs = self.resources.glyphs.take_uploads(frame.number);
        let copied = self.image_texture.copy_tiles(&self.device, &mut encoder, &images)
            + self.glyph_texture.copy_tiles(&self.device, &mut encoder, &glyphs);
        if copied > 0 {
            log::trace!("frame {}: {} atlas tiles uploaded", frame.number, copied);
        }

        self.flat_buffer.upload(&self.queue, &self.resources.flat);
        self.image_buffer.upload(&self.queue, &self.resources.image);
        self.sdf_buffer.upload(&self.queue, &self.resources.sdf);

        let (aw, ah, _) = self.glyph_texture.extent();
        let constants = FrameConstants::new(frame.window_extent, (aw, ah), self.subpixel_mode);
        self.queue
            .write_buffer(&self.constants_buffer, 0, bytemuck::bytes_of(&constants));
        self.encoder = Some(encoder);
        Ok(())
    }

    fn submit_draw(&mut self, frame: &FrameInfo) -> Result<(), RenderError> {
        let Some(surface_texture) = self.current.as_ref() else {
            return Err(RenderError::SwapChainOutOfDate);
        };
        let mut encoder = match self.encoder.take() {
            Some(encoder) => encoder,
            None => self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            }),
        };
        let swap_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let clear = self.clear_color;

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.hdr_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear.r as f64,
                            g: clear.g as f64,
                            b: clear.b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            // Draw order: flat → image → SDF; depth resolves overlap.
            pass.set_index_buffer(self.index_buffer.buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            Self::draw_stream(&mut pass, &self.flat_pipeline, &self.flat_buffer, &self.resources.flat);
            pass.set_bind_group(1, &self.atlas_bind_group, &[]);
            Self::draw_stream(&mut pass, &self.image_pipeline, &self.image_buffer, &self.resources.image);
            Self::draw_stream(&mut pass, &self.sdf_pipeline, &self.sdf_buffer, &self.resources.sdf);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("tonemap_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.tonemap_pipeline);
            pass.set_bind_group(0, &self.targets.tonemap_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        let index = self.queue.submit(Some(encoder.finish()));
        self.fences.submitted(&self.queue, frame.number, index);
        Ok(())
    }

    fn present(&mut self, _frame: &FrameInfo) {
        if let Some(texture) = self.current.take() {
            texture.present();
        }
    }

    fn fence_signaled(&mut self, frame: u64) -> bool {
        self.fences.signaled(&self.device, frame)
    }

    fn wait_fence(&mut self, frame: u64) -> Result<(), RenderError> {
        self.fences.wait(&self.device, frame)
    }

    fn retire(&mut self, frame: u64) {
        self.resources.retire(frame);
        self.fences.remove(frame);
    }

    fn abandon(&mut self, frame: &FrameInfo) {
        log::debug!("frame {} abandoned", frame.number);
        self.current = None;
        // Staged tiles are already marked with this frame; a later frame's
        // fence retires them, so the copies must still reach the queue.
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
    }

    fn has_pending_uploads(&self) -> bool {
        self.resources.has_pending_uploads()
    }
}
