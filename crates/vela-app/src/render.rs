// Render thread: owns the renderer, the scheduler and the widget tree.
// Talks to the OS thread only through the host queue and the event-loop proxy.

use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use winit::event_loop::EventLoopProxy;

use vela_atlas::{system_font_candidates, TtfFace};
use vela_core::{BoxFace, Config, FontBook, FontFace, FontId, Severity, Size};
use vela_frame::{Clock, Envelope, Scheduler};
use vela_input::HostRequest;
use vela_render::WgpuRenderer;

use crate::clipboard::HostClipboard;
use crate::demo::{self, Palette};
use crate::gpu::Gpu;

/// Events the render thread posts back to the OS thread.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Request(HostRequest),
    RenderStopped,
}

pub fn load_fonts() -> (FontBook, FontId) {
    let mut book = FontBook::new();
    let face: Arc<dyn FontFace> = match system_font_candidates()
        .iter()
        .find_map(|p| TtfFace::from_file(Path::new(p)).map(|f| (p, f)))
    {
        Some((path, face)) => {
            log::info!("font: {}", path);
            Arc::new(face)
        }
        None => {
            log::warn!("no system font found, drawing box glyphs");
            Arc::new(BoxFace::default())
        }
    };
    let id = book.add(face);
    (book, id)
}

pub struct RenderThread {
    pub gpu: Gpu,
    pub config: Config,
    pub receiver: Receiver<Envelope>,
    pub clock: Clock,
    pub extent: Size,
    pub proxy: EventLoopProxy<AppEvent>,
}

impl RenderThread {
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("vela-render".into())
            .spawn(move || {
                let proxy = self.proxy.clone();
                self.run();
                let _ = proxy.send_event(AppEvent::RenderStopped);
            })
    }

    fn run(self) {
        let (fonts, font) = load_fonts();
        let Gpu {
            device,
            queue,
            surface,
            surface_config,
        } = self.gpu;
        let renderer = match WgpuRenderer::new(device, queue, surface, surface_config, &self.config, fonts) {
            Ok(r) => r,
            Err(e) => {
                log::error!("renderer init failed: {}", e);
                return;
            }
        };

        let image = demo::gradient_image();
        if let Some(pixels) = &image {
            renderer.resources().images.loader().submit(pixels.clone());
        }
        let mut root = demo::build(font, Palette::for_theme(self.config.theme_mode), image);

        let mut scheduler = Scheduler::new(
            renderer,
            &self.config,
            self.receiver,
            self.clock,
            self.extent,
            Box::new(HostClipboard::new()),
        );

        loop {
            match scheduler.run_frame(&mut root) {
                Ok(Some(report)) => {
                    if let Some(e) = &report.dropped {
                        log::debug!("frame {} dropped: {}", report.info.number, e);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug_assert_eq!(e.severity(), Severity::Fatal);
                    log::error!("fatal: {}", e);
                    break;
                }
            }
            for request in scheduler.take_host_requests() {
                if self.proxy.send_event(AppEvent::Request(request)).is_err() {
                    return;
                }
            }
        }

        let stats = scheduler.stats();
        log::info!(
            "render thread done: {} presented, {} dropped",
            stats.frames_presented,
            stats.frames_dropped
        );
    }
}
