// Vela demo host: winit window on the OS thread, rendering on its own thread.
// The OS thread only translates window events into host messages and
// carries out the window requests the dispatcher sends back.

mod clipboard;
mod demo;
mod gpu;
mod input;
mod render;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, Ime, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::keyboard::ModifiersState;
use winit::window::{Window, WindowAttributes, WindowId};

use vela_core::{
    load_config, Config, KeyboardEvent, MouseButtons, MouseEvent, MouseEventKind, Size, TextEvent,
    Vec2,
};
use vela_frame::{host_channel, Clock, HostMessage, HostSender, VsyncTicker};
use vela_input::HostRequest;

use input::{
    resize_direction, scroll_delta, vela_cursor_to_winit, winit_button_to_vela, winit_key_to_vela,
    winit_modifiers_to_vela,
};
use render::{AppEvent, RenderThread};

/// Capacity of the host queue; pointer moves are dropped beyond it.
const HOST_QUEUE_CAPACITY: usize = 256;
const DEFAULT_REFRESH_MILLIHERTZ: u32 = 60_000;

// ──────────────────────────────────────────────
// App state
// ──────────────────────────────────────────────

struct App {
    config: Config,
    proxy: EventLoopProxy<AppEvent>,
    window: Option<Arc<Window>>,
    host: Option<HostSender>,
    vsync: Option<VsyncTicker>,
    render_thread: Option<JoinHandle<()>>,

    modifiers: ModifiersState,
    cursor: Vec2,
    buttons: MouseButtons,
    ime_composing: bool,
}

impl App {
    fn new(config: Config, proxy: EventLoopProxy<AppEvent>) -> Self {
        Self {
            config,
            proxy,
            window: None,
            host: None,
            vsync: None,
            render_thread: None,
            modifiers: ModifiersState::empty(),
            cursor: Vec2::ZERO,
            buttons: MouseButtons::default(),
            ime_composing: false,
        }
    }

    fn send(&self, message: HostMessage) {
        if let Some(host) = &self.host {
            if !host.send(message) {
                log::debug!("render thread gone; message dropped");
            }
        }
    }

    fn mouse_event(&self, kind: MouseEventKind) -> MouseEvent {
        let mut event = MouseEvent::new(kind, self.cursor);
        event.buttons = self.buttons;
        event.modifiers = winit_modifiers_to_vela(self.modifiers);
        event
    }

    fn start(&mut self, event_loop: &ActiveEventLoop, window: Arc<Window>) -> Result<(), String> {
        let gpu = gpu::init_gpu(window.clone(), self.config.frames_in_flight)
            .map_err(|e| e.to_string())?;
        let size = window.inner_size();
        let extent = Size::new(size.width.max(1) as f32, size.height.max(1) as f32);

        let clock = Clock::new();
        let (host, receiver) = host_channel(HOST_QUEUE_CAPACITY, clock);

        let millihertz = window
            .current_monitor()
            .or_else(|| event_loop.primary_monitor())
            .and_then(|m| m.refresh_rate_millihertz())
            .unwrap_or(DEFAULT_REFRESH_MILLIHERTZ);
        let period = Duration::from_nanos(1_000_000_000_000 / millihertz.max(1) as u64);
        log::info!("vsync period {:?}", period);
        let vsync = VsyncTicker::spawn(host.clone(), period).map_err(|e| e.to_string())?;

        let render = RenderThread {
            gpu,
            config: self.config.clone(),
            receiver,
            clock,
            extent,
            proxy: self.proxy.clone(),
        };
        self.render_thread = Some(render.spawn().map_err(|e| e.to_string())?);
        self.host = Some(host);
        self.vsync = Some(vsync);
        Ok(())
    }

    fn handle_request(&self, request: HostRequest) {
        let Some(window) = &self.window else {
            return;
        };
        let result = match request {
            HostRequest::SetCursor(icon) => {
                window.set_cursor(vela_cursor_to_winit(icon));
                Ok(())
            }
            HostRequest::DragWindow => window.drag_window(),
            HostRequest::ResizeWindow(kind) => match resize_direction(kind) {
                Some(direction) => window.drag_resize_window(direction),
                None => Ok(()),
            },
            HostRequest::ShowWindowMenu => {
                window.show_window_menu(PhysicalPosition::new(self.cursor.x as f64, self.cursor.y as f64));
                Ok(())
            }
        };
        if let Err(e) = result {
            log::debug!("{:?} not supported: {}", request, e);
        }
    }

    fn shutdown(&mut self) {
        self.send(HostMessage::Close);
        self.host = None;
        if let Some(mut vsync) = self.vsync.take() {
            vsync.stop();
        }
        if let Some(handle) = self.render_thread.take() {
            if handle.join().is_err() {
                log::error!("render thread panicked");
            }
        }
    }
}

// ──────────────────────────────────────────────
// Event loop
// ──────────────────────────────────────────────

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title("Vela")
            .with_inner_size(LogicalSize::new(900.0, 640.0))
            .with_min_inner_size(LogicalSize::new(320.0, 240.0));

        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        window.set_ime_allowed(true);
        self.window = Some(window.clone());

        if let Err(e) = self.start(event_loop, window) {
            log::error!("startup failed: {}", e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.send(HostMessage::Close),
            WindowEvent::Resized(size) => {
                self.send(HostMessage::Resize(Size::new(size.width as f32, size.height as f32)));
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                if let Some(host) = &self.host {
                    host.try_send(HostMessage::Mouse(self.mouse_event(MouseEventKind::Move)));
                }
            }
            WindowEvent::CursorLeft { .. } => self.send(HostMessage::PointerLeft),
            WindowEvent::MouseInput { state, button, .. } => {
                let Some(button) = winit_button_to_vela(button) else {
                    return;
                };
                let pressed = state == ElementState::Pressed;
                self.buttons = self.buttons.with(button, pressed);
                let kind = if pressed {
                    MouseEventKind::Down(button)
                } else {
                    MouseEventKind::Up(button)
                };
                self.send(HostMessage::Mouse(self.mouse_event(kind)));
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let kind = MouseEventKind::Wheel(scroll_delta(delta));
                self.send(HostMessage::Mouse(self.mouse_event(kind)));
            }
            WindowEvent::Focused(false) => {
                self.buttons = MouseButtons::default();
                self.send(HostMessage::FocusLost);
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers.state();
                self.send(HostMessage::Modifiers(winit_modifiers_to_vela(self.modifiers)));
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let mods = winit_modifiers_to_vela(self.modifiers);
                let pressed = event.state == ElementState::Pressed;
                if let Some(key) = winit_key_to_vela(&event.logical_key) {
                    let mut key_event = if pressed {
                        KeyboardEvent::down(key, mods)
                    } else {
                        KeyboardEvent::up(key, mods)
                    };
                    key_event.repeat = event.repeat;
                    self.send(HostMessage::Key(key_event));
                }
                // Committed text comes from the IME while it is composing.
                if pressed && !self.ime_composing && !mods.ctrl && !mods.meta {
                    if let Some(text) = event.text.filter(|t| t.chars().any(|c| !c.is_control())) {
                        self.send(HostMessage::Text(TextEvent {
                            text: text.to_string(),
                            composing: false,
                        }));
                    }
                }
            }
            WindowEvent::Ime(Ime::Preedit(text, _)) => {
                self.ime_composing = !text.is_empty();
                self.send(HostMessage::Text(TextEvent {
                    text,
                    composing: true,
                }));
            }
            WindowEvent::Ime(Ime::Commit(text)) => {
                self.ime_composing = false;
                self.send(HostMessage::Text(TextEvent {
                    text,
                    composing: false,
                }));
            }
            _ => {}
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::Request(request) => self.handle_request(request),
            AppEvent::RenderStopped => {
                log::info!("render thread stopped");
                event_loop.exit();
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config();
    let event_loop = EventLoop::<AppEvent>::with_user_event()
        .build()
        .expect("create event loop");
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config, event_loop.create_proxy());
    event_loop.run_app(&mut app).expect("run event loop");
}
