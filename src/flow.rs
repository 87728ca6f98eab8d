//! Desktop host and application event loop.
//!
//! The desktop build opens one window, registers it under the surface id
//! [`WINDOW_SURFACE_ID`] and drives the [`Bridge`] from winit events. Dragging
//! with the left button orbits, the wheel zooms and dropping a `.glb` file on
//! the window loads it.
//!
//! # Lifecycle Flow
//!
//! 1. `resumed` creates the window, resolves it through the bridge and builds a
//!    [`Context`] for it on the tokio runtime
//! 2. a model passed on the command line is loaded once the viewer runs
//! 3. every `RedrawRequested` ticks exactly one frame and requests the next
//! 4. `CloseRequested` releases the surface and leaves the loop

use std::{path::Path, sync::Arc};

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::{
    bridge::{Bridge, SurfaceHost},
    camera::DragTracker,
    config::ViewerConfig,
    context::{Context, create_instance},
    error::RenderError,
};

pub const WINDOW_SURFACE_ID: &str = "window";

/// Scroll lines are converted to the pixel-like deltas the camera expects.
const PIXELS_PER_LINE: f32 = 40.0;

/// Owns the wgpu instance and the single window.
#[derive(Default)]
pub struct NativeHost {
    instance: Option<wgpu::Instance>,
    window: Option<Arc<Window>>,
}

impl NativeHost {
    pub fn window(&self) -> Option<&Arc<Window>> {
        self.window.as_ref()
    }

    fn instance(&self) -> Option<&wgpu::Instance> {
        self.instance.as_ref()
    }
}

impl SurfaceHost for NativeHost {
    type Surface = Arc<Window>;

    fn acquire(&mut self) -> anyhow::Result<()> {
        self.instance = Some(create_instance());
        Ok(())
    }

    fn resolve(&self, surface_id: &str) -> Option<Arc<Window>> {
        if surface_id == WINDOW_SURFACE_ID {
            self.window.clone()
        } else {
            None
        }
    }
}

pub struct App {
    async_runtime: tokio::runtime::Runtime,
    bridge: Bridge<NativeHost, Context>,
    pending_model: Option<Vec<u8>>,
    drag: DragTracker,
    cursor: (f32, f32),
}

impl App {
    fn new(config: ViewerConfig, model: Option<Vec<u8>>) -> anyhow::Result<Self> {
        Ok(Self {
            async_runtime: tokio::runtime::Runtime::new()?,
            bridge: Bridge::new(NativeHost::default(), config),
            pending_model: model,
            drag: DragTracker::default(),
            cursor: (0.0, 0.0),
        })
    }

    fn start_viewer(&mut self, window: Arc<Window>) -> anyhow::Result<()> {
        self.bridge.host_mut().window = Some(window);
        let window = self.bridge.resolve_surface(WINDOW_SURFACE_ID)?;
        let instance = self
            .bridge
            .host()
            .instance()
            .ok_or_else(|| anyhow::anyhow!("graphics were not initialised"))?;
        let PhysicalSize { width, height } = window.inner_size();
        let surface = instance.create_surface(window.clone())?;
        let context = self
            .async_runtime
            .block_on(Context::new(instance, surface, (width, height)))?;
        self.bridge.attach(WINDOW_SURFACE_ID, context);
        window.request_redraw();
        Ok(())
    }

    fn load(&mut self, bytes: &[u8]) {
        match self.bridge.load_gltf(bytes) {
            Ok(report) => log::info!(
                "showing {} draws from {} nodes",
                report.draw_count,
                report.node_count
            ),
            Err(e) => log::error!("could not load model ({}): {e}", e.kind()),
        }
    }

    fn load_file(&mut self, path: &Path) {
        match std::fs::read(path) {
            Ok(bytes) => self.load(&bytes),
            Err(e) => log::error!("could not read {}: {e}", path.display()),
        }
    }

    fn redraw(&mut self) {
        match self.bridge.tick() {
            Ok(_) => {}
            Err(RenderError::SurfaceLost) => log::warn!("surface lost, reconfigured"),
            Err(e) => log::error!("frame failed: {e}"),
        }
        if let Some(window) = self.bridge.host().window() {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.bridge.is_running() {
            return;
        }
        let window_attributes = Window::default_attributes().with_title("glb viewer");
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("could not create a window: {e}");
                event_loop.exit();
                return;
            }
        };
        if let Err(e) = self.start_viewer(window) {
            log::error!("could not start the viewer: {e:#}");
            event_loop.exit();
            return;
        }
        if let Some(bytes) = self.pending_model.take() {
            self.load(&bytes);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.bridge.release_surface();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => self.bridge.resize(size.width, size.height),
            WindowEvent::RedrawRequested => self.redraw(),
            WindowEvent::DroppedFile(path) => self.load_file(&path),
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => self.drag.press(self.cursor.0, self.cursor.1),
                ElementState::Released => self.drag.release(),
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
                if let Some((dx, dy)) = self.drag.move_to(self.cursor.0, self.cursor.1) {
                    self.bridge.on_drag(dx, dy);
                }
            }
            WindowEvent::CursorLeft { .. } => self.drag.release(),
            WindowEvent::MouseWheel { delta, .. } => {
                // Wheel down zooms out
                let dy = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y * PIXELS_PER_LINE,
                    MouseScrollDelta::PixelDelta(pos) => -pos.y as f32,
                };
                self.bridge.on_scroll(dy);
            }
            _ => {}
        }
    }
}

/// Open a window and run the viewer until it is closed.
pub fn run(config: ViewerConfig, model: Option<Vec<u8>>) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };
    config.validate()?;

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, model)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
