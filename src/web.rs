//! Browser bindings.
//!
//! Exposes `init`, `run_viewer`, `load_gltf` and a few tuning calls to
//! JavaScript. Surface ids are canvas element ids. The bridge lives in a
//! thread local because every call arrives on the page's single thread.

use std::cell::{Cell, RefCell};

use wasm_bindgen::{JsCast, prelude::*};
use wasm_bindgen_futures::spawn_local;
use web_sys::{HtmlCanvasElement, MouseEvent, WheelEvent};

use crate::{
    bridge::{Bridge, SurfaceHost},
    camera::DragTracker,
    config::ViewerConfig,
    context::{Context, create_instance},
};

#[derive(Default)]
pub struct WebHost {
    instance: Option<wgpu::Instance>,
}

impl SurfaceHost for WebHost {
    type Surface = HtmlCanvasElement;

    fn acquire(&mut self) -> anyhow::Result<()> {
        self.instance = Some(create_instance());
        Ok(())
    }

    fn resolve(&self, surface_id: &str) -> Option<HtmlCanvasElement> {
        web_sys::window()?
            .document()?
            .get_element_by_id(surface_id)?
            .dyn_into()
            .ok()
    }
}

thread_local! {
    static BRIDGE: RefCell<Bridge<WebHost, Context>> =
        RefCell::new(Bridge::new(WebHost::default(), ViewerConfig::default()));
    static DRAG: Cell<DragTracker> = Cell::new(DragTracker::default());
    static LOOP_ACTIVE: Cell<bool> = const { Cell::new(false) };
    /// Canvas of the running session, measured by every frame.
    static ACTIVE_CANVAS: RefCell<Option<HtmlCanvasElement>> = const { RefCell::new(None) };
    /// The one animation frame callback, created on first use and reused by every restart.
    static FRAME_CALLBACK: RefCell<Option<Closure<dyn FnMut()>>> = const { RefCell::new(None) };
    static INPUT_CANVASES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Outcome of `load_gltf`, as seen from JavaScript.
#[wasm_bindgen(getter_with_clone)]
pub struct LoadResult {
    pub ok: bool,
    pub error_kind: Option<String>,
    pub message: String,
    pub draw_count: u32,
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsError> {
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::warn_1(&format!("logger already set: {e}").into());
    }
    init()
}

/// Acquire graphics. Safe to call more than once.
#[wasm_bindgen]
pub fn init() -> Result<(), JsError> {
    BRIDGE
        .with_borrow_mut(|bridge| bridge.init())
        .map_err(|e| JsError::new(&e.to_string()))
}

/// Start rendering into the canvas with id `canvas_id`.
///
/// An unknown id fails immediately. Device creation finishes asynchronously;
/// loads issued before that report `NotRunning`.
#[wasm_bindgen]
pub fn run_viewer(canvas_id: String) -> Result<(), JsError> {
    let (canvas, instance) = BRIDGE
        .with_borrow_mut(|bridge| {
            let canvas = bridge.resolve_surface(&canvas_id)?;
            Ok::<_, crate::error::SessionError>((canvas, bridge.host().instance.clone()))
        })
        .map_err(|e| JsError::new(&e.to_string()))?;
    let instance = instance.ok_or_else(|| JsError::new("graphics were not initialised"))?;

    let size = (canvas.width(), canvas.height());
    let surface = instance
        .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
        .map_err(|e| JsError::new(&e.to_string()))?;

    spawn_local(async move {
        match Context::new(&instance, surface, size).await {
            Ok(context) => {
                BRIDGE.with_borrow_mut(|bridge| bridge.attach(&canvas_id, context));
                register_input(&canvas_id, &canvas);
                ACTIVE_CANVAS.set(Some(canvas));
                start_loop();
            }
            Err(e) => log::error!("could not start the viewer on {canvas_id:?}: {e:#}"),
        }
    });
    Ok(())
}

#[wasm_bindgen]
pub fn load_gltf(bytes: &[u8]) -> LoadResult {
    match BRIDGE.with_borrow_mut(|bridge| bridge.load_gltf(bytes)) {
        Ok(report) => LoadResult {
            ok: true,
            error_kind: None,
            message: format!(
                "{} nodes, {} draws, radius {:.3}",
                report.node_count, report.draw_count, report.bounds.radius
            ),
            draw_count: report.draw_count as u32,
        },
        Err(e) => LoadResult {
            ok: false,
            error_kind: Some(e.kind().to_string()),
            message: e.to_string(),
            draw_count: 0,
        },
    }
}

#[wasm_bindgen]
pub fn configure_camera(rotate_sensitivity: f32, zoom_base: f32) -> Result<(), JsError> {
    BRIDGE
        .with_borrow_mut(|bridge| {
            let camera = bridge
                .session()
                .map(|session| session.config().camera.clone())
                .unwrap_or_default()
                .with_rotate_sensitivity(rotate_sensitivity)
                .with_zoom_base(zoom_base);
            bridge.configure_camera(camera)
        })
        .map_err(|e| JsError::new(&e.to_string()))
}

/// Stop rendering and free the scene. A later `run_viewer` starts afresh.
#[wasm_bindgen]
pub fn release_viewer() {
    BRIDGE.with_borrow_mut(|bridge| bridge.release_surface());
    ACTIVE_CANVAS.set(None);
}

/// Input on a canvas only reaches the bridge while that canvas hosts the session.
fn is_active(canvas_id: &str) -> bool {
    BRIDGE.with_borrow(|bridge| bridge.surface_id() == Some(canvas_id))
}

fn register_input(canvas_id: &str, canvas: &HtmlCanvasElement) {
    let already = INPUT_CANVASES.with_borrow(|ids| ids.iter().any(|id| id == canvas_id));
    if already {
        return;
    }
    INPUT_CANVASES.with_borrow_mut(|ids| ids.push(canvas_id.to_string()));

    let id = canvas_id.to_string();
    let on_down = Closure::wrap(Box::new(move |e: MouseEvent| {
        if e.button() == 0 && is_active(&id) {
            DRAG.with(|drag| {
                let mut tracker = drag.get();
                tracker.press(e.offset_x() as f32, e.offset_y() as f32);
                drag.set(tracker);
            });
        }
    }) as Box<dyn FnMut(_)>);
    let on_up = Closure::wrap(Box::new(move |_: MouseEvent| {
        DRAG.set(DragTracker::default());
    }) as Box<dyn FnMut(_)>);
    let id = canvas_id.to_string();
    let on_move = Closure::wrap(Box::new(move |e: MouseEvent| {
        if !is_active(&id) {
            return;
        }
        let delta = DRAG.with(|drag| {
            let mut tracker = drag.get();
            let delta = tracker.move_to(e.offset_x() as f32, e.offset_y() as f32);
            drag.set(tracker);
            delta
        });
        if let Some((dx, dy)) = delta {
            BRIDGE.with_borrow_mut(|bridge| bridge.on_drag(dx, dy));
        }
    }) as Box<dyn FnMut(_)>);
    let id = canvas_id.to_string();
    let on_wheel = Closure::wrap(Box::new(move |e: WheelEvent| {
        if !is_active(&id) {
            return;
        }
        e.prevent_default();
        BRIDGE.with_borrow_mut(|bridge| bridge.on_scroll(e.delta_y() as f32));
    }) as Box<dyn FnMut(_)>);

    for (event, callback) in [
        ("mousedown", on_down.as_ref()),
        ("mouseup", on_up.as_ref()),
        ("mouseleave", on_up.as_ref()),
        ("mousemove", on_move.as_ref()),
        ("wheel", on_wheel.as_ref()),
    ] {
        if let Err(e) = canvas.add_event_listener_with_callback(event, callback.unchecked_ref()) {
            log::warn!("could not listen for {event}: {e:?}");
        }
    }
    // Listeners live as long as the page
    on_down.forget();
    on_up.forget();
    on_move.forget();
    on_wheel.forget();
}

fn request_frame(callback: &Closure<dyn FnMut()>) {
    if let Some(window) = web_sys::window()
        && let Err(e) = window.request_animation_frame(callback.as_ref().unchecked_ref())
    {
        log::error!("requestAnimationFrame failed: {e:?}");
    }
}

/// One frame: follow the active canvas size, tick, and report whether to go on.
fn frame() -> bool {
    let canvas = ACTIVE_CANVAS.with_borrow(|canvas| canvas.clone());
    BRIDGE.with_borrow_mut(|bridge| {
        if let Some(canvas) = canvas {
            let width = canvas.client_width().max(0) as u32;
            let height = canvas.client_height().max(0) as u32;
            if width > 0 && (width, height) != (canvas.width(), canvas.height()) {
                canvas.set_width(width);
                canvas.set_height(height);
                bridge.resize(width, height);
            }
        }
        if let Err(e) = bridge.tick() {
            log::warn!("frame failed: {e}");
        }
        bridge.is_running()
    })
}

fn schedule_next_frame() {
    FRAME_CALLBACK.with_borrow(|callback| {
        if let Some(callback) = callback {
            request_frame(callback);
        }
    });
}

/// Keep one animation frame loop alive while a session runs. Calling it again
/// while the loop is live does nothing; the loop picks up a new canvas by itself.
fn start_loop() {
    if LOOP_ACTIVE.replace(true) {
        return;
    }
    FRAME_CALLBACK.with_borrow_mut(|callback| {
        callback.get_or_insert_with(|| {
            Closure::wrap(Box::new(|| {
                if frame() {
                    schedule_next_frame();
                } else {
                    LOOP_ACTIVE.set(false);
                }
            }) as Box<dyn FnMut()>)
        });
    });
    schedule_next_frame();
}
