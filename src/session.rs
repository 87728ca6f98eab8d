//! One viewer session: renderer, camera and the loaded scene bound to a surface.
//!
//! A session is created once a surface has been resolved and a backend exists
//! for it, and lives until the host releases that surface. Loads run the whole
//! parse and build pipeline before anything displayed is touched, so a failed
//! load leaves the session exactly as it was.

use std::time::Duration;

use crate::{
    camera::{CameraController, CameraState},
    config::{CameraConfig, ViewerConfig},
    data_structures::{bounds::BoundingSphere, scene_graph::SceneBuilder},
    error::{LoadError, RenderError},
    render::{FrameStats, RenderBackend, Renderer},
    resources,
};

/// Summary of a successful load.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadReport {
    pub node_count: usize,
    pub mesh_count: usize,
    pub draw_count: usize,
    pub bounds: BoundingSphere,
}

pub struct EngineSession<B: RenderBackend> {
    renderer: Renderer<B>,
    camera: CameraController,
    builder: SceneBuilder,
    config: ViewerConfig,
    running: bool,
    last_tick: Option<instant::Instant>,
}

impl<B: RenderBackend> EngineSession<B> {
    pub fn new(backend: B, config: ViewerConfig) -> Self {
        log::info!(
            "starting session on a {}x{} surface",
            backend.surface_size().0,
            backend.surface_size().1
        );
        Self {
            renderer: Renderer::new(backend, config.clear_colour),
            camera: CameraController::new(config.camera.clone()),
            builder: SceneBuilder::new(config.build.clone()),
            config,
            running: true,
            last_tick: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stop the frame loop and release the displayed scene.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            drop(self.renderer.scene_slot().take());
            log::info!("session stopped");
        }
    }

    pub fn renderer(&self) -> &Renderer<B> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer<B> {
        &mut self.renderer
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Parse, build and display a binary container, then frame the camera on it.
    pub fn load_gltf(&mut self, bytes: &[u8]) -> Result<LoadReport, LoadError> {
        if !self.running {
            return Err(LoadError::NotRunning);
        }
        let tables = resources::parse(bytes)?;
        let scene = self.builder.build(&tables, &mut self.renderer)?;
        let report = LoadReport {
            node_count: scene.nodes().len(),
            mesh_count: scene.meshes().len(),
            draw_count: scene.draw_list().len(),
            bounds: scene.bounds(),
        };
        self.camera.frame_scene(&scene);
        self.renderer.submit_scene(scene);
        log::info!(
            "loaded {} bytes: {} nodes, {} draws, centre {:?}, radius {:.3}",
            bytes.len(),
            report.node_count,
            report.draw_count,
            report.bounds.center,
            report.bounds.radius
        );
        Ok(report)
    }

    /// Draw one frame, timing it against the previous tick.
    pub fn tick(&mut self) -> Result<FrameStats, RenderError> {
        let now = instant::Instant::now();
        let dt = self
            .last_tick
            .map(|last| now.duration_since(last))
            .unwrap_or_default();
        self.last_tick = Some(now);
        self.tick_with(dt)
    }

    pub fn tick_with(&mut self, dt: Duration) -> Result<FrameStats, RenderError> {
        if !self.running {
            return Err(RenderError::Stopped);
        }
        self.renderer.tick(dt, &self.camera.current_state())
    }

    pub fn on_drag_delta(&mut self, dx: f32, dy: f32) {
        self.camera.on_drag_delta(dx, dy);
    }

    pub fn on_scroll_delta(&mut self, dy: f32) {
        self.camera.on_scroll_delta(dy);
    }

    pub fn camera_state(&self) -> CameraState {
        self.camera.current_state()
    }

    pub fn configure_camera(&mut self, config: CameraConfig) -> anyhow::Result<()> {
        config.validate()?;
        self.camera.reconfigure(config.clone());
        self.config.camera = config;
        Ok(())
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.renderer.resize(width, height);
    }
}
