//! Host-facing entry points: `init`, `run_viewer` and `load_gltf`.
//!
//! The [`Bridge`] is the only thing a host talks to. It owns at most one
//! [`EngineSession`] and serialises every call through `&mut self`. Platform
//! specifics (how a surface id resolves, how graphics are acquired) sit behind
//! [`SurfaceHost`], so the same bridge drives the browser canvas, the desktop
//! window and the headless tests.

use crate::{
    config::{CameraConfig, ViewerConfig},
    error::{LoadError, RenderError, SessionError},
    render::{FrameStats, RenderBackend},
    session::{EngineSession, LoadReport},
};

/// Platform glue resolving surface ids to drawable surfaces.
pub trait SurfaceHost {
    type Surface;

    /// One-time acquisition of process-wide graphics state.
    fn acquire(&mut self) -> anyhow::Result<()>;

    fn resolve(&self, surface_id: &str) -> Option<Self::Surface>;
}

pub struct Bridge<H: SurfaceHost, B: RenderBackend> {
    host: H,
    config: ViewerConfig,
    initialised: bool,
    surface_id: Option<String>,
    session: Option<EngineSession<B>>,
}

impl<H: SurfaceHost, B: RenderBackend> Bridge<H, B> {
    pub fn new(host: H, config: ViewerConfig) -> Self {
        Self {
            host,
            config,
            initialised: false,
            surface_id: None,
            session: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Acquire graphics once. Later calls return immediately.
    pub fn init(&mut self) -> Result<(), SessionError> {
        if self.initialised {
            log::debug!("init called again, keeping the existing setup");
            return Ok(());
        }
        self.host
            .acquire()
            .map_err(SessionError::GraphicsUnavailable)?;
        self.initialised = true;
        log::info!("graphics initialised");
        Ok(())
    }

    /// First half of `run_viewer`: look the surface up without touching any session.
    pub fn resolve_surface(&mut self, surface_id: &str) -> Result<H::Surface, SessionError> {
        self.init()?;
        self.host
            .resolve(surface_id)
            .ok_or_else(|| SessionError::SurfaceNotFound {
                surface_id: surface_id.to_string(),
            })
    }

    /// Second half of `run_viewer`: start a session on a backend built for the surface.
    /// A session on another surface is released first.
    pub fn attach(&mut self, surface_id: &str, backend: B) {
        self.release_surface();
        self.session = Some(EngineSession::new(backend, self.config.clone()));
        self.surface_id = Some(surface_id.to_string());
        log::info!("viewer running on {surface_id:?}");
    }

    /// `run_viewer` for hosts that can build a backend synchronously.
    pub fn run_viewer_with<F>(&mut self, surface_id: &str, make_backend: F) -> Result<(), SessionError>
    where
        F: FnOnce(H::Surface) -> anyhow::Result<B>,
    {
        let surface = self.resolve_surface(surface_id)?;
        let backend = make_backend(surface).map_err(SessionError::GraphicsUnavailable)?;
        self.attach(surface_id, backend);
        Ok(())
    }

    pub fn surface_id(&self) -> Option<&str> {
        self.surface_id.as_deref()
    }

    pub fn session(&self) -> Option<&EngineSession<B>> {
        self.session.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.session.as_ref().is_some_and(EngineSession::is_running)
    }

    /// Load a container into the running session. Failures are returned, never raised.
    pub fn load_gltf(&mut self, bytes: &[u8]) -> Result<LoadReport, LoadError> {
        let session = self.session.as_mut().ok_or(LoadError::NotRunning)?;
        session.load_gltf(bytes).inspect_err(|e| {
            log::warn!("load of {} bytes failed ({}): {e}", bytes.len(), e.kind());
        })
    }

    /// Draw one frame. `Ok(None)` when no viewer is running.
    pub fn tick(&mut self) -> Result<Option<FrameStats>, RenderError> {
        match self.session.as_mut() {
            Some(session) if session.is_running() => session.tick().map(Some),
            _ => Ok(None),
        }
    }

    pub fn on_drag(&mut self, dx: f32, dy: f32) {
        if let Some(session) = self.session.as_mut() {
            session.on_drag_delta(dx, dy);
        }
    }

    pub fn on_scroll(&mut self, dy: f32) {
        if let Some(session) = self.session.as_mut() {
            session.on_scroll_delta(dy);
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if let Some(session) = self.session.as_mut() {
            session.resize(width, height);
        }
    }

    /// Change camera tuning for the running session and every later one.
    pub fn configure_camera(&mut self, camera: CameraConfig) -> anyhow::Result<()> {
        camera.validate()?;
        if let Some(session) = self.session.as_mut() {
            session.configure_camera(camera.clone())?;
        }
        self.config.camera = camera;
        Ok(())
    }

    /// Tear the session down. The graphics setup from `init` stays.
    pub fn release_surface(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
            log::info!(
                "released surface {:?}",
                self.surface_id.take().unwrap_or_default()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, render::headless::HeadlessBackend};

    #[derive(Default)]
    struct FakeHost {
        acquisitions: usize,
        broken: bool,
    }

    impl SurfaceHost for FakeHost {
        type Surface = (u32, u32);

        fn acquire(&mut self) -> anyhow::Result<()> {
            anyhow::ensure!(!self.broken, "no adapter");
            self.acquisitions += 1;
            Ok(())
        }

        fn resolve(&self, surface_id: &str) -> Option<(u32, u32)> {
            (surface_id == "canvas").then_some((320, 240))
        }
    }

    fn bridge() -> Bridge<FakeHost, HeadlessBackend> {
        Bridge::new(FakeHost::default(), ViewerConfig::default())
    }

    fn run(bridge: &mut Bridge<FakeHost, HeadlessBackend>, id: &str) -> Result<(), SessionError> {
        bridge.run_viewer_with(id, |(w, h)| Ok(HeadlessBackend::new(w, h)))
    }

    #[test]
    fn init_is_idempotent() {
        let mut bridge = bridge();
        bridge.init().unwrap();
        bridge.init().unwrap();
        run(&mut bridge, "canvas").unwrap();
        assert_eq!(bridge.host().acquisitions, 1);
    }

    #[test]
    fn failed_acquisition_can_be_retried() {
        let mut bridge = Bridge::<_, HeadlessBackend>::new(
            FakeHost {
                broken: true,
                ..Default::default()
            },
            ViewerConfig::default(),
        );
        assert!(matches!(bridge.init(), Err(SessionError::GraphicsUnavailable(_))));
        assert!(!bridge.is_initialised());
        bridge.host_mut().broken = false;
        assert!(bridge.init().is_ok());
    }

    #[test]
    fn unknown_surface_leaves_viewer_unstarted() {
        let mut bridge = bridge();
        let err = run(&mut bridge, "nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SurfaceNotFound);
        assert!(!bridge.is_running());
        assert_eq!(bridge.tick(), Ok(None));
    }

    #[test]
    fn load_before_run_reports_not_running() {
        let mut bridge = bridge();
        let err = bridge.load_gltf(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotRunning);
    }

    #[test]
    fn release_stops_the_session() {
        let mut bridge = bridge();
        run(&mut bridge, "canvas").unwrap();
        assert_eq!(bridge.surface_id(), Some("canvas"));
        assert!(bridge.tick().unwrap().is_some());
        bridge.release_surface();
        assert!(!bridge.is_running());
        assert_eq!(bridge.surface_id(), None);
        assert!(bridge.is_initialised());
    }

    #[test]
    fn camera_config_applies_to_later_sessions() {
        let mut bridge = bridge();
        bridge
            .configure_camera(CameraConfig::default().with_rotate_sensitivity(0.02))
            .unwrap();
        run(&mut bridge, "canvas").unwrap();
        let session = bridge.session().unwrap();
        assert_eq!(session.config().camera.rotate_sensitivity, 0.02);
    }
}
