//! Runtime configuration of the viewer.
//!
//! None of these values are part of the host contract; hosts may override any of
//! them before the session starts. Defaults are tuned for models in the unit-to-
//! hundreds-of-units range.

use cgmath::{Deg, Rad};

/// Orbit camera tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    /// Radians of azimuth/elevation per pointer pixel.
    pub rotate_sensitivity: f32,
    /// Radius is multiplied by `zoom_base.powf(dy)` per scroll delta.
    pub zoom_base: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Elevation is clamped to `[-max_elevation, max_elevation]`, strictly inside ±90°.
    pub max_elevation: Deg<f32>,
    pub fovy: Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
    /// Framing places the eye this many bounding radii away from the centre.
    pub frame_radius_factor: f32,
    pub initial_azimuth: Rad<f32>,
    pub initial_elevation: Rad<f32>,
    pub initial_radius: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            rotate_sensitivity: 0.005,
            zoom_base: 1.001,
            min_radius: 0.1,
            max_radius: 5000.0,
            max_elevation: Deg(89.0),
            fovy: Deg(45.0),
            znear: 0.05,
            zfar: 10_000.0,
            frame_radius_factor: 3.0,
            initial_azimuth: Rad(0.8),
            initial_elevation: Rad(0.45),
            initial_radius: 12.0,
        }
    }
}

impl CameraConfig {
    pub fn with_rotate_sensitivity(mut self, sensitivity: f32) -> Self {
        self.rotate_sensitivity = sensitivity;
        self
    }

    pub fn with_zoom_base(mut self, zoom_base: f32) -> Self {
        self.zoom_base = zoom_base;
        self
    }

    pub fn with_radius_range(mut self, min: f32, max: f32) -> Self {
        self.min_radius = min;
        self.max_radius = max;
        self
    }

    pub fn with_max_elevation(mut self, max_elevation: Deg<f32>) -> Self {
        self.max_elevation = max_elevation;
        self
    }

    pub fn with_frame_radius_factor(mut self, factor: f32) -> Self {
        self.frame_radius_factor = factor;
        self
    }

    /// Reject combinations that would let the camera reach a pole, cross the near
    /// plane or zoom in the wrong direction.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.rotate_sensitivity.is_finite() && self.rotate_sensitivity > 0.0,
            "rotate sensitivity must be positive, got {}",
            self.rotate_sensitivity
        );
        anyhow::ensure!(
            self.zoom_base.is_finite() && self.zoom_base > 1.0,
            "zoom base must be greater than 1, got {}",
            self.zoom_base
        );
        anyhow::ensure!(
            self.max_elevation.0 > 0.0 && self.max_elevation.0 < 90.0,
            "max elevation must lie in (0, 90) degrees, got {}",
            self.max_elevation.0
        );
        anyhow::ensure!(
            self.znear > 0.0 && self.znear < self.min_radius,
            "near plane {} must be positive and below the minimum radius {}",
            self.znear,
            self.min_radius
        );
        anyhow::ensure!(
            self.min_radius < self.max_radius && self.max_radius < self.zfar,
            "radius range [{}, {}] must be ordered and inside the far plane {}",
            self.min_radius,
            self.max_radius,
            self.zfar
        );
        anyhow::ensure!(
            self.frame_radius_factor > 0.0,
            "frame radius factor must be positive"
        );
        Ok(())
    }
}

/// Scene builder limits.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildConfig {
    /// Deepest node (roots are depth 1) the builder accepts.
    pub max_depth: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

impl BuildConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Everything a session is configured with.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    pub camera: CameraConfig,
    pub build: BuildConfig,
    pub clear_colour: wgpu::Color,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            build: BuildConfig::default(),
            clear_colour: wgpu::Color {
                r: 0.08,
                g: 0.08,
                b: 0.1,
                a: 1.0,
            },
        }
    }
}

impl ViewerConfig {
    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_build(mut self, build: BuildConfig) -> Self {
        self.build = build;
        self
    }

    pub fn with_clear_colour(mut self, clear_colour: wgpu::Color) -> Self {
        self.clear_colour = clear_colour;
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.camera.validate()?;
        anyhow::ensure!(self.build.max_depth > 0, "max depth must be at least 1");
        Ok(())
    }
}
