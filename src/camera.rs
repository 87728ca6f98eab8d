//! Orbit camera: state, input handling and the GPU uniform.
//!
//! The camera orbits a target point. Pointer drags change azimuth and elevation,
//! scrolling scales the orbit radius exponentially, and [`CameraController::frame`]
//! recentres on a freshly loaded scene.

use std::f32::consts::TAU;

use cgmath::{EuclideanSpace, Matrix4, Point3, Rad, Vector3, perspective};
use wgpu::util::DeviceExt;

use crate::{
    config::CameraConfig,
    data_structures::{bounds::BoundingSphere, scene_graph::RenderableScene},
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Everything the renderer needs to know about the camera for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    pub target: Point3<f32>,
    pub radius: f32,
    pub azimuth: Rad<f32>,
    pub elevation: Rad<f32>,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl CameraState {
    /// `target + radius * (cos(el) sin(az), sin(el), cos(el) cos(az))`
    pub fn eye(&self) -> Point3<f32> {
        let (sin_az, cos_az) = self.azimuth.0.sin_cos();
        let (sin_el, cos_el) = self.elevation.0.sin_cos();
        self.target + Vector3::new(cos_el * sin_az, sin_el, cos_el * cos_az) * self.radius
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye(), self.target, Vector3::unit_y())
    }

    /// Right handed projection in OpenGL clip space. Backends convert it to their
    /// own depth range.
    pub fn projection_matrix(&self, aspect: f32) -> Matrix4<f32> {
        let aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        };
        perspective(self.fovy, aspect, self.znear, self.zfar)
    }
}

#[derive(Clone, Debug)]
pub struct CameraController {
    config: CameraConfig,
    state: CameraState,
}

impl CameraController {
    pub fn new(config: CameraConfig) -> Self {
        let state = CameraState {
            target: Point3::origin(),
            radius: config
                .initial_radius
                .clamp(config.min_radius, config.max_radius),
            azimuth: config.initial_azimuth,
            elevation: config.initial_elevation,
            fovy: config.fovy.into(),
            znear: config.znear,
            zfar: config.zfar,
        };
        let mut controller = Self { config, state };
        controller.state.elevation = controller.clamp_elevation(controller.state.elevation.0);
        controller
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Swap the tuning at runtime. The current state is re-clamped into the new limits.
    pub fn reconfigure(&mut self, config: CameraConfig) {
        self.state.radius = self.state.radius.clamp(config.min_radius, config.max_radius);
        self.state.fovy = config.fovy.into();
        self.state.znear = config.znear;
        self.state.zfar = config.zfar;
        self.config = config;
        self.state.elevation = self.clamp_elevation(self.state.elevation.0);
    }

    fn clamp_elevation(&self, elevation: f32) -> Rad<f32> {
        let limit = Rad::from(self.config.max_elevation).0;
        Rad(elevation.clamp(-limit, limit))
    }

    /// Rotate by a pointer drag of `(dx, dy)` pixels.
    pub fn on_drag_delta(&mut self, dx: f32, dy: f32) {
        if !dx.is_finite() || !dy.is_finite() {
            log::debug!("ignoring non-finite drag ({dx}, {dy})");
            return;
        }
        let yaw = dx * self.config.rotate_sensitivity;
        let pitch = dy * self.config.rotate_sensitivity;
        if !yaw.is_finite() || !pitch.is_finite() {
            log::debug!("ignoring drag ({dx}, {dy}) that overflows the rotation");
            return;
        }
        self.state.azimuth = Rad((self.state.azimuth.0 - yaw).rem_euclid(TAU));
        self.state.elevation = self.clamp_elevation(self.state.elevation.0 + pitch);
    }

    /// Zoom by a scroll delta. Positive values move the eye away from the target.
    pub fn on_scroll_delta(&mut self, dy: f32) {
        if !dy.is_finite() {
            log::debug!("ignoring non-finite scroll {dy}");
            return;
        }
        let scaled = self.state.radius * self.config.zoom_base.powf(dy);
        self.state.radius = if scaled.is_nan() {
            self.state.radius
        } else {
            scaled.clamp(self.config.min_radius, self.config.max_radius)
        };
    }

    /// Recentre on a bounding sphere. Azimuth and elevation are kept.
    pub fn frame(&mut self, bounds: BoundingSphere) {
        self.state.target = bounds.center;
        self.state.radius = (bounds.radius * self.config.frame_radius_factor)
            .clamp(self.config.min_radius, self.config.max_radius);
    }

    /// Frame a freshly built scene before it is shown.
    pub fn frame_scene<M>(&mut self, scene: &RenderableScene<M>) {
        self.frame(scene.bounds());
    }

    pub fn current_state(&self) -> CameraState {
        self.state
    }
}

/// Turns absolute pointer positions into drag deltas while a button is held.
#[derive(Clone, Copy, Debug, Default)]
pub struct DragTracker {
    last: Option<(f32, f32)>,
}

impl DragTracker {
    pub fn press(&mut self, x: f32, y: f32) {
        self.last = Some((x, y));
    }

    pub fn release(&mut self) {
        self.last = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.last.is_some()
    }

    /// Delta since the previous position, `None` when no button is held.
    pub fn move_to(&mut self, x: f32, y: f32) -> Option<(f32, f32)> {
        let (last_x, last_y) = self.last?;
        self.last = Some((x, y));
        Some((x - last_x, y - last_y))
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn from_matrices(eye: Point3<f32>, view: Matrix4<f32>, proj: Matrix4<f32>) -> Self {
        Self {
            view_position: eye.to_homogeneous().into(),
            view_proj: (OPENGL_TO_WGPU_MATRIX * proj * view).into(),
        }
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// GPU side of the camera: uniform buffer plus its bind group.
#[derive(Debug)]
pub struct CameraResources {
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform = CameraUniform::new();
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn write(&mut self, queue: &wgpu::Queue, uniform: CameraUniform) {
        self.uniform = uniform;
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[uniform]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{Deg, InnerSpace};

    fn controller() -> CameraController {
        CameraController::new(CameraConfig::default())
    }

    #[test]
    fn eye_follows_orbit_formula() {
        let mut state = controller().current_state();
        state.azimuth = Rad(0.0);
        state.elevation = Rad(0.0);
        state.radius = 2.0;
        assert_relative_eq!(state.eye(), Point3::new(0.0, 0.0, 2.0), epsilon = 1e-6);

        state.elevation = Deg(90.0).into();
        assert_relative_eq!(state.eye(), Point3::new(0.0, 2.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn elevation_never_reaches_the_poles() {
        let mut camera = controller();
        for _ in 0..10_000 {
            camera.on_drag_delta(3.0, 1.0e6);
        }
        let limit = Rad::from(Deg(89.0f32)).0;
        assert_relative_eq!(camera.current_state().elevation.0, limit);
        assert!(camera.current_state().elevation.0 < std::f32::consts::FRAC_PI_2);

        camera.on_drag_delta(0.0, -1.0e30);
        assert_relative_eq!(camera.current_state().elevation.0, -limit);
    }

    #[test]
    fn azimuth_wraps_into_one_turn() {
        let mut camera = controller();
        camera.on_drag_delta(1.0e7, 0.0);
        let azimuth = camera.current_state().azimuth.0;
        assert!((0.0..TAU).contains(&azimuth));
    }

    #[test]
    fn radius_stays_in_range_under_huge_scroll() {
        let mut camera = controller();
        camera.on_scroll_delta(1.0e9);
        assert_eq!(camera.current_state().radius, 5000.0);
        camera.on_scroll_delta(-1.0e9);
        assert_eq!(camera.current_state().radius, 0.1);
        for _ in 0..1000 {
            camera.on_scroll_delta(-500.0);
        }
        assert_eq!(camera.current_state().radius, 0.1);
    }

    #[test]
    fn zoom_is_exponential() {
        let mut a = controller();
        let mut b = controller();
        a.on_scroll_delta(100.0);
        a.on_scroll_delta(100.0);
        b.on_scroll_delta(200.0);
        assert_relative_eq!(
            a.current_state().radius,
            b.current_state().radius,
            max_relative = 1e-5
        );
        assert!(a.current_state().radius > 12.0);
    }

    #[test]
    fn drag_that_overflows_the_rotation_is_ignored() {
        let mut camera =
            CameraController::new(CameraConfig::default().with_rotate_sensitivity(1.0e30));
        let before = camera.current_state();
        camera.on_drag_delta(1.0e10, 0.0);
        camera.on_drag_delta(0.0, -1.0e10);
        assert_eq!(camera.current_state(), before);
        assert!(camera.current_state().azimuth.0.is_finite());
    }

    #[test]
    fn framing_a_scene_uses_its_bounds() {
        let mut camera = controller();
        camera.on_drag_delta(40.0, 0.0);
        let azimuth = camera.current_state().azimuth;
        camera.frame_scene(&RenderableScene::<()>::empty());
        let state = camera.current_state();
        assert_eq!(state.target, Point3::origin());
        assert_relative_eq!(state.radius, 3.0);
        assert_eq!(state.azimuth, azimuth);
    }

    #[test]
    fn non_finite_input_is_ignored() {
        let mut camera = controller();
        let before = camera.current_state();
        camera.on_drag_delta(f32::NAN, 1.0);
        camera.on_scroll_delta(f32::INFINITY);
        assert_eq!(camera.current_state(), before);
    }

    #[test]
    fn framing_centres_on_the_sphere() {
        let mut camera = controller();
        let before = camera.current_state();
        camera.frame(BoundingSphere {
            center: Point3::new(1.0, 2.0, 3.0),
            radius: 2.0,
        });
        let state = camera.current_state();
        assert_eq!(state.target, Point3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(state.radius, 6.0);
        assert_eq!(state.azimuth, before.azimuth);
        assert_relative_eq!((state.eye() - state.target).magnitude(), 6.0, epsilon = 1e-5);
    }

    #[test]
    fn drag_tracker_reports_deltas_only_while_pressed() {
        let mut drag = DragTracker::default();
        assert_eq!(drag.move_to(5.0, 5.0), None);
        drag.press(10.0, 10.0);
        assert_eq!(drag.move_to(13.0, 6.0), Some((3.0, -4.0)));
        assert_eq!(drag.move_to(14.0, 6.0), Some((1.0, 0.0)));
        drag.release();
        assert!(!drag.is_dragging());
        assert_eq!(drag.move_to(20.0, 20.0), None);
    }

    #[test]
    fn reconfigure_reclamps_radius() {
        let mut camera = controller();
        camera.reconfigure(CameraConfig::default().with_radius_range(1.0, 5.0));
        assert_eq!(camera.current_state().radius, 5.0);
    }
}
