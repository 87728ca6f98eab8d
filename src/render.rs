//! Renderer and frame loop.
//!
//! The [`Renderer`] owns a [`RenderBackend`] and the currently displayed scene.
//! The scene lives in a [`SceneSlot`]: every tick takes one snapshot of the slot,
//! and a submit replaces the slot's content in one swap. A frame therefore sees
//! either the old scene or the new one, never a mix.
//!
//! # Key types
//!
//! - [`RenderBackend`] is the seam between frame logic and the GPU
//! - [`Frame`] is everything a backend needs to draw one frame
//! - [`MeshUploader`] is the upload contract the scene builder relies on
//!

use std::{sync::Arc, time::Duration};

use cgmath::Matrix4;
use parking_lot::RwLock;

use crate::{
    camera::CameraState,
    data_structures::{
        mesh::MeshPrimitive,
        scene_graph::{DrawItem, RenderableScene},
    },
    error::{RenderError, UploadError},
};

pub mod headless;

/// Uploads decoded primitives and hands back GPU handles.
pub trait MeshUploader {
    type Mesh;

    fn upload_mesh(&mut self, primitive: &MeshPrimitive) -> Result<Self::Mesh, UploadError>;
}

/// One frame's worth of input for a backend.
pub struct Frame<'a, M> {
    pub clear_colour: wgpu::Color,
    pub camera: CameraState,
    pub view: Matrix4<f32>,
    /// OpenGL clip space; backends apply their own depth conversion.
    pub proj: Matrix4<f32>,
    pub scene: Option<&'a RenderableScene<M>>,
}

impl<'a, M> Frame<'a, M> {
    /// Draw list entries paired with their uploaded mesh.
    pub fn draws(&self) -> impl Iterator<Item = (&'a M, &'a DrawItem)> + 'a {
        self.scene.into_iter().flat_map(|scene| {
            scene
                .draw_list()
                .iter()
                .filter_map(move |draw| scene.mesh(draw.mesh).map(|mesh| (mesh, draw)))
        })
    }
}

/// Something that can put meshes on a device and draw frames with them.
pub trait RenderBackend {
    type Mesh;

    fn upload_mesh(&mut self, primitive: &MeshPrimitive) -> Result<Self::Mesh, UploadError>;

    /// Clear, draw every entry of the frame's scene, present.
    fn render_frame(&mut self, frame: &Frame<'_, Self::Mesh>) -> Result<(), RenderError>;

    fn surface_size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);
}

/// Shared holder of the displayed scene.
pub struct SceneSlot<M> {
    inner: Arc<RwLock<Option<Arc<RenderableScene<M>>>>>,
}

impl<M> Clone for SceneSlot<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M> Default for SceneSlot<M> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }
}

impl<M> SceneSlot<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the displayed scene. The snapshot stays valid after a swap.
    pub fn current(&self) -> Option<Arc<RenderableScene<M>>> {
        self.inner.read().clone()
    }

    /// Replace the displayed scene and hand back the previous one.
    ///
    /// The lock is released before this returns, so dropping the returned scene
    /// (and its GPU resources) never happens while a reader waits.
    #[must_use = "dropping the previous scene frees its GPU resources"]
    pub fn swap(&self, scene: Arc<RenderableScene<M>>) -> Option<Arc<RenderableScene<M>>> {
        self.inner.write().replace(scene)
    }

    pub fn take(&self) -> Option<Arc<RenderableScene<M>>> {
        self.inner.write().take()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStats {
    pub frame_index: u64,
    pub draw_calls: usize,
    pub dt: Duration,
}

pub struct Renderer<B: RenderBackend> {
    backend: B,
    slot: SceneSlot<B::Mesh>,
    clear_colour: wgpu::Color,
    frame_index: u64,
}

impl<B: RenderBackend> Renderer<B> {
    /// Takes over an initialised backend, which already owns its surface.
    pub fn new(backend: B, clear_colour: wgpu::Color) -> Self {
        Self {
            backend,
            slot: SceneSlot::new(),
            clear_colour,
            frame_index: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn scene_slot(&self) -> SceneSlot<B::Mesh> {
        self.slot.clone()
    }

    pub fn current_scene(&self) -> Option<Arc<RenderableScene<B::Mesh>>> {
        self.slot.current()
    }

    pub fn set_clear_colour(&mut self, clear_colour: wgpu::Color) {
        self.clear_colour = clear_colour;
    }

    /// Make `scene` the displayed scene. The previous scene is torn down after the swap.
    pub fn submit_scene(&mut self, scene: RenderableScene<B::Mesh>) {
        let previous = self.slot.swap(Arc::new(scene));
        if let Some(previous) = previous {
            log::debug!(
                "replaced scene with {} meshes; {} other references keep it alive",
                previous.meshes().len(),
                Arc::strong_count(&previous) - 1
            );
        }
    }

    /// Draw exactly one frame with the displayed scene and `camera`.
    pub fn tick(&mut self, dt: Duration, camera: &CameraState) -> Result<FrameStats, RenderError> {
        let scene = self.slot.current();
        let (width, height) = self.backend.surface_size();
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let frame = Frame {
            clear_colour: self.clear_colour,
            camera: *camera,
            view: camera.view_matrix(),
            proj: camera.projection_matrix(aspect),
            scene: scene.as_deref(),
        };
        let draw_calls = frame.draws().count();
        self.backend.render_frame(&frame)?;

        let stats = FrameStats {
            frame_index: self.frame_index,
            draw_calls,
            dt,
        };
        self.frame_index += 1;
        log::debug!(
            "frame {}: {} draws, dt {:.2} ms",
            stats.frame_index,
            stats.draw_calls,
            dt.as_secs_f64() * 1000.0
        );
        Ok(stats)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.backend.resize(width, height);
        }
    }
}

impl<B: RenderBackend> MeshUploader for Renderer<B> {
    type Mesh = B::Mesh;

    fn upload_mesh(&mut self, primitive: &MeshPrimitive) -> Result<Self::Mesh, UploadError> {
        primitive.validate()?;
        self.backend.upload_mesh(primitive)
    }
}
