//! A backend that draws nothing and remembers everything.
//!
//! Frames are recorded as plain values, so two frames rendered from the same
//! state compare equal. Meshes count themselves in and out of a shared counter,
//! which makes it observable when a replaced scene has been released.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use cgmath::{Matrix4, Point3};

use crate::{
    data_structures::mesh::MeshPrimitive,
    error::{RenderError, UploadError},
    render::{Frame, RenderBackend},
};

#[derive(Debug)]
pub struct HeadlessMesh {
    id: usize,
    vertex_count: usize,
    index_count: usize,
    live: Arc<AtomicUsize>,
}

impl HeadlessMesh {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn index_count(&self) -> usize {
        self.index_count
    }
}

impl Drop for HeadlessMesh {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedDraw {
    pub mesh_id: usize,
    pub index_count: usize,
    pub world: Matrix4<f32>,
    pub color: [f32; 4],
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedFrame {
    pub clear: wgpu::Color,
    pub eye: Point3<f32>,
    pub view: Matrix4<f32>,
    pub proj: Matrix4<f32>,
    pub draws: Vec<RecordedDraw>,
}

#[derive(Debug)]
pub struct HeadlessBackend {
    size: (u32, u32),
    frames: Vec<RecordedFrame>,
    next_id: usize,
    uploads: usize,
    fail_after: Option<usize>,
    live: Arc<AtomicUsize>,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            frames: Vec::new(),
            next_id: 0,
            uploads: 0,
            fail_after: None,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Let the next `successes` uploads through and reject every one after them.
    /// `None` turns failure injection off.
    pub fn fail_uploads_after(&mut self, successes: Option<usize>) {
        self.fail_after = successes;
    }

    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }

    /// Successful uploads so far.
    pub fn uploads(&self) -> usize {
        self.uploads
    }

    /// Meshes uploaded and not yet dropped.
    pub fn live_meshes(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl RenderBackend for HeadlessBackend {
    type Mesh = HeadlessMesh;

    fn upload_mesh(&mut self, primitive: &MeshPrimitive) -> Result<HeadlessMesh, UploadError> {
        if let Some(remaining) = self.fail_after.as_mut() {
            if *remaining == 0 {
                return Err(UploadError::Device(format!(
                    "injected failure uploading {}",
                    primitive.label
                )));
            }
            *remaining -= 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.uploads += 1;
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(HeadlessMesh {
            id,
            vertex_count: primitive.vertex_count(),
            index_count: primitive.index_count(),
            live: self.live.clone(),
        })
    }

    fn render_frame(&mut self, frame: &Frame<'_, HeadlessMesh>) -> Result<(), RenderError> {
        let draws = frame
            .draws()
            .map(|(mesh, draw)| RecordedDraw {
                mesh_id: mesh.id,
                index_count: mesh.index_count,
                world: draw.world,
                color: draw.color,
            })
            .collect();
        self.frames.push(RecordedFrame {
            clear: frame.clear_colour,
            eye: frame.camera.eye(),
            view: frame.view,
            proj: frame.proj,
            draws,
        });
        Ok(())
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }
}
