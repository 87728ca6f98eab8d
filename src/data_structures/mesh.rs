//! CPU-side vertex data ready for upload.

use cgmath::{InnerSpace, Vector3, Zero};

use crate::error::UploadError;

/// Vertex layout description for GPU buffers.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBS: [wgpu::VertexAttribute; 3] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBS,
        }
    }
}

/// One decoded triangle-list primitive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshPrimitive {
    pub label: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl MeshPrimitive {
    /// Assemble a primitive from attribute streams. Missing normals are generated,
    /// missing texture coordinates are zero and missing indices are sequential.
    pub fn from_attributes(
        label: String,
        positions: Vec<[f32; 3]>,
        normals: Option<Vec<[f32; 3]>>,
        tex_coords: Option<Vec<[f32; 2]>>,
        indices: Option<Vec<u32>>,
    ) -> Self {
        let indices = indices.unwrap_or_else(|| (0..positions.len() as u32).collect());
        let normals = normals.unwrap_or_else(|| smooth_normals(&positions, &indices));
        let vertices = positions
            .iter()
            .enumerate()
            .map(|(i, position)| ModelVertex {
                position: *position,
                normal: normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                tex_coords: tex_coords
                    .as_ref()
                    .and_then(|uvs| uvs.get(i).copied())
                    .unwrap_or_default(),
            })
            .collect();
        Self {
            label,
            vertices,
            indices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn positions(&self) -> impl Iterator<Item = Vector3<f32>> + '_ {
        self.vertices.iter().map(|v| Vector3::from(v.position))
    }

    /// Checks shared by every backend before anything touches the device.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.vertices.is_empty() {
            return Err(UploadError::EmptyMesh);
        }
        let vertex_count = self.vertices.len();
        match self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            Some(&index) => Err(UploadError::IndexOutOfRange {
                index,
                vertex_count,
            }),
            None => Ok(()),
        }
    }
}

/// Convert strip or fan index order into a plain triangle list.
pub fn strip_to_list(indices: &[u32]) -> Vec<u32> {
    let mut list = Vec::with_capacity(indices.len().saturating_sub(2) * 3);
    for i in 0..indices.len().saturating_sub(2) {
        // Every other triangle flips its winding to stay front facing
        if i % 2 == 0 {
            list.extend_from_slice(&[indices[i], indices[i + 1], indices[i + 2]]);
        } else {
            list.extend_from_slice(&[indices[i + 1], indices[i], indices[i + 2]]);
        }
    }
    list
}

pub fn fan_to_list(indices: &[u32]) -> Vec<u32> {
    let mut list = Vec::with_capacity(indices.len().saturating_sub(2) * 3);
    for i in 1..indices.len().saturating_sub(1) {
        list.extend_from_slice(&[indices[0], indices[i], indices[i + 1]]);
    }
    list
}

/// Area-weighted vertex normals. Degenerate or unreferenced vertices point up.
fn smooth_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut sums = vec![Vector3::<f32>::zero(); positions.len()];
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let (Some(pa), Some(pb), Some(pc)) = (positions.get(a), positions.get(b), positions.get(c))
        else {
            continue;
        };
        let (pa, pb, pc) = (Vector3::from(*pa), Vector3::from(*pb), Vector3::from(*pc));
        // The cross product's length is twice the triangle area
        let face = (pb - pa).cross(pc - pa);
        sums[a] += face;
        sums[b] += face;
        sums[c] += face;
    }
    sums.into_iter()
        .map(|n| {
            if n.magnitude2() > f32::EPSILON {
                n.normalize().into()
            } else {
                [0.0, 1.0, 0.0]
            }
        })
        .collect()
}
