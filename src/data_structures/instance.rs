//! Node transforms and the per-draw data handed to the GPU.
//!
//! A node's local transform is either a translation/rotation/scale triple or an
//! explicit matrix. World transforms are plain matrices derived top-down by the
//! scene builder and packed into [`InstanceRaw`] for instanced draws.

use cgmath::{Matrix, Matrix3, Matrix4, One, Quaternion, SquareMatrix, Vector3};

use crate::data_structures::mesh;

/// Local transform of a scene node.
#[derive(Clone, Debug, PartialEq)]
pub enum LocalTransform {
    Trs {
        translation: Vector3<f32>,
        rotation: Quaternion<f32>,
        scale: Vector3<f32>,
    },
    Matrix(Matrix4<f32>),
}

impl LocalTransform {
    /// Identity transformation (no move, rotate, or scale).
    pub fn identity() -> Self {
        LocalTransform::Trs {
            translation: Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        match self {
            LocalTransform::Trs {
                translation,
                rotation,
                scale,
            } => {
                Matrix4::from_translation(*translation)
                    * Matrix4::from(*rotation)
                    * Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z)
            }
            LocalTransform::Matrix(matrix) => *matrix,
        }
    }
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<gltf::scene::Transform> for LocalTransform {
    fn from(transform: gltf::scene::Transform) -> Self {
        match transform {
            // Columns, matching cgmath's array conversion
            gltf::scene::Transform::Matrix { matrix } => LocalTransform::Matrix(matrix.into()),
            gltf::scene::Transform::Decomposed {
                translation,
                rotation: [x, y, z, w],
                scale,
            } => LocalTransform::Trs {
                translation: translation.into(),
                rotation: Quaternion::new(w, x, y, z),
                scale: scale.into(),
            },
        }
    }
}

impl From<Vector3<f32>> for LocalTransform {
    fn from(translation: Vector3<f32>) -> Self {
        LocalTransform::Trs {
            translation,
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

/// Inverse-transpose of the upper 3x3 block, used to carry normals into world space.
pub fn normal_matrix(world: &Matrix4<f32>) -> Matrix3<f32> {
    let linear = Matrix3::from_cols(world.x.truncate(), world.y.truncate(), world.z.truncate());
    linear
        .invert()
        .map(|inverse| inverse.transpose())
        .unwrap_or_else(Matrix3::identity)
}

/**
 * The raw instance is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
    color: [f32; 4],
}

impl InstanceRaw {
    pub fn new(world: &Matrix4<f32>, color: [f32; 4]) -> Self {
        Self {
            model: (*world).into(),
            normal: normal_matrix(world).into(),
            color,
        }
    }
}

/**
 * As we store vertex data directly in the GPU memory we need to tell what the bytes refer to:
 *
 * Stride layout here: world matrix as four vec4 columns, normal matrix as three vec3
 * columns and the base colour.
 */
impl mesh::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // Shaders advance to the next instance only once per drawn instance
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // A mat4 takes up 4 vertex slots as it is technically 4 vec4s.
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 25]>() as wgpu::BufferAddress,
                    shader_location: 12,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}
