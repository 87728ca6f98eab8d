//! Flat, index-addressed asset tables decoded from one container.
//!
//! Every index stored in these tables has been range checked by
//! [`crate::resources::parse`], and node references form a forest.

use gltf::{
    accessor::{DataType, Dimensions},
    mesh::Mode,
};

use crate::data_structures::{instance::LocalTransform, mesh::MeshPrimitive};

/// Whether primitives drawn with `mode` can be unrolled into a triangle list.
pub fn has_triangle_form(mode: Mode) -> bool {
    matches!(mode, Mode::Triangles | Mode::TriangleStrip | Mode::TriangleFan)
}

/// A binary region owned by the tables.
#[derive(Clone, Debug, PartialEq)]
pub struct Buffer {
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BufferView {
    pub buffer: usize,
    pub offset: usize,
    pub length: usize,
    pub stride: Option<usize>,
}

/// A typed, strided view into a buffer view. `view == None` reads as zeros.
#[derive(Clone, Debug, PartialEq)]
pub struct Accessor {
    pub view: Option<usize>,
    pub offset: usize,
    pub count: usize,
    pub component: DataType,
    pub dimensions: Dimensions,
    pub normalized: bool,
}

impl Accessor {
    pub fn element_size(&self) -> usize {
        self.component.size() * self.dimensions.multiplicity()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Primitive {
    pub position: usize,
    pub normal: Option<usize>,
    pub tex_coord: Option<usize>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    pub mode: Mode,
    /// Decoded triangle-list data, `None` for point and line primitives.
    pub data: Option<MeshPrimitive>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

/// Material placeholder: only what the flat shader consumes.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub base_color: [f32; 4],
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            base_color: [1.0, 1.0, 1.0, 1.0],
            double_sided: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: Option<String>,
    pub transform: LocalTransform,
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    pub name: Option<String>,
    pub nodes: Vec<usize>,
}

/// The decoded contents of one container.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssetTables {
    pub buffers: Vec<Buffer>,
    pub buffer_views: Vec<BufferView>,
    pub accessors: Vec<Accessor>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub nodes: Vec<Node>,
    pub scenes: Vec<Scene>,
    pub default_scene: Option<usize>,
}

impl AssetTables {
    /// Base colour of a primitive, white when it has no material.
    pub fn base_color(&self, primitive: &Primitive) -> [f32; 4] {
        primitive
            .material
            .and_then(|idx| self.materials.get(idx))
            .map_or(Material::default().base_color, |m| m.base_color)
    }
}
