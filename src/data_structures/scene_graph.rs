//! Scene graph and the builder that produces it.
//!
//! A [`RenderableScene`] is built in one go from validated asset tables and is
//! immutable afterwards: the node hierarchy with local and world transforms, the
//! uploaded meshes, a flattened draw list and the bounding sphere used to frame
//! the camera. Nodes are plain records with optional fields; there is one node
//! shape and no per-node dispatch.

use std::collections::HashMap;

use cgmath::{EuclideanSpace, Matrix4, Point3, SquareMatrix, Transform};

use crate::{
    config::BuildConfig,
    data_structures::{
        bounds::{BoundingSphere, bounding_sphere},
        tables::AssetTables,
    },
    error::{BuildError, ParseError, Table},
    render::MeshUploader,
};

/// One node of a built scene.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    /// Index of the node in the asset tables it was built from.
    pub source: usize,
    pub local: Matrix4<f32>,
    pub world: Matrix4<f32>,
    /// Indices into [`RenderableScene::nodes`].
    pub children: Vec<usize>,
    /// Index into the asset tables' meshes.
    pub mesh: Option<usize>,
}

/// One entry of the flattened draw list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawItem {
    /// Index into [`RenderableScene::meshes`].
    pub mesh: usize,
    pub world: Matrix4<f32>,
    pub color: [f32; 4],
}

#[derive(Debug)]
pub struct RenderableScene<M> {
    nodes: Vec<SceneNode>,
    meshes: Vec<M>,
    draw_list: Vec<DrawItem>,
    bounds: BoundingSphere,
}

impl<M> RenderableScene<M> {
    /// A scene with nothing in it, framed like any other empty scene.
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            meshes: Vec::new(),
            draw_list: Vec::new(),
            bounds: BoundingSphere::unit(),
        }
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn meshes(&self) -> &[M] {
        &self.meshes
    }

    pub fn mesh(&self, index: usize) -> Option<&M> {
        self.meshes.get(index)
    }

    pub fn draw_list(&self) -> &[DrawItem] {
        &self.draw_list
    }

    pub fn bounds(&self) -> BoundingSphere {
        self.bounds
    }
}

/// Turns asset tables into a [`RenderableScene`], uploading meshes on the way.
#[derive(Clone, Debug, Default)]
pub struct SceneBuilder {
    config: BuildConfig,
}

struct Pending {
    node: usize,
    parent: Option<usize>,
    parent_world: Matrix4<f32>,
    depth: usize,
}

impl SceneBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Build the default scene of `tables`.
    ///
    /// Any error discards everything uploaded so far; nothing outside the returned
    /// scene is touched.
    pub fn build<U: MeshUploader>(
        &self,
        tables: &AssetTables,
        uploader: &mut U,
    ) -> Result<RenderableScene<U::Mesh>, BuildError> {
        let scene_idx = tables.default_scene.ok_or(BuildError::NoDefaultScene)?;
        let scene = tables
            .scenes
            .get(scene_idx)
            .ok_or(ParseError::DanglingReference {
                table: Table::Scenes,
                index: scene_idx,
            })?;

        let mut nodes: Vec<SceneNode> = Vec::new();
        let mut meshes = Vec::new();
        let mut mesh_positions: Vec<Vec<Point3<f32>>> = Vec::new();
        let mut draw_list = Vec::new();
        // (mesh, primitive) -> slot in `meshes`, `None` for skipped primitives
        let mut uploaded: HashMap<(usize, usize), Option<usize>> = HashMap::new();

        let mut stack: Vec<Pending> = scene
            .nodes
            .iter()
            .rev()
            .map(|&node| Pending {
                node,
                parent: None,
                parent_world: Matrix4::identity(),
                depth: 1,
            })
            .collect();

        while let Some(Pending {
            node: source,
            parent,
            parent_world,
            depth,
        }) = stack.pop()
        {
            if depth > self.config.max_depth {
                return Err(BuildError::HierarchyTooDeep {
                    node: source,
                    limit: self.config.max_depth,
                });
            }
            let node = tables
                .nodes
                .get(source)
                .ok_or(ParseError::DanglingReference {
                    table: Table::Nodes,
                    index: source,
                })?;
            let local = node.transform.to_matrix();
            let world = parent_world * local;
            let slot = nodes.len();
            if let Some(parent) = parent {
                nodes[parent].children.push(slot);
            }
            nodes.push(SceneNode {
                source,
                local,
                world,
                children: Vec::new(),
                mesh: node.mesh,
            });

            if let Some(mesh_idx) = node.mesh {
                let mesh = tables
                    .meshes
                    .get(mesh_idx)
                    .ok_or(ParseError::DanglingReference {
                        table: Table::Meshes,
                        index: mesh_idx,
                    })?;
                for (prim_idx, primitive) in mesh.primitives.iter().enumerate() {
                    let key = (mesh_idx, prim_idx);
                    let handle = match uploaded.get(&key) {
                        Some(handle) => *handle,
                        None => {
                            let handle = match &primitive.data {
                                Some(data) => {
                                    let gpu = uploader.upload_mesh(data).map_err(|source| {
                                        BuildError::AssetUploadFailed {
                                            mesh: mesh_idx,
                                            primitive: prim_idx,
                                            source,
                                        }
                                    })?;
                                    meshes.push(gpu);
                                    mesh_positions.push(data.positions().map(Point3::from_vec).collect());
                                    Some(meshes.len() - 1)
                                }
                                None => {
                                    log::warn!(
                                        "skipping mesh {mesh_idx} primitive {prim_idx}: {:?} has no triangle form",
                                        primitive.mode
                                    );
                                    None
                                }
                            };
                            uploaded.insert(key, handle);
                            handle
                        }
                    };
                    if let Some(mesh) = handle {
                        draw_list.push(DrawItem {
                            mesh,
                            world,
                            color: tables.base_color(primitive),
                        });
                    }
                }
            }

            stack.extend(node.children.iter().rev().map(|&child| Pending {
                node: child,
                parent: Some(slot),
                parent_world: world,
                depth: depth + 1,
            }));
        }

        let bounds = bounding_sphere(draw_list.iter().flat_map(|draw: &DrawItem| {
            mesh_positions[draw.mesh]
                .iter()
                .map(move |p| draw.world.transform_point(*p))
        }));

        log::info!(
            "built scene {scene_idx}: {} nodes, {} meshes, {} draws, radius {:.3}",
            nodes.len(),
            meshes.len(),
            draw_list.len(),
            bounds.radius
        );
        Ok(RenderableScene {
            nodes,
            meshes,
            draw_list,
            bounds,
        })
    }
}
