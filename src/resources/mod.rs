use base64::Engine;
use gltf::{
    Document, Semantic,
    accessor::{DataType, Dimensions},
    binary::Glb,
    buffer::Source,
    json::{self, accessor::GenericComponentType, validation::Checked},
};

use crate::{
    data_structures::{
        mesh::{MeshPrimitive, fan_to_list, strip_to_list},
        tables::{
            Accessor, AssetTables, Buffer, BufferView, Material, Mesh, Node, Primitive, Scene,
            has_triangle_form,
        },
    },
    error::{ParseError, Table},
};

/**
 * This module contains all logic for turning a binary container into asset tables.
 *
 * `parse` is pure: it touches no GPU state and either returns fully validated
 * tables or the first problem it found. Every reference is range checked on the
 * raw description before the `gltf` document wrappers are allowed to follow it.
 */

const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// Decode and validate a binary container.
pub fn parse(bytes: &[u8]) -> Result<AssetTables, ParseError> {
    let glb = open(bytes)?;
    let root = json::Root::from_slice(&glb.json)
        .map_err(|e| ParseError::malformed(format!("description is not valid JSON: {e}")))?;
    check_asset(&root)?;
    check_accessors(&root)?;
    check_meshes(&root)?;
    let parents = check_nodes(&root)?;
    check_scenes(&root, &parents)?;

    let document = Document::from_json_without_validation(root);
    let buffers = bind_buffers(&document, glb.bin.as_deref())?;
    let buffer_views = buffer_views(&document, &buffers)?;
    let accessors = accessors(&document, &buffer_views, &buffers)?;
    let meshes = meshes(&document, &accessors, &buffers)?;

    let tables = AssetTables {
        buffers,
        buffer_views,
        accessors,
        meshes,
        materials: materials(&document),
        nodes: nodes(&document),
        scenes: scenes(&document),
        default_scene: document.default_scene().map(|scene| scene.index()),
    };
    log::debug!(
        "parsed container: {} buffers, {} accessors, {} meshes, {} nodes, {} scenes",
        tables.buffers.len(),
        tables.accessors.len(),
        tables.meshes.len(),
        tables.nodes.len(),
        tables.scenes.len()
    );
    Ok(tables)
}

/// Frame checks that `Glb::from_slice` leaves to its caller, then the split itself.
fn open(bytes: &[u8]) -> Result<Glb<'_>, ParseError> {
    let magic = bytes
        .get(..4)
        .ok_or_else(|| ParseError::malformed("input is too short to carry a header"))?;
    if magic != b"glTF" {
        return Err(ParseError::malformed(format!("bad magic {magic:02x?}")));
    }
    let Some(&[a, b, c, d]) = bytes.get(8..HEADER_LEN) else {
        return Err(ParseError::TruncatedContainer {
            region: "header",
            declared: HEADER_LEN,
            available: bytes.len(),
        });
    };
    let declared = u32::from_le_bytes([a, b, c, d]) as usize;
    if declared > bytes.len() {
        return Err(ParseError::TruncatedContainer {
            region: "container",
            declared,
            available: bytes.len(),
        });
    }
    if declared < HEADER_LEN + CHUNK_HEADER_LEN {
        return Err(ParseError::malformed(format!(
            "declared length {declared} cannot hold a description chunk"
        )));
    }
    Glb::from_slice(&bytes[..declared]).map_err(container_error)
}

fn container_error(error: gltf::Error) -> ParseError {
    use gltf::binary::Error as Binary;
    match error {
        gltf::Error::Binary(Binary::ChunkLength {
            length,
            length_read,
            ..
        }) => ParseError::TruncatedContainer {
            region: "chunk",
            declared: length as usize,
            available: length_read,
        },
        gltf::Error::Binary(Binary::Length {
            length,
            length_read,
        }) => ParseError::TruncatedContainer {
            region: "container",
            declared: length as usize,
            available: length_read,
        },
        other => ParseError::malformed(other),
    }
}

fn check_asset(root: &json::Root) -> Result<(), ParseError> {
    let version = &root.asset.version;
    let major = version.split('.').next().and_then(|m| m.parse::<u32>().ok());
    if major != Some(2) {
        return Err(ParseError::malformed(format!(
            "unsupported asset version {version:?}"
        )));
    }
    if let Some(ext) = root.extensions_required.first() {
        return Err(ParseError::malformed(format!(
            "required extension {ext} is not supported"
        )));
    }
    Ok(())
}

fn dangling(table: Table, index: usize) -> ParseError {
    ParseError::DanglingReference { table, index }
}

fn in_range<T>(table: Table, len: usize, index: json::Index<T>) -> Result<usize, ParseError> {
    let index = index.value();
    if index < len {
        Ok(index)
    } else {
        Err(dangling(table, index))
    }
}

fn format_of(accessor: &json::Accessor) -> Option<(DataType, Dimensions)> {
    match (&accessor.component_type, &accessor.type_) {
        (Checked::Valid(GenericComponentType(component)), Checked::Valid(dimensions)) => {
            Some((*component, *dimensions))
        }
        _ => None,
    }
}

fn check_accessors(root: &json::Root) -> Result<(), ParseError> {
    for view in &root.buffer_views {
        in_range(Table::Buffers, root.buffers.len(), view.buffer)?;
    }
    for (index, accessor) in root.accessors.iter().enumerate() {
        let unsupported = |reason: &str| ParseError::UnsupportedAccessor {
            accessor: index,
            reason: reason.to_string(),
        };
        if accessor.sparse.is_some() {
            return Err(unsupported("sparse storage"));
        }
        if format_of(accessor).is_none() {
            return Err(unsupported("unknown component or element type"));
        }
        if let Some(view) = accessor.buffer_view {
            in_range(Table::BufferViews, root.buffer_views.len(), view)?;
        }
    }
    Ok(())
}

fn check_meshes(root: &json::Root) -> Result<(), ParseError> {
    for (mesh, desc) in root.meshes.iter().enumerate() {
        for (primitive, p) in desc.primitives.iter().enumerate() {
            check_primitive(root, mesh, primitive, p)?;
        }
    }
    Ok(())
}

fn accessor_at(
    root: &json::Root,
    index: json::Index<json::Accessor>,
) -> Result<(usize, &json::Accessor), ParseError> {
    let index = in_range(Table::Accessors, root.accessors.len(), index)?;
    Ok((index, &root.accessors[index]))
}

fn check_primitive(
    root: &json::Root,
    mesh: usize,
    primitive: usize,
    desc: &json::mesh::Primitive,
) -> Result<(), ParseError> {
    let lookup = |index| accessor_at(root, index);
    let unsupported = |accessor: usize, reason: &str| ParseError::UnsupportedAccessor {
        accessor,
        reason: format!("mesh {mesh} primitive {primitive}: {reason}"),
    };
    for &index in desc.attributes.values() {
        lookup(index)?;
    }
    let attribute = |semantic: Semantic| desc.attributes.get(&Checked::Valid(semantic)).copied();

    let (position, positions) = attribute(Semantic::Positions)
        .ok_or(ParseError::MissingPositions { mesh, primitive })
        .and_then(lookup)?;
    if format_of(positions) != Some((DataType::F32, Dimensions::Vec3)) {
        return Err(unsupported(position, "POSITION must be float VEC3"));
    }

    if let Some((index, normals)) = attribute(Semantic::Normals).map(lookup).transpose()? {
        if format_of(normals) != Some((DataType::F32, Dimensions::Vec3)) {
            return Err(unsupported(index, "NORMAL must be float VEC3"));
        }
        if normals.count != positions.count {
            return Err(unsupported(index, "NORMAL count differs from POSITION count"));
        }
    }

    if let Some((index, uvs)) = attribute(Semantic::TexCoords(0)).map(lookup).transpose()? {
        let format_ok = match format_of(uvs) {
            Some((DataType::F32, Dimensions::Vec2)) => true,
            Some((DataType::U8 | DataType::U16, Dimensions::Vec2)) => uvs.normalized,
            _ => false,
        };
        if !format_ok {
            return Err(unsupported(
                index,
                "TEXCOORD_0 must be float or normalized unsigned VEC2",
            ));
        }
        if uvs.count != positions.count {
            return Err(unsupported(index, "TEXCOORD_0 count differs from POSITION count"));
        }
    }

    if let Some((index, indices)) = desc.indices.map(lookup).transpose()? {
        let unsigned = matches!(
            format_of(indices),
            Some((DataType::U8 | DataType::U16 | DataType::U32, Dimensions::Scalar))
        );
        if !unsigned || indices.normalized {
            return Err(unsupported(index, "indices must be unsigned SCALAR"));
        }
    }

    if let Some(material) = desc.material {
        in_range(Table::Materials, root.materials.len(), material)?;
    }
    if let Checked::Invalid = desc.mode {
        return Err(ParseError::malformed(format!(
            "mesh {mesh} primitive {primitive} has an unknown mode"
        )));
    }
    Ok(())
}

/// Checks node references and that nodes form a forest. Returns every node's parent.
fn check_nodes(root: &json::Root) -> Result<Vec<Option<usize>>, ParseError> {
    let count = root.nodes.len();
    let mut children = Vec::with_capacity(count);
    for (index, node) in root.nodes.iter().enumerate() {
        if let Some(mesh) = node.mesh {
            in_range(Table::Meshes, root.meshes.len(), mesh)?;
        }
        let list = node
            .children
            .iter()
            .flatten()
            .map(|&child| in_range(Table::Nodes, count, child))
            .collect::<Result<Vec<_>, _>>()?;
        if list.contains(&index) {
            return Err(ParseError::InvalidHierarchy {
                node: index,
                reason: "node lists itself as a child",
            });
        }
        children.push(list);
    }
    check_hierarchy(&children)
}

/// `children[n]` lists the children of node `n`, every entry already in range.
fn check_hierarchy(children: &[Vec<usize>]) -> Result<Vec<Option<usize>>, ParseError> {
    let mut parents = vec![None; children.len()];
    for (parent, list) in children.iter().enumerate() {
        for &child in list {
            if parents[child].replace(parent).is_some() {
                return Err(ParseError::InvalidHierarchy {
                    node: child,
                    reason: "node has more than one parent",
                });
            }
        }
    }

    // With at most one parent each, a cycle shows up as a parent chain that
    // comes back to a node stamped during the same walk.
    const UNSEEN: usize = usize::MAX;
    let mut stamp = vec![UNSEEN; children.len()];
    for start in 0..children.len() {
        let mut current = Some(start);
        while let Some(node) = current {
            if stamp[node] == start {
                return Err(ParseError::InvalidHierarchy {
                    node,
                    reason: "node is its own ancestor",
                });
            }
            if stamp[node] != UNSEEN {
                break;
            }
            stamp[node] = start;
            current = parents[node];
        }
    }
    Ok(parents)
}

fn check_scenes(root: &json::Root, parents: &[Option<usize>]) -> Result<(), ParseError> {
    for desc in &root.scenes {
        let mut seen = vec![false; parents.len()];
        for &root_node in &desc.nodes {
            let node = in_range(Table::Nodes, parents.len(), root_node)?;
            if parents[node].is_some() {
                return Err(ParseError::InvalidHierarchy {
                    node,
                    reason: "scene root has a parent",
                });
            }
            if std::mem::replace(&mut seen[node], true) {
                return Err(ParseError::InvalidHierarchy {
                    node,
                    reason: "node is listed twice as a scene root",
                });
            }
        }
    }
    if let Some(scene) = root.scene {
        in_range(Table::Scenes, root.scenes.len(), scene)?;
    }
    Ok(())
}

/// Resolve every buffer to owned bytes. The first buffer without a uri takes the
/// binary chunk; `data:` uris are decoded in place and any other uri is refused.
fn bind_buffers(document: &Document, bin: Option<&[u8]>) -> Result<Vec<Buffer>, ParseError> {
    let mut bin = bin;
    document
        .buffers()
        .map(|buffer| {
            let index = buffer.index();
            let mut data = match buffer.source() {
                Source::Bin => bin.take().ok_or(dangling(Table::Buffers, index))?.to_vec(),
                Source::Uri(uri) => decode_data_uri(index, uri)?,
            };
            if buffer.length() > data.len() {
                return Err(ParseError::TruncatedContainer {
                    region: "buffer",
                    declared: buffer.length(),
                    available: data.len(),
                });
            }
            data.truncate(buffer.length());
            Ok(Buffer { data })
        })
        .collect()
}

fn decode_data_uri(index: usize, uri: &str) -> Result<Vec<u8>, ParseError> {
    let Some(rest) = uri.strip_prefix("data:") else {
        return Err(ParseError::malformed(format!(
            "buffer {index} references external data {uri:?}"
        )));
    };
    let (_, encoded) = rest.split_once(";base64,").ok_or_else(|| {
        ParseError::malformed(format!("buffer {index} has a data uri without base64 payload"))
    })?;
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| ParseError::malformed(format!("buffer {index} data uri: {e}")))
}

fn buffer_views(document: &Document, buffers: &[Buffer]) -> Result<Vec<BufferView>, ParseError> {
    document
        .views()
        .map(|view| {
            let buffer = view.buffer().index();
            let available = buffers[buffer].data.len();
            let required = view
                .offset()
                .checked_add(view.length())
                .unwrap_or(usize::MAX);
            if required > available {
                return Err(ParseError::BufferViewOutOfBounds {
                    view: view.index(),
                    required,
                    available,
                });
            }
            if let Some(stride) = view.stride()
                && (!(4..=252).contains(&stride) || stride % 4 != 0)
            {
                return Err(ParseError::malformed(format!(
                    "buffer view {} has invalid stride {stride}",
                    view.index()
                )));
            }
            Ok(BufferView {
                buffer,
                offset: view.offset(),
                length: view.length(),
                stride: view.stride(),
            })
        })
        .collect()
}

fn accessors(
    document: &Document,
    views: &[BufferView],
    buffers: &[Buffer],
) -> Result<Vec<Accessor>, ParseError> {
    // A view-less accessor reads as zeros and may not outgrow the data the
    // container actually carries.
    let largest_buffer = buffers.iter().map(|b| b.data.len()).max().unwrap_or(0);
    document
        .accessors()
        .map(|acc| {
            let index = acc.index();
            let accessor = Accessor {
                view: acc.view().map(|view| view.index()),
                offset: acc.offset(),
                count: acc.count(),
                component: acc.data_type(),
                dimensions: acc.dimensions(),
                normalized: acc.normalized(),
            };
            let element_size = accessor.element_size();

            let Some(view_idx) = accessor.view else {
                let required = accessor.count.checked_mul(element_size).unwrap_or(usize::MAX);
                if required > largest_buffer {
                    return Err(ParseError::AccessorOutOfBounds {
                        accessor: index,
                        required,
                        available: largest_buffer,
                    });
                }
                return Ok(accessor);
            };
            let view = &views[view_idx];
            let stride = view.stride.unwrap_or(element_size);
            if stride < element_size {
                return Err(ParseError::UnsupportedAccessor {
                    accessor: index,
                    reason: format!(
                        "stride {stride} is smaller than its {element_size} byte elements"
                    ),
                });
            }
            let required = match accessor.count.checked_sub(1) {
                None => Some(accessor.offset),
                Some(last) => stride
                    .checked_mul(last)
                    .and_then(|span| span.checked_add(element_size))
                    .and_then(|span| span.checked_add(accessor.offset)),
            }
            .unwrap_or(usize::MAX);
            if required > view.length {
                return Err(ParseError::AccessorOutOfBounds {
                    accessor: index,
                    required,
                    available: view.length,
                });
            }
            Ok(accessor)
        })
        .collect()
}

fn materials(document: &Document) -> Vec<Material> {
    document
        .materials()
        .map(|material| Material {
            name: material.name().map(str::to_string),
            base_color: material.pbr_metallic_roughness().base_color_factor(),
            double_sided: material.double_sided(),
        })
        .collect()
}

fn meshes(
    document: &Document,
    accessors: &[Accessor],
    buffers: &[Buffer],
) -> Result<Vec<Mesh>, ParseError> {
    document
        .meshes()
        .map(|mesh| {
            let primitives = mesh
                .primitives()
                .map(|primitive| self::primitive(&mesh, &primitive, accessors, buffers))
                .collect::<Result<_, _>>()?;
            Ok(Mesh {
                name: mesh.name().map(str::to_string),
                primitives,
            })
        })
        .collect()
}

fn primitive(
    mesh: &gltf::Mesh<'_>,
    primitive: &gltf::Primitive<'_>,
    accessors: &[Accessor],
    buffers: &[Buffer],
) -> Result<Primitive, ParseError> {
    let attribute = |semantic: Semantic| primitive.get(&semantic).map(|acc| acc.index());
    let position = attribute(Semantic::Positions).ok_or(ParseError::MissingPositions {
        mesh: mesh.index(),
        primitive: primitive.index(),
    })?;
    let normal = attribute(Semantic::Normals);
    let tex_coord = attribute(Semantic::TexCoords(0));
    let indices = primitive.indices().map(|acc| acc.index());
    let mode = primitive.mode();

    let data = if has_triangle_form(mode) {
        let reader =
            primitive.reader(|buffer| buffers.get(buffer.index()).map(|b| b.data.as_slice()));
        let positions = read_stream(accessors, position, || reader.read_positions())?;
        let normals = normal
            .map(|n| read_stream(accessors, n, || reader.read_normals()))
            .transpose()?;
        let tex_coords = tex_coord
            .map(|t| {
                read_stream(accessors, t, || {
                    reader.read_tex_coords(0).map(|uvs| uvs.into_f32())
                })
            })
            .transpose()?;
        let list = match indices {
            Some(i) => read_stream(accessors, i, || {
                reader.read_indices().map(|idx| idx.into_u32())
            })?,
            None => (0..positions.len() as u32).collect(),
        };
        let list = match mode {
            gltf::mesh::Mode::TriangleStrip => strip_to_list(&list),
            gltf::mesh::Mode::TriangleFan => fan_to_list(&list),
            _ => list,
        };
        let label = match mesh.name() {
            Some(name) => format!("{name}/{}", primitive.index()),
            None => format!("mesh{}/{}", mesh.index(), primitive.index()),
        };
        Some(MeshPrimitive::from_attributes(
            label,
            positions,
            normals,
            tex_coords,
            Some(list),
        ))
    } else {
        None
    };

    Ok(Primitive {
        position,
        normal,
        tex_coord,
        indices,
        material: primitive.material().index(),
        mode,
        data,
    })
}

/// Collect one attribute stream. Accessors without a view read as zeros.
fn read_stream<T, I, F>(accessors: &[Accessor], index: usize, read: F) -> Result<Vec<T>, ParseError>
where
    T: Clone + Default,
    I: Iterator<Item = T>,
    F: FnOnce() -> Option<I>,
{
    let accessor = accessors.get(index).ok_or(dangling(Table::Accessors, index))?;
    if accessor.view.is_none() || accessor.count == 0 {
        return Ok(vec![T::default(); accessor.count]);
    }
    read()
        .map(Iterator::collect)
        .ok_or_else(|| ParseError::UnsupportedAccessor {
            accessor: index,
            reason: "data could not be read".into(),
        })
}

fn nodes(document: &Document) -> Vec<Node> {
    document
        .nodes()
        .map(|node| Node {
            name: node.name().map(str::to_string),
            transform: node.transform().into(),
            children: node.children().map(|child| child.index()).collect(),
            mesh: node.mesh().map(|mesh| mesh.index()),
        })
        .collect()
}

fn scenes(document: &Document) -> Vec<Scene> {
    document
        .scenes()
        .map(|scene| Scene {
            name: scene.name().map(str::to_string),
            nodes: scene.nodes().map(|node| node.index()).collect(),
        })
        .collect()
}
