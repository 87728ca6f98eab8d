//! GLB fixtures assembled in memory.
#![allow(dead_code)]

use std::borrow::Cow;

use gltf::binary::{Glb, Header};
use serde_json::{Value, json};

pub const CUBE_POSITIONS: [[f32; 3]; 8] = [
    [-0.5, -0.5, -0.5],
    [0.5, -0.5, -0.5],
    [0.5, 0.5, -0.5],
    [-0.5, 0.5, -0.5],
    [-0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5],
    [0.5, 0.5, 0.5],
    [-0.5, 0.5, 0.5],
];

#[rustfmt::skip]
pub const CUBE_INDICES: [u32; 36] = [
    0, 2, 1, 0, 3, 2,
    4, 5, 6, 4, 6, 7,
    0, 1, 5, 0, 5, 4,
    3, 6, 2, 3, 7, 6,
    0, 4, 7, 0, 7, 3,
    1, 2, 6, 1, 6, 5,
];

/// Frame a description and an optional binary chunk. Both are padded to four
/// bytes before framing so the header's declared length is exact.
pub fn frame(description: &[u8], bin: &[u8]) -> Vec<u8> {
    let mut json = description.to_vec();
    json.resize(json.len().next_multiple_of(4), b' ');
    let mut bin = bin.to_vec();
    bin.resize(bin.len().next_multiple_of(4), 0);
    let length = 12 + 8 + json.len() + if bin.is_empty() { 0 } else { 8 + bin.len() };
    Glb {
        header: Header {
            magic: *b"glTF",
            version: 2,
            length: length as u32,
        },
        json: Cow::Owned(json),
        bin: (!bin.is_empty()).then_some(Cow::Owned(bin)),
    }
    .to_vec()
    .unwrap()
}

pub fn glb(description: &Value, bin: &[u8]) -> Vec<u8> {
    frame(&serde_json::to_vec(description).unwrap(), bin)
}

/// Three float positions forming one triangle: (0,0,0), (1,0,0), (0,1,0).
pub fn triangle_bin() -> Vec<u8> {
    [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        .iter()
        .flat_map(|f| f.to_le_bytes())
        .collect()
}

/// A description of one non-indexed triangle mesh with the given nodes and scenes.
pub fn triangle(nodes: Value, scenes: Value) -> Value {
    json!({
        "asset": {"version": "2.0"},
        "scene": 0,
        "scenes": scenes,
        "nodes": nodes,
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
        "buffers": [{"byteLength": 36}],
        "bufferViews": [{"buffer": 0, "byteLength": 36}],
        "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"}]
    })
}

/// One indexed mesh in one buffer, instanced by `nodes`, with `roots` as the default scene.
pub fn mesh_container(positions: &[[f32; 3]], indices: &[u32], nodes: Value, roots: Value) -> Vec<u8> {
    let mut bin: Vec<u8> = positions
        .iter()
        .flatten()
        .flat_map(|f| f.to_le_bytes())
        .collect();
    let index_offset = bin.len();
    bin.extend(indices.iter().flat_map(|i| i.to_le_bytes()));

    let description = json!({
        "asset": {"version": "2.0", "generator": "fixture"},
        "scene": 0,
        "scenes": [{"nodes": roots}],
        "nodes": nodes,
        "meshes": [{
            "name": "fixture",
            "primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]
        }],
        "buffers": [{"byteLength": bin.len()}],
        "bufferViews": [
            {"buffer": 0, "byteLength": index_offset},
            {"buffer": 0, "byteOffset": index_offset, "byteLength": indices.len() * 4}
        ],
        "accessors": [
            {"bufferView": 0, "componentType": 5126, "count": positions.len(), "type": "VEC3"},
            {"bufferView": 1, "componentType": 5125, "count": indices.len(), "type": "SCALAR"}
        ]
    });
    glb(&description, &bin)
}

/// A unit cube at the origin, one node, nothing else.
pub fn unit_cube() -> Vec<u8> {
    mesh_container(&CUBE_POSITIONS, &CUBE_INDICES, json!([{"mesh": 0}]), json!([0]))
}

/// A cube with edge length `2 * half` centred at `center`.
pub fn cube_at(center: [f32; 3], half: f32) -> Vec<u8> {
    mesh_container(
        &CUBE_POSITIONS,
        &CUBE_INDICES,
        json!([{"mesh": 0, "translation": center, "scale": [half * 2.0, half * 2.0, half * 2.0]}]),
        json!([0]),
    )
}

/// One parent with two transformed instances of the cube mesh.
pub fn two_instances() -> Vec<u8> {
    mesh_container(
        &CUBE_POSITIONS,
        &CUBE_INDICES,
        json!([
            {"name": "root", "children": [1, 2], "rotation": [0.0, 0.38268343, 0.0, 0.9238795]},
            {"mesh": 0, "translation": [3.0, 0.0, 0.0]},
            {"mesh": 0, "translation": [-3.0, 1.0, 0.0], "scale": [2.0, 2.0, 2.0]}
        ]),
        json!([0]),
    )
}

/// `depth` nodes nested in a single line, the deepest one carrying the cube.
pub fn chain(depth: usize) -> Vec<u8> {
    let nodes: Vec<Value> = (0..depth)
        .map(|i| {
            if i + 1 == depth {
                json!({"mesh": 0})
            } else {
                json!({"children": [i + 1], "translation": [0.0, 1.0, 0.0]})
            }
        })
        .collect();
    mesh_container(&CUBE_POSITIONS, &CUBE_INDICES, Value::Array(nodes), json!([0]))
}

/// A well framed container whose description is not JSON.
pub fn garbage_description() -> Vec<u8> {
    frame(b"{ this is not json", &[])
}
