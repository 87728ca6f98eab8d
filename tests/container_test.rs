use base64::Engine;
use cgmath::Vector3;
use glb_viewer::{
    EngineSession,
    config::ViewerConfig,
    data_structures::{instance::LocalTransform, tables::AssetTables},
    error::{ErrorKind, ParseError, Table},
    render::headless::HeadlessBackend,
    resources,
};
use gltf::mesh::Mode;
use serde_json::json;

mod common;

fn single_triangle() -> serde_json::Value {
    common::triangle(json!([{"mesh": 0}]), json!([{"nodes": [0]}]))
}

fn parse(description: serde_json::Value) -> Result<AssetTables, ParseError> {
    resources::parse(&common::glb(&description, &common::triangle_bin()))
}

#[test]
fn unit_cube_parses_into_tables() {
    let tables = resources::parse(&common::unit_cube()).unwrap();
    assert_eq!(tables.meshes.len(), 1);
    assert_eq!(tables.nodes.len(), 1);
    assert_eq!(tables.default_scene, Some(0));
    assert_eq!(tables.scenes[0].nodes, vec![0]);
    assert_eq!(tables.accessors[1].count, 36);
    let data = tables.meshes[0].primitives[0].data.as_ref().unwrap();
    assert_eq!(data.vertex_count(), 8);
    assert_eq!(data.indices, common::CUBE_INDICES);
}

#[test]
fn single_triangle_decodes_positions() {
    let tables = parse(single_triangle()).unwrap();
    let primitive = &tables.meshes[0].primitives[0];
    assert_eq!(primitive.mode, Mode::Triangles);
    let data = primitive.data.as_ref().unwrap();
    assert_eq!(data.vertices[1].position, [1.0, 0.0, 0.0]);
    assert_eq!(data.indices, vec![0, 1, 2]);
}

#[test]
fn every_truncation_is_reported_as_truncated() {
    let bytes = common::unit_cube();
    for len in 12..bytes.len() {
        let err = resources::parse(&bytes[..len]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedContainer, "cut at {len}: {err}");
    }
}

#[test]
fn chunk_overrunning_the_container_is_truncated() {
    let mut bytes = common::unit_cube();
    // First chunk length sits right after the 12 byte header
    bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        resources::parse(&bytes),
        Err(ParseError::TruncatedContainer { region: "chunk", .. })
    ));
}

#[test]
fn undecodable_description_is_malformed() {
    let err = resources::parse(&common::garbage_description()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedContainer);
}

#[test]
fn out_of_range_mesh_is_dangling() {
    let doc = common::triangle(json!([{"mesh": 3}]), json!([{"nodes": [0]}]));
    assert_eq!(
        parse(doc),
        Err(ParseError::DanglingReference {
            table: Table::Meshes,
            index: 3
        })
    );
}

#[test]
fn accessor_past_view_is_out_of_bounds() {
    let mut doc = single_triangle();
    doc["accessors"][0]["count"] = json!(4);
    assert_eq!(
        parse(doc),
        Err(ParseError::AccessorOutOfBounds {
            accessor: 0,
            required: 48,
            available: 36
        })
    );
}

#[test]
fn huge_count_does_not_overflow() {
    let mut doc = single_triangle();
    doc["accessors"][0]["count"] = json!(u64::MAX);
    assert!(matches!(
        parse(doc),
        Err(ParseError::AccessorOutOfBounds { .. })
    ));
}

#[test]
fn huge_view_less_accessor_is_out_of_bounds() {
    let description = json!({
        "asset": {"version": "2.0"},
        "accessors": [{"componentType": 5126, "count": u64::MAX, "type": "VEC3"}]
    });
    let bytes = common::glb(&description, &[]);
    assert!(matches!(
        resources::parse(&bytes),
        Err(ParseError::AccessorOutOfBounds {
            accessor: 0,
            available: 0,
            ..
        })
    ));

    let mut session = EngineSession::new(HeadlessBackend::new(64, 64), ViewerConfig::default());
    let err = session.load_gltf(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessorOutOfBounds);
}

#[test]
fn small_view_less_accessor_reads_as_zeros() {
    let mut doc = single_triangle();
    doc["accessors"]
        .as_array_mut()
        .unwrap()
        .push(json!({"componentType": 5126, "count": 3, "type": "VEC3"}));
    doc["meshes"][0]["primitives"][0]["attributes"]["NORMAL"] = json!(1);
    let tables = parse(doc).unwrap();
    let data = tables.meshes[0].primitives[0].data.as_ref().unwrap();
    assert!(data.vertices.iter().all(|v| v.normal == [0.0; 3]));
}

#[test]
fn view_past_buffer_is_out_of_bounds() {
    let mut doc = single_triangle();
    doc["bufferViews"][0]["byteOffset"] = json!(4);
    assert_eq!(
        parse(doc),
        Err(ParseError::BufferViewOutOfBounds {
            view: 0,
            required: 40,
            available: 36
        })
    );
}

#[test]
fn missing_position_is_reported() {
    let mut doc = single_triangle();
    doc["meshes"][0]["primitives"][0]["attributes"] = json!({"NORMAL": 0});
    assert_eq!(
        parse(doc),
        Err(ParseError::MissingPositions {
            mesh: 0,
            primitive: 0
        })
    );
}

#[test]
fn buffer_without_chunk_is_dangling() {
    let bytes = common::glb(&single_triangle(), &[]);
    assert_eq!(
        resources::parse(&bytes),
        Err(ParseError::DanglingReference {
            table: Table::Buffers,
            index: 0
        })
    );
}

#[test]
fn embedded_data_uri_buffer_is_decoded() {
    let encoded = base64::engine::general_purpose::STANDARD.encode(common::triangle_bin());
    let mut doc = single_triangle();
    doc["buffers"][0]["uri"] = json!(format!("data:application/octet-stream;base64,{encoded}"));
    let tables = resources::parse(&common::glb(&doc, &[])).unwrap();
    assert_eq!(tables.buffers[0].data, common::triangle_bin());
    let data = tables.meshes[0].primitives[0].data.as_ref().unwrap();
    assert_eq!(data.vertices[2].position, [0.0, 1.0, 0.0]);
}

#[test]
fn external_buffer_is_malformed() {
    let mut doc = single_triangle();
    doc["buffers"][0]["uri"] = json!("triangle.bin");
    assert!(matches!(
        parse(doc),
        Err(ParseError::MalformedContainer { .. })
    ));
}

#[test]
fn rejects_cycles_and_shared_children() {
    let cycle = common::triangle(
        json!([{"children": [1]}, {"children": [2]}, {"children": [0]}]),
        json!([{"nodes": []}]),
    );
    assert!(matches!(
        parse(cycle),
        Err(ParseError::InvalidHierarchy { .. })
    ));

    let shared = common::triangle(
        json!([{"children": [2]}, {"children": [2]}, {}]),
        json!([{"nodes": [0, 1]}]),
    );
    assert_eq!(
        parse(shared),
        Err(ParseError::InvalidHierarchy {
            node: 2,
            reason: "node has more than one parent"
        })
    );

    let self_child = common::triangle(json!([{"children": [0]}]), json!([{"nodes": []}]));
    assert!(matches!(
        parse(self_child),
        Err(ParseError::InvalidHierarchy { node: 0, .. })
    ));
}

#[test]
fn scene_root_with_parent_is_invalid() {
    let doc = common::triangle(json!([{"children": [1]}, {"mesh": 0}]), json!([{"nodes": [1]}]));
    assert_eq!(
        parse(doc),
        Err(ParseError::InvalidHierarchy {
            node: 1,
            reason: "scene root has a parent"
        })
    );
}

#[test]
fn default_scene_out_of_range_is_dangling() {
    let mut doc = single_triangle();
    doc["scene"] = json!(2);
    assert_eq!(
        parse(doc),
        Err(ParseError::DanglingReference {
            table: Table::Scenes,
            index: 2
        })
    );
}

#[test]
fn rejects_unsupported_versions_and_extensions() {
    let mut doc = single_triangle();
    doc["asset"]["version"] = json!("1.0");
    assert!(matches!(
        parse(doc),
        Err(ParseError::MalformedContainer { .. })
    ));

    let mut doc = single_triangle();
    doc["extensionsRequired"] = json!(["KHR_draco_mesh_compression"]);
    assert!(matches!(
        parse(doc),
        Err(ParseError::MalformedContainer { .. })
    ));
}

#[test]
fn integer_positions_are_unsupported() {
    let mut doc = single_triangle();
    doc["accessors"][0]["componentType"] = json!(5125);
    assert!(matches!(
        parse(doc),
        Err(ParseError::UnsupportedAccessor { accessor: 0, .. })
    ));
}

#[test]
fn strips_are_unrolled_and_lines_are_not_decoded() {
    let mut doc = single_triangle();
    doc["meshes"][0]["primitives"][0]["mode"] = json!(5);
    let tables = parse(doc).unwrap();
    assert_eq!(tables.meshes[0].primitives[0].data.as_ref().unwrap().indices, vec![0, 1, 2]);

    let mut doc = single_triangle();
    doc["meshes"][0]["primitives"][0]["mode"] = json!(1);
    let tables = parse(doc).unwrap();
    assert_eq!(tables.meshes[0].primitives[0].mode, Mode::Lines);
    assert_eq!(tables.meshes[0].primitives[0].data, None);
}

#[test]
fn matrix_nodes_keep_column_major_order() {
    let doc = common::triangle(
        json!([{"mesh": 0, "matrix": [1,0,0,0, 0,1,0,0, 0,0,1,0, 5,6,7,1]}]),
        json!([{"nodes": [0]}]),
    );
    let tables = parse(doc).unwrap();
    let LocalTransform::Matrix(m) = tables.nodes[0].transform else {
        panic!("expected a matrix transform");
    };
    assert_eq!(m.w.truncate(), Vector3::new(5.0, 6.0, 7.0));
}

#[test]
fn arbitrary_bytes_never_panic() {
    let cube = common::unit_cube();
    let mut session = EngineSession::new(HeadlessBackend::new(64, 64), ViewerConfig::default());
    session.load_gltf(&cube).unwrap();
    let mut state = 0x2545_f491_u32;
    for round in 0..256 {
        let mut bytes = cube.clone();
        for _ in 0..(round % 8 + 1) {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let at = state as usize % bytes.len();
            bytes[at] = (state >> 24) as u8;
        }
        let _ = resources::parse(&bytes);
        let _ = session.load_gltf(&bytes);
    }
    assert!(session.is_running());
    assert!(session.tick().is_ok());
}
