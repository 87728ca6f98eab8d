use approx::assert_relative_eq;
use cgmath::{Matrix4, Point3, SquareMatrix, Transform};
use glb_viewer::{
    config::BuildConfig,
    data_structures::scene_graph::SceneBuilder,
    error::{BuildError, ErrorKind},
    render::{Renderer, headless::HeadlessBackend},
    resources,
};

mod common;

fn renderer() -> Renderer<HeadlessBackend> {
    Renderer::new(HeadlessBackend::new(640, 480), wgpu::Color::BLACK)
}

#[test]
fn unit_cube_builds_one_identity_draw() {
    let tables = resources::parse(&common::unit_cube()).unwrap();
    let mut renderer = renderer();
    let scene = SceneBuilder::default().build(&tables, &mut renderer).unwrap();

    assert_eq!(scene.draw_list().len(), 1);
    assert_eq!(scene.draw_list()[0].world, Matrix4::identity());
    let bounds = scene.bounds();
    assert_relative_eq!(bounds.center, Point3::new(0.0, 0.0, 0.0));
    assert_relative_eq!(bounds.radius, 0.75f32.sqrt(), epsilon = 1e-6);
}

#[test]
fn bounding_sphere_contains_every_world_vertex() {
    let tables = resources::parse(&common::two_instances()).unwrap();
    let mut renderer = renderer();
    let scene = SceneBuilder::default().build(&tables, &mut renderer).unwrap();

    assert_eq!(scene.draw_list().len(), 2);
    let bounds = scene.bounds();
    for draw in scene.draw_list() {
        for p in common::CUBE_POSITIONS {
            let world = draw.world.transform_point(Point3::from(p));
            assert!(bounds.contains(world, 1e-4), "{world:?} outside {bounds:?}");
        }
    }
}

#[test]
fn shared_mesh_is_uploaded_once() {
    let tables = resources::parse(&common::two_instances()).unwrap();
    let mut renderer = renderer();
    let scene = SceneBuilder::default().build(&tables, &mut renderer).unwrap();
    assert_eq!(scene.meshes().len(), 1);
    assert_eq!(renderer.backend().uploads(), 1);
}

#[test]
fn children_inherit_parent_transforms() {
    let tables = resources::parse(&common::chain(4)).unwrap();
    let mut renderer = renderer();
    let scene = SceneBuilder::default().build(&tables, &mut renderer).unwrap();
    let origin = scene.draw_list()[0].world.transform_point(Point3::new(0.0, 0.0, 0.0));
    assert_relative_eq!(origin, Point3::new(0.0, 3.0, 0.0), epsilon = 1e-5);
}

#[test]
fn hierarchy_limit_is_inclusive() {
    let tables = resources::parse(&common::chain(5)).unwrap();
    let builder = SceneBuilder::new(BuildConfig::default().with_max_depth(5));
    assert!(builder.build(&tables, &mut renderer()).is_ok());

    let builder = SceneBuilder::new(BuildConfig::default().with_max_depth(4));
    let err = builder.build(&tables, &mut renderer()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HierarchyTooDeep);
    assert!(matches!(err, BuildError::HierarchyTooDeep { node: 4, limit: 4 }));
}

#[test]
fn deep_chain_does_not_exhaust_the_stack() {
    let tables = resources::parse(&common::chain(20_000)).unwrap();
    let builder = SceneBuilder::new(BuildConfig::default().with_max_depth(usize::MAX));
    let scene = builder.build(&tables, &mut renderer()).unwrap();
    assert_eq!(scene.nodes().len(), 20_000);
}
