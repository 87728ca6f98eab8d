use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use glb_viewer::{
    data_structures::{mesh::MeshPrimitive, scene_graph::SceneBuilder},
    error::UploadError,
    render::{MeshUploader, SceneSlot},
    resources,
};

mod common;

/// Tags every mesh with the load it belongs to.
struct Tagger(u32);

impl MeshUploader for Tagger {
    type Mesh = u32;

    fn upload_mesh(&mut self, _: &MeshPrimitive) -> Result<u32, UploadError> {
        Ok(self.0)
    }
}

#[test]
fn readers_never_see_a_mixed_scene() {
    let one = resources::parse(&common::unit_cube()).unwrap();
    let two = resources::parse(&common::two_instances()).unwrap();
    let builder = SceneBuilder::default();

    let slot: SceneSlot<u32> = SceneSlot::new();
    let _ = slot.swap(Arc::new(builder.build(&one, &mut Tagger(1)).unwrap()));
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let slot = slot.clone();
            let done = &done;
            scope.spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    let scene = slot.current().unwrap();
                    let expected_draws = match scene.meshes()[0] {
                        1 => 1,
                        2 => 2,
                        other => panic!("unknown tag {other}"),
                    };
                    assert_eq!(scene.draw_list().len(), expected_draws);
                    for draw in scene.draw_list() {
                        assert_eq!(scene.mesh(draw.mesh), Some(&scene.meshes()[0]));
                    }
                }
            });
        }

        for round in 0..2_000 {
            let scene = if round % 2 == 0 {
                builder.build(&two, &mut Tagger(2)).unwrap()
            } else {
                builder.build(&one, &mut Tagger(1)).unwrap()
            };
            drop(slot.swap(Arc::new(scene)));
        }
        done.store(true, Ordering::Relaxed);
    });
}
