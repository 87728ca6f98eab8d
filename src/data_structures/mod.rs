//! Engine data structures: asset tables, vertex data, transforms and scene graphs.
//!
//! - `tables` holds the flat asset tables decoded from a container
//! - `mesh` contains CPU-side vertex data and the vertex layout
//! - `instance` holds local transforms and per-draw GPU data
//! - `bounds` computes bounding spheres for camera framing
//! - `scene_graph` builds renderable scenes from asset tables
//! - `texture` wraps the depth attachment

pub mod bounds;
pub mod instance;
pub mod mesh;
pub mod scene_graph;
pub mod tables;
pub mod texture;
