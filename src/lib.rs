//! glb-viewer
//!
//! A small binary glTF viewer engine for native and WASM targets. A loaded
//! `.glb` container is parsed into flat asset tables, built into a renderable
//! scene graph and handed to the render loop in one atomic swap, so a frame
//! never shows half of two models. An orbit camera frames whatever was loaded.
//!
//! High-level modules
//! - `resources`: binary container parsing into [`data_structures::tables::AssetTables`]
//! - `data_structures`: asset tables, meshes, bounds and the scene graph builder
//! - `camera`: orbit camera controller, state and GPU uniforms
//! - `render`: the frame loop, the scene slot and the backend seam
//! - `context`: the wgpu backend that owns device, queue and surface
//! - `pipelines`: the mesh pipeline and its shader
//! - `session` / `bridge`: the host-facing `init`, `run_viewer` and `load_gltf`
//! - `flow` (native) and `web` (wasm32): platform hosts driving the bridge
//!

pub mod bridge;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
#[cfg(not(target_arch = "wasm32"))]
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod session;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use bridge::{Bridge, SurfaceHost};
pub use error::{ErrorKind, LoadError};
pub use session::{EngineSession, LoadReport};
