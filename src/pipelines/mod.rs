//! Render pipelines used by the wgpu backend.
//!
//! - `basic` builds the single mesh pipeline (vertex + instance buffers, depth test)

pub mod basic;
