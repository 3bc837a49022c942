//! wgpu plumbing behind [`crate::engine::RenderTarget`].
//!
//! - `context` owns the instance, device and either a window surface or an
//!   offscreen texture, and rebuilds them on resize.
//! - `geometry` uploads the six-vertex quad.
//! - `palette` turns an encoded palette image into the sampled texture.
//! - `pipeline` links the adapted program inside a validation scope.
//! - `state` glues everything together as [`GpuState`].

mod context;
mod geometry;
mod palette;
mod pipeline;
mod state;

pub use geometry::{QUAD_VERTEX_COUNT, QUAD_VERTICES};
pub use state::{GpuState, CLEAR_COLOR};
