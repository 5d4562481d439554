//! GPU side of the renderer
//!
//! Programs are drawn offscreen through wgpu, into three visual layers
//! (edges, nodes, hovered nodes) and two picking layers (nodes, edges).
//! Picking layers store item fingerprints instead of colors, downsized by
//! the picking ratio, and are read back one texel at a time.
//!
//! The renderer only depends on the [`RenderBackend`] trait, so label
//! computation and interaction logic run without a GPU on [`NullBackend`].

mod backend;
mod picking;
pub mod shaders;
mod types;

pub use backend::{Layer, NullBackend, PickingLayer, RenderBackend, WgpuBackend, request_device};
pub use picking::{PickingSurface, texture_extent};
pub use types::ProgramUniforms;
