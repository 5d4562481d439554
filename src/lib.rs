//! graphview - GPU rendering of large 2D graphs.
//!
//! A [`Renderer`] reads an attributed [`Graph`], normalizes its layout into
//! a unit square, and draws nodes, edges and a hover overlay through a
//! [`RenderBackend`] (wgpu offscreen, or nothing at all for headless use).
//! Picking layers map pixels back to entities, a [`Camera`] drives the view,
//! captors turn mouse and touch input into camera moves, and a label grid
//! decides which labels fit on screen.

pub mod camera;
pub mod captors;
pub mod color;
pub mod error;
pub mod events;
pub mod gpu;
pub mod graph;
pub mod labels;
pub mod programs;
pub mod renderer;
pub mod scheduler;
pub mod settings;
pub mod transform;

pub use camera::{Camera, CameraState, PartialCameraState};
pub use error::{EntityKind, GraphError, RendererError, RendererResult};
pub use events::{PointerAction, PointerPayload, RendererEvent};
pub use gpu::{NullBackend, RenderBackend, WgpuBackend};
pub use graph::{Graph, GraphData, SharedGraph};
pub use renderer::{FrameOutput, RefreshOptions, Renderer, TransformOverride};
pub use settings::Settings;
pub use transform::{Coordinates, Dimensions, Extent};
