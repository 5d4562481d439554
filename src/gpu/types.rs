//! GPU buffer types shared by every program
//!
//! Uploaded as-is, so the layout must match the WGSL `Uniforms` struct:
//! a `mat3x3<f32>` takes three 16-byte columns.

use bytemuck::{Pod, Zeroable};

use crate::programs::RenderParams;

/// Per-frame uniforms, bound at group 0, binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ProgramUniforms {
    /// Framed graph to clip space, column-major, each column padded
    pub view: [[f32; 4]; 3],
    pub size_ratio: f32,
    pub zoom_ratio: f32,
    pub correction_ratio: f32,
    pub pixel_ratio: f32,
    pub min_edge_thickness: f32,
    pub feather: f32,
    pub arrow_head_length_ratio: f32,
    pub arrow_head_wideness_ratio: f32,
}

impl From<&RenderParams> for ProgramUniforms {
    fn from(params: &RenderParams) -> Self {
        let m = params.matrix.map(|value| value as f32);
        Self {
            view: [
                [m[0], m[1], m[2], 0.0],
                [m[3], m[4], m[5], 0.0],
                [m[6], m[7], m[8], 0.0],
            ],
            size_ratio: params.size_ratio as f32,
            zoom_ratio: params.zoom_ratio as f32,
            correction_ratio: params.correction_ratio as f32,
            pixel_ratio: params.pixel_ratio as f32,
            min_edge_thickness: params.min_edge_thickness as f32,
            feather: params.anti_aliasing_feather as f32,
            arrow_head_length_ratio: params.arrow_head_length_ratio as f32,
            arrow_head_wideness_ratio: params.arrow_head_wideness_ratio as f32,
        }
    }
}
