//! Edges as thick quads
//!
//! Every edge writes six vertices (two triangles). Each vertex carries both
//! extremities plus two coefficients: one picks the extremity, the other
//! the side of the line the vertex is pushed towards.

use super::{ItemData, ProgramAttribute, ProgramDefinition, ProgramKind};
use crate::gpu::shaders::EDGE_LINE_SHADER;

const ATTRIBUTES: [ProgramAttribute; 7] = [
    ProgramAttribute::float("start", 2),
    ProgramAttribute::float("end", 2),
    ProgramAttribute::float("normal", 2),
    ProgramAttribute::float("positionCoef", 1),
    ProgramAttribute::float("normalCoef", 1),
    ProgramAttribute::packed_color("color"),
    ProgramAttribute::packed_color("id"),
];

/// `(position, normal)` coefficients of the six quad vertices
const CORNERS: [(f32, f32); 6] = [
    (0.0, 1.0),
    (0.0, -1.0),
    (1.0, 1.0),
    (1.0, 1.0),
    (0.0, -1.0),
    (1.0, -1.0),
];

pub static EDGE_LINE: ProgramDefinition = ProgramDefinition {
    kind: ProgramKind::EdgeLine,
    label: "edge line",
    vertices_per_item: 6,
    attributes: &ATTRIBUTES,
    constant_attributes: &[],
    constant_data: &[],
    shader: EDGE_LINE_SHADER,
    encode,
};

/// Normal of the segment, scaled to the edge thickness. Zero for
/// degenerate segments.
pub(super) fn scaled_normal(dx: f64, dy: f64, thickness: f64) -> (f32, f32) {
    let length = dx.hypot(dy);
    if length == 0.0 {
        return (0.0, 0.0);
    }
    ((-dy / length * thickness) as f32, (dx / length * thickness) as f32)
}

fn encode(item: &ItemData<'_>, color: f32, id: f32, out: &mut [f32]) {
    let ItemData::Edge(edge) = item else {
        return;
    };
    let (source, target) = (edge.source, edge.target);
    let (x1, y1) = (source.position.x, source.position.y);
    let (x2, y2) = (target.position.x, target.position.y);
    let (nx, ny) = scaled_normal(x2 - x1, y2 - y1, edge.data.size);

    for (vertex, (position_coef, normal_coef)) in out.chunks_exact_mut(10).zip(CORNERS) {
        vertex.copy_from_slice(&[
            x1 as f32,
            y1 as f32,
            x2 as f32,
            y2 as f32,
            nx,
            ny,
            position_coef,
            normal_coef,
            color,
            id,
        ]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_is_perpendicular_and_scaled() {
        let (nx, ny) = scaled_normal(3.0, 0.0, 2.0);
        assert_eq!((nx, ny), (0.0, 2.0));
        let (nx, ny) = scaled_normal(0.0, 4.0, 1.0);
        assert_eq!((nx, ny), (-1.0, 0.0));
        assert_eq!(scaled_normal(0.0, 0.0, 5.0), (0.0, 0.0));
    }
}
