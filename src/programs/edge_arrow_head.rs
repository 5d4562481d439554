//! Arrow heads drawn at the target end of an edge
//!
//! One instance per edge. The vertex stage moves the tip back to the
//! border of the target node, so the node radius travels with the instance.

use super::{ItemData, ProgramAttribute, ProgramDefinition, ProgramKind};
use crate::gpu::shaders::EDGE_ARROW_HEAD_SHADER;

const ATTRIBUTES: [ProgramAttribute; 5] = [
    ProgramAttribute::float("position", 2),
    ProgramAttribute::float("direction", 2),
    ProgramAttribute::float("radius", 1),
    ProgramAttribute::packed_color("color"),
    ProgramAttribute::packed_color("id"),
];

const CONSTANT_ATTRIBUTES: [ProgramAttribute; 1] = [ProgramAttribute::float("barycentric", 3)];

#[rustfmt::skip]
const BARYCENTRIC: [f32; 9] = [
    1.0, 0.0, 0.0,
    0.0, 1.0, 0.0,
    0.0, 0.0, 1.0,
];

pub static EDGE_ARROW_HEAD: ProgramDefinition = ProgramDefinition {
    kind: ProgramKind::EdgeArrowHead,
    label: "edge arrow head",
    vertices_per_item: 3,
    attributes: &ATTRIBUTES,
    constant_attributes: &CONSTANT_ATTRIBUTES,
    constant_data: &BARYCENTRIC,
    shader: EDGE_ARROW_HEAD_SHADER,
    encode,
};

fn encode(item: &ItemData<'_>, color: f32, id: f32, out: &mut [f32]) {
    let ItemData::Edge(edge) = item else {
        return;
    };
    let (source, target) = (edge.source, edge.target);
    let dx = target.position.x - source.position.x;
    let dy = target.position.y - source.position.y;
    let length = dx.hypot(dy);
    let (ux, uy) = if length == 0.0 {
        (0.0, 0.0)
    } else {
        (dx / length * edge.data.size, dy / length * edge.data.size)
    };
    out.copy_from_slice(&[
        target.position.x as f32,
        target.position.y as f32,
        ux as f32,
        uy as f32,
        target.data.size as f32,
        color,
        id,
    ]);
}
