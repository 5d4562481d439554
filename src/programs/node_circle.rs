//! Nodes as anti-aliased discs
//!
//! Each node is one instance of a triangle large enough to contain the
//! disc; the fragment stage cuts the circle out of it.

use super::{ItemData, ProgramAttribute, ProgramDefinition, ProgramKind};
use crate::gpu::shaders::NODE_CIRCLE_SHADER;

const ATTRIBUTES: [ProgramAttribute; 4] = [
    ProgramAttribute::float("position", 2),
    ProgramAttribute::float("size", 1),
    ProgramAttribute::packed_color("color"),
    ProgramAttribute::packed_color("id"),
];

const CONSTANT_ATTRIBUTES: [ProgramAttribute; 1] = [ProgramAttribute::float("angle", 1)];

/// Triangle corner angles, 120 degrees apart
const ANGLES: [f32; 3] = [0.0, 2.094_395_1, 4.188_790_2];

pub static NODE_CIRCLE: ProgramDefinition = ProgramDefinition {
    kind: ProgramKind::NodeCircle,
    label: "node circle",
    vertices_per_item: 3,
    attributes: &ATTRIBUTES,
    constant_attributes: &CONSTANT_ATTRIBUTES,
    constant_data: &ANGLES,
    shader: NODE_CIRCLE_SHADER,
    encode,
};

fn encode(item: &ItemData<'_>, color: f32, id: f32, out: &mut [f32]) {
    let ItemData::Node(node) = item else {
        return;
    };
    out[0] = node.position.x as f32;
    out[1] = node.position.y as f32;
    out[2] = node.data.size as f32;
    out[3] = color;
    out[4] = id;
}
