//! GPU program definitions and their CPU-side vertex buffers
//!
//! A program pairs a WGSL shader with a fixed vertex layout. Each drawn item
//! (node or edge) owns one slot in a [`ProgramBuffer`]; the slot is rewritten
//! in place when the item changes and zeroed when it is hidden.
//!
//! Programs come in two shapes:
//!
//! - **per-vertex**: every item writes `vertices_per_item` full vertices
//! - **instanced**: every item writes one instance, combined with a small
//!   constant template mesh shared by all instances
//!
//! Colors and picking fingerprints occupy a single `f32` slot each. The
//! slot holds four bytes that the GPU reads as normalized RGBA.

mod edge_arrow_head;
mod edge_line;
mod node_circle;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::renderer::{EdgeDisplayData, NodeDisplayData};
use crate::transform::{Coordinates, Matrix};

pub use edge_arrow_head::EDGE_ARROW_HEAD;
pub use edge_line::EDGE_LINE;
pub use node_circle::NODE_CIRCLE;

/// Built-in programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProgramKind {
    NodeCircle,
    EdgeLine,
    EdgeArrowHead,
}

impl ProgramKind {
    pub fn definition(self) -> &'static ProgramDefinition {
        match self {
            ProgramKind::NodeCircle => &NODE_CIRCLE,
            ProgramKind::EdgeLine => &EDGE_LINE,
            ProgramKind::EdgeArrowHead => &EDGE_ARROW_HEAD,
        }
    }
}

/// Node program classes available to settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeProgramType {
    Circle,
}

impl NodeProgramType {
    pub fn programs(self) -> &'static [ProgramKind] {
        match self {
            NodeProgramType::Circle => &[ProgramKind::NodeCircle],
        }
    }
}

/// Edge program classes available to settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeProgramType {
    Line,
    /// A line with an arrow head on the target side
    Arrow,
}

impl EdgeProgramType {
    pub fn programs(self) -> &'static [ProgramKind] {
        match self {
            EdgeProgramType::Line => &[ProgramKind::EdgeLine],
            EdgeProgramType::Arrow => &[ProgramKind::EdgeLine, ProgramKind::EdgeArrowHead],
        }
    }
}

// ===== Definitions =====

/// How an attribute is stored in its float slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    /// `size` consecutive 32-bit floats
    Float,
    /// One 32-bit slot holding four normalized bytes
    PackedColor,
}

/// One named vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAttribute {
    pub name: &'static str,
    pub size: usize,
    pub kind: AttributeType,
}

impl ProgramAttribute {
    pub const fn float(name: &'static str, size: usize) -> Self {
        Self {
            name,
            size,
            kind: AttributeType::Float,
        }
    }

    pub const fn packed_color(name: &'static str) -> Self {
        Self {
            name,
            size: 4,
            kind: AttributeType::PackedColor,
        }
    }

    /// Float slots taken by this attribute
    pub fn items(&self) -> usize {
        match self.kind {
            AttributeType::Float => self.size,
            AttributeType::PackedColor => 1,
        }
    }
}

/// A node with its framed graph position
#[derive(Debug, Clone, Copy)]
pub struct NodeItem<'a> {
    pub data: &'a NodeDisplayData,
    pub position: Coordinates,
}

impl<'a> NodeItem<'a> {
    pub fn new(data: &'a NodeDisplayData, position: Coordinates) -> Self {
        Self { data, position }
    }
}

/// An edge with both of its extremities
#[derive(Debug, Clone, Copy)]
pub struct EdgeItem<'a> {
    pub data: &'a EdgeDisplayData,
    pub source: NodeItem<'a>,
    pub target: NodeItem<'a>,
}

/// What a program encodes into one slot
#[derive(Debug, Clone, Copy)]
pub enum ItemData<'a> {
    Node(NodeItem<'a>),
    Edge(EdgeItem<'a>),
}

impl ItemData<'_> {
    /// Hidden items, and edges touching a hidden node, are not drawn
    pub fn is_hidden(&self) -> bool {
        match self {
            ItemData::Node(node) => node.data.hidden,
            ItemData::Edge(edge) => {
                edge.data.hidden || edge.source.data.hidden || edge.target.data.hidden
            }
        }
    }
}

/// Writes one item into its slot. `color` and `id` are already packed.
pub type Encoder = fn(item: &ItemData<'_>, color: f32, id: f32, out: &mut [f32]);

/// Static description of a GPU program
#[derive(Debug)]
pub struct ProgramDefinition {
    pub kind: ProgramKind,
    pub label: &'static str,
    /// Vertices drawn per item (per instance for instanced programs)
    pub vertices_per_item: usize,
    pub attributes: &'static [ProgramAttribute],
    /// Template attributes; non-empty means the program is instanced
    pub constant_attributes: &'static [ProgramAttribute],
    /// Template mesh, `vertices_per_item` vertices of constant attributes
    pub constant_data: &'static [f32],
    /// WGSL source, without the picking switch
    pub shader: &'static str,
    pub encode: Encoder,
}

impl ProgramDefinition {
    pub fn is_instanced(&self) -> bool {
        !self.constant_attributes.is_empty()
    }

    /// Float slots per vertex, or per instance
    pub fn attribute_items(&self) -> usize {
        self.attributes.iter().map(ProgramAttribute::items).sum()
    }

    /// Float slots per template vertex
    pub fn constant_items(&self) -> usize {
        self.constant_attributes
            .iter()
            .map(ProgramAttribute::items)
            .sum()
    }

    /// Float slots per item in the CPU array
    pub fn stride(&self) -> usize {
        if self.is_instanced() {
            self.attribute_items()
        } else {
            self.vertices_per_item * self.attribute_items()
        }
    }
}

// ===== Buffers =====

/// CPU-side vertex array of one program, with one slot per item
#[derive(Debug, Clone)]
pub struct ProgramBuffer {
    definition: &'static ProgramDefinition,
    array: Vec<f32>,
    capacity: usize,
    reallocations: u64,
}

impl ProgramBuffer {
    pub fn new(kind: ProgramKind) -> Self {
        Self {
            definition: kind.definition(),
            array: Vec::new(),
            capacity: 0,
            reallocations: 0,
        }
    }

    pub fn definition(&self) -> &'static ProgramDefinition {
        self.definition
    }

    pub fn kind(&self) -> ProgramKind {
        self.definition.kind
    }

    /// Number of item slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resize to `capacity` slots, zeroing them. Does nothing when the
    /// capacity is unchanged, so slots keep their content.
    pub fn reallocate(&mut self, capacity: usize) {
        if capacity == self.capacity {
            return;
        }
        self.capacity = capacity;
        self.array = vec![0.0; capacity * self.definition.stride()];
        self.reallocations += 1;
    }

    /// How many times the array was actually reallocated
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// Encode an item into a slot. Hidden items get a zeroed slot, which
    /// draws nothing.
    pub fn process(&mut self, slot: usize, item: &ItemData<'_>, color: f32, id: f32) {
        let stride = self.definition.stride();
        let start = slot * stride;
        let Some(out) = self.array.get_mut(start..start + stride) else {
            warn!(
                program = self.definition.label,
                slot,
                capacity = self.capacity,
                "slot out of range"
            );
            return;
        };
        if item.is_hidden() {
            out.fill(0.0);
            return;
        }
        (self.definition.encode)(item, color, id, out);
    }

    /// Content of one slot
    pub fn slot(&self, slot: usize) -> Option<&[f32]> {
        let stride = self.definition.stride();
        self.array.get(slot * stride..(slot + 1) * stride)
    }

    pub fn data(&self) -> &[f32] {
        &self.array
    }

    /// `(vertices, instances)` to draw
    pub fn draw_counts(&self) -> (u32, u32) {
        let vertices = self.definition.vertices_per_item as u32;
        if self.definition.is_instanced() {
            (vertices, self.capacity as u32)
        } else {
            (vertices * self.capacity as u32, 1)
        }
    }
}

/// The buffers of every program drawing one node or edge type
#[derive(Debug, Clone)]
pub struct ProgramSet {
    buffers: Vec<ProgramBuffer>,
}

impl ProgramSet {
    pub fn new(kinds: &[ProgramKind]) -> Self {
        Self {
            buffers: kinds.iter().map(|kind| ProgramBuffer::new(*kind)).collect(),
        }
    }

    pub fn reallocate(&mut self, capacity: usize) {
        for buffer in &mut self.buffers {
            buffer.reallocate(capacity);
        }
    }

    pub fn process(&mut self, slot: usize, item: &ItemData<'_>, color: f32, id: f32) {
        for buffer in &mut self.buffers {
            buffer.process(slot, item, color, id);
        }
    }

    pub fn buffers(&self) -> &[ProgramBuffer] {
        &self.buffers
    }

    pub fn capacity(&self) -> usize {
        self.buffers.first().map_or(0, ProgramBuffer::capacity)
    }
}

/// Per-frame inputs shared by every program
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    pub width: f64,
    pub height: f64,
    pub pixel_ratio: f64,
    pub matrix: Matrix,
    pub inverse_matrix: Matrix,
    pub camera_angle: f64,
    /// Camera ratio
    pub zoom_ratio: f64,
    /// Inverse of the on-screen size of a unit-size item
    pub size_ratio: f64,
    pub correction_ratio: f64,
    pub downsizing_ratio: f64,
    pub min_edge_thickness: f64,
    pub anti_aliasing_feather: f64,
    pub arrow_head_length_ratio: f64,
    pub arrow_head_wideness_ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorCodec, index_to_packed, unpack_rgba};

    fn node(x: f64, y: f64, hidden: bool) -> NodeDisplayData {
        NodeDisplayData {
            x,
            y,
            size: 3.0,
            color: "#f00".to_string(),
            label: None,
            node_type: "circle".to_string(),
            hidden,
            highlighted: false,
            force_label: false,
            z_index: 0.0,
        }
    }

    fn edge(hidden: bool) -> EdgeDisplayData {
        EdgeDisplayData {
            size: 2.0,
            color: "#00f".to_string(),
            label: None,
            edge_type: "line".to_string(),
            hidden,
            force_label: false,
            z_index: 0.0,
        }
    }

    #[test]
    fn layouts_have_expected_strides() {
        assert_eq!(NODE_CIRCLE.stride(), 5);
        assert!(NODE_CIRCLE.is_instanced());
        let expected = NODE_CIRCLE.vertices_per_item * NODE_CIRCLE.constant_items();
        assert_eq!(NODE_CIRCLE.constant_data.len(), expected);

        assert_eq!(EDGE_LINE.attribute_items(), 10);
        assert_eq!(EDGE_LINE.stride(), 60);
        assert!(!EDGE_LINE.is_instanced());

        assert_eq!(EDGE_ARROW_HEAD.stride(), 7);
        assert_eq!(
            EDGE_ARROW_HEAD.constant_data.len(),
            EDGE_ARROW_HEAD.vertices_per_item * EDGE_ARROW_HEAD.constant_items()
        );
    }

    #[test]
    fn reallocate_is_idempotent() {
        let mut buffer = ProgramBuffer::new(ProgramKind::NodeCircle);
        buffer.reallocate(4);
        let data = node(0.2, 0.4, false);
        let item = ItemData::Node(NodeItem::new(&data, Coordinates::new(0.2, 0.4)));
        buffer.process(1, &item, 1.0, 2.0);
        let before = buffer.data().to_vec();

        buffer.reallocate(4);
        assert_eq!(buffer.data(), before.as_slice());
        assert_eq!(buffer.reallocations(), 1);

        buffer.reallocate(2);
        assert_eq!(buffer.reallocations(), 2);
        assert!(buffer.data().iter().all(|value| *value == 0.0));
    }

    #[test]
    fn node_slot_layout() {
        let mut buffer = ProgramBuffer::new(ProgramKind::NodeCircle);
        buffer.reallocate(2);
        let codec = ColorCodec::new();
        let data = node(5.0, 5.0, false);
        let item = ItemData::Node(NodeItem::new(&data, Coordinates::new(0.5, 0.25)));
        let id = index_to_packed(7);
        buffer.process(1, &item, codec.packed(&data.color), id);

        let slot = buffer.slot(1).unwrap();
        assert_eq!(&slot[..3], &[0.5, 0.25, 3.0]);
        let color = unpack_rgba(slot[3]);
        assert_eq!((color.r, color.g, color.b), (255, 0, 0));
        assert_eq!(slot[4].to_bits(), id.to_bits());
        assert!(buffer.slot(0).unwrap().iter().all(|v| *v == 0.0));
        assert_eq!(buffer.draw_counts(), (3, 2));
    }

    #[test]
    fn hidden_items_encode_zeros() {
        let mut buffer = ProgramBuffer::new(ProgramKind::EdgeLine);
        buffer.reallocate(1);
        let source = node(0.0, 0.0, false);
        let target = node(1.0, 1.0, false);
        let data = edge(false);
        let visible = ItemData::Edge(EdgeItem {
            data: &data,
            source: NodeItem::new(&source, Coordinates::new(0.0, 0.0)),
            target: NodeItem::new(&target, Coordinates::new(1.0, 1.0)),
        });
        buffer.process(0, &visible, 1.0, 1.0);
        assert!(buffer.slot(0).unwrap().iter().any(|v| *v != 0.0));

        let hidden_target = node(1.0, 1.0, true);
        let hidden = ItemData::Edge(EdgeItem {
            data: &data,
            source: NodeItem::new(&source, Coordinates::new(0.0, 0.0)),
            target: NodeItem::new(&hidden_target, Coordinates::new(1.0, 1.0)),
        });
        buffer.process(0, &hidden, 1.0, 1.0);
        assert!(buffer.slot(0).unwrap().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn out_of_range_slots_are_ignored() {
        let mut buffer = ProgramBuffer::new(ProgramKind::NodeCircle);
        buffer.reallocate(1);
        let data = node(0.0, 0.0, false);
        let item = ItemData::Node(NodeItem::new(&data, Coordinates::new(0.0, 0.0)));
        buffer.process(3, &item, 1.0, 1.0);
        assert!(buffer.data().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn arrow_type_is_compound() {
        let mut set = ProgramSet::new(EdgeProgramType::Arrow.programs());
        set.reallocate(3);
        assert_eq!(set.capacity(), 3);
        let kinds: Vec<ProgramKind> = set.buffers().iter().map(ProgramBuffer::kind).collect();
        assert_eq!(
            kinds,
            vec![ProgramKind::EdgeLine, ProgramKind::EdgeArrowHead]
        );
        assert_eq!(set.buffers()[0].draw_counts(), (18, 1));
        assert_eq!(set.buffers()[1].draw_counts(), (3, 3));
    }
}
