//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::HashMap;

use graphview::color::index_to_color;
use graphview::error::RendererResult;
use graphview::gpu::{Layer, PickingLayer, RenderBackend};
use graphview::graph::{Graph, SharedGraph, attributes};
use graphview::programs::{ProgramBuffer, ProgramDefinition, ProgramKind, RenderParams};
use graphview::{Dimensions, Renderer, Settings};
use serde_json::json;

/// One visual layer draw
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub layer: Layer,
    pub programs: Vec<ProgramKind>,
    /// Content of every buffer, in draw order
    pub data: Vec<Vec<f32>>,
    pub params: RenderParams,
}

/// Backend that records draws and answers picking reads from a table
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub registered: Vec<ProgramKind>,
    pub draws: Vec<DrawCall>,
    pub picking_draws: usize,
    pub resizes: Vec<Dimensions>,
    /// Fingerprint answered for each picking layer, anywhere on screen
    pub picks: HashMap<PickingLayer, u32>,
}

impl RecordingBackend {
    /// Make every picking read on `layer` return `fingerprint`
    pub fn pick(&mut self, layer: PickingLayer, fingerprint: u32) {
        self.picks.insert(layer, fingerprint);
    }

    pub fn clear_picks(&mut self) {
        self.picks.clear();
    }

    /// Last draw of a layer
    pub fn last_draw(&self, layer: Layer) -> Option<&DrawCall> {
        self.draws.iter().rev().find(|draw| draw.layer == layer)
    }
}

impl RenderBackend for RecordingBackend {
    fn resize(
        &mut self,
        dimensions: Dimensions,
        _pixel_ratio: f64,
        _downsizing_ratio: f64,
    ) -> RendererResult<()> {
        self.resizes.push(dimensions);
        Ok(())
    }

    fn register_program(&mut self, definition: &'static ProgramDefinition) -> RendererResult<()> {
        if !self.registered.contains(&definition.kind) {
            self.registered.push(definition.kind);
        }
        Ok(())
    }

    fn draw_layer(
        &mut self,
        layer: Layer,
        buffers: &[&ProgramBuffer],
        params: &RenderParams,
    ) -> RendererResult<()> {
        self.draws.push(DrawCall {
            layer,
            programs: buffers.iter().map(|buffer| buffer.kind()).collect(),
            data: buffers
                .iter()
                .map(|buffer| buffer.data().to_vec())
                .collect(),
            params: *params,
        });
        Ok(())
    }

    fn draw_picking(
        &mut self,
        _layer: PickingLayer,
        _buffers: &[&ProgramBuffer],
        _params: &RenderParams,
    ) -> RendererResult<()> {
        self.picking_draws += 1;
        Ok(())
    }

    fn read_picking_pixel(
        &mut self,
        layer: PickingLayer,
        _position: graphview::Coordinates,
    ) -> RendererResult<Option<[u8; 4]>> {
        Ok(Some(match self.picks.get(&layer) {
            Some(fingerprint) => index_to_color(*fingerprint),
            None => [0, 0, 0, 0],
        }))
    }
}

/// Graph of nodes at the given positions, each labelled with its key
pub fn labelled_graph(nodes: &[(&str, f64, f64)]) -> Graph {
    let mut graph = Graph::new();
    for (key, x, y) in nodes {
        graph
            .add_node(
                key,
                attributes([
                    ("x", json!(x)),
                    ("y", json!(y)),
                    ("size", json!(10)),
                    ("label", json!(key.to_uppercase())),
                ]),
            )
            .unwrap();
    }
    graph
}

pub fn viewport() -> Dimensions {
    Dimensions::new(800.0, 600.0)
}

pub fn recording_renderer(graph: SharedGraph, settings: Settings) -> Renderer<RecordingBackend> {
    Renderer::new(graph, viewport(), RecordingBackend::default(), settings).unwrap()
}
