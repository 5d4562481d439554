//! Renderer orchestration
//!
//! The renderer owns everything derived from the graph and alternates
//! between two phases:
//!
//! - **process** rebuilds the caches: node extent, normalization, label
//!   grid, program buffer sizes, slot and fingerprint assignment.
//! - **render** computes the view matrices, draws every layer through the
//!   [`RenderBackend`], refreshes the picking layers and selects labels.
//!
//! Graph mutations are queued by a listener and folded in at the start of
//! the next process or render. Camera updates and graph mutations request a
//! frame through the shared [`FrameScheduler`]; the host drives frames with
//! [`Renderer::frame`].

mod display;
mod frame;
mod interaction;
mod picking_index;

use std::cell::{Ref, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::SQRT_2;
use std::rc::Rc;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::camera::{Camera, CameraState, PanBoundaries};
use crate::captors::{CaptorSettings, MouseCaptor, TouchCaptor};
use crate::color::{ColorCodec, index_to_packed};
use crate::error::{EntityKind, RendererError, RendererResult};
use crate::events::{Emitter, ListenerId, RendererEvent};
use crate::gpu::{Layer, PickingLayer, RenderBackend};
use crate::graph::{Graph, GraphEvent, SharedGraph};
use crate::labels::{LabelGrid, edge_labels_to_display};
use crate::programs::{EdgeItem, ItemData, NodeItem, ProgramBuffer, ProgramSet, RenderParams};
use crate::scheduler::{FrameRequest, FrameScheduler};
use crate::settings::{ItemSizesReference, Settings};
use crate::transform::{
    Coordinates, Dimensions, Extent, Matrix, NormalizationFunction, TransformCache, ViewContext,
    ViewTransform, multiply_vec2,
};

pub use display::{DEFAULT_EDGE_SIZE, DEFAULT_NODE_SIZE, EdgeDisplayData, NodeDisplayData};
pub use frame::{EdgeLabelDraw, FrameOutput, HoverDraw, LabelDraw};
pub use picking_index::PickingIndex;

/// Labels further than this outside the viewport are not drawn
const X_LABEL_MARGIN: f64 = 150.0;
const Y_LABEL_MARGIN: f64 = 50.0;

type Inbox = Rc<RefCell<Vec<GraphEvent>>>;

/// Entities to refresh instead of the whole graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshOptions {
    /// Only re-read these entities. `None` re-reads the whole graph.
    pub partial_graph: Option<PartialGraph>,
    /// Re-encode the entities in their current slots without reprocessing.
    /// Only valid with a partial graph whose layout did not change.
    pub skip_indexation: bool,
    /// Render on the next frame instead of right away
    pub schedule: bool,
}

/// Replaces parts of the current view when converting coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransformOverride {
    pub camera_state: Option<CameraState>,
    pub dimensions: Option<Dimensions>,
    pub graph_dimensions: Option<Dimensions>,
    pub padding: Option<f64>,
    /// Used as is, bypassing the camera. For conversions from the viewport,
    /// this must be the inverse matrix.
    pub matrix: Option<Matrix>,
}

#[derive(Debug, Clone)]
struct CachedNode {
    data: NodeDisplayData,
    /// Position in framed graph space
    framed: Coordinates,
}

impl CachedNode {
    fn item(&self) -> NodeItem<'_> {
        NodeItem::new(&self.data, self.framed)
    }
}

#[derive(Debug, Clone)]
struct CachedEdge {
    data: EdgeDisplayData,
    source: String,
    target: String,
}

/// Program buffers for every declared node and edge type
#[derive(Debug, Default)]
struct Programs {
    nodes: BTreeMap<String, ProgramSet>,
    hover: BTreeMap<String, ProgramSet>,
    edges: BTreeMap<String, ProgramSet>,
}

impl Programs {
    fn from_settings(settings: &Settings) -> Self {
        let nodes = settings
            .node_program_classes
            .iter()
            .map(|(name, program)| (name.clone(), ProgramSet::new(program.programs())))
            .collect();
        let hover = settings
            .node_program_classes
            .keys()
            .chain(settings.node_hover_program_classes.keys())
            .filter_map(|name| {
                let program = settings.node_hover_program(name)?;
                Some((name.clone(), ProgramSet::new(program.programs())))
            })
            .collect();
        let edges = settings
            .edge_program_classes
            .iter()
            .map(|(name, program)| (name.clone(), ProgramSet::new(program.programs())))
            .collect();
        Self {
            nodes,
            hover,
            edges,
        }
    }

    fn register(&self, backend: &mut impl RenderBackend) -> RendererResult<()> {
        let sets = self
            .nodes
            .values()
            .chain(self.hover.values())
            .chain(self.edges.values());
        for set in sets {
            for buffer in set.buffers() {
                backend.register_program(buffer.definition())?;
            }
        }
        Ok(())
    }
}

fn buffers(sets: &BTreeMap<String, ProgramSet>) -> Vec<&ProgramBuffer> {
    sets.values().flat_map(ProgramSet::buffers).collect()
}

fn missing_program(kind: EntityKind, program_type: &str) -> RendererError {
    RendererError::MissingProgram {
        kind,
        program_type: program_type.to_string(),
    }
}

fn check_container(dimensions: Dimensions, settings: &Settings) -> RendererResult<()> {
    let Dimensions { width, height } = dimensions;
    let empty = |side: f64| side.is_nan() || side <= 0.0;
    if (empty(width) || empty(height)) && !settings.allow_invalid_container {
        return Err(RendererError::InvalidContainer { width, height });
    }
    Ok(())
}

fn configure_camera(camera: &mut Camera, settings: &Settings) {
    camera.set_ratio_bounds(settings.min_camera_ratio, settings.max_camera_ratio);
    camera.set_enabled_zooming(settings.enable_camera_zooming);
    camera.set_enabled_panning(settings.enable_camera_panning);
    camera.set_enabled_rotation(settings.enable_camera_rotation);
}

fn subscribe(
    graph: &SharedGraph,
    inbox: &Inbox,
    scheduler: &FrameScheduler,
) -> RendererResult<ListenerId> {
    let mut graph = graph
        .try_borrow_mut()
        .map_err(|_| RendererError::GraphBusy)?;
    let inbox = Rc::clone(inbox);
    let scheduler = scheduler.clone();
    Ok(graph.subscribe(move |event| {
        inbox.borrow_mut().push(event.clone());
        scheduler.schedule_render();
    }))
}

type ResolvedGraph = (BTreeMap<String, NodeDisplayData>, BTreeMap<String, CachedEdge>);

fn borrow_graph(graph: &SharedGraph) -> RendererResult<Ref<'_, Graph>> {
    graph.try_borrow().map_err(|_| RendererError::GraphBusy)
}

/// Display data of an edge, `None` if the graph does not have it
fn resolve_edge_data(graph: &Graph, key: &str, settings: &Settings) -> Option<CachedEdge> {
    let attributes = graph.edge_attributes(key)?;
    let (source, target) = graph.extremities(key)?;
    Some(CachedEdge {
        data: EdgeDisplayData::resolve(key, attributes, settings),
        source: source.to_string(),
        target: target.to_string(),
    })
}

/// Display data of every entity, or the first error
fn resolve_all(graph: &SharedGraph, settings: &Settings) -> RendererResult<ResolvedGraph> {
    let graph = borrow_graph(graph)?;
    let mut nodes = BTreeMap::new();
    for key in graph.nodes() {
        let Some(attributes) = graph.node_attributes(key) else {
            continue;
        };
        let data = NodeDisplayData::resolve(key, attributes, settings)?;
        nodes.insert(key.to_string(), data);
    }
    let edges = graph
        .edges()
        .filter_map(|key| Some((key.to_string(), resolve_edge_data(&graph, key, settings)?)))
        .collect();
    Ok((nodes, edges))
}

/// Stable ascending z-index order
fn z_ordered<'a, T>(
    entries: impl Iterator<Item = (&'a String, &'a T)>,
    z_index: impl Fn(&T) -> f64,
) -> Vec<&'a String>
where
    T: 'a,
{
    let mut entries: Vec<_> = entries.collect();
    entries.sort_by(|(_, a), (_, b)| z_index(a).total_cmp(&z_index(b)));
    entries.into_iter().map(|(key, _)| key).collect()
}

fn encode_node(
    sets: &mut BTreeMap<String, ProgramSet>,
    colors: &ColorCodec,
    node: &CachedNode,
    slot: usize,
    fingerprint: u32,
) -> RendererResult<()> {
    let set = sets
        .get_mut(&node.data.node_type)
        .ok_or_else(|| missing_program(EntityKind::Node, &node.data.node_type))?;
    let item = ItemData::Node(node.item());
    let color = colors.packed(&node.data.color);
    set.process(slot, &item, color, index_to_packed(fingerprint));
    Ok(())
}

fn encode_edge(
    sets: &mut BTreeMap<String, ProgramSet>,
    colors: &ColorCodec,
    nodes: &BTreeMap<String, CachedNode>,
    edge: &CachedEdge,
    slot: usize,
    fingerprint: u32,
) -> RendererResult<()> {
    let set = sets
        .get_mut(&edge.data.edge_type)
        .ok_or_else(|| missing_program(EntityKind::Edge, &edge.data.edge_type))?;
    let item = ItemData::Edge(EdgeItem {
        data: &edge.data,
        source: cached_extremity(nodes, &edge.source)?.item(),
        target: cached_extremity(nodes, &edge.target)?.item(),
    });
    let color = colors.packed(&edge.data.color);
    set.process(slot, &item, color, index_to_packed(fingerprint));
    Ok(())
}

fn cached_extremity<'a>(
    nodes: &'a BTreeMap<String, CachedNode>,
    key: &str,
) -> RendererResult<&'a CachedNode> {
    nodes.get(key).ok_or_else(|| RendererError::UnknownEntity {
        kind: EntityKind::Node,
        key: key.to_string(),
    })
}

/// Draws a graph through a [`RenderBackend`] and turns pointer input into
/// camera moves and entity events
pub struct Renderer<B: RenderBackend> {
    graph: SharedGraph,
    graph_listener: Option<ListenerId>,
    inbox: Inbox,
    settings: Settings,
    backend: B,

    camera: Camera,
    camera_listener: Option<ListenerId>,
    mouse: MouseCaptor,
    touch: TouchCaptor,
    scheduler: FrameScheduler,
    events: Emitter<RendererEvent>,
    colors: ColorCodec,

    dimensions: Dimensions,
    pixel_ratio: f64,

    node_data: BTreeMap<String, CachedNode>,
    edge_data: BTreeMap<String, CachedEdge>,
    node_extent: Extent,
    custom_bbox: Option<Extent>,
    normalization: NormalizationFunction,
    transforms: RefCell<TransformCache>,
    label_grid: LabelGrid,

    nodes_with_forced_labels: BTreeSet<String>,
    edges_with_forced_labels: BTreeSet<String>,
    highlighted_nodes: BTreeSet<String>,
    hovered_node: Option<String>,
    hovered_edge: Option<String>,

    picking: PickingIndex,
    node_slots: BTreeMap<String, usize>,
    edge_slots: BTreeMap<String, usize>,
    programs: Programs,

    need_to_process: bool,
    displayed_node_labels: BTreeSet<String>,
    last_frame: FrameOutput,
    killed: bool,
}

impl<B: RenderBackend> std::fmt::Debug for Renderer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("dimensions", &self.dimensions)
            .field("camera", &self.camera.state())
            .field("nodes", &self.node_data.len())
            .field("edges", &self.edge_data.len())
            .field("killed", &self.killed)
            .finish()
    }
}

impl<B: RenderBackend> Renderer<B> {
    /// Create a renderer and draw the graph once
    pub fn new(
        graph: SharedGraph,
        dimensions: Dimensions,
        backend: B,
        settings: Settings,
    ) -> RendererResult<Self> {
        settings.validate()?;
        check_container(dimensions, &settings)?;

        let scheduler = FrameScheduler::new();
        let mut camera = Camera::new();
        configure_camera(&mut camera, &settings);
        let camera_listener = {
            let scheduler = scheduler.clone();
            camera.on_update(move |_| {
                scheduler.schedule_render();
            })
        };
        let captor_settings = CaptorSettings::from(&settings);

        let mut renderer = Self {
            graph,
            graph_listener: None,
            inbox: Inbox::default(),
            programs: Programs::from_settings(&settings),
            backend,
            camera,
            camera_listener: Some(camera_listener),
            mouse: MouseCaptor::new(captor_settings),
            touch: TouchCaptor::new(captor_settings),
            scheduler,
            events: Emitter::new(),
            colors: ColorCodec::new(),
            dimensions,
            pixel_ratio: 1.0,
            node_data: BTreeMap::new(),
            edge_data: BTreeMap::new(),
            node_extent: Extent::default(),
            custom_bbox: None,
            normalization: NormalizationFunction::default(),
            transforms: RefCell::new(TransformCache::default()),
            label_grid: LabelGrid::new(),
            nodes_with_forced_labels: BTreeSet::new(),
            edges_with_forced_labels: BTreeSet::new(),
            highlighted_nodes: BTreeSet::new(),
            hovered_node: None,
            hovered_edge: None,
            picking: PickingIndex::new(),
            node_slots: BTreeMap::new(),
            edge_slots: BTreeMap::new(),
            need_to_process: true,
            displayed_node_labels: BTreeSet::new(),
            last_frame: FrameOutput::default(),
            killed: false,
            settings,
        };

        let downsizing = renderer.settings.picking_down_sizing_ratio;
        renderer
            .backend
            .resize(dimensions, renderer.pixel_ratio, downsizing)?;
        renderer.programs.register(&mut renderer.backend)?;
        let listener = subscribe(&renderer.graph, &renderer.inbox, &renderer.scheduler)?;
        renderer.graph_listener = Some(listener);
        renderer.refresh(RefreshOptions::default())?;
        Ok(renderer)
    }

    fn ensure_alive(&self) -> RendererResult<()> {
        if self.killed {
            return Err(RendererError::Killed);
        }
        Ok(())
    }

    // ===== Accessors =====

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Camera updates made through this handle schedule a render
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn mouse_captor(&self) -> &MouseCaptor {
        &self.mouse
    }

    pub fn mouse_captor_mut(&mut self) -> &mut MouseCaptor {
        &mut self.mouse
    }

    pub fn touch_captor(&self) -> &TouchCaptor {
        &self.touch
    }

    pub fn touch_captor_mut(&mut self) -> &mut TouchCaptor {
        &mut self.touch
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn is_killed(&self) -> bool {
        self.killed
    }

    pub fn node_display_data(&self, key: &str) -> Option<&NodeDisplayData> {
        self.node_data.get(key).map(|node| &node.data)
    }

    pub fn edge_display_data(&self, key: &str) -> Option<&EdgeDisplayData> {
        self.edge_data.get(key).map(|edge| &edge.data)
    }

    pub fn node_data_keys(&self) -> impl Iterator<Item = &str> {
        self.node_data.keys().map(String::as_str)
    }

    pub fn hovered_node(&self) -> Option<&str> {
        self.hovered_node.as_deref()
    }

    pub fn hovered_edge(&self) -> Option<&str> {
        self.hovered_edge.as_deref()
    }

    pub fn highlighted_nodes(&self) -> &BTreeSet<String> {
        &self.highlighted_nodes
    }

    /// Nodes whose label was drawn by the last render
    pub fn displayed_node_labels(&self) -> &BTreeSet<String> {
        &self.displayed_node_labels
    }

    pub fn last_frame(&self) -> &FrameOutput {
        &self.last_frame
    }

    pub fn picking_index(&self) -> &PickingIndex {
        &self.picking
    }

    /// Slot of an entity in the program set of its type
    pub fn slot(&self, kind: EntityKind, key: &str) -> Option<usize> {
        match kind {
            EntityKind::Node => self.node_slots.get(key).copied(),
            EntityKind::Edge => self.edge_slots.get(key).copied(),
        }
    }

    pub fn node_program(&self, node_type: &str) -> Option<&ProgramSet> {
        self.programs.nodes.get(node_type)
    }

    pub fn edge_program(&self, edge_type: &str) -> Option<&ProgramSet> {
        self.programs.edges.get(edge_type)
    }

    pub fn label_grid(&self) -> &LabelGrid {
        &self.label_grid
    }

    // ===== Events =====

    pub fn on(&mut self, listener: impl FnMut(&RendererEvent) + 'static) -> ListenerId {
        self.events.on(listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    // ===== Settings =====

    /// Replace every setting. Invalid settings are rejected and the current
    /// ones stay in place.
    pub fn set_settings(&mut self, settings: Settings) -> RendererResult<()> {
        self.ensure_alive()?;
        settings.validate()?;
        let (nodes, edges) = resolve_all(&self.graph, &settings)?;
        let programs = Programs::from_settings(&settings);

        self.scheduler.cancel();
        programs.register(&mut self.backend)?;
        let downsizing = settings.picking_down_sizing_ratio;
        self.backend
            .resize(self.dimensions, self.pixel_ratio, downsizing)?;

        configure_camera(&mut self.camera, &settings);
        let captor_settings = CaptorSettings::from(&settings);
        self.mouse.set_settings(captor_settings);
        self.touch.set_settings(captor_settings);
        self.settings = settings;
        self.programs = programs;

        self.inbox.borrow_mut().clear();
        self.install_data(nodes, edges);
        self.need_to_process = true;
        self.scheduler.schedule_render();
        debug!("settings applied");
        Ok(())
    }

    /// Change some settings in place
    pub fn update_settings(&mut self, update: impl FnOnce(&mut Settings)) -> RendererResult<()> {
        let mut settings = self.settings.clone();
        update(&mut settings);
        self.set_settings(settings)
    }

    // ===== Graph =====

    /// Render another graph. Listeners move from the old graph to the new one.
    pub fn set_graph(&mut self, graph: SharedGraph) -> RendererResult<()> {
        self.ensure_alive()?;
        let (nodes, edges) = resolve_all(&graph, &self.settings)?;
        let listener = subscribe(&graph, &self.inbox, &self.scheduler)?;

        if let Some(previous) = self.graph_listener.take() {
            match self.graph.try_borrow_mut() {
                Ok(mut old) => {
                    old.unsubscribe(previous);
                }
                Err(_) => warn!("previous graph is borrowed, its listener stays registered"),
            }
        }
        self.graph = graph;
        self.graph_listener = Some(listener);
        self.inbox.borrow_mut().clear();
        self.hovered_node = None;
        self.hovered_edge = None;
        self.install_data(nodes, edges);
        self.need_to_process = true;
        self.render().map(|_| ())
    }

    /// Replace the cached display data
    fn install_data(
        &mut self,
        nodes: BTreeMap<String, NodeDisplayData>,
        edges: BTreeMap<String, CachedEdge>,
    ) {
        self.node_data.clear();
        self.edge_data.clear();
        self.nodes_with_forced_labels.clear();
        self.edges_with_forced_labels.clear();
        self.highlighted_nodes.clear();
        for (key, data) in nodes {
            self.set_node_data(key, data);
        }
        for (key, edge) in edges {
            self.set_edge_data(key, edge);
        }
        if matches!(&self.hovered_node, Some(key) if !self.node_data.contains_key(key)) {
            self.hovered_node = None;
        }
        if matches!(&self.hovered_edge, Some(key) if !self.edge_data.contains_key(key)) {
            self.hovered_edge = None;
        }
    }

    fn set_node_data(&mut self, key: String, data: NodeDisplayData) {
        self.nodes_with_forced_labels.remove(&key);
        if data.force_label && !data.hidden {
            self.nodes_with_forced_labels.insert(key.clone());
        }
        self.highlighted_nodes.remove(&key);
        if data.highlighted && !data.hidden {
            self.highlighted_nodes.insert(key.clone());
        }
        let framed = self.normalization.apply(Coordinates::new(data.x, data.y));
        self.node_data.insert(key, CachedNode { data, framed });
    }

    fn set_edge_data(&mut self, key: String, edge: CachedEdge) {
        self.edges_with_forced_labels.remove(&key);
        if edge.data.force_label && !edge.data.hidden {
            self.edges_with_forced_labels.insert(key.clone());
        }
        self.edge_data.insert(key, edge);
    }

    fn remove_node(&mut self, key: &str) {
        self.node_data.remove(key);
        self.node_slots.remove(key);
        self.nodes_with_forced_labels.remove(key);
        self.highlighted_nodes.remove(key);
        if self.hovered_node.as_deref() == Some(key) {
            self.hovered_node = None;
        }
    }

    fn remove_edge(&mut self, key: &str) {
        self.edge_data.remove(key);
        self.edge_slots.remove(key);
        self.edges_with_forced_labels.remove(key);
        if self.hovered_edge.as_deref() == Some(key) {
            self.hovered_edge = None;
        }
    }

    /// Display data of one node, `None` if the graph no longer has it
    fn resolve_node(&self, key: &str) -> RendererResult<Option<NodeDisplayData>> {
        let graph = borrow_graph(&self.graph)?;
        graph
            .node_attributes(key)
            .map(|attributes| NodeDisplayData::resolve(key, attributes, &self.settings))
            .transpose()
    }

    fn resolve_edge(&self, key: &str) -> RendererResult<Option<CachedEdge>> {
        let graph = borrow_graph(&self.graph)?;
        Ok(resolve_edge_data(&graph, key, &self.settings))
    }

    fn update_node(&mut self, key: &str) -> RendererResult<()> {
        match self.resolve_node(key)? {
            Some(data) => self.set_node_data(key.to_string(), data),
            None => self.remove_node(key),
        }
        Ok(())
    }

    fn update_edge(&mut self, key: &str) -> RendererResult<()> {
        match self.resolve_edge(key)? {
            Some(edge) => self.set_edge_data(key.to_string(), edge),
            None => self.remove_edge(key),
        }
        Ok(())
    }

    fn reindex(&mut self) -> RendererResult<()> {
        let (nodes, edges) = resolve_all(&self.graph, &self.settings)?;
        self.install_data(nodes, edges);
        Ok(())
    }

    /// Fold queued graph mutations into the caches
    fn drain_graph_events(&mut self) -> RendererResult<()> {
        let events = std::mem::take(&mut *self.inbox.borrow_mut());
        if events.is_empty() {
            return Ok(());
        }
        trace!(count = events.len(), "applying graph events");
        for event in events {
            match event {
                GraphEvent::NodeAdded { key } | GraphEvent::NodeAttributesUpdated { key } => {
                    self.update_node(&key)?
                }
                GraphEvent::NodeDropped { key } => self.remove_node(&key),
                GraphEvent::EdgeAdded { key } | GraphEvent::EdgeAttributesUpdated { key } => {
                    self.update_edge(&key)?
                }
                GraphEvent::EdgeDropped { key } => self.remove_edge(&key),
                GraphEvent::EachNodeAttributesUpdated
                | GraphEvent::EachEdgeAttributesUpdated
                | GraphEvent::Cleared => self.reindex()?,
                GraphEvent::EdgesCleared => {
                    self.edge_data.clear();
                    self.edge_slots.clear();
                    self.edges_with_forced_labels.clear();
                    self.hovered_edge = None;
                }
            }
        }
        self.need_to_process = true;
        Ok(())
    }

    // ===== Refresh and process =====

    /// Re-read graph data and render, now or on the next frame
    pub fn refresh(&mut self, options: RefreshOptions) -> RendererResult<()> {
        self.ensure_alive()?;
        self.drain_graph_events()?;
        let full = options.partial_graph.is_none();
        match &options.partial_graph {
            None => self.reindex()?,
            Some(partial) => {
                for key in &partial.nodes {
                    let data = self.resolve_node(key)?.ok_or_else(|| RendererError::UnknownEntity {
                        kind: EntityKind::Node,
                        key: key.clone(),
                    })?;
                    self.set_node_data(key.clone(), data);
                    if options.skip_indexation {
                        self.repaint(EntityKind::Node, key)?;
                    }
                }
                for key in &partial.edges {
                    let edge = self.resolve_edge(key)?.ok_or_else(|| RendererError::UnknownEntity {
                        kind: EntityKind::Edge,
                        key: key.clone(),
                    })?;
                    self.set_edge_data(key.clone(), edge);
                    if options.skip_indexation {
                        self.repaint(EntityKind::Edge, key)?;
                    }
                }
            }
        }
        if full || !options.skip_indexation {
            self.need_to_process = true;
        }
        if options.schedule {
            self.scheduler.schedule_render();
            Ok(())
        } else {
            self.render().map(|_| ())
        }
    }

    /// Full refresh on the next frame
    pub fn schedule_refresh(&mut self) -> RendererResult<()> {
        self.refresh(RefreshOptions {
            schedule: true,
            ..RefreshOptions::default()
        })
    }

    /// Re-encode an entity in the slot it already has
    fn repaint(&mut self, kind: EntityKind, key: &str) -> RendererResult<()> {
        let not_indexed = || RendererError::NotIndexed {
            kind,
            key: key.to_string(),
        };
        let slot = self.slot(kind, key).ok_or_else(not_indexed)?;
        let fingerprint = self
            .picking
            .fingerprint(kind, key)
            .ok_or_else(not_indexed)?;
        match kind {
            EntityKind::Node => {
                let node = self.node_data.get(key).ok_or_else(not_indexed)?;
                encode_node(
                    &mut self.programs.nodes,
                    &self.colors,
                    node,
                    slot,
                    fingerprint,
                )
            }
            EntityKind::Edge => {
                let edge = self.edge_data.get(key).ok_or_else(not_indexed)?;
                encode_edge(
                    &mut self.programs.edges,
                    &self.colors,
                    &self.node_data,
                    edge,
                    slot,
                    fingerprint,
                )
            }
        }
    }

    /// Rebuild every derived cache from the display data
    pub fn process(&mut self) -> RendererResult<()> {
        self.ensure_alive()?;
        self.drain_graph_events()?;
        self.process_caches()?;
        self.need_to_process = false;
        Ok(())
    }

    fn process_caches(&mut self) -> RendererResult<()> {
        let started = Instant::now();

        // unknown types abort before anything changes
        for node in self.node_data.values() {
            if !self.programs.nodes.contains_key(&node.data.node_type) {
                return Err(missing_program(EntityKind::Node, &node.data.node_type));
            }
        }
        for edge in self.edge_data.values() {
            if !self.programs.edges.contains_key(&edge.data.edge_type) {
                return Err(missing_program(EntityKind::Edge, &edge.data.edge_type));
            }
        }

        self.events.emit(&RendererEvent::BeforeProcess);

        let mut extent = Extent::from_points(
            self.node_data
                .values()
                .map(|node| Coordinates::new(node.data.x, node.data.y)),
        );
        if !self.settings.auto_rescale {
            let Dimensions { width, height } = self.dimensions;
            let center_x = (extent.x[0] + extent.x[1]) / 2.0;
            let center_y = (extent.y[0] + extent.y[1]) / 2.0;
            extent = Extent::new(
                [center_x - width / 2.0, center_x + width / 2.0],
                [center_y - height / 2.0, center_y + height / 2.0],
            );
        }
        self.node_extent = extent;
        let bbox = self.custom_bbox.unwrap_or(extent);
        self.normalization = NormalizationFunction::from_extent(&bbox);
        for node in self.node_data.values_mut() {
            let position = Coordinates::new(node.data.x, node.data.y);
            node.framed = self.normalization.apply(position);
        }
        self.transforms.borrow_mut().invalidate();
        self.install_pan_boundaries();

        // label candidates are placed as seen by the default camera
        let null_view = self.view_context().transform(CameraState::default());
        self.label_grid
            .resize_and_clear(self.dimensions, self.settings.label_grid_cell_size);
        for (key, node) in &self.node_data {
            if node.data.hidden || node.data.label_text().is_none() {
                continue;
            }
            let position = null_view.framed_graph_to_viewport(node.framed);
            self.label_grid.add(key, node.data.size, position);
        }
        self.label_grid.organize();

        self.picking.clear();
        self.node_slots.clear();
        self.edge_slots.clear();

        // nodes
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for node in self.node_data.values() {
            *counts.entry(node.data.node_type.as_str()).or_default() += 1;
        }
        for (node_type, set) in &mut self.programs.nodes {
            set.reallocate(counts.get(node_type.as_str()).copied().unwrap_or(0));
        }
        let order = if self.settings.z_index {
            z_ordered(self.node_data.iter(), |node: &CachedNode| node.data.z_index)
        } else {
            self.node_data.keys().collect()
        };
        let mut next_slot: BTreeMap<&str, usize> = BTreeMap::new();
        for key in order {
            let node = &self.node_data[key];
            let slot = next_slot.entry(node.data.node_type.as_str()).or_default();
            let fingerprint = self.picking.push(EntityKind::Node, key);
            encode_node(
                &mut self.programs.nodes,
                &self.colors,
                node,
                *slot,
                fingerprint,
            )?;
            self.node_slots.insert(key.clone(), *slot);
            *slot += 1;
        }

        // edges
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for edge in self.edge_data.values() {
            *counts.entry(edge.data.edge_type.as_str()).or_default() += 1;
        }
        for (edge_type, set) in &mut self.programs.edges {
            set.reallocate(counts.get(edge_type.as_str()).copied().unwrap_or(0));
        }
        let order = if self.settings.z_index {
            z_ordered(self.edge_data.iter(), |edge: &CachedEdge| edge.data.z_index)
        } else {
            self.edge_data.keys().collect()
        };
        let mut next_slot: BTreeMap<&str, usize> = BTreeMap::new();
        for key in order {
            let edge = &self.edge_data[key];
            let slot = next_slot.entry(edge.data.edge_type.as_str()).or_default();
            let fingerprint = self.picking.push(EntityKind::Edge, key);
            encode_edge(
                &mut self.programs.edges,
                &self.colors,
                &self.node_data,
                edge,
                *slot,
                fingerprint,
            )?;
            self.edge_slots.insert(key.clone(), *slot);
            *slot += 1;
        }

        self.events.emit(&RendererEvent::AfterProcess);
        debug!(
            nodes = self.node_data.len(),
            edges = self.edge_data.len(),
            elapsed = ?started.elapsed(),
            "processed graph"
        );
        Ok(())
    }

    fn install_pan_boundaries(&mut self) {
        let pan_boundaries = self.settings.camera_pan_boundaries;
        let boundaries = pan_boundaries.map(|pan| PanBoundaries {
            extent: self
                .normalization
                .apply_extent(&pan.boundaries.unwrap_or(self.node_extent)),
            context: self.view_context(),
            tolerance: pan.tolerance,
        });
        self.camera.set_pan_boundaries(boundaries);
    }

    // ===== Rendering =====

    /// Request a full render on the next frame. Returns false if one was
    /// already pending.
    pub fn schedule_render(&self) -> bool {
        !self.killed && self.scheduler.schedule_render()
    }

    /// Request a hover overlay repaint on the next frame
    pub fn schedule_highlighted_render(&self) -> bool {
        !self.killed && self.scheduler.schedule_highlighted_render()
    }

    /// Whether the host should request another frame
    pub fn needs_frame(&self) -> bool {
        !self.killed && (self.camera.is_animated() || self.scheduler.is_pending())
    }

    /// Run one frame: advance the camera animation, then perform the
    /// pending render request. Returns whether anything was drawn.
    pub fn frame(&mut self, now: Instant) -> RendererResult<bool> {
        self.ensure_alive()?;
        self.camera.tick(now);
        match self.scheduler.take() {
            Some(FrameRequest::Render) => {
                self.render_at(now)?;
                Ok(true)
            }
            Some(FrameRequest::RenderHighlighted) => {
                self.render_highlighted()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether the view is changing: camera animation, drag, inertia or a
    /// wheel zoom in flight
    pub fn is_moving(&self, now: Instant) -> bool {
        self.camera.is_animated()
            || self.mouse.is_moving(now)
            || self.mouse.dragged_events() > 0
            || self.mouse.wheel_direction() != 0
            || self.touch.is_moving(now)
    }

    pub fn render(&mut self) -> RendererResult<&FrameOutput> {
        self.render_at(Instant::now())
    }

    /// Render every layer. `now` decides whether the view is moving.
    pub fn render_at(&mut self, now: Instant) -> RendererResult<&FrameOutput> {
        self.ensure_alive()?;
        let started = Instant::now();
        self.events.emit(&RendererEvent::BeforeRender);
        self.scheduler.cancel();

        self.drain_graph_events()?;
        if self.need_to_process {
            self.process_caches()?;
            self.need_to_process = false;
        }

        let params = self.render_params();
        let moving = self.is_moving(now);
        let mut output = FrameOutput {
            edges_hidden: self.settings.hide_edges_on_move && moving,
            ..FrameOutput::default()
        };

        let node_buffers = buffers(&self.programs.nodes);
        let edge_buffers = if output.edges_hidden {
            Vec::new()
        } else {
            buffers(&self.programs.edges)
        };
        self.backend
            .draw_layer(Layer::Edges, &edge_buffers, &params)?;
        self.backend
            .draw_layer(Layer::Nodes, &node_buffers, &params)?;
        self.backend
            .draw_picking(PickingLayer::Nodes, &node_buffers, &params)?;
        let picked_edges = if self.settings.enable_edge_events {
            edge_buffers.as_slice()
        } else {
            &[]
        };
        self.backend
            .draw_picking(PickingLayer::Edges, picked_edges, &params)?;

        if self.settings.hide_labels_on_move && moving {
            output.labels_hidden = true;
        } else {
            if self.settings.render_labels {
                output.labels = self.node_labels();
            } else {
                self.displayed_node_labels.clear();
            }
            if self.settings.render_edge_labels {
                output.edge_labels = self.edge_labels();
            }
        }
        output.hovered = self.draw_hovered(&params)?;
        self.last_frame = output;

        self.events.emit(&RendererEvent::AfterRender);
        trace!(
            labels = self.last_frame.labels.len(),
            moving,
            elapsed = ?started.elapsed(),
            "rendered frame"
        );
        Ok(&self.last_frame)
    }

    /// Repaint the hover overlay only
    pub fn render_highlighted(&mut self) -> RendererResult<()> {
        self.ensure_alive()?;
        let params = self.render_params();
        self.last_frame.hovered = self.draw_hovered(&params)?;
        Ok(())
    }

    fn render_params(&self) -> RenderParams {
        let camera = self.camera.state();
        let transform = self.current_transform();
        RenderParams {
            width: self.dimensions.width,
            height: self.dimensions.height,
            pixel_ratio: self.pixel_ratio,
            matrix: *transform.matrix(),
            inverse_matrix: *transform.inverse_matrix(),
            camera_angle: camera.angle,
            zoom_ratio: camera.ratio,
            size_ratio: 1.0 / self.scale_size(1.0, camera.ratio),
            correction_ratio: transform.matrix_impact(),
            downsizing_ratio: self.settings.picking_down_sizing_ratio,
            min_edge_thickness: self.settings.min_edge_thickness,
            anti_aliasing_feather: self.settings.anti_aliasing_feather,
            arrow_head_length_ratio: self.settings.arrow_head_length_to_thickness_ratio,
            arrow_head_wideness_ratio: self.settings.arrow_head_wideness_to_thickness_ratio,
        }
    }

    /// Grid labels plus forced ones, filtered by size and position
    fn node_labels(&mut self) -> Vec<LabelDraw> {
        let ratio = self.camera.state().ratio;
        let transform = self.current_transform();
        let mut candidates = self
            .label_grid
            .labels_to_display(ratio, self.settings.label_density);
        candidates.extend(self.nodes_with_forced_labels.iter().cloned());

        self.displayed_node_labels.clear();
        let mut labels = Vec::new();
        for key in candidates {
            if self.displayed_node_labels.contains(&key) {
                continue;
            }
            let Some(node) = self.node_data.get(&key) else {
                continue;
            };
            if node.data.hidden {
                continue;
            }
            let Some(text) = node.data.label_text() else {
                continue;
            };
            let size = self.scale_size(node.data.size, ratio);
            if !node.data.force_label && size < self.settings.label_rendered_size_threshold {
                continue;
            }
            let position = transform.framed_graph_to_viewport(node.framed);
            if position.x < -X_LABEL_MARGIN
                || position.x > self.dimensions.width + X_LABEL_MARGIN
                || position.y < -Y_LABEL_MARGIN
                || position.y > self.dimensions.height + Y_LABEL_MARGIN
            {
                continue;
            }
            labels.push(LabelDraw {
                key: key.clone(),
                text: text.to_string(),
                position,
                size,
                color: self.settings.label_color.clone(),
                font_size: self.settings.label_size,
            });
            self.displayed_node_labels.insert(key);
        }
        labels
    }

    /// Labels of edges between displayed labels or touching an emphasized
    /// node, plus forced ones
    fn edge_labels(&self) -> Vec<EdgeLabelDraw> {
        let ratio = self.camera.state().ratio;
        let transform = self.current_transform();
        let mut keys = edge_labels_to_display(
            self.edge_data
                .iter()
                .map(|(key, edge)| (key.as_str(), edge.source.as_str(), edge.target.as_str())),
            &self.displayed_node_labels,
            &self.highlighted_nodes,
            self.hovered_node.as_deref(),
        );
        keys.extend(self.edges_with_forced_labels.iter().cloned());

        let mut seen = BTreeSet::new();
        let mut labels = Vec::new();
        for key in keys {
            if !seen.insert(key.clone()) {
                continue;
            }
            let Some(edge) = self.edge_data.get(&key) else {
                continue;
            };
            let source = self.node_data.get(&edge.source);
            let target = self.node_data.get(&edge.target);
            let (Some(source), Some(target)) = (source, target) else {
                continue;
            };
            if edge.data.hidden || source.data.hidden || target.data.hidden {
                continue;
            }
            let Some(text) = edge.data.label_text() else {
                continue;
            };
            labels.push(EdgeLabelDraw {
                text: text.to_string(),
                source: transform.framed_graph_to_viewport(source.framed),
                target: transform.framed_graph_to_viewport(target.framed),
                size: self.scale_size(edge.data.size, ratio),
                color: self.settings.label_color.clone(),
                font_size: self.settings.label_size,
                key,
            });
        }
        labels
    }

    /// Draw highlighted nodes and the hovered one in the overlay layer
    fn draw_hovered(&mut self, params: &RenderParams) -> RendererResult<Vec<HoverDraw>> {
        let keys: BTreeSet<String> = self
            .highlighted_nodes
            .iter()
            .cloned()
            .chain(self.hovered_node.clone())
            .filter(|key| matches!(self.node_data.get(key), Some(node) if !node.data.hidden))
            .collect();

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for key in &keys {
            let node_type = self.node_data[key].data.node_type.as_str();
            if !self.programs.hover.contains_key(node_type) {
                return Err(missing_program(EntityKind::Node, node_type));
            }
            *counts.entry(node_type).or_default() += 1;
        }
        for (node_type, set) in &mut self.programs.hover {
            set.reallocate(counts.get(node_type.as_str()).copied().unwrap_or(0));
        }

        let ratio = self.camera.state().ratio;
        let transform = self.current_transform();
        let mut next_slot: BTreeMap<&str, usize> = BTreeMap::new();
        let mut hovered = Vec::with_capacity(keys.len());
        for key in &keys {
            let node = &self.node_data[key];
            let slot = next_slot.entry(node.data.node_type.as_str()).or_default();
            let fingerprint = self.picking.fingerprint(EntityKind::Node, key).unwrap_or(0);
            encode_node(
                &mut self.programs.hover,
                &self.colors,
                node,
                *slot,
                fingerprint,
            )?;
            *slot += 1;
            hovered.push(HoverDraw {
                key: key.clone(),
                label: node.data.label_text().map(str::to_string),
                position: transform.framed_graph_to_viewport(node.framed),
                size: self.scale_size(node.data.size, ratio),
            });
        }

        self.backend
            .draw_layer(Layer::HoverNodes, &buffers(&self.programs.hover), params)?;
        Ok(hovered)
    }

    // ===== Viewport =====

    /// Resize the viewport. The graph is reprocessed on the next frame.
    pub fn resize(&mut self, dimensions: Dimensions) -> RendererResult<()> {
        self.ensure_alive()?;
        check_container(dimensions, &self.settings)?;
        self.scheduler.cancel();
        let downsizing = self.settings.picking_down_sizing_ratio;
        self.backend
            .resize(dimensions, self.pixel_ratio, downsizing)?;
        self.dimensions = dimensions;
        self.events.emit(&RendererEvent::Resize {
            width: dimensions.width,
            height: dimensions.height,
        });
        self.need_to_process = true;
        self.scheduler.schedule_render();
        Ok(())
    }

    /// Device pixels per viewport pixel
    pub fn set_pixel_ratio(&mut self, pixel_ratio: f64) -> RendererResult<()> {
        self.ensure_alive()?;
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
            return Err(RendererError::InvalidSettings(format!(
                "pixel ratio must be a positive number, got {pixel_ratio}"
            )));
        }
        let downsizing = self.settings.picking_down_sizing_ratio;
        self.backend
            .resize(self.dimensions, pixel_ratio, downsizing)?;
        self.pixel_ratio = pixel_ratio;
        self.scheduler.schedule_render();
        Ok(())
    }

    /// Override the graph-space box framed by the default camera. `None`
    /// goes back to the node extent.
    pub fn set_custom_bbox(&mut self, bbox: Option<Extent>) -> RendererResult<()> {
        self.ensure_alive()?;
        self.custom_bbox = bbox;
        self.need_to_process = true;
        self.scheduler.schedule_render();
        Ok(())
    }

    /// The framed graph-space box: the custom one if set, else the extent of
    /// the nodes at the last process
    pub fn bbox(&self) -> Extent {
        self.custom_bbox.unwrap_or(self.node_extent)
    }

    pub fn graph_extent(&self) -> Extent {
        self.node_extent
    }

    fn graph_dimensions(&self) -> Dimensions {
        self.bbox().dimensions()
    }

    pub fn view_context(&self) -> ViewContext {
        ViewContext {
            dimensions: self.dimensions,
            graph_dimensions: self.graph_dimensions(),
            padding: self.settings.stage_padding,
        }
    }

    fn current_transform(&self) -> ViewTransform {
        self.transforms
            .borrow_mut()
            .get(self.camera.state(), self.view_context())
    }

    fn view_transform(&self, overrides: &TransformOverride) -> ViewTransform {
        let unchanged = overrides.camera_state.is_none()
            && overrides.dimensions.is_none()
            && overrides.graph_dimensions.is_none()
            && overrides.padding.is_none();
        if unchanged {
            return self.current_transform();
        }
        let context = self.view_context();
        let state = overrides
            .camera_state
            .unwrap_or_else(|| self.camera.state());
        ViewContext {
            dimensions: overrides.dimensions.unwrap_or(context.dimensions),
            graph_dimensions: overrides
                .graph_dimensions
                .unwrap_or(context.graph_dimensions),
            padding: overrides.padding.unwrap_or(context.padding),
        }
        .transform(state)
    }

    pub fn framed_graph_to_viewport(
        &self,
        point: Coordinates,
        overrides: &TransformOverride,
    ) -> Coordinates {
        match overrides.matrix {
            Some(matrix) => {
                let Dimensions { width, height } = overrides.dimensions.unwrap_or(self.dimensions);
                let clip = multiply_vec2(&matrix, point, 1.0);
                Coordinates::new((1.0 + clip.x) * width / 2.0, (1.0 - clip.y) * height / 2.0)
            }
            None => {
                let transform = self.view_transform(overrides);
                transform.framed_graph_to_viewport(point)
            }
        }
    }

    pub fn viewport_to_framed_graph(
        &self,
        point: Coordinates,
        overrides: &TransformOverride,
    ) -> Coordinates {
        match overrides.matrix {
            Some(inverse) => {
                let Dimensions { width, height } = overrides.dimensions.unwrap_or(self.dimensions);
                let clip_x = (point.x / width) * 2.0 - 1.0;
                let clip_y = 1.0 - (point.y / height) * 2.0;
                multiply_vec2(&inverse, Coordinates::new(clip_x, clip_y), 1.0)
            }
            None => {
                let transform = self.view_transform(overrides);
                transform.viewport_to_framed_graph(point)
            }
        }
    }

    /// Graph-space point to viewport pixels
    pub fn graph_to_viewport(
        &self,
        point: Coordinates,
        overrides: &TransformOverride,
    ) -> Coordinates {
        self.framed_graph_to_viewport(self.normalization.apply(point), overrides)
    }

    /// Viewport pixels to a graph-space point
    pub fn viewport_to_graph(
        &self,
        point: Coordinates,
        overrides: &TransformOverride,
    ) -> Coordinates {
        self.normalization
            .inverse(self.viewport_to_framed_graph(point, overrides))
    }

    /// Camera state at `new_ratio` keeping the point under `anchor` in place
    pub fn viewport_zoomed_state(&self, anchor: Coordinates, new_ratio: f64) -> CameraState {
        self.current_transform().zoomed_state(anchor, new_ratio)
    }

    /// Viewport pixels per graph unit, at camera ratio 1
    pub fn graph_to_viewport_ratio(&self) -> f64 {
        let overrides = TransformOverride {
            camera_state: Some(CameraState {
                ratio: 1.0,
                ..self.camera.state()
            }),
            ..TransformOverride::default()
        };
        let origin = self.graph_to_viewport(Coordinates::new(0.0, 0.0), &overrides);
        let unit = self.graph_to_viewport(Coordinates::new(1.0, 1.0), &overrides);
        (unit.x - origin.x).hypot(unit.y - origin.y) / SQRT_2
    }

    /// On-screen size in pixels of an item of `size` at a camera ratio
    pub fn scale_size(&self, size: f64, camera_ratio: f64) -> f64 {
        match self.settings.item_sizes_reference {
            ItemSizesReference::Screen => size / camera_ratio.sqrt(),
            ItemSizesReference::Positions => size * self.graph_to_viewport_ratio() / camera_ratio,
        }
    }

    // ===== Lifecycle =====

    /// Stop rendering for good: pending frames are dropped, listeners
    /// removed and buffers released. Every later call fails with `Killed`.
    pub fn kill(&mut self) {
        if self.killed {
            return;
        }
        self.events.emit(&RendererEvent::Kill);
        self.scheduler.cancel();
        self.camera.cancel_animation();
        if let Some(id) = self.camera_listener.take() {
            self.camera.off(id);
        }
        if let Some(id) = self.graph_listener.take() {
            match self.graph.try_borrow_mut() {
                Ok(mut graph) => {
                    graph.unsubscribe(id);
                }
                Err(_) => warn!("graph is borrowed, the renderer listener stays registered"),
            }
        }
        self.mouse.disable();
        self.touch.disable();
        self.inbox.borrow_mut().clear();
        self.node_data.clear();
        self.edge_data.clear();
        self.node_slots.clear();
        self.edge_slots.clear();
        self.picking.clear();
        self.programs = Programs::default();
        self.hovered_node = None;
        self.hovered_edge = None;
        self.events.clear();
        self.killed = true;
        debug!("renderer killed");
    }
}

impl<B: RenderBackend> Drop for Renderer<B> {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::gpu::NullBackend;
    use crate::graph::{Attributes, Graph, attributes};

    fn graph(nodes: &[(&str, f64, f64)]) -> SharedGraph {
        let mut graph = Graph::new();
        for (key, x, y) in nodes {
            graph
                .add_node(key, attributes([("x", json!(x)), ("y", json!(y))]))
                .unwrap();
        }
        graph.into_shared()
    }

    fn renderer(graph: SharedGraph) -> Renderer<NullBackend> {
        let dimensions = Dimensions::new(800.0, 600.0);
        Renderer::new(graph, dimensions, NullBackend, Settings::default()).unwrap()
    }

    fn close(a: Coordinates, b: Coordinates) -> bool {
        (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6
    }

    #[test]
    fn center_of_the_extent_projects_to_the_viewport_center() {
        let renderer = renderer(graph(&[("a", 0.0, 0.0), ("b", 10.0, 10.0), ("c", 5.0, 5.0)]));
        let overrides = TransformOverride::default();
        let center = renderer.graph_to_viewport(Coordinates::new(5.0, 5.0), &overrides);
        assert!(close(center, Coordinates::new(400.0, 300.0)), "{center:?}");
    }

    #[test]
    fn graph_viewport_round_trip() {
        let mut renderer = renderer(graph(&[("a", -3.0, 2.0), ("b", 7.0, 11.0)]));
        renderer.camera_mut().set_state(crate::camera::PartialCameraState {
            x: Some(0.3),
            y: Some(0.6),
            ratio: Some(0.4),
            angle: Some(0.7),
        });
        let point = Coordinates::new(1.5, 4.0);
        let viewport = renderer.graph_to_viewport(point, &TransformOverride::default());
        let back = renderer.viewport_to_graph(viewport, &TransformOverride::default());
        assert!(close(point, back), "{back:?}");
    }

    #[test]
    fn matrix_override_bypasses_the_camera() {
        let renderer = renderer(graph(&[("a", 0.0, 0.0), ("b", 1.0, 1.0)]));
        let overrides = TransformOverride {
            matrix: Some(crate::transform::identity()),
            ..TransformOverride::default()
        };
        let origin = renderer.framed_graph_to_viewport(Coordinates::new(0.0, 0.0), &overrides);
        assert!(close(origin, Coordinates::new(400.0, 300.0)));
    }

    #[test]
    fn screen_sizes_shrink_with_the_square_root_of_the_ratio() {
        let renderer = renderer(graph(&[("a", 0.0, 0.0)]));
        assert!((renderer.scale_size(10.0, 1.0) - 10.0).abs() < 1e-9);
        assert!((renderer.scale_size(10.0, 4.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn positions_sizes_follow_the_graph_scale() {
        let settings = Settings {
            item_sizes_reference: ItemSizesReference::Positions,
            ..Settings::default()
        };
        let renderer = Renderer::new(
            graph(&[("a", 0.0, 0.0), ("b", 10.0, 10.0)]),
            Dimensions::new(800.0, 600.0),
            NullBackend,
            settings,
        )
        .unwrap();
        // the 10 unit extent spans the 540 px between paddings
        let ratio = renderer.graph_to_viewport_ratio();
        assert!((ratio - 54.0).abs() < 1e-6, "{ratio}");
        assert!((renderer.scale_size(1.0, 2.0) - 27.0).abs() < 1e-6);
    }

    #[test]
    fn slots_follow_key_order() {
        let renderer = renderer(graph(&[("b", 0.0, 0.0), ("a", 1.0, 1.0)]));
        assert_eq!(renderer.slot(EntityKind::Node, "a"), Some(0));
        assert_eq!(renderer.slot(EntityKind::Node, "b"), Some(1));
        let index = renderer.picking_index();
        assert_eq!(index.fingerprint(EntityKind::Node, "a"), Some(1));
        let circles = renderer.node_program("circle");
        assert_eq!(circles.map(ProgramSet::capacity), Some(2));
    }

    #[test]
    fn z_index_orders_slots() {
        let node = |position: i64, z_index: i64| {
            attributes([
                ("x", json!(position)),
                ("y", json!(position)),
                ("zIndex", json!(z_index)),
            ])
        };
        let mut graph = Graph::new();
        graph.add_node("a", node(0, 2)).unwrap();
        graph.add_node("b", node(1, 1)).unwrap();
        let settings = Settings {
            z_index: true,
            ..Settings::default()
        };
        let renderer = Renderer::new(
            graph.into_shared(),
            Dimensions::new(100.0, 100.0),
            NullBackend,
            settings,
        )
        .unwrap();
        assert_eq!(renderer.slot(EntityKind::Node, "b"), Some(0));
        assert_eq!(renderer.slot(EntityKind::Node, "a"), Some(1));
    }

    #[test]
    fn edges_need_both_extremities_cached() {
        let shared = graph(&[("a", 0.0, 0.0), ("b", 1.0, 1.0)]);
        shared
            .borrow_mut()
            .add_edge("ab", "a", "b", Attributes::new())
            .unwrap();
        let mut renderer = renderer(shared);
        renderer.node_data.remove("b");
        let edge = renderer.edge_data["ab"].clone();

        let result = encode_edge(
            &mut renderer.programs.edges,
            &renderer.colors,
            &renderer.node_data,
            &edge,
            0,
            1,
        );
        match result {
            Err(RendererError::UnknownEntity { kind, key }) => {
                assert_eq!(kind, EntityKind::Node);
                assert_eq!(key, "b");
            }
            other => panic!("Expected UnknownEntity, got {other:?}"),
        }
    }

    #[test]
    fn killed_renderer_rejects_calls() {
        let shared = graph(&[("a", 0.0, 0.0)]);
        let mut renderer = renderer(Rc::clone(&shared));
        assert_eq!(shared.borrow().subscriber_count(), 1);
        renderer.kill();
        assert_eq!(shared.borrow().subscriber_count(), 0);
        assert!(matches!(renderer.render(), Err(RendererError::Killed)));
        assert!(!renderer.needs_frame());
    }
}
