//! In-memory attributed graph consumed by the renderer
//!
//! Nodes and edges are keyed by string and carry free-form JSON attributes.
//! Every mutation notifies subscribers synchronously, in mutation order.
//! Iteration follows key order, which keeps rendering deterministic.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EntityKind, GraphError};
use crate::events::{Emitter, ListenerId};

/// Free-form attribute map of a node or an edge
pub type Attributes = Map<String, Value>;

/// Graph handle shared between the host and a renderer
pub type SharedGraph = Rc<RefCell<Graph>>;

/// Mutation notifications
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    NodeAdded { key: String },
    NodeDropped { key: String },
    NodeAttributesUpdated { key: String },
    EachNodeAttributesUpdated,
    EdgeAdded { key: String },
    EdgeDropped { key: String },
    EdgeAttributesUpdated { key: String },
    EachEdgeAttributesUpdated,
    Cleared,
    EdgesCleared,
}

#[derive(Debug, Clone, PartialEq)]
struct EdgeEntry {
    source: String,
    target: String,
    attributes: Attributes,
}

/// Serialized node record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub key: String,
    #[serde(default)]
    pub attributes: Attributes,
}

/// Serialized edge record. Edges without a key get `"{source}->{target}"`
/// with a numeric suffix when needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub attributes: Attributes,
}

/// Serialized graph, as read from and written to JSON files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

/// Attributed graph with synchronous change notification
#[derive(Debug, Default)]
pub struct Graph {
    nodes: BTreeMap<String, Attributes>,
    edges: BTreeMap<String, EdgeEntry>,
    listeners: Emitter<GraphEvent>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from serialized records
    pub fn from_data(data: GraphData) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for node in data.nodes {
            graph.add_node(&node.key, node.attributes)?;
        }
        for edge in data.edges {
            let key = match edge.key {
                Some(key) => key,
                None => graph.free_edge_key(&edge.source, &edge.target),
            };
            graph.add_edge(&key, &edge.source, &edge.target, edge.attributes)?;
        }
        Ok(graph)
    }

    /// Serialize the graph into records, in key order
    pub fn to_data(&self) -> GraphData {
        GraphData {
            nodes: self
                .nodes
                .iter()
                .map(|(key, attributes)| NodeRecord {
                    key: key.clone(),
                    attributes: attributes.clone(),
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|(key, entry)| EdgeRecord {
                    key: Some(key.clone()),
                    source: entry.source.clone(),
                    target: entry.target.clone(),
                    attributes: entry.attributes.clone(),
                })
                .collect(),
        }
    }

    /// Wrap the graph into a shareable handle
    pub fn into_shared(self) -> SharedGraph {
        Rc::new(RefCell::new(self))
    }

    fn free_edge_key(&self, source: &str, target: &str) -> String {
        let base = format!("{source}->{target}");
        if !self.edges.contains_key(&base) {
            return base;
        }
        (1..)
            .map(|n| format!("{base}#{n}"))
            .find(|key| !self.edges.contains_key(key))
            .unwrap_or(base)
    }

    // ===== Subscriptions =====

    /// Subscribe to mutation events
    pub fn subscribe(&mut self, listener: impl FnMut(&GraphEvent) + 'static) -> ListenerId {
        self.listeners.on(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.off(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.listener_count()
    }

    // ===== Reads =====

    /// Number of nodes
    pub fn order(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges
    pub fn size(&self) -> usize {
        self.edges.len()
    }

    pub fn has_node(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn has_edge(&self, key: &str) -> bool {
        self.edges.contains_key(key)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn edges(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    pub fn node_attributes(&self, key: &str) -> Option<&Attributes> {
        self.nodes.get(key)
    }

    pub fn edge_attributes(&self, key: &str) -> Option<&Attributes> {
        self.edges.get(key).map(|entry| &entry.attributes)
    }

    /// Source and target of an edge
    pub fn extremities(&self, key: &str) -> Option<(&str, &str)> {
        self.edges
            .get(key)
            .map(|entry| (entry.source.as_str(), entry.target.as_str()))
    }

    /// Visit every node with its attributes
    pub fn for_each_node(&self, mut visit: impl FnMut(&str, &Attributes)) {
        for (key, attributes) in &self.nodes {
            visit(key, attributes);
        }
    }

    /// Visit every edge with its attributes and extremities
    pub fn for_each_edge(&self, mut visit: impl FnMut(&str, &Attributes, &str, &str)) {
        for (key, entry) in &self.edges {
            visit(key, &entry.attributes, &entry.source, &entry.target);
        }
    }

    // ===== Mutations =====

    pub fn add_node(&mut self, key: &str, attributes: Attributes) -> Result<(), GraphError> {
        if self.nodes.contains_key(key) {
            return Err(GraphError::Duplicate {
                kind: EntityKind::Node,
                key: key.to_string(),
            });
        }
        self.nodes.insert(key.to_string(), attributes);
        self.listeners.emit(&GraphEvent::NodeAdded {
            key: key.to_string(),
        });
        Ok(())
    }

    /// Add an edge between two existing nodes
    pub fn add_edge(
        &mut self,
        key: &str,
        source: &str,
        target: &str,
        attributes: Attributes,
    ) -> Result<(), GraphError> {
        if self.edges.contains_key(key) {
            return Err(GraphError::Duplicate {
                kind: EntityKind::Edge,
                key: key.to_string(),
            });
        }
        for extremity in [source, target] {
            if !self.nodes.contains_key(extremity) {
                return Err(GraphError::NotFound {
                    kind: EntityKind::Node,
                    key: extremity.to_string(),
                });
            }
        }
        self.edges.insert(
            key.to_string(),
            EdgeEntry {
                source: source.to_string(),
                target: target.to_string(),
                attributes,
            },
        );
        self.listeners.emit(&GraphEvent::EdgeAdded {
            key: key.to_string(),
        });
        Ok(())
    }

    /// Drop a node and every edge attached to it. Edge drops are notified
    /// before the node drop.
    pub fn drop_node(&mut self, key: &str) -> Result<(), GraphError> {
        if !self.nodes.contains_key(key) {
            return Err(GraphError::NotFound {
                kind: EntityKind::Node,
                key: key.to_string(),
            });
        }
        let incident: Vec<String> = self
            .edges
            .iter()
            .filter(|(_, entry)| entry.source == key || entry.target == key)
            .map(|(edge, _)| edge.clone())
            .collect();
        for edge in incident {
            self.drop_edge(&edge)?;
        }
        self.nodes.remove(key);
        self.listeners.emit(&GraphEvent::NodeDropped {
            key: key.to_string(),
        });
        Ok(())
    }

    pub fn drop_edge(&mut self, key: &str) -> Result<(), GraphError> {
        if self.edges.remove(key).is_none() {
            return Err(GraphError::NotFound {
                kind: EntityKind::Edge,
                key: key.to_string(),
            });
        }
        self.listeners.emit(&GraphEvent::EdgeDropped {
            key: key.to_string(),
        });
        Ok(())
    }

    /// Set one node attribute
    pub fn set_node_attribute(
        &mut self,
        key: &str,
        name: &str,
        value: Value,
    ) -> Result<(), GraphError> {
        self.update_node_attributes(key, |attributes| {
            attributes.insert(name.to_string(), value);
        })
    }

    /// Mutate the attributes of one node in place
    pub fn update_node_attributes(
        &mut self,
        key: &str,
        update: impl FnOnce(&mut Attributes),
    ) -> Result<(), GraphError> {
        let attributes = self.nodes.get_mut(key).ok_or_else(|| GraphError::NotFound {
            kind: EntityKind::Node,
            key: key.to_string(),
        })?;
        update(attributes);
        self.listeners.emit(&GraphEvent::NodeAttributesUpdated {
            key: key.to_string(),
        });
        Ok(())
    }

    /// Merge attributes into one node, overwriting existing names
    pub fn merge_node_attributes(
        &mut self,
        key: &str,
        attributes: Attributes,
    ) -> Result<(), GraphError> {
        self.update_node_attributes(key, |current| current.extend(attributes))
    }

    /// Set one edge attribute
    pub fn set_edge_attribute(
        &mut self,
        key: &str,
        name: &str,
        value: Value,
    ) -> Result<(), GraphError> {
        self.update_edge_attributes(key, |attributes| {
            attributes.insert(name.to_string(), value);
        })
    }

    /// Mutate the attributes of one edge in place
    pub fn update_edge_attributes(
        &mut self,
        key: &str,
        update: impl FnOnce(&mut Attributes),
    ) -> Result<(), GraphError> {
        let entry = self.edges.get_mut(key).ok_or_else(|| GraphError::NotFound {
            kind: EntityKind::Edge,
            key: key.to_string(),
        })?;
        update(&mut entry.attributes);
        self.listeners.emit(&GraphEvent::EdgeAttributesUpdated {
            key: key.to_string(),
        });
        Ok(())
    }

    /// Merge attributes into one edge, overwriting existing names
    pub fn merge_edge_attributes(
        &mut self,
        key: &str,
        attributes: Attributes,
    ) -> Result<(), GraphError> {
        self.update_edge_attributes(key, |current| current.extend(attributes))
    }

    /// Mutate every node's attributes, notified as a single event
    pub fn update_each_node_attributes(&mut self, mut update: impl FnMut(&str, &mut Attributes)) {
        for (key, attributes) in &mut self.nodes {
            update(key, attributes);
        }
        self.listeners.emit(&GraphEvent::EachNodeAttributesUpdated);
    }

    /// Mutate every edge's attributes, notified as a single event
    pub fn update_each_edge_attributes(&mut self, mut update: impl FnMut(&str, &mut Attributes)) {
        for (key, entry) in &mut self.edges {
            update(key, &mut entry.attributes);
        }
        self.listeners.emit(&GraphEvent::EachEdgeAttributesUpdated);
    }

    /// Remove every node and edge
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.listeners.emit(&GraphEvent::Cleared);
    }

    /// Remove every edge, keeping nodes
    pub fn clear_edges(&mut self) {
        self.edges.clear();
        self.listeners.emit(&GraphEvent::EdgesCleared);
    }
}

/// Build an attribute map from `(name, value)` pairs
pub fn attributes<I, K>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs
        .into_iter()
        .map(|(name, value)| (name.into(), value))
        .collect()
}
