//! Fingerprint assignment for picking
//!
//! Fingerprints are dense and start at 1, since 0 is the cleared picking
//! color. Nodes are numbered first, then edges, in slot order.

use std::collections::HashMap;

use tracing::warn;

use crate::color::MAX_FINGERPRINT;
use crate::error::EntityKind;

#[derive(Debug, Clone, Default)]
pub struct PickingIndex {
    items: Vec<(EntityKind, String)>,
    nodes: HashMap<String, u32>,
    edges: HashMap<String, u32>,
}

impl PickingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.nodes.clear();
        self.edges.clear();
    }

    /// Assign the next fingerprint to an entity
    pub fn push(&mut self, kind: EntityKind, key: &str) -> u32 {
        self.items.push((kind, key.to_string()));
        let fingerprint = self.items.len() as u32;
        if fingerprint == MAX_FINGERPRINT + 1 {
            warn!("more items than picking colors, picking will be ambiguous");
        }
        match kind {
            EntityKind::Node => self.nodes.insert(key.to_string(), fingerprint),
            EntityKind::Edge => self.edges.insert(key.to_string(), fingerprint),
        };
        fingerprint
    }

    pub fn fingerprint(&self, kind: EntityKind, key: &str) -> Option<u32> {
        match kind {
            EntityKind::Node => self.nodes.get(key).copied(),
            EntityKind::Edge => self.edges.get(key).copied(),
        }
    }

    /// Entity behind a fingerprint read from a picking layer
    pub fn resolve(&self, fingerprint: u32) -> Option<(EntityKind, &str)> {
        let index = (fingerprint as usize).checked_sub(1)?;
        self.items
            .get(index)
            .map(|(kind, key)| (*kind, key.as_str()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprints_start_at_one() {
        let mut index = PickingIndex::new();
        assert_eq!(index.push(EntityKind::Node, "a"), 1);
        assert_eq!(index.push(EntityKind::Node, "b"), 2);
        assert_eq!(index.push(EntityKind::Edge, "a->b"), 3);

        assert_eq!(index.resolve(0), None);
        assert_eq!(index.resolve(2), Some((EntityKind::Node, "b")));
        assert_eq!(index.resolve(3), Some((EntityKind::Edge, "a->b")));
        assert_eq!(index.resolve(4), None);
        assert_eq!(index.fingerprint(EntityKind::Edge, "a->b"), Some(3));
        assert_eq!(index.fingerprint(EntityKind::Edge, "a"), None);
    }

    #[test]
    fn clear_restarts_numbering() {
        let mut index = PickingIndex::new();
        index.push(EntityKind::Node, "a");
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.push(EntityKind::Edge, "e"), 1);
        assert_eq!(index.len(), 1);
    }
}
