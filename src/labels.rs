//! Label selection
//!
//! Node labels are spread over a fixed grid of viewport cells so they never
//! pile up: each cell keeps its biggest candidates and only a zoom-dependent
//! number of them is shown. Edge labels follow the node labels that made it.

use std::collections::{BTreeMap, BTreeSet};

use crate::transform::{Coordinates, Dimensions};

/// A node competing for a label slot
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCandidate {
    pub key: String,
    pub size: f64,
}

/// Spatial grid of label candidates, built at the default camera
#[derive(Debug, Clone, Default)]
pub struct LabelGrid {
    width: f64,
    height: f64,
    cell_size: f64,
    columns: i64,
    rows: i64,
    cells: BTreeMap<i64, Vec<LabelCandidate>>,
}

impl LabelGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every candidate and size the grid for a viewport
    pub fn resize_and_clear(&mut self, dimensions: Dimensions, cell_size: f64) {
        self.width = dimensions.width;
        self.height = dimensions.height;
        self.cell_size = cell_size;
        self.columns = (dimensions.width / cell_size).ceil().max(0.0) as i64;
        self.rows = (dimensions.height / cell_size).ceil().max(0.0) as i64;
        self.cells.clear();
    }

    pub fn columns(&self) -> i64 {
        self.columns
    }

    pub fn rows(&self) -> i64 {
        self.rows
    }

    /// Cell holding a viewport position, `None` outside the grid
    fn cell_index(&self, position: Coordinates) -> Option<i64> {
        let column = (position.x / self.cell_size).floor();
        let row = (position.y / self.cell_size).floor();
        if !column.is_finite() || !row.is_finite() {
            return None;
        }
        let (column, row) = (column as i64, row as i64);
        if column < 0 || column >= self.columns || row < 0 || row >= self.rows {
            return None;
        }
        Some(row * self.columns + column)
    }

    /// Register a candidate at a viewport position. Candidates off the grid
    /// are ignored.
    pub fn add(&mut self, key: &str, size: f64, position: Coordinates) {
        let Some(index) = self.cell_index(position) else {
            return;
        };
        self.cells.entry(index).or_default().push(LabelCandidate {
            key: key.to_string(),
            size,
        });
    }

    /// Sort every cell by size, biggest first, ties broken by key
    pub fn organize(&mut self) {
        for cell in self.cells.values_mut() {
            cell.sort_by(|a, b| b.size.total_cmp(&a.size).then_with(|| a.key.cmp(&b.key)));
        }
    }

    /// Candidates currently in a cell, in display priority order
    pub fn cell(&self, index: i64) -> &[LabelCandidate] {
        self.cells.get(&index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// How many labels each cell may show at a camera ratio
    pub fn labels_per_cell(&self, ratio: f64, density: f64) -> usize {
        let cell_area = self.cell_size * self.cell_size;
        let scaled_cell_area = cell_area / ratio / ratio;
        let budget = (density * scaled_cell_area / cell_area).ceil();
        if budget.is_finite() && budget > 0.0 {
            budget as usize
        } else {
            0
        }
    }

    /// Keys of the labels to display, cell by cell
    pub fn labels_to_display(&self, ratio: f64, density: f64) -> Vec<String> {
        let budget = self.labels_per_cell(ratio, density);
        self.cells
            .values()
            .flat_map(|cell| cell.iter().take(budget))
            .map(|candidate| candidate.key.clone())
            .collect()
    }
}

/// Edges whose label should be shown: an edge qualifies when either end is
/// hovered or highlighted, or when both ends display their label.
pub fn edge_labels_to_display<'a>(
    edges: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>,
    displayed_node_labels: &BTreeSet<String>,
    highlighted_nodes: &BTreeSet<String>,
    hovered_node: Option<&str>,
) -> Vec<String> {
    let emphasized = |node: &str| hovered_node == Some(node) || highlighted_nodes.contains(node);
    edges
        .into_iter()
        .filter(|(_, source, target)| {
            let displayed = |node: &str| displayed_node_labels.contains(node);
            emphasized(source) || emphasized(target) || (displayed(source) && displayed(target))
        })
        .map(|(edge, _, _)| edge.to_string())
        .collect()
}
