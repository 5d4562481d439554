//! Renderer settings
//!
//! A flat set of options, loadable from JSON or YAML with camelCase keys.
//! Every field has a default, so a settings file only lists what it changes:
//!
//! ```yaml
//! labelDensity: 0.5
//! renderEdgeLabels: true
//! minCameraRatio: 0.1
//! ```
//!
//! Reducers cannot be expressed in a file; set them in code.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RendererError, RendererResult};
use crate::programs::{EdgeProgramType, NodeProgramType};
use crate::renderer::{EdgeDisplayData, NodeDisplayData};
use crate::transform::Extent;

/// Rewrites node display data right after defaults are applied
pub type NodeReducer = Rc<dyn Fn(&str, NodeDisplayData) -> NodeDisplayData>;

/// Rewrites edge display data right after defaults are applied
pub type EdgeReducer = Rc<dyn Fn(&str, EdgeDisplayData) -> EdgeDisplayData>;

/// Whether item sizes are in screen pixels or scale with graph positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemSizesReference {
    #[default]
    Screen,
    Positions,
}

/// Keeps the graph reachable while panning
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraPanBoundaries {
    /// Pixels the graph may leave the viewport by
    pub tolerance: f64,
    /// Graph-space box to keep in view. Defaults to the node extent.
    pub boundaries: Option<Extent>,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    // Performance
    pub hide_edges_on_move: bool,
    pub hide_labels_on_move: bool,
    pub render_labels: bool,
    pub render_edge_labels: bool,
    pub enable_edge_events: bool,

    // Component rendering
    pub default_node_color: String,
    pub default_node_type: String,
    pub default_edge_color: String,
    pub default_edge_type: String,
    pub label_color: String,
    pub label_size: f64,
    pub label_density: f64,
    pub label_grid_cell_size: f64,
    pub label_rendered_size_threshold: f64,
    pub z_index: bool,
    pub min_edge_thickness: f64,
    pub anti_aliasing_feather: f64,
    pub arrow_head_length_to_thickness_ratio: f64,
    pub arrow_head_wideness_to_thickness_ratio: f64,

    // Camera
    pub min_camera_ratio: Option<f64>,
    pub max_camera_ratio: Option<f64>,
    pub enable_camera_zooming: bool,
    pub enable_camera_panning: bool,
    pub enable_camera_rotation: bool,
    pub camera_pan_boundaries: Option<CameraPanBoundaries>,

    // Lifecycle
    pub allow_invalid_container: bool,
    pub stage_padding: f64,
    pub item_sizes_reference: ItemSizesReference,
    pub auto_rescale: bool,
    pub picking_down_sizing_ratio: f64,

    // Programs
    pub node_program_classes: BTreeMap<String, NodeProgramType>,
    pub node_hover_program_classes: BTreeMap<String, NodeProgramType>,
    pub edge_program_classes: BTreeMap<String, EdgeProgramType>,

    // Captors, durations in milliseconds
    pub double_click_timeout: u64,
    pub double_click_zooming_duration: u64,
    pub double_click_zooming_ratio: f64,
    pub dragged_events_tolerance: u32,
    pub drag_timeout: u64,
    pub inertia_duration: u64,
    pub inertia_ratio: f64,
    pub zoom_duration: u64,
    pub zooming_ratio: f64,
    pub tap_move_tolerance: f64,

    #[serde(skip)]
    pub node_reducer: Option<NodeReducer>,
    #[serde(skip)]
    pub edge_reducer: Option<EdgeReducer>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hide_edges_on_move: false,
            hide_labels_on_move: false,
            render_labels: true,
            render_edge_labels: false,
            enable_edge_events: false,

            default_node_color: "#999".to_string(),
            default_node_type: "circle".to_string(),
            default_edge_color: "#ccc".to_string(),
            default_edge_type: "line".to_string(),
            label_color: "#000".to_string(),
            label_size: 14.0,
            label_density: 1.0,
            label_grid_cell_size: 100.0,
            label_rendered_size_threshold: 6.0,
            z_index: false,
            min_edge_thickness: 1.7,
            anti_aliasing_feather: 1.0,
            arrow_head_length_to_thickness_ratio: 2.5,
            arrow_head_wideness_to_thickness_ratio: 2.0,

            min_camera_ratio: None,
            max_camera_ratio: None,
            enable_camera_zooming: true,
            enable_camera_panning: true,
            enable_camera_rotation: true,
            camera_pan_boundaries: None,

            allow_invalid_container: false,
            stage_padding: 30.0,
            item_sizes_reference: ItemSizesReference::Screen,
            auto_rescale: true,
            picking_down_sizing_ratio: 2.0,

            node_program_classes: BTreeMap::from([("circle".to_string(), NodeProgramType::Circle)]),
            node_hover_program_classes: BTreeMap::new(),
            edge_program_classes: BTreeMap::from([
                ("line".to_string(), EdgeProgramType::Line),
                ("arrow".to_string(), EdgeProgramType::Arrow),
            ]),

            double_click_timeout: 300,
            double_click_zooming_duration: 200,
            double_click_zooming_ratio: 2.2,
            dragged_events_tolerance: 3,
            drag_timeout: 100,
            inertia_duration: 200,
            inertia_ratio: 3.0,
            zoom_duration: 250,
            zooming_ratio: 1.7,
            tap_move_tolerance: 10.0,

            node_reducer: None,
            edge_reducer: None,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // reducers are closures; show whether they are set
        let mut value = serde_json::to_value(self).map_err(|_| fmt::Error)?;
        if let Some(object) = value.as_object_mut() {
            object.insert("nodeReducer".into(), self.node_reducer.is_some().into());
            object.insert("edgeReducer".into(), self.edge_reducer.is_some().into());
        }
        write!(f, "Settings {value}")
    }
}

impl Settings {
    /// Parse settings from JSON and validate them
    pub fn from_json_str(input: &str) -> RendererResult<Self> {
        let settings: Settings =
            serde_json::from_str(input).map_err(|e| RendererError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from YAML and validate them
    pub fn from_yaml_str(input: &str) -> RendererResult<Self> {
        let settings: Settings =
            serde_yaml::from_str(input).map_err(|e| RendererError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a `.json`, `.yaml` or `.yml` file
    pub fn from_path(path: &Path) -> RendererResult<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Err(RendererError::Parse(format!(
                "unsupported settings format: {}",
                path.display()
            ))),
        }
    }

    /// Reject values the renderer cannot work with
    pub fn validate(&self) -> RendererResult<()> {
        let invalid = |message: String| Err(RendererError::InvalidSettings(message));

        if !self.label_density.is_finite() || self.label_density < 0.0 {
            return invalid(format!(
                "labelDensity must be a non-negative number, got {}",
                self.label_density
            ));
        }
        if self.label_grid_cell_size.is_nan() || self.label_grid_cell_size <= 0.0 {
            return invalid(format!(
                "labelGridCellSize must be positive, got {}",
                self.label_grid_cell_size
            ));
        }
        if self.picking_down_sizing_ratio.is_nan() || self.picking_down_sizing_ratio < 1.0 {
            return invalid(format!(
                "pickingDownSizingRatio must be at least 1, got {}",
                self.picking_down_sizing_ratio
            ));
        }
        if !self.stage_padding.is_finite() || self.stage_padding < 0.0 {
            return invalid(format!(
                "stagePadding must be a non-negative number, got {}",
                self.stage_padding
            ));
        }
        let camera_ratios = [
            ("minCameraRatio", self.min_camera_ratio),
            ("maxCameraRatio", self.max_camera_ratio),
        ];
        for (name, ratio) in camera_ratios {
            if let Some(ratio) = ratio {
                if !ratio.is_finite() || ratio <= 0.0 {
                    return invalid(format!("{name} must be a positive number, got {ratio}"));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_camera_ratio, self.max_camera_ratio) {
            if min > max {
                return invalid(format!(
                    "minCameraRatio ({min}) is greater than maxCameraRatio ({max})"
                ));
            }
        }
        for (name, ratio) in [
            ("zoomingRatio", self.zooming_ratio),
            ("doubleClickZoomingRatio", self.double_click_zooming_ratio),
        ] {
            if !ratio.is_finite() || ratio <= 0.0 {
                return invalid(format!("{name} must be a positive number, got {ratio}"));
            }
        }
        let node_types = &self.node_program_classes;
        if !node_types.contains_key(&self.default_node_type) {
            return invalid(format!(
                "defaultNodeType \"{}\" has no entry in nodeProgramClasses",
                self.default_node_type
            ));
        }
        let edge_types = &self.edge_program_classes;
        if !edge_types.contains_key(&self.default_edge_type) {
            return invalid(format!(
                "defaultEdgeType \"{}\" has no entry in edgeProgramClasses",
                self.default_edge_type
            ));
        }
        Ok(())
    }

    /// Program used to draw a node type in the hover overlay
    pub fn node_hover_program(&self, node_type: &str) -> Option<NodeProgramType> {
        self.node_hover_program_classes
            .get(node_type)
            .or_else(|| self.node_program_classes.get(node_type))
            .copied()
    }

    pub(crate) fn millis(value: u64) -> Duration {
        Duration::from_millis(value)
    }
}
