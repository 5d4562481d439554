//! Display data resolved from graph attributes
//!
//! Attributes are read leniently: missing or mistyped values fall back to
//! the settings defaults. The optional reducer then gets the last word, and
//! only the node position is validated afterwards.

use serde::Serialize;
use serde_json::Value;

use crate::error::{RendererError, RendererResult};
use crate::graph::Attributes;
use crate::settings::Settings;

/// Node size used when the attribute is missing or not positive
pub const DEFAULT_NODE_SIZE: f64 = 2.0;

/// Edge size used when the attribute is missing or not positive
pub const DEFAULT_EDGE_SIZE: f64 = 0.5;

/// What the renderer draws for a node. `x`/`y` are in graph space.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDisplayData {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub color: String,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub node_type: String,
    pub hidden: bool,
    pub highlighted: bool,
    pub force_label: bool,
    pub z_index: f64,
}

/// What the renderer draws for an edge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDisplayData {
    pub size: f64,
    pub color: String,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub hidden: bool,
    pub force_label: bool,
    pub z_index: f64,
}

fn number(attributes: &Attributes, name: &str) -> Option<f64> {
    attributes.get(name).and_then(Value::as_f64)
}

fn positive(attributes: &Attributes, name: &str) -> Option<f64> {
    number(attributes, name).filter(|value| *value > 0.0)
}

fn flag(attributes: &Attributes, name: &str) -> bool {
    attributes
        .get(name)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn non_empty(attributes: &Attributes, name: &str) -> Option<String> {
    attributes
        .get(name)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Labels may be strings or numbers
fn label(attributes: &Attributes) -> Option<String> {
    match attributes.get("label")? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        _ => None,
    }
}

impl NodeDisplayData {
    /// Read attributes and apply defaults. Missing coordinates become NaN.
    pub fn from_attributes(attributes: &Attributes, settings: &Settings) -> Self {
        Self {
            x: number(attributes, "x").unwrap_or(f64::NAN),
            y: number(attributes, "y").unwrap_or(f64::NAN),
            size: positive(attributes, "size").unwrap_or(DEFAULT_NODE_SIZE),
            color: non_empty(attributes, "color")
                .unwrap_or_else(|| settings.default_node_color.clone()),
            label: label(attributes),
            node_type: non_empty(attributes, "type")
                .unwrap_or_else(|| settings.default_node_type.clone()),
            hidden: flag(attributes, "hidden"),
            highlighted: flag(attributes, "highlighted"),
            force_label: flag(attributes, "forceLabel"),
            z_index: number(attributes, "zIndex").unwrap_or(0.0),
        }
    }

    /// Defaults, then reducer, then position validation
    pub fn resolve(
        key: &str,
        attributes: &Attributes,
        settings: &Settings,
    ) -> RendererResult<Self> {
        let mut data = Self::from_attributes(attributes, settings);
        if let Some(reducer) = &settings.node_reducer {
            data = reducer(key, data);
        }
        if !data.x.is_finite() || !data.y.is_finite() {
            return Err(RendererError::InvalidNodePosition {
                node: key.to_string(),
            });
        }
        Ok(data)
    }

    /// Label text, if there is anything to show
    pub fn label_text(&self) -> Option<&str> {
        self.label.as_deref().filter(|text| !text.is_empty())
    }
}

impl EdgeDisplayData {
    pub fn from_attributes(attributes: &Attributes, settings: &Settings) -> Self {
        Self {
            size: positive(attributes, "size").unwrap_or(DEFAULT_EDGE_SIZE),
            color: non_empty(attributes, "color")
                .unwrap_or_else(|| settings.default_edge_color.clone()),
            label: label(attributes),
            edge_type: non_empty(attributes, "type")
                .unwrap_or_else(|| settings.default_edge_type.clone()),
            hidden: flag(attributes, "hidden"),
            force_label: flag(attributes, "forceLabel"),
            z_index: number(attributes, "zIndex").unwrap_or(0.0),
        }
    }

    pub fn resolve(key: &str, attributes: &Attributes, settings: &Settings) -> Self {
        let data = Self::from_attributes(attributes, settings);
        match &settings.edge_reducer {
            Some(reducer) => reducer(key, data),
            None => data,
        }
    }

    pub fn label_text(&self) -> Option<&str> {
        self.label.as_deref().filter(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::graph::attributes;

    #[test]
    fn node_defaults() {
        let settings = Settings::default();
        let position = attributes([("x", json!(1)), ("y", json!(2))]);
        let data = NodeDisplayData::resolve("a", &position, &settings).unwrap();
        assert_eq!(data.size, DEFAULT_NODE_SIZE);
        assert_eq!(data.color, "#999");
        assert_eq!(data.node_type, "circle");
        assert_eq!(data.label, None);
        assert!(!data.hidden && !data.highlighted && !data.force_label);
    }

    #[test]
    fn node_attributes_override_defaults() {
        let settings = Settings::default();
        let attrs = attributes([
            ("x", json!(1.5)),
            ("y", json!(-2)),
            ("size", json!(7)),
            ("color", json!("red")),
            ("label", json!(42)),
            ("hidden", json!(true)),
            ("forceLabel", json!(true)),
            ("zIndex", json!(3)),
        ]);
        let data = NodeDisplayData::resolve("a", &attrs, &settings).unwrap();
        assert_eq!((data.x, data.y, data.size), (1.5, -2.0, 7.0));
        assert_eq!(data.color, "red");
        assert_eq!(data.label_text(), Some("42"));
        assert!(data.hidden && data.force_label);
        assert_eq!(data.z_index, 3.0);
    }

    #[test]
    fn missing_position_is_an_error() {
        let settings = Settings::default();
        let result = NodeDisplayData::resolve("a", &attributes([("x", json!(1))]), &settings);
        assert!(matches!(result, Err(RendererError::InvalidNodePosition { node }) if node == "a"));
    }

    #[test]
    fn reducer_can_supply_positions() {
        let settings = Settings {
            node_reducer: Some(Rc::new(|_key: &str, mut data: NodeDisplayData| {
                data.x = 0.0;
                data.y = 0.0;
                data.color = "blue".into();
                data
            })),
            ..Settings::default()
        };
        let data = NodeDisplayData::resolve("a", &Attributes::new(), &settings).unwrap();
        assert_eq!((data.x, data.y), (0.0, 0.0));
        assert_eq!(data.color, "blue");
    }

    #[test]
    fn edge_defaults_and_reducer() {
        let settings = Settings {
            edge_reducer: Some(Rc::new(|key: &str, mut data: EdgeDisplayData| {
                data.label = Some(key.to_uppercase());
                data
            })),
            ..Settings::default()
        };
        let data = EdgeDisplayData::resolve("ab", &Attributes::new(), &settings);
        assert_eq!(data.size, DEFAULT_EDGE_SIZE);
        assert_eq!(data.color, "#ccc");
        assert_eq!(data.edge_type, "line");
        assert_eq!(data.label_text(), Some("AB"));
    }
}
