//! What a frame hands back to the host
//!
//! The GPU layers are drawn by the backend. Text is left to the host, which
//! gets one record per label to draw.

use serde::Serialize;

use crate::transform::Coordinates;

/// A node label to draw
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDraw {
    pub key: String,
    pub text: String,
    /// Node center in viewport pixels
    pub position: Coordinates,
    /// Node radius on screen, in pixels
    pub size: f64,
    pub color: String,
    pub font_size: f64,
}

/// An edge label to draw along the segment between its extremities
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeLabelDraw {
    pub key: String,
    pub text: String,
    pub source: Coordinates,
    pub target: Coordinates,
    /// Edge thickness on screen, in pixels
    pub size: f64,
    pub color: String,
    pub font_size: f64,
}

/// A hovered or highlighted node, drawn above everything else
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoverDraw {
    pub key: String,
    pub label: Option<String>,
    pub position: Coordinates,
    pub size: f64,
}

/// Outcome of the last render
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameOutput {
    pub labels: Vec<LabelDraw>,
    pub edge_labels: Vec<EdgeLabelDraw>,
    pub hovered: Vec<HoverDraw>,
    /// Edges were skipped because the camera was moving
    pub edges_hidden: bool,
    /// Labels were skipped because the camera was moving
    pub labels_hidden: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_serializes_in_camel_case() {
        let frame = FrameOutput {
            labels: vec![LabelDraw {
                key: "a".to_string(),
                text: "Alpha".to_string(),
                position: Coordinates::new(130.0, 570.0),
                size: 10.0,
                color: "#000".to_string(),
                font_size: 14.0,
            }],
            hovered: vec![HoverDraw {
                key: "a".to_string(),
                label: None,
                position: Coordinates::new(130.0, 570.0),
                size: 10.0,
            }],
            ..FrameOutput::default()
        };
        let json = serde_json::to_string_pretty(&frame).unwrap();
        insta::assert_snapshot!(json, @r###"
        {
          "labels": [
            {
              "key": "a",
              "text": "Alpha",
              "position": {
                "x": 130.0,
                "y": 570.0
              },
              "size": 10.0,
              "color": "#000",
              "fontSize": 14.0
            }
          ],
          "edgeLabels": [],
          "hovered": [
            {
              "key": "a",
              "label": null,
              "position": {
                "x": 130.0,
                "y": 570.0
              },
              "size": 10.0
            }
          ],
          "edgesHidden": false,
          "labelsHidden": false
        }
        "###);
    }
}
