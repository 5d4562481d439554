//! The `graphview` binary, on commands that need no GPU

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::{Value, json};

fn graphview(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_graphview"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run graphview")
}

fn write_graph(dir: &Path) -> String {
    let graph = json!({
        "nodes": [
            { "key": "a", "attributes": { "x": 0, "y": 0, "size": 10, "label": "Alpha" } },
            { "key": "b", "attributes": { "x": 10, "y": 10, "size": 10, "label": "Beta" } },
            { "key": "c", "attributes": { "x": 5, "y": 5, "size": 2, "label": "Small" } }
        ],
        "edges": [
            { "source": "a", "target": "b" }
        ]
    });
    let path = dir.join("graph.json");
    fs::write(&path, serde_json::to_string_pretty(&graph).unwrap()).unwrap();
    path.to_string_lossy().into_owned()
}

fn assert_success(output: &Output) {
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "{stderr}");
}

#[test]
fn labels_lists_visible_labels() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_graph(dir.path());

    let output = graphview(&["labels", "--input", &input]);
    assert_success(&output);
    let stdout = String::from_utf8(output.stdout).unwrap();
    let mut keys: Vec<&str> = stdout
        .lines()
        .filter_map(|line| line.split('\t').next())
        .collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["a", "b"]);
    assert!(stdout.contains("Alpha\t130.0\t570.0"));
}

#[test]
fn labels_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_graph(dir.path());

    let output = graphview(&["labels", "-i", &input, "--json"]);
    assert!(output.status.success());
    let labels: Value = serde_json::from_slice(&output.stdout).unwrap();
    let labels = labels.as_array().unwrap();
    assert_eq!(labels.len(), 2);
    assert!(labels.iter().all(|label| label["fontSize"] == json!(14.0)));
}

#[test]
fn settings_file_changes_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_graph(dir.path());
    let settings = dir.path().join("settings.yaml");
    fs::write(&settings, "labelRenderedSizeThreshold: 1\n").unwrap();

    let output = graphview(&["labels", "-i", &input, "-s", settings.to_str().unwrap()]);
    assert_success(&output);
    assert_eq!(String::from_utf8(output.stdout).unwrap().lines().count(), 3);
}

#[test]
fn missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");

    let output = graphview(&["labels", "-i", missing.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read"));
}

#[test]
fn invalid_settings_fail() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_graph(dir.path());
    let settings = dir.path().join("settings.json");
    fs::write(&settings, r#"{ "labelDensity": -2 }"#).unwrap();

    let output = graphview(&["labels", "-i", &input, "-s", settings.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("labelDensity"));
}
