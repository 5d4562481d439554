use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};

use graphview::color::ColorCodec;
use graphview::{Graph, GraphData, Settings};

/// Headless GPU graph renderer
#[derive(Parser, Debug)]
#[command(name = "graphview")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
    /// Graph file (.json)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Settings file (.json, .yaml or .yml)
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Viewport width in pixels
    #[arg(long, default_value = "800")]
    pub width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value = "600")]
    pub height: u32,

    /// Camera ratio; below 1 zooms in
    #[arg(long)]
    pub ratio: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the graph to a binary PPM image
    Render {
        #[command(flatten)]
        view: ViewArgs,

        /// Output image (.ppm)
        #[arg(short, long)]
        output: PathBuf,

        /// Background color
        #[arg(long, default_value = "#ffffff")]
        background: String,
    },
    /// Print the labels that would be displayed
    Labels {
        #[command(flatten)]
        view: ViewArgs,

        /// Print JSON records instead of one line per label
        #[arg(long)]
        json: bool,
    },
    /// Report the entity drawn under a viewport pixel
    Pick {
        #[command(flatten)]
        view: ViewArgs,

        #[arg(short, long)]
        x: f64,

        #[arg(short, long)]
        y: f64,
    },
}

/// Read a graph file
pub fn load_graph(path: &Path) -> anyhow::Result<Graph> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let data: GraphData = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse graph {}", path.display()))?;
    Ok(Graph::from_data(data)?)
}

/// Read a settings file, or use the defaults
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Ok(Settings::from_path(path)?),
        None => Ok(Settings::default()),
    }
}

/// Parse an opaque background color
pub fn parse_background(input: &str) -> anyhow::Result<[u8; 3]> {
    match ColorCodec::new().parse(input) {
        Some(color) => Ok([color.r, color.g, color.b]),
        None => bail!("invalid background color: {input}"),
    }
}

/// Write RGBA rows as a binary PPM, dropping alpha
pub fn write_ppm(path: &Path, width: u32, height: u32, rgba: &[u8]) -> anyhow::Result<()> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        bail!("expected {expected} bytes of pixels, got {}", rgba.len());
    }
    let mut file = fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write!(file, "P6\n{width} {height}\n255\n")?;
    let rgb: Vec<u8> = rgba
        .chunks_exact(4)
        .flat_map(|pixel| [pixel[0], pixel[1], pixel[2]])
        .collect();
    file.write_all(&rgb)?;
    Ok(())
}
