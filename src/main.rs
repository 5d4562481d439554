use tracing::info;
use tracing_subscriber::EnvFilter;

use clap::Parser;

use graphview::{
    Coordinates, Dimensions, NullBackend, PartialCameraState, RenderBackend, Renderer, WgpuBackend,
};

mod cli;

use cli::{Cli, Commands, ViewArgs};

/// Log to stderr, filtered by `RUST_LOG` (default `info`)
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

/// Build a renderer for the view options and draw one frame
fn open<B: RenderBackend>(view: &ViewArgs, backend: B) -> anyhow::Result<Renderer<B>> {
    let graph = cli::load_graph(&view.input)?;
    let settings = cli::load_settings(view.settings.as_deref())?;
    let dimensions = Dimensions::new(f64::from(view.width), f64::from(view.height));
    let mut renderer = Renderer::new(graph.into_shared(), dimensions, backend, settings)?;
    if let Some(ratio) = view.ratio {
        let camera = renderer.camera_mut();
        camera.set_state(PartialCameraState::ratio(ratio));
    }
    renderer.render()?;
    Ok(renderer)
}

fn render(view: &ViewArgs, output: &std::path::Path, background: &str) -> anyhow::Result<()> {
    let background = cli::parse_background(background)?;
    let renderer = open(view, WgpuBackend::create()?)?;
    let pixels = renderer.backend().composite_pixels(background)?;
    let fallback = (view.width, view.height);
    let (width, height) = renderer.backend().size().unwrap_or(fallback);
    cli::write_ppm(output, width, height, &pixels)?;
    info!(path = %output.display(), width, height, "wrote frame");
    println!("Rendered {} to {}", view.input.display(), output.display());
    Ok(())
}

fn labels(view: &ViewArgs, json: bool) -> anyhow::Result<()> {
    let renderer = open(view, NullBackend)?;
    let frame = renderer.last_frame();
    if json {
        println!("{}", serde_json::to_string_pretty(&frame.labels)?);
    } else {
        for label in &frame.labels {
            println!(
                "{}\t{}\t{:.1}\t{:.1}",
                label.key, label.text, label.position.x, label.position.y
            );
        }
    }
    Ok(())
}

fn pick(view: &ViewArgs, x: f64, y: f64) -> anyhow::Result<()> {
    let mut renderer = open(view, WgpuBackend::create()?)?;
    let position = Coordinates::new(x, y);
    if let Some(node) = renderer.get_node_at_position(position)? {
        println!("node {node}");
    } else if let Some(edge) = renderer.get_edge_at_position(position)? {
        println!("edge {edge}");
    } else {
        println!("stage");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            view,
            output,
            background,
        } => render(&view, &output, &background),
        Commands::Labels { view, json } => labels(&view, json),
        Commands::Pick { view, x, y } => pick(&view, x, y),
    }
}
