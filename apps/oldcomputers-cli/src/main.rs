use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use oldcomputers_assets::{AssetCache, SceneAsset, fixture};
use oldcomputers_render::{DebugTextRenderer, LedState, RenderView, Renderer, SceneSummary};
use oldcomputers_scene::{InstanceProvider, Scene, Stage, StageHandle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oldcomputers-cli", about = "Inspect and compose old computers scenes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Binary glTF scene asset
    #[arg(long, default_value = "computers_1-transformed.glb")]
    asset: PathBuf,
    /// Use the built-in synthetic scene instead of --asset
    #[arg(long)]
    synthetic: bool,
    /// Font for the text monitors
    #[arg(long, default_value = "Inter-Medium.ttf")]
    font: PathBuf,
    /// Also compose the seven text monitors (needs --font)
    #[arg(long)]
    text_screens: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// List the nodes and materials of a scene asset
    Inspect {
        asset: PathBuf,
    },
    /// Compose the stage and print it
    Compose {
        #[command(flatten)]
        source: SourceArgs,
        /// Print a JSON summary instead of the node tree
        #[arg(long)]
        json: bool,
    },
    /// Tabulate LED states over time
    Leds {
        #[command(flatten)]
        source: SourceArgs,
        /// Start time in seconds
        #[arg(short, long, default_value = "0")]
        time: f64,
        /// Number of frames to print
        #[arg(short, long, default_value = "10")]
        frames: u32,
        /// Seconds between frames
        #[arg(long, default_value = "0.016666666666666666")]
        dt: f64,
        #[arg(long)]
        json: bool,
    },
}

fn compose(source: &SourceArgs) -> anyhow::Result<(Scene, StageHandle)> {
    let mut cache = AssetCache::new();
    let asset = if source.synthetic {
        Arc::new(fixture::computers_scene()?)
    } else {
        cache
            .scene(&source.asset)
            .with_context(|| format!("loading {}", source.asset.display()))?
    };
    let mut stage = Stage::default();
    if source.text_screens {
        let font = cache
            .font(&source.font)
            .with_context(|| format!("loading {}", source.font.display()))?;
        stage.computers = stage.computers.clone().with_text_screens(font);
    }

    let instances = InstanceProvider::new().instances(&asset)?;
    let mut scene = Scene::new();
    let handle = stage.compose(&instances, &mut scene)?;
    Ok((scene, handle))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info => {
            println!("oldcomputers-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", oldcomputers_common::crate_info());
            println!("assets: {}", oldcomputers_assets::crate_info());
            println!("scene: {}", oldcomputers_scene::crate_info());
            println!("render: {}", oldcomputers_render::crate_info());
        }
        Commands::Inspect { asset } => {
            let scene = SceneAsset::load(&asset)
                .with_context(|| format!("loading {}", asset.display()))?;
            println!(
                "{}: id={:016x} nodes={} materials={}",
                asset.display(),
                scene.id().0,
                scene.node_count(),
                scene.material_count()
            );
            for node in scene.nodes() {
                let tris = node.geometry.as_ref().map_or(0, |g| g.triangle_count());
                let material = node.material.as_ref().map_or("-", |m| m.name.as_str());
                let p = node.world.w_axis;
                println!(
                    "  {:<16} tris={:<6} material={:<10} at=({:.2}, {:.2}, {:.2})",
                    node.name, tris, material, p.x, p.y, p.z
                );
            }
            for material in scene.materials() {
                let c = material.base_color;
                println!(
                    "  material {:<10} color=({:.2}, {:.2}, {:.2}, {:.2}) textured={}",
                    material.name,
                    c[0],
                    c[1],
                    c[2],
                    c[3],
                    material.base_color_texture.is_some()
                );
            }
        }
        Commands::Compose { source, json } => {
            let (scene, _) = compose(&source)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&SceneSummary::of(&scene))?);
            } else {
                print!("{}", DebugTextRenderer::new().render(&scene, &RenderView::default()));
            }
        }
        Commands::Leds {
            source,
            time,
            frames,
            dt,
            json,
        } => {
            let (_, handle) = compose(&source)?;
            let leds = &handle.computers.leds;
            let rows: Vec<(f64, Vec<LedState>)> = (0..frames)
                .map(|i| {
                    let t = time + f64::from(i) * dt;
                    (t, LedState::at(leds, t))
                })
                .collect();
            if json {
                let value: Vec<_> = rows
                    .iter()
                    .map(|(t, states)| serde_json::json!({ "time": t, "leds": states }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                let header: String = (0..leds.len()).map(|i| format!(" {i:>2}")).collect();
                println!("{:>10} |{header}", "time");
                for (t, states) in &rows {
                    let cells: String = states
                        .iter()
                        .map(|s| if s.on { "  #" } else { "  ." })
                        .collect();
                    println!("{t:>10.4} |{cells}");
                }
            }
        }
    }

    Ok(())
}
