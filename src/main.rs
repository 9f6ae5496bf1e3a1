use clap::Parser;
use log::{LevelFilter, error, info};
use std::path::PathBuf;
use std::{process, str::FromStr};

use stackdiagram::config::PluginConfig;
use stackdiagram::diagram::{AssetCatalog, ImageResolver, NoImages};
use stackdiagram::error::DiagramError;
use stackdiagram::graph::Store;
use stackdiagram::layout_engine::{DEFAULT_DOT_BINARY, LayoutEngine};
use stackdiagram::plugin::{GenerateOptions, generate};

/// Infrastructure graph to diagram generator
#[derive(Parser, Debug)]
#[command(name = "stackdiagram")]
#[command(version)]
#[command(about = "Render an infrastructure graph as DOT, SVG, PNG or PDF diagrams", long_about = None)]
struct Args {
    /// Input graph JSON file (use "-" for stdin)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Plugin configuration (TOML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Directory the diagram artifacts are written to
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Directory icon paths are resolved against
    #[arg(long, value_name = "DIR")]
    asset_dir: Option<PathBuf>,

    /// Icon catalog manifest (TOML)
    #[arg(long, value_name = "CATALOG")]
    catalog: Option<PathBuf>,

    /// Graphviz dot executable
    #[arg(long, value_name = "PATH", default_value = DEFAULT_DOT_BINARY)]
    dot: PathBuf,

    /// Raster scale multiplier for PNG output
    #[arg(long, default_value_t = 1.0)]
    png_scale: f32,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using 'warn' instead.", args.log_level);
        LevelFilter::Warn
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    match run(&args) {
        Ok(written) => {
            for path in written {
                println!("{}", path.display());
            }
        }
        Err(err) => {
            error!(err:err; "Diagram generation failed");
            process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<Vec<PathBuf>, DiagramError> {
    let source = if args.input.to_str() == Some("-") {
        let mut buffer = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(&args.input)?
    };
    let store = Store::from_json(&source)?;

    let config = match &args.config {
        Some(path) => PluginConfig::load(path)?,
        None => PluginConfig::default(),
    };

    let catalog = args.catalog.as_deref().map(AssetCatalog::load).transpose()?;
    let images: &dyn ImageResolver = match &catalog {
        Some(catalog) => catalog,
        None => &NoImages,
    };

    let options = GenerateOptions {
        out_dir: args.out_dir.clone(),
        asset_dir: args.asset_dir.clone(),
        engine: LayoutEngine::new(args.dot.clone()),
        png_scale: args.png_scale,
    };

    info!(input = args.input.display().to_string(); "loaded graph");
    generate(&store, &config, images, &options)
}
