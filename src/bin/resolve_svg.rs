use clap::Parser;
use log::{LevelFilter, error};
use std::path::PathBuf;
use std::{process, str::FromStr};

use stackdiagram::error::DiagramError;
use stackdiagram::export::write_output;
use stackdiagram::svg::resolve_svg;

/// Standalone post-processor for Graphviz SVG output
#[derive(Parser, Debug)]
#[command(name = "stackdiagram-svg")]
#[command(version)]
#[command(about = "Reconcile geometry and inline image assets of a rendered SVG", long_about = None)]
struct Args {
    /// Input SVG file (use "-" for stdin)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file path (extension determines format: .svg, .png or .pdf)
    #[arg(short, long, value_name = "OUTPUT")]
    output: PathBuf,

    /// Directory image references are resolved against
    #[arg(long, value_name = "DIR", default_value = ".")]
    asset_dir: PathBuf,

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

    if let Err(err) = run(&args) {
        error!(err:err; "SVG resolution failed");
        process::exit(1);
    }
    eprintln!("Saved to: {}", args.output.display());
}

fn run(args: &Args) -> Result<(), DiagramError> {
    let source = if args.input.to_str() == Some("-") {
        let mut buffer = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(&args.input)?
    };

    let svg = resolve_svg(&source, &args.asset_dir)?;
    write_output(&svg, &args.output, args.png_scale)
}
