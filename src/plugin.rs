use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::{DiagramFormat, PluginConfig, ResolvedDiagram};
use crate::diagram::{ImageResolver, build_diagram, to_dot};
use crate::error::DiagramError;
use crate::export::{svg_to_pdf, svg_to_png};
use crate::graph::Store;
use crate::layout_engine::LayoutEngine;
use crate::svg::resolve_svg;
use crate::theme::GraphTheme;

/// Where and how artifacts are produced.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub out_dir: PathBuf,
    /// Directory icon paths are relative to. Defaults to `out_dir`.
    pub asset_dir: Option<PathBuf>,
    pub engine: LayoutEngine,
    pub png_scale: f32,
}

impl GenerateOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            asset_dir: None,
            engine: LayoutEngine::default(),
            png_scale: 1.0,
        }
    }

    fn asset_dir(&self) -> &Path {
        self.asset_dir.as_deref().unwrap_or(&self.out_dir)
    }
}

/// Builds and writes all diagrams, returning the written paths in order.
pub fn generate(
    store: &Store,
    config: &PluginConfig,
    images: &dyn ImageResolver,
    options: &GenerateOptions,
) -> Result<Vec<PathBuf>, DiagramError> {
    fs::create_dir_all(&options.out_dir)?;

    let mut written = Vec::new();
    for diagram in config.resolved_diagrams()? {
        written.extend(generate_one(store, &diagram, images, options)?);
    }
    Ok(written)
}

fn generate_one(
    store: &Store,
    config: &ResolvedDiagram,
    images: &dyn ImageResolver,
    options: &GenerateOptions,
) -> Result<Vec<PathBuf>, DiagramError> {
    info!(diagram = config.name.as_str(), title = config.title.as_str(); "generating diagram");

    let theme = GraphTheme::resolve(&config.theme)?;
    let mut diagram_options = config.options();
    diagram_options.imagepath = Some(options.asset_dir().display().to_string());

    let diagram = build_diagram(store, &theme, images, &diagram_options)?;
    let dot = to_dot(&diagram);

    let mut written = Vec::new();
    let mut write = |format: DiagramFormat, bytes: &[u8]| -> Result<(), DiagramError> {
        let path = options.out_dir.join(config.artifact_name(format));
        fs::write(&path, bytes)?;
        debug!(path = path.display().to_string(); "wrote artifact");
        written.push(path);
        Ok(())
    };

    write(DiagramFormat::Dot, dot.as_bytes())?;
    if !config.generates(DiagramFormat::Svg) {
        return Ok(written);
    }

    let rendered = options.engine.render_svg(&dot)?;
    let svg = resolve_svg(&rendered, options.asset_dir())?;
    write(DiagramFormat::Svg, svg.as_bytes())?;

    if config.generates(DiagramFormat::Png) {
        write(DiagramFormat::Png, &svg_to_png(&svg, options.png_scale)?)?;
    }
    if config.generates(DiagramFormat::Pdf) {
        write(DiagramFormat::Pdf, &svg_to_pdf(&svg)?)?;
    }

    Ok(written)
}
