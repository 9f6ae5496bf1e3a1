use std::path::Path;

use log::debug;
use resvg::usvg;
use tiny_skia::{Pixmap, Transform};

use crate::error::DiagramError;

/// Output format of a rendered file, picked from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Svg,
    Png,
    Pdf,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self, DiagramError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| DiagramError::Export("output file has no extension".into()))?
            .to_ascii_lowercase();
        match ext.as_str() {
            "svg" => Ok(ExportFormat::Svg),
            "png" => Ok(ExportFormat::Png),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(DiagramError::Export(format!(
                "unsupported output format: .{} (use .svg, .png or .pdf)",
                other
            ))),
        }
    }
}

/// Writes `svg` to `output`, converting by extension.
pub fn write_output(svg: &str, output: &Path, png_scale: f32) -> Result<(), DiagramError> {
    let bytes = match ExportFormat::from_path(output)? {
        ExportFormat::Svg => svg.as_bytes().to_vec(),
        ExportFormat::Png => svg_to_png(svg, png_scale)?,
        ExportFormat::Pdf => svg_to_pdf(svg)?,
    };
    std::fs::write(output, bytes)?;
    debug!(path = output.display().to_string(); "wrote diagram output");
    Ok(())
}

pub fn svg_to_png(svg: &str, scale: f32) -> Result<Vec<u8>, DiagramError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(DiagramError::Export(format!("invalid png scale: {}", scale)));
    }

    let mut opts = usvg::Options::default();
    {
        let fontdb = opts.fontdb_mut();
        fontdb.load_system_fonts();

        let local_fonts = Path::new("fonts");
        if local_fonts.is_dir() {
            fontdb.load_fonts_dir(local_fonts);
        }

        let fallbacks = FallbackFamilies::pick(
            fontdb
                .faces()
                .flat_map(|face| face.families.iter().map(|(family, _)| family.as_str())),
        );
        if let Some(family) = &fallbacks.sans {
            fontdb.set_sans_serif_family(family);
        }
        if let Some(family) = &fallbacks.serif {
            fontdb.set_serif_family(family);
        }
        if let Some(family) = &fallbacks.mono {
            fontdb.set_monospace_family(family);
        }
    }

    let tree = usvg::Tree::from_str(svg, &opts)
        .map_err(|e| DiagramError::Export(format!("failed to parse SVG: {}", e)))?;

    let width = (tree.size().width() * scale).ceil() as u32;
    let height = (tree.size().height() * scale).ceil() as u32;

    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| DiagramError::Export(format!("cannot allocate {}x{} pixmap", width, height)))?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| DiagramError::Export(format!("failed to encode PNG: {}", e)))
}

pub fn svg_to_pdf(svg: &str) -> Result<Vec<u8>, DiagramError> {
    use svg2pdf::usvg::fontdb;

    let mut fontdb = fontdb::Database::new();
    fontdb.load_system_fonts();

    let local_fonts = Path::new("fonts");
    if local_fonts.is_dir() {
        fontdb.load_fonts_dir(local_fonts);
    }

    let fallbacks = FallbackFamilies::pick(
        fontdb
            .faces()
            .flat_map(|face| face.families.iter().map(|(family, _)| family.as_str())),
    );
    if let Some(family) = &fallbacks.sans {
        fontdb.set_sans_serif_family(family);
    }
    if let Some(family) = &fallbacks.serif {
        fontdb.set_serif_family(family);
    }
    if let Some(family) = &fallbacks.mono {
        fontdb.set_monospace_family(family);
    }

    let opts = svg2pdf::usvg::Options {
        fontdb: std::sync::Arc::new(fontdb),
        ..Default::default()
    };

    let tree = svg2pdf::usvg::Tree::from_str(svg, &opts)
        .map_err(|e| DiagramError::Export(format!("failed to parse SVG: {}", e)))?;

    // Text as paths; viewers without the diagram fonts still show labels.
    let options = svg2pdf::ConversionOptions {
        embed_text: false,
        ..Default::default()
    };

    svg2pdf::to_pdf(&tree, options, svg2pdf::PageOptions::default())
        .map_err(|e| DiagramError::Export(format!("failed to convert SVG to PDF: {}", e)))
}

/// Generic font families chosen from the installed faces.
#[derive(Debug, Default, PartialEq, Eq)]
struct FallbackFamilies {
    sans: Option<String>,
    serif: Option<String>,
    mono: Option<String>,
}

impl FallbackFamilies {
    fn pick<'a>(families: impl Iterator<Item = &'a str>) -> Self {
        let mut sans: Option<&str> = None;
        let mut serif: Option<&str> = None;
        let mut mono: Option<&str> = None;
        let mut first: Option<&str> = None;

        for family in families {
            first = first.or(Some(family));

            let lower = family.to_ascii_lowercase();
            if sans.is_none() && lower.contains("sans") {
                sans = Some(family);
            }
            if serif.is_none() && lower.contains("serif") {
                serif = Some(family);
            }
            if mono.is_none() && (lower.contains("mono") || lower.contains("code")) {
                mono = Some(family);
            }
        }

        Self {
            sans: sans.or(first).map(str::to_string),
            serif: serif.or(first).map(str::to_string),
            mono: mono.or(sans).or(first).map(str::to_string),
        }
    }
}
