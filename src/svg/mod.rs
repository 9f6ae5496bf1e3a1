mod geometry;
mod inline;
mod tree;

use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::fonts::parse_fontconfig;
use crate::xml::unescape_entities;

pub use geometry::{MAX_DIMENSION, ViewBox, reconcile_geometry, validate_geometry};
pub use inline::{decode_svg_data_url, inline_assets};
pub use tree::{SvgElement, SvgNode, parse_svg};

#[derive(Debug, Error)]
pub enum SvgError {
    #[error("Malformed SVG: {0}")]
    Malformed(String),

    #[error("SVG document has no root element")]
    Empty,

    #[error("SVG viewBox is missing or incomplete: {0:?}")]
    ViewBox(String),

    #[error("Failed to read asset {}: {source}", path.display())]
    AssetRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Decodes entity sequences in every attribute value and text node, once.
pub fn unescape_text_values(root: &mut SvgElement) {
    root.walk_mut(&mut |element| {
        for value in element.attributes.values_mut() {
            if value.contains('&') {
                *value = unescape_entities(value).into_owned();
            }
        }
        for child in element.children.iter_mut() {
            if let SvgNode::Text(text) = child
                && text.contains('&')
            {
                *text = unescape_entities(text).into_owned();
            }
        }
    });
}

/// Rewrites fontconfig `font-family` values into CSS font attributes.
pub fn resolve_fonts(root: &mut SvgElement) {
    root.walk_mut(&mut |element| {
        let Some(attrs) = element.attr("font-family").and_then(parse_fontconfig) else {
            return;
        };
        element.set_attr("font-family", attrs.family);
        if let Some(style) = attrs.style {
            element.set_attr("font-style", style);
        }
        if let Some(weight) = attrs.weight {
            element.set_attr("font-weight", weight);
        }
    });
}

/// Full post-processing of a rendered diagram: unescape, reconcile, resolve
/// fonts, inline assets and validate the geometry again.
pub fn resolve_svg(source: &str, asset_dir: &Path) -> Result<String, SvgError> {
    let mut root = parse_svg(source)?;

    unescape_text_values(&mut root);
    reconcile_geometry(&mut root)?;
    resolve_fonts(&mut root);
    let assets = inline_assets(&mut root, asset_dir)?;
    let view_box = validate_geometry(&root)?;

    info!(
        assets = assets,
        width = view_box.width,
        height = view_box.height;
        "resolved svg"
    );

    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n{}",
        root.to_svg_string()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const RENDERED: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<svg width="2058pt" height="2117pt" viewBox="0.00 0.00 494.00 508.00" xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">
<g id="graph0" class="graph" transform="scale(4.16667 4.16667) rotate(0) translate(4 504)">
<title>Cloud Diagram</title>
<g id="node_b1" class="node">
<image xlink:href="storage/s3.svg" width="40px" height="40px" x="10" y="10"/>
<text font-family="Helvetica:style=Regular" font-size="11">Bucket&amp;#45;Logs</text>
</g>
<g id="node_b2" class="node">
<image xlink:href="storage/s3.svg" width="40px" height="40px" x="60" y="10"/>
<text font-family="Helvetica,Helvetica Light:style=Light Italic,Italic">Data</text>
</g>
</g>
</svg>"#;

    #[test]
    fn resolve_svg_produces_self_contained_image() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("storage")).unwrap();
        fs::write(dir.path().join("storage/s3.svg"), "<svg width=\"1\" height=\"1\"/>").unwrap();

        let out = resolve_svg(RENDERED, dir.path()).unwrap();
        let root = parse_svg(&out).unwrap();

        assert_eq!(root.attr("width"), None);
        let view_box = ViewBox::parse(root.attr("viewBox").unwrap()).unwrap();
        assert!((view_box.width - 2058.33).abs() < 0.01);
        assert!((view_box.height - 2116.67).abs() < 0.01);

        assert_eq!(root.elements().next().unwrap().name, "defs");
        assert_eq!(root.count(&|e| e.name == "image"), 1);
        assert_eq!(root.count(&|e| e.name == "use"), 2);

        let texts: Vec<String> = {
            let mut found = Vec::new();
            let mut copy = root.clone();
            copy.walk_mut(&mut |e| {
                if e.name == "text" {
                    found.push(e.text());
                }
            });
            found
        };
        assert_eq!(texts, vec!["Bucket-Logs".to_string(), "Data".to_string()]);
    }

    #[test]
    fn fonts_become_css_attributes() {
        let mut root = parse_svg(
            r#"<svg><text font-family="Helvetica,Helvetica Light:style=Light Italic,Italic"/><text font-family="Arial"/></svg>"#,
        )
        .unwrap();
        resolve_fonts(&mut root);

        let texts: Vec<&SvgElement> = root.elements().collect();
        assert_eq!(texts[0].attr("font-family"), Some("Helvetica Light"));
        assert_eq!(texts[0].attr("font-style"), Some("italic"));
        assert_eq!(texts[0].attr("font-weight"), Some("300"));
        assert_eq!(texts[1].attr("font-family"), Some("Arial"));
        assert_eq!(texts[1].attr("font-style"), None);
    }

    #[test]
    fn unescape_leaves_clean_values_untouched() {
        let mut root =
            parse_svg(r#"<svg><text class="label">Plain text 100%</text></svg>"#).unwrap();
        let before = root.clone();
        unescape_text_values(&mut root);
        assert_eq!(root, before);
    }

    #[test]
    fn missing_view_box_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_svg("<svg><g/></svg>", dir.path()).unwrap_err();
        assert!(matches!(err, SvgError::ViewBox(_)));
    }
}
