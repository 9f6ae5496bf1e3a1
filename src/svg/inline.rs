use std::fs;
use std::path::{Component, Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexMap;
use log::{debug, warn};

use super::SvgError;
use super::tree::{SvgElement, SvgNode, parse_svg};

const SVG_DATA_PREFIX: &str = "data:image/svg+xml;base64,";

/// Shared `<image>` definition for one asset.
#[derive(Debug, Clone, PartialEq)]
struct AssetDef {
    id: String,
    path: PathBuf,
    width: Option<String>,
    height: Option<String>,
}

/// Replaces local `<image>` references with `<use>` elements pointing at a
/// single embedded definition per asset, and prepends the `<defs>` block.
///
/// Returns the number of distinct assets embedded.
pub fn inline_assets(root: &mut SvgElement, asset_dir: &Path) -> Result<usize, SvgError> {
    let mut defs: IndexMap<PathBuf, AssetDef> = IndexMap::new();
    collect_and_replace(root, asset_dir, &mut defs);

    if defs.is_empty() {
        return Ok(0);
    }

    let mut defs_element = SvgElement::new("defs");
    for def in defs.values() {
        let data_url = encode_asset(&def.path)?;

        let (width, height) = match (&def.width, &def.height) {
            (Some(w), Some(h)) => (w.clone(), h.clone()),
            (w, h) => {
                let (iw, ih) = intrinsic_size(&def.path, &data_url);
                (
                    w.clone().or(iw).unwrap_or_default(),
                    h.clone().or(ih).unwrap_or_default(),
                )
            }
        };

        let mut image = SvgElement::new("image").with_attr("id", def.id.clone());
        if !width.is_empty() {
            image.set_attr("width", width);
        }
        if !height.is_empty() {
            image.set_attr("height", height);
        }
        image.set_attr("xlink:href", data_url);
        defs_element.children.push(SvgNode::Element(image));
    }

    if !root.attributes.contains_key("xmlns:xlink") {
        root.set_attr("xmlns:xlink", "http://www.w3.org/1999/xlink");
    }
    root.children.insert(0, SvgNode::Element(defs_element));

    debug!(assets = defs.len(); "inlined svg assets");
    Ok(defs.len())
}

fn collect_and_replace(
    element: &mut SvgElement,
    asset_dir: &Path,
    defs: &mut IndexMap<PathBuf, AssetDef>,
) {
    for child in element.children.iter_mut() {
        let SvgNode::Element(child) = child else {
            continue;
        };

        if child.name == "image" {
            if let Some(replacement) = replace_image(child, asset_dir, defs) {
                *child = replacement;
            }
            continue;
        }
        collect_and_replace(child, asset_dir, defs);
    }
}

fn replace_image(
    image: &SvgElement,
    asset_dir: &Path,
    defs: &mut IndexMap<PathBuf, AssetDef>,
) -> Option<SvgElement> {
    let (href_key, href) = ["xlink:href", "href"]
        .into_iter()
        .find_map(|k| image.attr(k).map(|v| (k, v)))?;

    let path = local_asset_path(href, asset_dir)?;
    let key = relative_key(&path, asset_dir);

    let id = match defs.get(&key) {
        Some(def) => def.id.clone(),
        None => {
            let id = unique_id(&asset_id(&key), defs);
            defs.insert(
                key,
                AssetDef {
                    id: id.clone(),
                    path,
                    width: image.attr("width").map(str::to_string),
                    height: image.attr("height").map(str::to_string),
                },
            );
            id
        }
    };

    let mut replacement = SvgElement::new("use");
    for (k, v) in &image.attributes {
        if k == href_key || matches!(k.as_str(), "href" | "xlink:href" | "width" | "height") {
            continue;
        }
        replacement.set_attr(k.clone(), v.clone());
    }
    replacement.set_attr("xlink:href", format!("#{}", id));
    Some(replacement)
}

/// Resolves `href` to a file under or relative to `asset_dir`.
///
/// URLs (`http:`, `data:`, `#fragment`) and absolute paths outside the asset
/// directory are not assets.
fn local_asset_path(href: &str, asset_dir: &Path) -> Option<PathBuf> {
    if href.is_empty() || href.starts_with('#') || href.contains("://") || href.starts_with("data:")
    {
        return None;
    }

    let path = Path::new(href);
    if path.is_absolute() {
        return path.starts_with(asset_dir).then(|| path.to_path_buf());
    }
    Some(asset_dir.join(path))
}

/// Dedup key: the normalised path relative to the asset directory,
/// extension included.
fn relative_key(path: &Path, asset_dir: &Path) -> PathBuf {
    let relative = path.strip_prefix(asset_dir).unwrap_or(path);
    let mut key = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => key.push(part),
            Component::ParentDir => {
                key.pop();
            }
            _ => {}
        }
    }
    key
}

/// Readable element id: extension dropped, separators and other
/// non-alphanumerics mapped to `_`. Not unique on its own.
fn asset_id(key: &Path) -> String {
    let stem = key
        .with_extension("")
        .components()
        .map(|c| {
            c.as_os_str()
                .to_string_lossy()
                .chars()
                .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' { ch } else { '_' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("_");
    format!("asset_{}", stem)
}

/// `base`, or `base_<n>` with the lowest `n` no other definition uses.
fn unique_id(base: &str, defs: &IndexMap<PathBuf, AssetDef>) -> String {
    let taken = |id: &str| defs.values().any(|def| def.id == id);
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|id| !taken(id))
        .unwrap_or_else(|| base.to_string())
}

fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "image/svg+xml",
    }
}

fn encode_asset(path: &Path) -> Result<String, SvgError> {
    let bytes = fs::read(path).map_err(|source| SvgError::AssetRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(format!(
        "data:{};base64,{}",
        mime_type(path),
        BASE64.encode(bytes)
    ))
}

/// Decodes a `data:image/svg+xml;base64,` URL back into SVG text.
pub fn decode_svg_data_url(url: &str) -> Option<String> {
    let payload = url.strip_prefix(SVG_DATA_PREFIX)?;
    let bytes = BASE64.decode(payload).ok()?;
    String::from_utf8(bytes).ok()
}

fn intrinsic_size(path: &Path, data_url: &str) -> (Option<String>, Option<String>) {
    let Some(source) = decode_svg_data_url(data_url) else {
        return (None, None);
    };
    match parse_svg(&source) {
        Ok(svg) => (
            svg.attr("width").map(str::to_string),
            svg.attr("height").map(str::to_string),
        ),
        Err(e) => {
            warn!(path = path.display().to_string(), error = e.to_string(); "asset is not parseable svg");
            (None, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ICON: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="64" height="48"><rect/></svg>"#;

    fn asset_dir() -> TempDir {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::create_dir_all(dir.path().join("aws/storage")).unwrap();
        fs::write(dir.path().join("aws/storage/s3.svg"), ICON).unwrap();
        fs::write(dir.path().join("pixel.png"), [0x89, b'P', b'N', b'G']).unwrap();
        dir
    }

    #[test]
    fn same_asset_is_embedded_once() {
        let dir = asset_dir();
        let svg = r#"<svg viewBox="0 0 10 10"><g>
            <g id="node1"><image xlink:href="aws/storage/s3.svg" width="40px" height="40px" x="1" y="2"/></g>
            <g id="node2"><image xlink:href="aws/storage/s3.svg" width="40px" height="40px" x="5" y="6"/></g>
        </g></svg>"#;
        let mut root = parse_svg(svg).unwrap();

        let embedded = inline_assets(&mut root, dir.path()).unwrap();
        assert_eq!(embedded, 1);

        let defs = root.elements().next().unwrap();
        assert_eq!(defs.name, "defs");
        assert_eq!(defs.elements().count(), 1);
        let def = defs.child("image").unwrap();
        assert_eq!(def.attr("id"), Some("asset_aws_storage_s3"));
        assert_eq!(def.attr("width"), Some("40px"));
        let data = def.attr("xlink:href").unwrap();
        assert_eq!(decode_svg_data_url(data).as_deref(), Some(ICON));

        assert_eq!(root.count(&|e| e.name == "image"), 1);
        assert_eq!(
            root.count(&|e| e.name == "use" && e.attr("xlink:href") == Some("#asset_aws_storage_s3")),
            2
        );
    }

    #[test]
    fn use_keeps_other_attributes() {
        let dir = asset_dir();
        let mut root = parse_svg(
            r#"<svg viewBox="0 0 1 1"><image href="pixel.png" x="3" preserveAspectRatio="xMinYMin meet"/></svg>"#,
        )
        .unwrap();
        inline_assets(&mut root, dir.path()).unwrap();

        let used = root.child("use").unwrap();
        assert_eq!(used.attr("x"), Some("3"));
        assert_eq!(used.attr("preserveAspectRatio"), Some("xMinYMin meet"));
        assert_eq!(used.attr("href"), None);
        assert_eq!(used.attr("xlink:href"), Some("#asset_pixel"));

        let def = root.child("defs").unwrap().child("image").unwrap();
        assert!(def.attr("xlink:href").unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn missing_size_comes_from_asset() {
        let dir = asset_dir();
        let mut root = parse_svg(
            r#"<svg viewBox="0 0 1 1"><image xlink:href="aws/storage/s3.svg"/></svg>"#,
        )
        .unwrap();
        inline_assets(&mut root, dir.path()).unwrap();

        let def = root.child("defs").unwrap().child("image").unwrap();
        assert_eq!(def.attr("width"), Some("64"));
        assert_eq!(def.attr("height"), Some("48"));
    }

    #[test]
    fn urls_and_foreign_paths_are_left_alone() {
        let dir = asset_dir();
        let svg = r##"<svg viewBox="0 0 1 1">
            <image xlink:href="https://example.com/a.svg"/>
            <image xlink:href="/elsewhere/b.svg"/>
            <image xlink:href="#local"/>
        </svg>"##;
        let mut root = parse_svg(svg).unwrap();
        assert_eq!(inline_assets(&mut root, dir.path()).unwrap(), 0);
        assert_eq!(root.count(&|e| e.name == "image"), 3);
        assert!(root.child("defs").is_none());
    }

    #[test]
    fn absolute_path_under_asset_dir_is_inlined() {
        let dir = asset_dir();
        let href = dir.path().join("aws/storage/s3.svg");
        let svg = format!(
            r#"<svg viewBox="0 0 1 1"><image xlink:href="{}"/></svg>"#,
            href.display()
        );
        let mut root = parse_svg(&svg).unwrap();
        assert_eq!(inline_assets(&mut root, dir.path()).unwrap(), 1);
        assert_eq!(
            root.child("use").unwrap().attr("xlink:href"),
            Some("#asset_aws_storage_s3")
        );
    }

    #[test]
    fn similar_paths_get_their_own_definitions() {
        let dir = asset_dir();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/b.svg"), ICON).unwrap();
        fs::write(dir.path().join("a_b.svg"), ICON).unwrap();
        fs::write(dir.path().join("s3.svg"), ICON).unwrap();
        fs::write(dir.path().join("s3.png"), [0x89, b'P', b'N', b'G']).unwrap();

        let svg = r#"<svg viewBox="0 0 1 1">
            <image xlink:href="a/b.svg" x="1"/>
            <image xlink:href="a_b.svg" x="2"/>
            <image xlink:href="s3.svg" x="3"/>
            <image xlink:href="s3.png" x="4"/>
            <image xlink:href="./a/../s3.png" x="5"/>
        </svg>"#;
        let mut root = parse_svg(svg).unwrap();
        assert_eq!(inline_assets(&mut root, dir.path()).unwrap(), 4);

        let ids: Vec<&str> = root
            .child("defs")
            .unwrap()
            .elements()
            .filter_map(|def| def.attr("id"))
            .collect();
        assert_eq!(ids, vec!["asset_a_b", "asset_a_b_2", "asset_s3", "asset_s3_2"]);

        let targets: Vec<&str> = root
            .elements()
            .filter(|e| e.name == "use")
            .filter_map(|e| e.attr("xlink:href"))
            .collect();
        assert_eq!(
            targets,
            vec!["#asset_a_b", "#asset_a_b_2", "#asset_s3", "#asset_s3_2", "#asset_s3_2"]
        );

        let png = root.child("defs").unwrap().elements().nth(3).unwrap();
        assert!(png.attr("xlink:href").unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn unreadable_asset_is_fatal() {
        let dir = asset_dir();
        let mut root = parse_svg(
            r#"<svg viewBox="0 0 1 1"><image xlink:href="missing/icon.svg"/></svg>"#,
        )
        .unwrap();
        let err = inline_assets(&mut root, dir.path()).unwrap_err();
        assert!(matches!(err, SvgError::AssetRead { .. }));
    }
}
