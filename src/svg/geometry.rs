use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use super::SvgError;
use super::tree::SvgElement;

/// Largest width or height a reconciled image may declare.
pub const MAX_DIMENSION: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    pub fn parse(value: &str) -> Result<Self, SvgError> {
        let numbers: Vec<f64> = value
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>().map_err(|_| SvgError::ViewBox(value.to_string())))
            .collect::<Result<_, _>>()?;

        match numbers.as_slice() {
            [x, y, width, height]
                if numbers.iter().all(|n| n.is_finite()) && *width > 0.0 && *height > 0.0 =>
            {
                Ok(Self {
                    x: *x,
                    y: *y,
                    width: *width,
                    height: *height,
                })
            }
            _ => Err(SvgError::ViewBox(value.to_string())),
        }
    }
}

impl std::fmt::Display for ViewBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {} {}", self.x, self.y, self.width, self.height)
    }
}

/// One component of a `scale(...)` transform. Non-numeric components are
/// written back untouched and act as a factor of 1.
#[derive(Debug, Clone, PartialEq)]
enum ScaleToken {
    Number(f64),
    Raw(String),
}

impl ScaleToken {
    fn factor(&self) -> f64 {
        match self {
            ScaleToken::Number(n) => *n,
            ScaleToken::Raw(_) => 1.0,
        }
    }

    fn rescale(&mut self, by: f64) {
        if let ScaleToken::Number(n) = self {
            *n *= by;
        }
    }
}

impl std::fmt::Display for ScaleToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleToken::Number(n) => write!(f, "{}", n),
            ScaleToken::Raw(s) => f.write_str(s),
        }
    }
}

fn scale_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)scale\(([^)]+)\)").expect("scale pattern is valid"))
}

/// Rewrites the root `viewBox` and the top-level group's `scale(...)` so the
/// declared size equals the rendered size, capped at [`MAX_DIMENSION`].
///
/// Width is clamped first, then height; each clamp rescales both axes so the
/// aspect ratio is kept.
pub fn reconcile_geometry(root: &mut SvgElement) -> Result<ViewBox, SvgError> {
    root.remove_attr("width");
    root.remove_attr("height");

    let declared = root
        .attr("viewBox")
        .ok_or_else(|| SvgError::ViewBox(String::new()))?;
    let mut view_box = ViewBox::parse(declared)?;
    let declared_box = declared.to_string();

    let Some(group) = root.child_mut("g") else {
        root.set_attr("viewBox", view_box.to_string());
        return Ok(view_box);
    };
    let Some(transform) = group.attr("transform").map(str::to_string) else {
        root.set_attr("viewBox", view_box.to_string());
        return Ok(view_box);
    };
    let Some(captures) = scale_regex().captures(&transform) else {
        root.set_attr("viewBox", view_box.to_string());
        return Ok(view_box);
    };

    let (whole, inner) = match (captures.get(0), captures.get(1)) {
        (Some(whole), Some(inner)) => (whole, inner),
        _ => return Ok(view_box),
    };

    let mut tokens: Vec<ScaleToken> = inner
        .as_str()
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<f64>() {
            Ok(n) if n.is_finite() => ScaleToken::Number(n),
            _ => ScaleToken::Raw(s.to_string()),
        })
        .collect();

    let sx = |tokens: &[ScaleToken]| tokens.first().map_or(1.0, ScaleToken::factor);
    let sy = |tokens: &[ScaleToken]| tokens.get(1).map_or(sx(tokens), ScaleToken::factor);

    let mut width = view_box.width * sx(&tokens);
    let mut height = view_box.height * sy(&tokens);

    if width > MAX_DIMENSION {
        let by = MAX_DIMENSION / width;
        tokens.iter_mut().for_each(|t| t.rescale(by));
        width = view_box.width * sx(&tokens);
        height = view_box.height * sy(&tokens);
    }
    if height > MAX_DIMENSION {
        let by = MAX_DIMENSION / height;
        tokens.iter_mut().for_each(|t| t.rescale(by));
        width = view_box.width * sx(&tokens);
        height = view_box.height * sy(&tokens);
    }

    debug!(
        declared_width = view_box.width,
        declared_height = view_box.height,
        width = width,
        height = height;
        "reconciled svg geometry"
    );

    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(SvgError::ViewBox(format!("{declared_box} scaled by {transform}")));
    }

    view_box.width = width;
    view_box.height = height;

    let scale = tokens
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    let rewritten = format!(
        "{}scale({}){}",
        &transform[..whole.start()],
        scale,
        &transform[whole.end()..]
    );
    group.set_attr("transform", rewritten);
    root.set_attr("viewBox", view_box.to_string());

    Ok(view_box)
}

/// Re-checks an already reconciled root: the `viewBox` must still parse and
/// stay within [`MAX_DIMENSION`]. The scale transform is not applied again.
pub fn validate_geometry(root: &SvgElement) -> Result<ViewBox, SvgError> {
    let declared = root
        .attr("viewBox")
        .ok_or_else(|| SvgError::ViewBox(String::new()))?;
    let view_box = ViewBox::parse(declared)?;
    if view_box.width <= 0.0
        || view_box.height <= 0.0
        || view_box.width > MAX_DIMENSION + 1e-6
        || view_box.height > MAX_DIMENSION + 1e-6
    {
        return Err(SvgError::ViewBox(declared.to_string()));
    }
    Ok(view_box)
}
