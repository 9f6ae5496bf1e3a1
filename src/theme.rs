use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::DiagramError;
use crate::fonts::GraphFont;

const BUILTIN_PALETTES: &[(&str, &str)] = &[
    ("dark", include_str!("../themes/dark.toml")),
    ("light", include_str!("../themes/light.toml")),
];

const DEFAULT_FONT_FAMILY: &str = "Helvetica";
const DEFAULT_PALETTE: &str = "light";

/// Ordered attribute table for a single diagram entity role.
pub type Attributes = IndexMap<String, String>;

/// Builds an [`Attributes`] table from literal pairs.
pub fn attributes(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Overlays `extra` on top of `base`, later keys win.
pub fn apply(base: &mut Attributes, extra: &Attributes) {
    for (k, v) in extra {
        base.insert(k.clone(), v.clone());
    }
}

/// Icon specificity levels, ordered from most to least specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconTarget {
    /// Data driven icon, e.g. an instance type or database engine.
    Data,
    Resource,
    General,
    Service,
    Category,
}

impl IconTarget {
    pub const ALL: [IconTarget; 5] = [
        IconTarget::Data,
        IconTarget::Resource,
        IconTarget::General,
        IconTarget::Service,
        IconTarget::Category,
    ];

    /// Targets within `min..=max`, in lookup order.
    pub fn range(min: IconTarget, max: IconTarget) -> impl Iterator<Item = IconTarget> {
        Self::ALL.into_iter().filter(move |t| *t >= min && *t <= max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutDirection {
    Horizontal,
    #[default]
    Vertical,
}

/// Which stages become top-level clusters when the graph has stages.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StageSelection {
    #[default]
    All,
    First,
    Last,
    /// Regex matched against the stage construct id.
    Pattern(String),
}

impl From<String> for StageSelection {
    fn from(value: String) -> Self {
        match value.as_str() {
            "all" => StageSelection::All,
            "first" => StageSelection::First,
            "last" => StageSelection::Last,
            _ => StageSelection::Pattern(value),
        }
    }
}

impl From<StageSelection> for String {
    fn from(value: StageSelection) -> Self {
        match value {
            StageSelection::All => "all".to_string(),
            StageSelection::First => "first".to_string(),
            StageSelection::Last => "last".to_string(),
            StageSelection::Pattern(p) => p,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingOptions {
    pub resource_icon_min: IconTarget,
    pub resource_icon_max: IconTarget,
    pub cfn_resource_icon_min: IconTarget,
    pub cfn_resource_icon_max: IconTarget,
    pub layout: LayoutDirection,
    pub stage: StageSelection,
    /// Regex of root stack construct ids to render.
    pub stack: Option<String>,
}

impl Default for RenderingOptions {
    fn default() -> Self {
        Self {
            resource_icon_min: IconTarget::Data,
            resource_icon_max: IconTarget::Category,
            cfn_resource_icon_min: IconTarget::Data,
            cfn_resource_icon_max: IconTarget::Service,
            layout: LayoutDirection::default(),
            stage: StageSelection::default(),
            stack: None,
        }
    }
}

/// Theme selection as it appears in configuration: a built-in palette name or
/// a path to a palette file, plus rendering options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub theme: Option<String>,
    pub rendering: RenderingOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowFormat {
    pub color: String,
    pub head: String,
    pub tail: String,
    pub width: f32,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupFormat {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub bgcolor: Option<String>,
    #[serde(default)]
    pub border_color: Option<String>,
    pub border_style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backgrounds {
    pub base: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextColors {
    pub default: String,
    pub primary: String,
    pub secondary: String,
    pub tertiary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrows {
    pub default: ArrowFormat,
    pub child: ArrowFormat,
    pub reference: ArrowFormat,
    pub dependency: ArrowFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Groups {
    pub account: GroupFormat,
    pub generic_alt: GroupFormat,
}

/// Colour palette a [`GraphTheme`] is derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub id: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    pub backgrounds: Backgrounds,
    pub text: TextColors,
    pub arrows: Arrows,
    pub groups: Groups,
}

fn default_font_family() -> String {
    DEFAULT_FONT_FAMILY.to_string()
}

impl Palette {
    pub fn from_builtin(name: &str) -> Result<Self, DiagramError> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        let content = BUILTIN_PALETTES
            .iter()
            .find(|(n, _)| *n == normalized)
            .map(|(_, c)| *c)
            .ok_or_else(|| {
                DiagramError::Theme(format!(
                    "Unknown built-in theme '{}'. Available: {}",
                    name,
                    Self::list_builtins().join(", ")
                ))
            })?;
        Self::from_toml(content)
    }

    pub fn list_builtins() -> Vec<&'static str> {
        BUILTIN_PALETTES.iter().map(|(n, _)| *n).collect()
    }

    pub fn from_toml(content: &str) -> Result<Self, DiagramError> {
        toml::from_str(content)
            .map_err(|e| DiagramError::Theme(format!("Failed to parse palette TOML: {}", e)))
    }

    pub fn from_yaml(content: &str) -> Result<Self, DiagramError> {
        serde_yaml::from_str(content)
            .map_err(|e| DiagramError::Theme(format!("Failed to parse palette YAML: {}", e)))
    }

    /// Loads a palette by built-in name, or from a TOML/YAML file path.
    pub fn load(name_or_path: &str) -> Result<Self, DiagramError> {
        let path = std::path::Path::new(name_or_path);
        if !path.is_file() {
            return Self::from_builtin(name_or_path);
        }

        let content = std::fs::read_to_string(path)?;
        // TOML first, then YAML
        match Self::from_toml(&content) {
            Ok(palette) => Ok(palette),
            Err(_) => Self::from_yaml(&content),
        }
    }
}

/// Resolved attribute tables keyed by entity role.
///
/// A theme is an explicit value handed to the builder; nothing about it is
/// global, so concurrent builds may use different themes.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphTheme {
    pub rendering: RenderingOptions,

    pub graph: Attributes,
    pub subgraph: Attributes,
    pub cluster: Attributes,
    pub node: Attributes,
    pub edge: Attributes,

    pub stage: Attributes,
    pub stack: Attributes,
    pub nested_stack: Attributes,

    pub image_node: Attributes,
    pub cfn_resource_node: Attributes,
    pub resource_node: Attributes,

    pub child_link: Attributes,
    pub reference_link: Attributes,
    pub dependency_link: Attributes,

    pub palette: Option<Palette>,
}

impl Default for GraphTheme {
    fn default() -> Self {
        Self::resolve(&ThemeConfig::default()).expect("built-in light theme must parse")
    }
}

impl GraphTheme {
    /// Resolves a [`ThemeConfig`] into attribute tables.
    pub fn resolve(config: &ThemeConfig) -> Result<Self, DiagramError> {
        let name = config.theme.as_deref().unwrap_or(DEFAULT_PALETTE);
        let palette = Palette::load(name)?;
        Ok(Self::from_palette(palette, config.rendering.clone()))
    }

    /// Base attribute tables with no palette applied.
    pub fn base(rendering: RenderingOptions, font_family: &str) -> Self {
        let font = |f: GraphFont| f.fontname(font_family);

        let mut graph = attributes(&[
            ("center", "true"),
            ("compound", "true"),
            ("concentrate", "true"),
            ("dpi", "300"),
            ("fontcolor", "#222222"),
            ("fontnames", "ps"),
            ("fontsize", "14"),
            ("forcelabels", "true"),
            ("labelloc", "tc"),
            ("nodesep", "0.6"),
            ("pad", "0.2"),
            ("ranksep", "0.75"),
            ("ratio", "compress"),
            ("remincross", "true"),
            ("splines", "ortho"),
        ]);
        graph.insert("fontname".into(), font(GraphFont::Regular));
        let rankdir = match rendering.layout {
            LayoutDirection::Horizontal => "LR",
            LayoutDirection::Vertical => "TB",
        };
        graph.insert("rankdir".into(), rankdir.into());

        let mut subgraph = attributes(&[
            ("labelloc", "tc"),
            ("fontsize", "12"),
            ("style", "rounded,solid"),
        ]);
        subgraph.insert("fontname".into(), font(GraphFont::LightItalic));

        let mut cluster = attributes(&[
            ("labelloc", "tc"),
            ("fontsize", "12"),
            ("style", "rounded,dashed"),
        ]);
        cluster.insert("fontname".into(), font(GraphFont::Light));

        let mut stage = attributes(&[("style", "dashed"), ("margin", "6"), ("rank", "same")]);
        stage.insert("fontname".into(), font(GraphFont::BoldItalic));

        let mut stack = attributes(&[
            ("style", "solid,bold,filled"),
            ("fillcolor", "#5A6B861A"),
            ("margin", "10"),
        ]);
        stack.insert("fontname".into(), font(GraphFont::Light));

        let mut nested_stack = attributes(&[
            ("style", "solid,filled"),
            ("fillcolor", "#5A6B861A"),
            ("margin", "6"),
        ]);
        nested_stack.insert("fontname".into(), font(GraphFont::LightItalic));

        let mut node = attributes(&[
            ("shape", "box"),
            ("style", "solid"),
            ("fixedsize", "false"),
            ("width", "0.25"),
            ("height", "0.25"),
            ("labelloc", "c"),
            ("imagescale", "true"),
            ("fontsize", "11"),
            ("penwidth", "0.25"),
        ]);
        node.insert("fontname".into(), font(GraphFont::Regular));

        let image_node = attributes(&[
            ("shape", "box"),
            ("style", "solid,rounded"),
            ("fixedsize", "true"),
            ("width", "1"),
            ("height", "1"),
            ("labelloc", "b"),
            ("imagescale", "true"),
            ("imagepos", "tc"),
            ("penwidth", "0"),
            ("fillcolor", "transparent"),
        ]);

        let cfn_resource_node = attributes(&[
            ("width", "1"),
            ("height", "1"),
            ("fixedsize", "true"),
            ("style", "solid,rounded"),
            ("color", "#999999"),
            ("fontcolor", "#999999"),
        ]);

        let resource_node = attributes(&[
            ("width", "1"),
            ("height", "1"),
            ("fixedsize", "true"),
            ("color", "#666666"),
            ("fontcolor", "#666666"),
        ]);

        let mut edge = attributes(&[
            ("dir", "both"),
            ("color", "#545B64"),
            ("penwidth", "0.75"),
            ("arrowhead", "dot"),
            ("arrowtail", "dot"),
            ("arrowsize", "0.5"),
            ("fontsize", "9"),
            ("style", "solid"),
        ]);
        edge.insert("fontname".into(), font(GraphFont::LightItalic));

        let child_link = attributes(&[
            ("penwidth", "1"),
            ("arrowhead", "none"),
            ("arrowtail", "normal"),
            ("arrowsize", "1"),
            ("style", "solid"),
        ]);

        let reference_link = attributes(&[
            ("penwidth", "1"),
            ("arrowhead", "none"),
            ("arrowtail", "normal"),
            ("arrowsize", "0.75"),
            ("style", "solid"),
        ]);

        let dependency_link = attributes(&[
            ("penwidth", "0.75"),
            ("arrowhead", "dot"),
            ("arrowtail", "odot"),
            ("arrowsize", "0.75"),
            ("style", "dotted"),
        ]);

        Self {
            rendering,
            graph,
            subgraph,
            cluster,
            node,
            edge,
            stage,
            stack,
            nested_stack,
            image_node,
            cfn_resource_node,
            resource_node,
            child_link,
            reference_link,
            dependency_link,
            palette: None,
        }
    }

    /// Base tables overlaid with palette colours.
    pub fn from_palette(palette: Palette, rendering: RenderingOptions) -> Self {
        let mut theme = Self::base(rendering, &palette.font_family);

        apply(
            &mut theme.graph,
            &attributes(&[
                ("bgcolor", palette.backgrounds.base.as_str()),
                ("fontcolor", palette.text.default.as_str()),
            ]),
        );
        apply(&mut theme.node, &attributes(&[("fontcolor", palette.text.primary.as_str())]));
        apply(&mut theme.edge, &arrow_attributes(&palette.arrows.default));

        apply(&mut theme.stage, &group_attributes(&palette.groups.account, true));
        apply(&mut theme.stack, &group_attributes(&palette.groups.generic_alt, true));
        apply(
            &mut theme.nested_stack,
            &group_attributes(&palette.groups.generic_alt, true),
        );

        apply(
            &mut theme.cfn_resource_node,
            &attributes(&[
                ("color", palette.text.secondary.as_str()),
                ("fontcolor", palette.text.secondary.as_str()),
            ]),
        );
        apply(
            &mut theme.resource_node,
            &attributes(&[
                ("color", palette.text.primary.as_str()),
                ("fontcolor", palette.text.primary.as_str()),
            ]),
        );

        apply(&mut theme.child_link, &arrow_attributes(&palette.arrows.child));
        apply(&mut theme.reference_link, &arrow_attributes(&palette.arrows.reference));
        apply(&mut theme.dependency_link, &arrow_attributes(&palette.arrows.dependency));

        theme.palette = Some(palette);
        theme
    }

    /// Colour used to fade imported resources.
    pub fn tertiary_text(&self) -> &str {
        self.palette
            .as_ref()
            .map(|p| p.text.tertiary.as_str())
            .unwrap_or("#555555")
    }
}

fn arrow_attributes(arrow: &ArrowFormat) -> Attributes {
    let width = arrow.width.to_string();
    attributes(&[
        ("color", arrow.color.as_str()),
        ("fontcolor", arrow.color.as_str()),
        ("arrowtail", arrow.tail.as_str()),
        ("arrowhead", arrow.head.as_str()),
        ("penwidth", width.as_str()),
        ("style", arrow.style.as_str()),
    ])
}

fn group_attributes(group: &GroupFormat, ignore_style: bool) -> Attributes {
    let mut attrs = Attributes::new();

    if !ignore_style {
        if group.border_style == "none" {
            attrs.insert("style".into(), "solid".into());
            attrs.insert("penwidth".into(), "0".into());
        } else {
            attrs.insert("style".into(), group.border_style.clone());
        }
    }

    let transparent = || "transparent".to_string();
    attrs.insert("color".into(), group.color.clone().unwrap_or_else(transparent));
    attrs.insert("bgcolor".into(), group.bgcolor.clone().unwrap_or_else(transparent));
    attrs.insert("fillcolor".into(), group.bgcolor.clone().unwrap_or_else(transparent));
    attrs.insert(
        "pencolor".into(),
        group.border_color.clone().unwrap_or_else(transparent),
    );
    if let Some(color) = group.color.as_ref().filter(|c| *c != "transparent") {
        attrs.insert("fontcolor".into(), color.clone());
    }

    attrs
}
