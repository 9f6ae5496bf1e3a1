use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::diagram::{DEFAULT_TITLE, DiagramOptions, NodePosition};
use crate::error::DiagramError;
use crate::theme::ThemeConfig;

pub const DEFAULT_DIAGRAM_NAME: &str = "diagram";

/// Output formats. Each format implies every format it is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramFormat {
    Dot,
    Svg,
    Png,
    Pdf,
}

impl DiagramFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DiagramFormat::Dot => "dot",
            DiagramFormat::Svg => "svg",
            DiagramFormat::Png => "png",
            DiagramFormat::Pdf => "pdf",
        }
    }

    /// Formats that must be produced to produce `self`.
    fn implied(&self) -> &'static [DiagramFormat] {
        match self {
            DiagramFormat::Dot => &[DiagramFormat::Dot],
            DiagramFormat::Svg => &[DiagramFormat::Dot, DiagramFormat::Svg],
            DiagramFormat::Png => &[DiagramFormat::Dot, DiagramFormat::Svg, DiagramFormat::Png],
            DiagramFormat::Pdf => &[DiagramFormat::Dot, DiagramFormat::Svg, DiagramFormat::Pdf],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPreset {
    #[default]
    Compact,
    None,
}

/// Settings shared by every diagram unless it opts out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramDefaults {
    pub formats: Option<Vec<DiagramFormat>>,
    pub preset: Option<FilterPreset>,
    pub theme: Option<ThemeConfig>,
    pub node_positions: Option<HashMap<String, NodePosition>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramConfig {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub formats: Option<Vec<DiagramFormat>>,
    #[serde(default)]
    pub preset: Option<FilterPreset>,
    #[serde(default)]
    pub theme: Option<ThemeConfig>,
    #[serde(default)]
    pub node_positions: Option<HashMap<String, NodePosition>>,
    /// Skip `defaults` entirely for this diagram.
    #[serde(default)]
    pub ignore_defaults: bool,
}

impl DiagramConfig {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            formats: None,
            preset: None,
            theme: None,
            node_positions: None,
            ignore_defaults: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub defaults: DiagramDefaults,
    pub diagrams: Vec<DiagramConfig>,
}

/// A diagram config with defaults applied and formats expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDiagram {
    pub name: String,
    pub title: String,
    pub formats: BTreeSet<DiagramFormat>,
    pub preset: FilterPreset,
    pub theme: ThemeConfig,
    pub node_positions: HashMap<String, NodePosition>,
}

impl ResolvedDiagram {
    pub fn generates(&self, format: DiagramFormat) -> bool {
        self.formats.contains(&format)
    }

    /// File name of the artifact for `format`.
    pub fn artifact_name(&self, format: DiagramFormat) -> String {
        artifact_name(&self.name, format)
    }

    pub fn options(&self) -> DiagramOptions {
        DiagramOptions {
            title: self.title.clone(),
            compact: self.preset == FilterPreset::Compact,
            node_positions: self.node_positions.clone(),
            imagepath: None,
        }
    }
}

pub fn artifact_name(name: &str, format: DiagramFormat) -> String {
    if name == DEFAULT_DIAGRAM_NAME {
        format!("{}.{}", DEFAULT_DIAGRAM_NAME, format.extension())
    } else {
        format!("{}.{}.{}", DEFAULT_DIAGRAM_NAME, name, format.extension())
    }
}

impl PluginConfig {
    pub fn from_toml(content: &str) -> Result<Self, DiagramError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, DiagramError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Diagrams to generate; the default diagram when none are configured.
    pub fn resolved_diagrams(&self) -> Result<Vec<ResolvedDiagram>, DiagramError> {
        if self.diagrams.is_empty() {
            let default = DiagramConfig::new(DEFAULT_DIAGRAM_NAME, DEFAULT_TITLE);
            return Ok(vec![self.resolve(&default)?]);
        }
        self.diagrams.iter().map(|d| self.resolve(d)).collect()
    }

    fn resolve(&self, diagram: &DiagramConfig) -> Result<ResolvedDiagram, DiagramError> {
        let empty = DiagramDefaults::default();
        let defaults = if diagram.ignore_defaults { &empty } else { &self.defaults };

        let requested = diagram
            .formats
            .clone()
            .or_else(|| defaults.formats.clone())
            .unwrap_or_else(|| vec![DiagramFormat::Png]);
        if requested.is_empty() {
            return Err(DiagramError::InvalidConfig {
                name: diagram.name.clone(),
                reason: "empty list of formats".into(),
            });
        }
        let formats = requested
            .iter()
            .flat_map(|f| f.implied().iter().copied())
            .collect();

        Ok(ResolvedDiagram {
            name: diagram.name.clone(),
            title: diagram.title.clone(),
            formats,
            preset: diagram.preset.or(defaults.preset).unwrap_or_default(),
            theme: diagram
                .theme
                .clone()
                .or_else(|| defaults.theme.clone())
                .unwrap_or_default(),
            node_positions: diagram
                .node_positions
                .clone()
                .or_else(|| defaults.node_positions.clone())
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::LayoutDirection;

    #[test]
    fn no_diagrams_yields_default() {
        let diagrams = PluginConfig::default().resolved_diagrams().unwrap();
        assert_eq!(diagrams.len(), 1);

        let diagram = &diagrams[0];
        assert_eq!(diagram.name, "diagram");
        assert_eq!(diagram.title, "Cloud Diagram");
        assert_eq!(diagram.preset, FilterPreset::Compact);
        assert!(diagram.generates(DiagramFormat::Dot));
        assert!(diagram.generates(DiagramFormat::Svg));
        assert!(diagram.generates(DiagramFormat::Png));
        assert!(!diagram.generates(DiagramFormat::Pdf));
        assert_eq!(diagram.artifact_name(DiagramFormat::Png), "diagram.png");
    }

    #[test]
    fn formats_imply_their_sources() {
        let config = PluginConfig::from_toml(
            r#"
[[diagrams]]
name = "svg-only"
title = "Vector"
formats = ["svg"]

[[diagrams]]
name = "print"
title = "Print"
formats = ["pdf"]
"#,
        )
        .unwrap();
        let diagrams = config.resolved_diagrams().unwrap();

        let svg: Vec<_> = diagrams[0].formats.iter().copied().collect();
        assert_eq!(svg, vec![DiagramFormat::Dot, DiagramFormat::Svg]);
        assert_eq!(diagrams[0].artifact_name(DiagramFormat::Svg), "diagram.svg-only.svg");

        assert!(diagrams[1].generates(DiagramFormat::Pdf));
        assert!(diagrams[1].generates(DiagramFormat::Svg));
        assert!(!diagrams[1].generates(DiagramFormat::Png));
    }

    #[test]
    fn defaults_apply_unless_ignored() {
        let config = PluginConfig::from_toml(
            r#"
[defaults]
formats = ["dot"]
preset = "none"

[defaults.theme]
theme = "dark"
rendering = { layout = "horizontal" }

[defaults.node_positions]
Bucket = { x = 1.0, y = 2.0 }

[[diagrams]]
name = "inherits"
title = "Inherits"

[[diagrams]]
name = "own"
title = "Own"
ignore_defaults = true
"#,
        )
        .unwrap();
        let diagrams = config.resolved_diagrams().unwrap();

        let inherits = &diagrams[0];
        assert_eq!(inherits.formats.len(), 1);
        assert_eq!(inherits.preset, FilterPreset::None);
        assert!(!inherits.options().compact);
        assert_eq!(inherits.theme.theme.as_deref(), Some("dark"));
        assert_eq!(inherits.theme.rendering.layout, LayoutDirection::Horizontal);
        assert_eq!(inherits.node_positions["Bucket"], NodePosition { x: 1.0, y: 2.0 });

        let own = &diagrams[1];
        assert!(own.generates(DiagramFormat::Png));
        assert_eq!(own.preset, FilterPreset::Compact);
        assert_eq!(own.theme, ThemeConfig::default());
        assert!(own.node_positions.is_empty());
    }

    #[test]
    fn empty_format_list_is_rejected() {
        let mut config = PluginConfig::default();
        let mut diagram = DiagramConfig::new("broken", "Broken");
        diagram.formats = Some(Vec::new());
        config.diagrams.push(diagram);

        let err = config.resolved_diagrams().unwrap_err();
        assert!(matches!(err, DiagramError::InvalidConfig { ref name, .. } if name == "broken"));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = PluginConfig::from_toml("diagrams = 3").unwrap_err();
        assert!(matches!(err, DiagramError::Config(_)));
    }
}
