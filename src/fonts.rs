/// Font variants referenced by the theme attribute tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFont {
    Regular,
    Light,
    LightItalic,
    Bold,
    BoldItalic,
}

impl GraphFont {
    /// Fontconfig pattern understood by the layout engine, e.g.
    /// `Helvetica,Helvetica Light:style=Light Italic,Italic`.
    pub fn fontname(&self, family: &str) -> String {
        match self {
            GraphFont::Regular => format!("{family}:style=Regular"),
            GraphFont::Light => format!("{family},{family} Light:style=Light,Regular"),
            GraphFont::LightItalic => {
                format!("{family},{family} Light:style=Light Italic,Italic")
            }
            GraphFont::Bold => format!("{family}:style=Bold"),
            GraphFont::BoldItalic => format!("{family}:style=Bold Italic"),
        }
    }
}

/// CSS font attributes recovered from a fontconfig pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontAttributes {
    pub family: String,
    pub style: Option<&'static str>,
    pub weight: Option<&'static str>,
}

/// Parses a fontconfig pattern. Returns `None` for plain CSS family lists.
///
/// The last listed family wins since it is the most specific face
/// (`Helvetica,Helvetica Light` resolves to `Helvetica Light`).
pub fn parse_fontconfig(pattern: &str) -> Option<FontAttributes> {
    let (families, styles) = pattern.split_once(':')?;
    let family = families.split(',').map(str::trim).rfind(|f| !f.is_empty())?;

    let mut attributes = FontAttributes {
        family: family.to_string(),
        style: None,
        weight: None,
    };

    let styles = styles.trim().trim_start_matches("style=");
    for token in styles
        .split(',')
        .flat_map(|v| v.split_whitespace())
        .map(str::to_ascii_lowercase)
    {
        match token.as_str() {
            "italic" => attributes.style = Some("italic"),
            "bold" => attributes.weight = Some("bold"),
            "light" => attributes.weight = attributes.weight.or(Some("300")),
            "thin" => attributes.weight = attributes.weight.or(Some("100")),
            "medium" => attributes.weight = attributes.weight.or(Some("500")),
            "heavy" => attributes.weight = attributes.weight.or(Some("900")),
            _ => {}
        }
    }

    Some(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_italic_roundtrips_to_css() {
        let pattern = GraphFont::LightItalic.fontname("Helvetica");
        let attrs = parse_fontconfig(&pattern).expect("fontconfig pattern");
        assert_eq!(attrs.family, "Helvetica Light");
        assert_eq!(attrs.style, Some("italic"));
        assert_eq!(attrs.weight, Some("300"));
    }

    #[test]
    fn bold_sets_weight_not_style() {
        let attrs = parse_fontconfig(&GraphFont::Bold.fontname("Arial")).unwrap();
        assert_eq!(attrs.family, "Arial");
        assert_eq!(attrs.style, None);
        assert_eq!(attrs.weight, Some("bold"));
    }

    #[test]
    fn plain_family_is_not_a_pattern() {
        assert!(parse_fontconfig("sans-serif").is_none());
    }
}
