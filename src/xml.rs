use std::borrow::Cow;

/// XML 1.0 valid char ranges:
/// - 0x09, 0x0A, 0x0D
/// - 0x20..=0xD7FF
/// - 0xE000..=0xFFFD
/// - 0x10000..=0x10FFFF
fn is_valid_xml_char(c: char) -> bool {
    matches!(
        c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF
    )
}

pub fn sanitize_xml_text(text: &str) -> String {
    text.chars().filter(|&c| is_valid_xml_char(c)).collect()
}

pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if !is_valid_xml_char(c) {
            continue;
        }
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Decodes one level of XML escaping from raw document text.
///
/// Malformed references are kept verbatim rather than rejected; layout engines
/// occasionally emit stray ampersands.
pub fn decode_xml(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    match quick_xml::escape::unescape(raw) {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(raw),
    }
}

/// Decodes HTML entity sequences (`&#45;`, `&amp;`, `&nbsp;`) exactly once.
///
/// Values without an ampersand are returned untouched.
pub fn unescape_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    htmlize::unescape(text)
}

#[cfg(test)]
mod tests {
    use super::{decode_xml, escape_xml, sanitize_xml_text, unescape_entities};

    #[test]
    fn remove_invalid_control_chars() {
        let s = "A\u{0007}B\u{000C}C";
        assert_eq!(sanitize_xml_text(s), "ABC");
        assert_eq!(escape_xml(s), "ABC");
    }

    #[test]
    fn keep_valid_whitespace_controls() {
        let s = "a\tb\nc\rd";
        assert_eq!(sanitize_xml_text(s), s);
        assert_eq!(escape_xml(s), s);
    }

    #[test]
    fn escape_special_xml_chars() {
        let s = r#"<tag attr="x&y">'z'"#;
        assert_eq!(
            escape_xml(s),
            "&lt;tag attr=&quot;x&amp;y&quot;&gt;&apos;z&apos;"
        );
    }

    #[test]
    fn decode_xml_keeps_malformed_references() {
        assert_eq!(decode_xml("a &amp; b"), "a & b");
        assert_eq!(decode_xml("a & b"), "a & b");
        assert_eq!(decode_xml("plain"), "plain");
    }

    #[test]
    fn unescape_entities_decodes_once() {
        assert_eq!(unescape_entities("Diagram (hyphenated&#45;value)"), "Diagram (hyphenated-value)");
        // a doubly escaped value only loses one level
        assert_eq!(unescape_entities("&amp;#45;"), "&#45;");
    }

    #[test]
    fn unescape_entities_is_identity_on_clean_text() {
        let clean = "Stack / Bucket <ok> 100%";
        assert_eq!(unescape_entities(clean), clean);
    }
}
