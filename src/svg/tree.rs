use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::reader::Reader as XmlReader;

use super::SvgError;
use crate::xml::{decode_xml, escape_xml};

/// A child of an [`SvgElement`].
#[derive(Debug, Clone, PartialEq)]
pub enum SvgNode {
    Element(SvgElement),
    Text(String),
}

/// Mutable in-memory SVG element.
///
/// Attribute values and text hold decoded (logical) strings; escaping is
/// applied once again when the tree is serialised.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SvgElement {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<SvgNode>,
}

impl SvgElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        self.attributes.shift_remove(key)
    }

    pub fn elements(&self) -> impl Iterator<Item = &SvgElement> {
        self.children.iter().filter_map(|c| match c {
            SvgNode::Element(e) => Some(e),
            SvgNode::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut SvgElement> {
        self.children.iter_mut().filter_map(|c| match c {
            SvgNode::Element(e) => Some(e),
            SvgNode::Text(_) => None,
        })
    }

    /// First direct child element with the given tag name.
    pub fn child(&self, name: &str) -> Option<&SvgElement> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut SvgElement> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                SvgNode::Text(t) => Some(t.as_str()),
                SvgNode::Element(_) => None,
            })
            .collect()
    }

    /// Visits this element and every descendant, parents first.
    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut SvgElement)) {
        visit(self);
        for child in self.elements_mut() {
            child.walk_mut(visit);
        }
    }

    /// Counts this element and every descendant matching `predicate`.
    pub fn count(&self, predicate: &dyn Fn(&SvgElement) -> bool) -> usize {
        let own = usize::from(predicate(self));
        own + self.elements().map(|e| e.count(predicate)).sum::<usize>()
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(SvgNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(SvgNode::Text(text.to_string()));
        }
    }

    fn drop_blank_text(&mut self) {
        let has_elements = self.elements().next().is_some();
        if has_elements {
            self.children
                .retain(|c| !matches!(c, SvgNode::Text(t) if t.trim().is_empty()));
        }
    }

    /// Serialises the element, without an XML declaration.
    pub fn to_svg_string(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_xml(value));
            out.push('"');
        }

        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        for child in &self.children {
            match child {
                SvgNode::Element(e) => e.write_into(out),
                SvgNode::Text(t) => out.push_str(&escape_xml(t)),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Parses an SVG document into its root element.
///
/// Declarations, doctypes, comments and processing instructions are dropped.
pub fn parse_svg(source: &str) -> Result<SvgElement, SvgError> {
    let mut reader = XmlReader::from_str(source);
    let mut stack: Vec<SvgElement> = Vec::new();
    let mut root: Option<SvgElement> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(ref e)) => stack.push(element_from(e)),
            Ok(XmlEvent::Empty(ref e)) => attach(&mut stack, &mut root, element_from(e))?,
            Ok(XmlEvent::End(_)) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| SvgError::Malformed("unbalanced closing tag".into()))?;
                element.drop_blank_text();
                attach(&mut stack, &mut root, element)?;
            }
            Ok(XmlEvent::Text(ref e)) => {
                if let Some(parent) = stack.last_mut() {
                    let raw = e.decode().map_err(|e| SvgError::Malformed(e.to_string()))?;
                    parent.push_text(&decode_xml(&raw));
                }
            }
            Ok(XmlEvent::GeneralRef(ref e)) => {
                if let Some(parent) = stack.last_mut() {
                    let name = e.decode().map_err(|e| SvgError::Malformed(e.to_string()))?;
                    let reference = format!("&{};", name);
                    parent.push_text(&decode_xml(&reference));
                }
            }
            Ok(XmlEvent::CData(ref e)) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(XmlEvent::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SvgError::Malformed(format!(
                    "{} at position {}",
                    e,
                    reader.error_position()
                )));
            }
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(SvgError::Malformed("unclosed element at end of document".into()));
    }
    root.ok_or(SvgError::Empty)
}

fn element_from(start: &BytesStart) -> SvgElement {
    let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let attributes = start
        .attributes()
        .filter_map(|a| a.ok())
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).to_string();
            let raw = String::from_utf8_lossy(&a.value);
            let value = decode_xml(&raw).into_owned();
            (key, value)
        })
        .collect();

    SvgElement {
        name,
        attributes,
        children: Vec::new(),
    }
}

fn attach(
    stack: &mut [SvgElement],
    root: &mut Option<SvgElement>,
    element: SvgElement,
) -> Result<(), SvgError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(SvgNode::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(SvgError::Malformed("multiple root elements".into()));
    }
    *root = Some(element);
    Ok(())
}
