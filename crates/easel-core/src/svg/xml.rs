//! Owned XML tree plus the parse/serialize port used by the SVG pipeline.

use super::{SvgError, SvgResult};
use roxmltree::{Node, ParsingOptions};

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Deepest element nesting accepted from untrusted markup.
pub const MAX_ELEMENT_DEPTH: usize = 256;

/// A child of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An element with qualified attribute names.
///
/// Namespace declarations are stored as ordinary `xmlns` / `xmlns:prefix`
/// attributes, so they survive edits and serialize where they were declared.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element name without its prefix.
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Set an attribute, replacing in place or appending.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(index).1)
    }

    /// Move namespace declarations to the front in a fixed order: the default
    /// namespace first, then prefixed ones by prefix.
    pub fn canonicalize_namespace_decls(&mut self) {
        let is_decl = |k: &str| k == "xmlns" || k.starts_with("xmlns:");
        let (mut decls, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.attributes)
            .into_iter()
            .partition(|(k, _)| is_decl(k));
        decls.sort_by(|(a, _), (b, _)| (a != "xmlns", a).cmp(&(b != "xmlns", b)));
        decls.extend(rest);
        self.attributes = decls;
    }

    pub fn push_element(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(XmlNode::Text(text.into()));
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Whether this element or any descendant satisfies `predicate`.
    pub fn any(&self, predicate: &impl Fn(&XmlElement) -> bool) -> bool {
        predicate(self) || self.elements().any(|e| e.any(predicate))
    }

    /// Remove descendant elements (at any depth) matching `predicate`.
    /// Returns the number removed.
    pub fn remove_descendants(&mut self, predicate: &impl Fn(&XmlElement) -> bool) -> usize {
        let before = self.children.len();
        self.children
            .retain(|c| !matches!(c, XmlNode::Element(e) if predicate(e)));
        let mut removed = before - self.children.len();
        for child in self.elements_mut() {
            removed += child.remove_descendants(predicate);
        }
        removed
    }

    /// Apply `f` to this element and every descendant element.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut XmlElement)) {
        f(self);
        for child in self.elements_mut() {
            child.visit_mut(f);
        }
    }
}

fn collect_text(element: &XmlElement, out: &mut String) {
    for child in &element.children {
        match child {
            XmlNode::Text(t) => out.push_str(t),
            XmlNode::Element(e) => collect_text(e, out),
        }
    }
}

/// Parses markup into an owned tree and serializes it back.
pub trait XmlPort {
    fn parse(&self, markup: &str) -> SvgResult<XmlElement>;
    fn serialize(&self, root: &XmlElement) -> String;
}

/// [`XmlPort`] backed by `roxmltree`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoxmlPort;

impl XmlPort for RoxmlPort {
    fn parse(&self, markup: &str) -> SvgResult<XmlElement> {
        let depth = element_depth(markup);
        if depth > MAX_ELEMENT_DEPTH {
            return Err(SvgError::TooDeep(depth));
        }
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(markup, options)
            .map_err(|e| SvgError::Xml(e.to_string()))?;
        Ok(convert_element(doc.root_element(), None))
    }

    fn serialize(&self, root: &XmlElement) -> String {
        let mut out = String::with_capacity(1024);
        write_element(root, &mut out);
        out
    }
}

fn prefix_for<'a, 'input>(node: Node<'a, 'input>, uri: &str) -> Option<&'input str> {
    node.namespaces()
        .find(|ns| ns.uri() == uri)
        .and_then(|ns| ns.name())
}

/// Attributes are never in the default namespace, so only a prefixed
/// binding qualifies them.
fn attribute_prefix<'a, 'input>(node: Node<'a, 'input>, uri: &str) -> Option<&'input str> {
    node.namespaces()
        .filter(|ns| ns.uri() == uri)
        .find_map(|ns| ns.name())
}

fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local}"),
        None => local.to_string(),
    }
}

fn convert_element(node: Node<'_, '_>, parent: Option<Node<'_, '_>>) -> XmlElement {
    let tag = node.tag_name();
    let prefix = tag.namespace().and_then(|uri| prefix_for(node, uri));
    let mut element = XmlElement::new(qualify(prefix, tag.name()));

    // Declarations introduced on this element.
    for ns in node.namespaces() {
        if ns.uri() == XML_NS {
            continue;
        }
        let inherited = parent.is_some_and(|p| {
            p.namespaces()
                .any(|pns| pns.name() == ns.name() && pns.uri() == ns.uri())
        });
        if !inherited {
            let key = match ns.name() {
                Some(name) => format!("xmlns:{name}"),
                None => "xmlns".to_string(),
            };
            element.attributes.push((key, ns.uri().to_string()));
        }
    }

    for attr in node.attributes() {
        let name = match attr.namespace() {
            Some(XML_NS) => format!("xml:{}", attr.name()),
            Some(uri) => qualify(attribute_prefix(node, uri), attr.name()),
            None => attr.name().to_string(),
        };
        element.attributes.push((name, attr.value().to_string()));
    }
    element.canonicalize_namespace_decls();

    for child in node.children() {
        if child.is_element() {
            element.push_element(convert_element(child, Some(node)));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                element.push_text(text);
            }
        }
    }
    element
}

/// Maximum element nesting found by a lexical scan. Comments, CDATA,
/// declarations and quoted attribute values are skipped; malformed markup
/// yields an estimate, never a panic.
pub fn element_depth(markup: &str) -> usize {
    let bytes = markup.as_bytes();
    let skip_past = |from: usize, end: &str| {
        markup[from..]
            .find(end)
            .map_or(bytes.len(), |i| from + i + end.len())
    };
    let (mut i, mut depth, mut max) = (0, 0usize, 0usize);
    while let Some(offset) = markup[i..].find('<') {
        let start = i + offset;
        let rest = &markup[start..];
        if rest.starts_with("<!--") {
            i = skip_past(start, "-->");
        } else if rest.starts_with("<![CDATA[") {
            i = skip_past(start, "]]>");
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            i = skip_past(start, ">");
        } else if rest.starts_with("</") {
            depth = depth.saturating_sub(1);
            i = skip_past(start, ">");
        } else {
            let mut j = start + 1;
            let mut quote = None;
            while j < bytes.len() {
                match (quote, bytes[j]) {
                    (Some(q), b) if b == q => quote = None,
                    (None, b @ (b'"' | b'\'')) => quote = Some(b),
                    (None, b'>') => break,
                    _ => {}
                }
                j += 1;
            }
            max = max.max(depth + 1);
            if j >= bytes.len() || bytes[j - 1] != b'/' {
                depth += 1;
            }
            i = (j + 1).min(bytes.len());
        }
    }
    max
}

fn write_element(element: &XmlElement, out: &mut String) {
    out.push('<');
    out.push_str(&element.name);
    for (name, value) in &element.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &element.children {
        match child {
            XmlNode::Element(e) => write_element(e, out),
            XmlNode::Text(t) => out.push_str(&escape_text(t)),
        }
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize() {
        let port = RoxmlPort;
        let root = port
            .parse(r#"<svg xmlns="http://www.w3.org/2000/svg"><rect width="10"/>hi</svg>"#)
            .unwrap();
        assert_eq!(root.local_name(), "svg");
        assert_eq!(root.attr("xmlns"), Some(SVG_NS));
        assert_eq!(
            port.serialize(&root),
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect width="10"/>hi</svg>"#
        );
    }

    #[test]
    fn test_namespaces_declared_once() {
        let port = RoxmlPort;
        let markup = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"><g><use xlink:href="#a"/></g></svg>"##;
        let root = port.parse(markup).unwrap();
        assert_eq!(root.attr("xmlns:xlink"), Some(XLINK_NS));
        let group = root.elements().next().unwrap();
        assert!(group.attributes.is_empty());
        let link = group.elements().next().unwrap();
        assert_eq!(link.attr("xlink:href"), Some("#a"));
        let reparsed = port.parse(&port.serialize(&root)).unwrap();
        assert_eq!(reparsed, root);
    }

    #[test]
    fn test_entities_are_escaped_on_output() {
        let port = RoxmlPort;
        let root = port.parse("<svg><text>a &amp; b &lt; c</text></svg>").unwrap();
        let text = root.elements().next().unwrap();
        assert_eq!(text.text_content(), "a & b < c");
        assert_eq!(port.serialize(&root), "<svg><text>a &amp; b &lt; c</text></svg>");
    }

    #[test]
    fn test_serialization_is_stable() {
        let port = RoxmlPort;
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg" width="1" title="a &quot;b&quot;"><!-- c --><g/></svg>"#;
        let once = port.serialize(&port.parse(markup).unwrap());
        let twice = port.serialize(&port.parse(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_prefixed_attribute_keeps_prefix() {
        let port = RoxmlPort;
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:s="http://www.w3.org/2000/svg"><rect width="1" s:width="2"/></svg>"#;
        let root = port.parse(markup).unwrap();
        let rect = root.elements().next().unwrap();
        assert_eq!(rect.attr("width"), Some("1"));
        assert_eq!(rect.attr("s:width"), Some("2"));
        let reparsed = port.parse(&port.serialize(&root)).unwrap();
        assert_eq!(reparsed, root);
    }

    #[test]
    fn test_element_depth() {
        assert_eq!(element_depth("<svg/>"), 1);
        assert_eq!(element_depth("<svg><g><rect/></g><g/></svg>"), 3);
        assert_eq!(element_depth("<svg><!-- <g><g> --><![CDATA[<g>]]><g a='>'/></svg>"), 2);
        assert_eq!(element_depth("<?xml version='1.0'?><!DOCTYPE svg><svg><g>"), 2);
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let depth = MAX_ELEMENT_DEPTH * 100;
        let markup = format!("<svg>{}{}</svg>", "<g>".repeat(depth), "</g>".repeat(depth));
        assert!(matches!(RoxmlPort.parse(&markup), Err(SvgError::TooDeep(_))));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(RoxmlPort.parse("<svg><rect x=/></svg>"), Err(SvgError::Xml(_))));
    }

    #[test]
    fn test_attribute_editing() {
        let mut element = XmlElement::new("rect");
        element.set_attr("fill", "red");
        element.set_attr("fill", "blue");
        assert_eq!(element.attributes.len(), 1);
        assert_eq!(element.remove_attr("fill").as_deref(), Some("blue"));
        assert!(!element.has_attr("fill"));
    }

    #[test]
    fn test_remove_descendants() {
        let mut root = RoxmlPort
            .parse("<svg><script/><g><script/><rect/></g></svg>")
            .unwrap();
        let removed = root.remove_descendants(&|e: &XmlElement| e.local_name() == "script");
        assert_eq!(removed, 2);
        assert!(!root.any(&|e: &XmlElement| e.local_name() == "script"));
    }
}
